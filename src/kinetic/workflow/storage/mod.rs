// SPDX-License-Identifier: MIT

//! Persistence boundary for workflow sessions
//!
//! This module provides:
//! - `WorkflowStorage` - the pluggable session store used by `Workflow`
//! - `StorageStats` - optional aggregate statistics over stored sessions
//! - `MemoryStorage` - bounded in-memory reference implementation

mod memory;

pub use memory::MemoryStorage;

use super::session::WorkflowSession;
use crate::adk::cancel::CancelContext;
use crate::adk::error::StorageError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Session store used by the orchestrator.
///
/// Every method checks `ctx` first and returns its `CancelReason` unchanged
/// when the context is already done.
#[async_trait]
pub trait WorkflowStorage: Send + Sync {
    /// Create a session; fails with `SessionExists` if the id is taken
    async fn create_session(
        &self,
        ctx: &CancelContext,
        session_id: &str,
        workflow_id: &str,
        user_id: &str,
    ) -> Result<Arc<WorkflowSession>, StorageError>;

    async fn get_session(
        &self,
        ctx: &CancelContext,
        session_id: &str,
    ) -> Result<Arc<WorkflowSession>, StorageError>;

    /// Store an existing session and bump its `updated_at`
    async fn update_session(
        &self,
        ctx: &CancelContext,
        session: Arc<WorkflowSession>,
    ) -> Result<(), StorageError>;

    async fn delete_session(&self, ctx: &CancelContext, session_id: &str) -> Result<(), StorageError>;

    /// Sessions of one workflow. `limit` 0 means no limit.
    async fn list_sessions(
        &self,
        ctx: &CancelContext,
        workflow_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Arc<WorkflowSession>>, StorageError>;

    /// Sessions owned by one user. `limit` 0 means no limit.
    async fn list_user_sessions(
        &self,
        ctx: &CancelContext,
        user_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Arc<WorkflowSession>>, StorageError>;

    /// Remove sessions created more than `older_than` ago; returns how many
    async fn clear(&self, ctx: &CancelContext, older_than: Duration) -> Result<usize, StorageError>;

    async fn close(&self) -> Result<(), StorageError>;
}

/// Aggregate statistics, recomputed on every call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub total_sessions: usize,
    pub total_runs: usize,
    pub completed_runs: usize,
    pub successful_runs: usize,
    /// Completed but not successful, so cancelled runs are included
    pub failed_runs: usize,
    pub average_duration: Duration,
}

impl SessionStats {
    fn add_session(&mut self, session: &WorkflowSession, durations: &mut Vec<Duration>) {
        let completed = session.count_completed_runs();
        let successful = session.count_successful_runs();
        self.total_sessions += 1;
        self.total_runs += session.count_runs();
        self.completed_runs += completed;
        self.successful_runs += successful;
        self.failed_runs += completed - successful;
        durations.extend(
            session
                .get_runs()
                .iter()
                .filter(|run| run.is_completed())
                .map(|run| run.duration()),
        );
    }

    fn finish(mut self, durations: &[Duration]) -> Self {
        if !durations.is_empty() {
            let total: Duration = durations.iter().sum();
            self.average_duration = total / durations.len() as u32;
        }
        self
    }
}

/// Optional statistics extension for storage backends
#[async_trait]
pub trait StorageStats: Send + Sync {
    async fn get_stats(&self, ctx: &CancelContext) -> Result<SessionStats, StorageError>;

    async fn get_workflow_stats(
        &self,
        ctx: &CancelContext,
        workflow_id: &str,
    ) -> Result<SessionStats, StorageError>;
}
