// SPDX-License-Identifier: MIT

//! In-memory session store with FIFO eviction

use super::{SessionStats, StorageStats, WorkflowStorage};
use crate::adk::cancel::CancelContext;
use crate::adk::error::StorageError;
use crate::kinetic::workflow::session::WorkflowSession;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

struct StoredSession {
    session: Arc<WorkflowSession>,
    // insertion order, breaks `created_at` ties
    seq: u64,
}

#[derive(Default)]
struct MemoryInner {
    sessions: HashMap<String, StoredSession>,
    next_seq: u64,
}

impl MemoryInner {
    fn ordered(&self) -> Vec<&StoredSession> {
        let mut entries: Vec<&StoredSession> = self.sessions.values().collect();
        entries.sort_by_key(|entry| (entry.session.created_at(), entry.seq));
        entries
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .ordered()
            .first()
            .map(|entry| entry.session.session_id().to_string());
        if let Some(id) = oldest {
            log::debug!("Evicting oldest session {}", id);
            self.sessions.remove(&id);
        }
    }
}

/// Bounded in-memory `WorkflowStorage`.
///
/// When `max_size` sessions are stored, creating another one first evicts the
/// oldest session by creation time. `max_size` 0 means unlimited.
#[derive(Clone)]
pub struct MemoryStorage {
    inner: Arc<RwLock<MemoryInner>>,
    max_size: usize,
}

impl MemoryStorage {
    pub fn new(max_size: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(MemoryInner::default())),
            max_size,
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.sessions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.sessions.is_empty()
    }

    async fn list_where<F>(&self, limit: usize, offset: usize, keep: F) -> Vec<Arc<WorkflowSession>>
    where
        F: Fn(&WorkflowSession) -> bool,
    {
        let inner = self.inner.read().await;
        let filtered: Vec<Arc<WorkflowSession>> = inner
            .ordered()
            .into_iter()
            .filter(|entry| keep(&entry.session))
            .map(|entry| entry.session.clone())
            .collect();
        paginate(filtered, limit, offset)
    }

    async fn stats_where<F>(&self, keep: F) -> SessionStats
    where
        F: Fn(&WorkflowSession) -> bool,
    {
        let inner = self.inner.read().await;
        let mut stats = SessionStats::default();
        let mut durations = Vec::new();
        for entry in inner.sessions.values() {
            if keep(&entry.session) {
                stats.add_session(&entry.session, &mut durations);
            }
        }
        stats.finish(&durations)
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new(0)
    }
}

fn paginate<T>(items: Vec<T>, limit: usize, offset: usize) -> Vec<T> {
    let iter = items.into_iter().skip(offset);
    if limit > 0 {
        iter.take(limit).collect()
    } else {
        iter.collect()
    }
}

#[async_trait]
impl WorkflowStorage for MemoryStorage {
    async fn create_session(
        &self,
        ctx: &CancelContext,
        session_id: &str,
        workflow_id: &str,
        user_id: &str,
    ) -> Result<Arc<WorkflowSession>, StorageError> {
        if session_id.is_empty() {
            return Err(StorageError::InvalidSessionId);
        }
        if workflow_id.is_empty() {
            return Err(StorageError::InvalidWorkflowId);
        }
        ctx.check()?;

        let mut inner = self.inner.write().await;
        if inner.sessions.contains_key(session_id) {
            return Err(StorageError::SessionExists);
        }
        if self.max_size > 0 && inner.sessions.len() >= self.max_size {
            inner.evict_oldest();
        }

        let session = Arc::new(WorkflowSession::new(session_id, workflow_id, user_id));
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.sessions.insert(
            session_id.to_string(),
            StoredSession {
                session: session.clone(),
                seq,
            },
        );
        Ok(session)
    }

    async fn get_session(
        &self,
        ctx: &CancelContext,
        session_id: &str,
    ) -> Result<Arc<WorkflowSession>, StorageError> {
        if session_id.is_empty() {
            return Err(StorageError::InvalidSessionId);
        }
        ctx.check()?;

        let inner = self.inner.read().await;
        inner
            .sessions
            .get(session_id)
            .map(|entry| entry.session.clone())
            .ok_or(StorageError::SessionNotFound)
    }

    async fn update_session(
        &self,
        ctx: &CancelContext,
        session: Arc<WorkflowSession>,
    ) -> Result<(), StorageError> {
        if session.session_id().is_empty() {
            return Err(StorageError::InvalidSessionId);
        }
        ctx.check()?;

        let mut inner = self.inner.write().await;
        let entry = inner
            .sessions
            .get_mut(session.session_id())
            .ok_or(StorageError::SessionNotFound)?;
        session.touch();
        entry.session = session;
        Ok(())
    }

    async fn delete_session(&self, ctx: &CancelContext, session_id: &str) -> Result<(), StorageError> {
        if session_id.is_empty() {
            return Err(StorageError::InvalidSessionId);
        }
        ctx.check()?;

        let mut inner = self.inner.write().await;
        inner
            .sessions
            .remove(session_id)
            .map(|_| ())
            .ok_or(StorageError::SessionNotFound)
    }

    async fn list_sessions(
        &self,
        ctx: &CancelContext,
        workflow_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Arc<WorkflowSession>>, StorageError> {
        if workflow_id.is_empty() {
            return Err(StorageError::InvalidWorkflowId);
        }
        ctx.check()?;
        Ok(self
            .list_where(limit, offset, |s| s.workflow_id() == workflow_id)
            .await)
    }

    async fn list_user_sessions(
        &self,
        ctx: &CancelContext,
        user_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Arc<WorkflowSession>>, StorageError> {
        ctx.check()?;
        Ok(self
            .list_where(limit, offset, |s| s.user_id() == user_id)
            .await)
    }

    async fn clear(&self, ctx: &CancelContext, older_than: Duration) -> Result<usize, StorageError> {
        ctx.check()?;

        let cutoff = chrono::Duration::from_std(older_than)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age));
        let Some(cutoff) = cutoff else {
            return Ok(0);
        };

        let mut inner = self.inner.write().await;
        let before = inner.sessions.len();
        inner
            .sessions
            .retain(|_, entry| entry.session.created_at() >= cutoff);
        let removed = before - inner.sessions.len();
        if removed > 0 {
            log::info!("Cleared {} expired workflow sessions", removed);
        }
        Ok(removed)
    }

    async fn close(&self) -> Result<(), StorageError> {
        let mut inner = self.inner.write().await;
        inner.sessions.clear();
        Ok(())
    }
}

#[async_trait]
impl StorageStats for MemoryStorage {
    async fn get_stats(&self, ctx: &CancelContext) -> Result<SessionStats, StorageError> {
        ctx.check()?;
        Ok(self.stats_where(|_| true).await)
    }

    async fn get_workflow_stats(
        &self,
        ctx: &CancelContext,
        workflow_id: &str,
    ) -> Result<SessionStats, StorageError> {
        if workflow_id.is_empty() {
            return Err(StorageError::InvalidWorkflowId);
        }
        ctx.check()?;
        Ok(self.stats_where(|s| s.workflow_id() == workflow_id).await)
    }
}
