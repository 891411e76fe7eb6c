// SPDX-License-Identifier: MIT

//! A single execution attempt of a workflow

use crate::adk::message::Message;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Record of one workflow execution.
///
/// Status moves `Pending -> Running -> {Completed | Failed | Cancelled}`.
/// Once a terminal status is reached further `mark_*` calls are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub run_id: String,
    pub session_id: String,
    pub workflow_id: String,
    pub input: String,
    pub output: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cancellation_reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancellation_snapshot: Option<HashMap<String, Value>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub last_step_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resumed_from: String,
}

impl WorkflowRun {
    pub fn new(
        run_id: impl Into<String>,
        session_id: impl Into<String>,
        workflow_id: impl Into<String>,
        input: impl Into<String>,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            session_id: session_id.into(),
            workflow_id: workflow_id.into(),
            input: input.into(),
            output: String::new(),
            messages: Vec::new(),
            status: RunStatus::Pending,
            error: String::new(),
            started_at: Utc::now(),
            completed_at: None,
            metadata: HashMap::new(),
            cancellation_reason: String::new(),
            cancellation_snapshot: None,
            last_step_id: String::new(),
            resumed_from: String::new(),
        }
    }

    pub fn mark_started(&mut self) {
        if self.status != RunStatus::Pending {
            return;
        }
        self.status = RunStatus::Running;
        self.started_at = Utc::now();
    }

    pub fn mark_completed(&mut self, output: impl Into<String>) {
        if self.finish(RunStatus::Completed) {
            self.output = output.into();
        }
    }

    pub fn mark_failed(&mut self, error: impl fmt::Display) {
        if self.finish(RunStatus::Failed) {
            self.error = error.to_string();
        }
    }

    pub fn mark_cancelled(&mut self) {
        self.finish(RunStatus::Cancelled);
    }

    /// Mark cancelled and record why, where execution stopped and the
    /// session state at that point. An empty snapshot is not recorded.
    pub fn apply_cancellation(
        &mut self,
        reason: impl Into<String>,
        step_id: impl Into<String>,
        snapshot: HashMap<String, Value>,
    ) {
        if !self.finish(RunStatus::Cancelled) {
            return;
        }
        self.cancellation_reason = reason.into();
        self.last_step_id = step_id.into();
        if !snapshot.is_empty() {
            self.cancellation_snapshot = Some(snapshot);
        }
    }

    // Returns false when the run already reached a terminal status
    fn finish(&mut self, status: RunStatus) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = status;
        self.completed_at = Some(Utc::now());
        true
    }

    pub fn add_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Elapsed time since start while running, the frozen interval once terminal
    pub fn duration(&self) -> Duration {
        let end = self.completed_at.unwrap_or_else(Utc::now);
        (end - self.started_at).to_std().unwrap_or_default()
    }

    /// True for any terminal status
    pub fn is_completed(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn is_successful(&self) -> bool {
        self.status == RunStatus::Completed
    }
}

/// Session-level record of a cancelled run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancellationRecord {
    pub run_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub step_id: String,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}
