// SPDX-License-Identifier: MIT

//! Ordered collection of runs belonging to one external session id

use super::history::{format_history, HistoryEntry, HistoryFormatOptions};
use super::run::{CancellationRecord, RunStatus, WorkflowRun};
use crate::adk::message::Message;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug)]
struct SessionInner {
    runs: Vec<WorkflowRun>,
    cancellations: Vec<CancellationRecord>,
    updated_at: DateTime<Utc>,
    metadata: HashMap<String, Value>,
}

/// Append-only history of workflow runs for one session.
///
/// Identity fields are fixed at construction; runs, cancellations and
/// metadata sit behind a lock so concurrent writers serialize.
#[derive(Debug)]
pub struct WorkflowSession {
    session_id: String,
    workflow_id: String,
    user_id: String,
    created_at: DateTime<Utc>,
    inner: RwLock<SessionInner>,
}

/// Serializable form of a `WorkflowSession`, for durable backends
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub workflow_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user_id: String,
    #[serde(default)]
    pub runs: Vec<WorkflowRun>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cancellations: Vec<CancellationRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
}

impl WorkflowSession {
    pub fn new(
        session_id: impl Into<String>,
        workflow_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            workflow_id: workflow_id.into(),
            user_id: user_id.into(),
            created_at: now,
            inner: RwLock::new(SessionInner {
                runs: Vec::new(),
                cancellations: Vec::new(),
                updated_at: now,
                metadata: HashMap::new(),
            }),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.inner.read().updated_at
    }

    /// Bump `updated_at`; storage backends call this on update
    pub fn touch(&self) {
        self.inner.write().updated_at = Utc::now();
    }

    pub fn add_run(&self, run: WorkflowRun) {
        let mut inner = self.inner.write();
        inner.runs.push(run);
        inner.updated_at = Utc::now();
    }

    /// Snapshot of all runs, oldest first
    pub fn get_runs(&self) -> Vec<WorkflowRun> {
        self.inner.read().runs.clone()
    }

    pub fn get_last_run(&self) -> Option<WorkflowRun> {
        self.inner.read().runs.last().cloned()
    }

    /// Most recent `num_runs` completed runs as history entries, oldest first.
    /// `0` returns every completed run.
    pub fn get_history(&self, num_runs: usize) -> Vec<HistoryEntry> {
        let inner = self.inner.read();
        let completed: Vec<&WorkflowRun> = inner.runs.iter().filter(|r| r.is_completed()).collect();
        window(&completed, num_runs)
            .iter()
            .map(|run| HistoryEntry {
                input: run.input.clone(),
                output: run.output.clone(),
                timestamp: run.completed_at.unwrap_or(run.started_at),
            })
            .collect()
    }

    /// `get_history` rendered with the default format
    pub fn get_history_context(&self, num_runs: usize) -> String {
        format_history(&self.get_history(num_runs), &HistoryFormatOptions::default())
    }

    /// Transcript messages of the most recent `num_runs` completed runs
    pub fn get_history_messages(&self, num_runs: usize) -> Vec<Message> {
        let inner = self.inner.read();
        let completed: Vec<&WorkflowRun> = inner.runs.iter().filter(|r| r.is_completed()).collect();
        window(&completed, num_runs)
            .iter()
            .flat_map(|run| run.messages.iter().cloned())
            .collect()
    }

    pub fn count_runs(&self) -> usize {
        self.inner.read().runs.len()
    }

    pub fn count_completed_runs(&self) -> usize {
        self.inner.read().runs.iter().filter(|r| r.is_completed()).count()
    }

    pub fn count_successful_runs(&self) -> usize {
        self.inner.read().runs.iter().filter(|r| r.is_successful()).count()
    }

    /// Runs whose status is exactly `Failed` (cancelled runs are not counted)
    pub fn count_failed_runs(&self) -> usize {
        self.inner
            .read()
            .runs
            .iter()
            .filter(|r| r.status == RunStatus::Failed)
            .count()
    }

    /// Remove every run
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.runs.clear();
        inner.updated_at = Utc::now();
    }

    pub fn get_metadata(&self, key: &str) -> Option<Value> {
        self.inner.read().metadata.get(key).cloned()
    }

    pub fn set_metadata(&self, key: impl Into<String>, value: Value) {
        let mut inner = self.inner.write();
        inner.metadata.insert(key.into(), value);
        inner.updated_at = Utc::now();
    }

    pub fn add_cancellation(&self, record: CancellationRecord) {
        let mut inner = self.inner.write();
        inner.cancellations.push(record);
        inner.updated_at = Utc::now();
    }

    pub fn cancellations(&self) -> Vec<CancellationRecord> {
        self.inner.read().cancellations.clone()
    }

    pub fn to_record(&self) -> SessionRecord {
        let inner = self.inner.read();
        SessionRecord {
            session_id: self.session_id.clone(),
            workflow_id: self.workflow_id.clone(),
            user_id: self.user_id.clone(),
            runs: inner.runs.clone(),
            cancellations: inner.cancellations.clone(),
            created_at: self.created_at,
            updated_at: inner.updated_at,
            metadata: inner.metadata.clone(),
        }
    }

    pub fn from_record(record: SessionRecord) -> Self {
        Self {
            session_id: record.session_id,
            workflow_id: record.workflow_id,
            user_id: record.user_id,
            created_at: record.created_at,
            inner: RwLock::new(SessionInner {
                runs: record.runs,
                cancellations: record.cancellations,
                updated_at: record.updated_at,
                metadata: record.metadata,
            }),
        }
    }
}

// Last `num_runs` items, all of them when `num_runs` is 0
fn window<T>(items: &[T], num_runs: usize) -> &[T] {
    if num_runs > 0 && items.len() > num_runs {
        &items[items.len() - num_runs..]
    } else {
        items
    }
}

impl Serialize for WorkflowSession {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_record().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for WorkflowSession {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        SessionRecord::deserialize(deserializer).map(Self::from_record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::join_all;
    use std::sync::Arc;

    fn completed_run(input: &str, output: &str) -> WorkflowRun {
        let mut run = WorkflowRun::new(format!("run-{}", input), "s", "w", input);
        run.mark_started();
        run.mark_completed(output);
        run
    }

    #[test]
    fn test_new_session() {
        let session = WorkflowSession::new("session-1", "workflow-1", "user-1");
        assert_eq!(session.session_id(), "session-1");
        assert_eq!(session.workflow_id(), "workflow-1");
        assert_eq!(session.user_id(), "user-1");
        assert_eq!(session.count_runs(), 0);
        assert!(session.get_last_run().is_none());
        assert!(session.get_history(3).is_empty());
        assert_eq!(session.get_history_context(3), "");
    }

    #[test]
    fn test_history_window_and_order() {
        let session = WorkflowSession::new("s", "w", "");
        for i in 1..=5 {
            session.add_run(completed_run(&format!("in{}", i), &format!("out{}", i)));
        }

        let history = session.get_history(3);
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].input, "in3");
        assert_eq!(history[2].input, "in5");
        assert!(history.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));

        let last = session.get_last_run().unwrap();
        assert_eq!(history[2].input, last.input);
        assert_eq!(history[2].output, last.output);

        assert_eq!(session.get_history(0).len(), 5);
        assert_eq!(session.get_history(10).len(), 5);
    }

    #[test]
    fn test_history_skips_unfinished_runs() {
        let session = WorkflowSession::new("s", "w", "");
        session.add_run(completed_run("done", "ok"));
        let mut running = WorkflowRun::new("run-x", "s", "w", "in flight");
        running.mark_started();
        session.add_run(running);

        let mut failed = WorkflowRun::new("run-y", "s", "w", "broken");
        failed.mark_started();
        failed.mark_failed("boom");
        session.add_run(failed);

        let history = session.get_history(0);
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].input, "broken");
        assert_eq!(session.count_runs(), 3);
        assert_eq!(session.count_completed_runs(), 2);
        assert_eq!(session.count_successful_runs(), 1);
        assert_eq!(session.count_failed_runs(), 1);
    }

    #[test]
    fn test_history_context_format() {
        let session = WorkflowSession::new("s", "w", "");
        session.add_run(completed_run("hello", "hi"));
        assert_eq!(
            session.get_history_context(1),
            "<workflow_history_context>\n[run-1]\ninput: hello\noutput: hi\n\n</workflow_history_context>"
        );
    }

    #[test]
    fn test_history_messages() {
        let session = WorkflowSession::new("s", "w", "");
        let mut run = completed_run("a", "b");
        run.add_message(Message::user("a"));
        run.add_message(Message::assistant("b"));
        session.add_run(run);
        session.add_run(completed_run("c", "d"));

        assert_eq!(session.get_history_messages(0).len(), 2);
        assert!(session.get_history_messages(1).is_empty());
    }

    #[test]
    fn test_metadata_cancellations_and_clear() {
        let session = WorkflowSession::new("s", "w", "");
        session.set_metadata("topic", serde_json::json!("rust"));
        assert_eq!(session.get_metadata("topic"), Some(serde_json::json!("rust")));

        session.add_cancellation(CancellationRecord {
            run_id: "run-1".to_string(),
            step_id: "step-a".to_string(),
            reason: "context canceled".to_string(),
            timestamp: Utc::now(),
        });
        assert_eq!(session.cancellations().len(), 1);

        session.add_run(completed_run("x", "y"));
        session.clear();
        assert_eq!(session.count_runs(), 0);
    }

    #[test]
    fn test_record_round_trip_preserves_identity() {
        let session = WorkflowSession::new("s", "w", "u");
        session.add_run(completed_run("x", "y"));
        let json = serde_json::to_string(&session).unwrap();
        let restored: WorkflowSession = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.session_id(), "s");
        assert_eq!(restored.created_at(), session.created_at());
        assert_eq!(restored.get_runs()[0].output, "y");
    }

    #[tokio::test]
    async fn test_concurrent_add_run() {
        let session = Arc::new(WorkflowSession::new("s", "w", ""));
        let tasks = (0..100).map(|i| {
            let session = session.clone();
            tokio::spawn(async move {
                session.add_run(completed_run(&format!("in{}", i), "out"));
            })
        });
        for result in join_all(tasks).await {
            result.unwrap();
        }
        assert_eq!(session.count_runs(), 100);
        assert_eq!(session.count_completed_runs(), 100);
    }
}
