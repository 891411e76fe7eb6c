// SPDX-License-Identifier: MIT

//! The mutable value threaded through every node of a run

use super::store::SessionState;
use crate::adk::message::Message;
use crate::kinetic::workflow::history::HistoryEntry;
use crate::kinetic::workflow::options::RunContext;
use crate::kinetic::workflow::session::WorkflowSession;
use crate::kinetic::workflow::types::HistoryConfig;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Session state key holding the run transcript
pub const MESSAGES_KEY: &str = "messages";

/// Per-run execution state.
///
/// A node's `output` becomes the next node's input candidate; when it is
/// empty the node falls back to `input`.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    pub input: String,
    pub output: String,
    /// Scratch values recorded by nodes (`step_<id>_output`, ...)
    pub data: HashMap<String, Value>,
    pub metadata: HashMap<String, Value>,
    pub session_state: SessionState,
    pub session_id: String,
    pub user_id: String,
    /// Completed runs of this session, oldest first
    pub workflow_history: Vec<HistoryEntry>,
    /// Rendered history block, empty unless history is injected into steps
    pub history_context: String,
    /// Workflow-level history policy; `None` when history is disabled
    pub history_config: Option<HistoryConfig>,
    /// Session the history was loaded from, if any
    pub workflow_session: Option<Arc<WorkflowSession>>,
    pub run_context: Option<RunContext>,
}

impl ExecutionContext {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            ..Default::default()
        }
    }

    pub fn with_session(
        input: impl Into<String>,
        session_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            input: input.into(),
            session_id: session_id.into(),
            user_id: user_id.into(),
            ..Default::default()
        }
    }

    /// Input for the next node: the previous output, or the run input
    pub fn current_input(&self) -> &str {
        if self.output.is_empty() {
            &self.input
        } else {
            &self.output
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.data.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn set_session_state(&self, key: impl Into<String>, value: Value) {
        self.session_state.set(key, value);
    }

    pub fn get_session_state(&self, key: &str) -> Option<Value> {
        self.session_state.get(key)
    }

    pub fn has_history(&self) -> bool {
        !self.workflow_history.is_empty()
    }

    pub fn history_count(&self) -> usize {
        self.workflow_history.len()
    }

    pub fn last_history_entry(&self) -> Option<&HistoryEntry> {
        self.workflow_history.last()
    }

    // 0 is the oldest entry, -1 the most recent
    fn history_at(&self, index: isize) -> Option<&HistoryEntry> {
        let len = self.workflow_history.len() as isize;
        let index = if index < 0 { len + index } else { index };
        if index < 0 || index >= len {
            return None;
        }
        self.workflow_history.get(index as usize)
    }

    /// Input of the history entry at `index`; negative indices count from the end
    pub fn history_input(&self, index: isize) -> &str {
        self.history_at(index).map(|e| e.input.as_str()).unwrap_or("")
    }

    /// Output of the history entry at `index`; negative indices count from the end
    pub fn history_output(&self, index: isize) -> &str {
        self.history_at(index).map(|e| e.output.as_str()).unwrap_or("")
    }

    /// Transcript stored in session state; malformed entries are skipped
    pub fn messages(&self) -> Vec<Message> {
        match self.session_state.get(MESSAGES_KEY) {
            Some(Value::Array(items)) => items
                .into_iter()
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn add_message(&self, message: Message) {
        self.add_messages(vec![message]);
    }

    pub fn add_messages(&self, messages: Vec<Message>) {
        if messages.is_empty() {
            return;
        }
        let mut all = self.messages();
        all.extend(messages);
        self.store_messages(&all);
    }

    pub fn clear_messages(&self) {
        self.store_messages(&[]);
    }

    fn store_messages(&self, messages: &[Message]) {
        let items = messages
            .iter()
            .filter_map(|m| serde_json::to_value(m).ok())
            .collect();
        self.session_state.set(MESSAGES_KEY, Value::Array(items));
    }

    /// Seed session state from a snapshot
    pub fn apply_session_state(&self, snapshot: HashMap<String, Value>) {
        for (key, value) in snapshot {
            self.session_state.set(key, value);
        }
    }

    /// Copy of the current session state
    pub fn export_session_state(&self) -> HashMap<String, Value> {
        self.session_state.to_map()
    }

    pub fn merge_metadata(&mut self, metadata: HashMap<String, Value>) {
        self.metadata.extend(metadata);
    }

    /// Thread a run context and mirror it under `metadata["run_context"]`
    pub fn set_run_context(&mut self, run_context: RunContext) {
        let payload = run_context.to_metadata();
        if !payload.is_empty() {
            self.metadata
                .insert("run_context".to_string(), Value::Object(payload));
        }
        self.run_context = Some(run_context);
    }

    /// Context handed to one parallel branch: same input, output, data,
    /// metadata and history, with an independent copy of session state
    pub(crate) fn fork(&self) -> Self {
        self.clone()
    }
}
