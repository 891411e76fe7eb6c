// SPDX-License-Identifier: MIT

//! Per-call options for `Workflow::run`

use crate::adk::media::{normalize_attachments, normalize_media, Attachment};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use uuid::Uuid;

/// Correlation identifiers supplied by the caller and threaded explicitly
/// through the execution context
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunContext {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub run_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub parent_run_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub session_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub user_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub workflow_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub team_id: String,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    pub fn with_parent_run_id(mut self, parent_run_id: impl Into<String>) -> Self {
        self.parent_run_id = parent_run_id.into();
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    pub fn with_workflow_id(mut self, workflow_id: impl Into<String>) -> Self {
        self.workflow_id = workflow_id.into();
        self
    }

    pub fn with_team_id(mut self, team_id: impl Into<String>) -> Self {
        self.team_id = team_id.into();
        self
    }

    /// Generate a `run-<uuid>` id if none is set, and return it
    pub fn ensure_run_id(&mut self) -> &str {
        if self.run_id.is_empty() {
            self.run_id = format!("run-{}", Uuid::new_v4());
        }
        &self.run_id
    }

    /// Non-empty identifiers as a metadata object
    pub fn to_metadata(&self) -> Map<String, Value> {
        let mut out = Map::new();
        let fields = [
            ("run_id", &self.run_id),
            ("parent_run_id", &self.parent_run_id),
            ("session_id", &self.session_id),
            ("user_id", &self.user_id),
            ("workflow_id", &self.workflow_id),
            ("team_id", &self.team_id),
        ];
        for (key, value) in fields {
            if !value.is_empty() {
                out.insert(key.to_string(), Value::String(value.clone()));
            }
        }
        if !self.metadata.is_empty() {
            let metadata: Map<String, Value> = self
                .metadata
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            out.insert("metadata".to_string(), Value::Object(metadata));
        }
        out
    }
}

/// Options recognised by `Workflow::run`, built with the `with_*` methods
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub(crate) user_id: Option<String>,
    pub(crate) session_state: HashMap<String, Value>,
    pub(crate) resume_from: Option<String>,
    pub(crate) media: Vec<Attachment>,
    pub(crate) media_error: Option<String>,
    pub(crate) metadata: HashMap<String, Value>,
    pub(crate) run_context: Option<RunContext>,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tag the run with its owning user
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Seed session state entries before any node runs
    pub fn with_session_state(mut self, state: HashMap<String, Value>) -> Self {
        self.session_state.extend(state);
        self
    }

    /// Skip every top-level node before `step_id`
    pub fn with_resume_from(mut self, step_id: impl Into<String>) -> Self {
        self.resume_from = Some(step_id.into());
        self
    }

    /// Attach a loosely shaped media payload. An invalid payload makes the
    /// run fail with `InvalidInput` before any node executes.
    pub fn with_media_payload(mut self, payload: &Value) -> Self {
        match normalize_media(payload) {
            Ok(items) => {
                self.media = items;
                self.media_error = None;
            }
            Err(err) => self.media_error = Some(err.to_string()),
        }
        self
    }

    /// Attach typed media attachments
    pub fn with_attachments(mut self, items: Vec<Attachment>) -> Self {
        match normalize_attachments(items) {
            Ok(items) => {
                self.media = items;
                self.media_error = None;
            }
            Err(err) => self.media_error = Some(err.to_string()),
        }
        self
    }

    /// Merge arbitrary metadata into the execution context and stored run
    pub fn with_metadata(mut self, metadata: HashMap<String, Value>) -> Self {
        self.metadata.extend(metadata);
        self
    }

    /// Adopt caller correlation identifiers
    pub fn with_run_context(mut self, run_context: RunContext) -> Self {
        self.run_context = Some(run_context);
        self
    }

    pub fn media(&self) -> &[Attachment] {
        &self.media
    }

    pub fn resume_from(&self) -> Option<&str> {
        self.resume_from.as_deref()
    }
}
