// SPDX-License-Identifier: MIT

//! Shared workflow types and the YAML settings schema

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a workflow node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Step,
    Condition,
    Loop,
    Parallel,
    Router,
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Step => "step",
            Self::Condition => "condition",
            Self::Loop => "loop",
            Self::Parallel => "parallel",
            Self::Router => "router",
        };
        f.write_str(s)
    }
}

/// Default number of past runs loaded as history
pub const DEFAULT_NUM_HISTORY_RUNS: usize = 3;

/// Default capacity of the memory store created for history-enabled workflows
pub const DEFAULT_MAX_SESSIONS: usize = 100;

/// Workflow-level history policy, visible to every step of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryConfig {
    pub add_history_to_steps: bool,
    pub num_history_runs: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            add_history_to_steps: false,
            num_history_runs: DEFAULT_NUM_HISTORY_RUNS,
        }
    }
}

/// Scalar workflow settings, loadable from YAML
///
/// ```yaml
/// name: assistant
/// enable_history: true
/// num_history_runs: 5
/// add_history_to_steps: true
/// storage:
///   max_sessions: 50
/// ```
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct WorkflowSettings {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub enable_history: bool,
    /// 0 falls back to the default of 3
    #[serde(default)]
    pub num_history_runs: usize,
    #[serde(default)]
    pub add_history_to_steps: bool,
    #[serde(default)]
    pub storage: StorageSettings,
}

/// In-memory storage settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct StorageSettings {
    /// Maximum number of sessions kept (0 = unlimited)
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

fn default_max_sessions() -> usize {
    DEFAULT_MAX_SESSIONS
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_type_display_and_serde() {
        assert_eq!(NodeType::Parallel.to_string(), "parallel");
        assert_eq!(
            serde_json::to_string(&NodeType::Router).unwrap(),
            "\"router\""
        );
    }

    #[test]
    fn test_settings_defaults() {
        let settings: WorkflowSettings = serde_yaml::from_str("name: test").unwrap();
        assert_eq!(settings.name, "test");
        assert!(!settings.enable_history);
        assert_eq!(settings.num_history_runs, 0);
        assert_eq!(settings.storage.max_sessions, 100);
    }
}
