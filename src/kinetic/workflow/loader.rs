//! Workflow loader - YAML settings loading and parsing

use super::types::WorkflowSettings;
use crate::adk::error::KineticError;
use std::fs;
use std::path::Path;

/// Loads workflow settings from YAML files
pub struct WorkflowLoader;

impl WorkflowLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load workflow settings from a YAML file
    pub fn load_settings<P: AsRef<Path>>(&self, path: P) -> Result<WorkflowSettings, KineticError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            KineticError::config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::parse_yaml(&content)
    }

    /// Parse workflow settings from a YAML string
    pub fn parse_yaml(content: &str) -> Result<WorkflowSettings, KineticError> {
        let settings: WorkflowSettings = serde_yaml::from_str(content)?;
        if settings.id.is_empty() && settings.name.is_empty() {
            return Err(KineticError::config("workflow settings need an id or a name"));
        }
        Ok(settings)
    }
}

impl Default for WorkflowLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_settings() {
        let yaml = r#"
name: assistant
description: "Remembers the conversation"
enable_history: true
num_history_runs: 5
add_history_to_steps: true
storage:
  max_sessions: 10
"#;
        let settings = WorkflowLoader::parse_yaml(yaml).unwrap();
        assert_eq!(settings.name, "assistant");
        assert!(settings.enable_history);
        assert_eq!(settings.num_history_runs, 5);
        assert!(settings.add_history_to_steps);
        assert_eq!(settings.storage.max_sessions, 10);
    }

    #[test]
    fn test_parse_minimal_settings() {
        let settings = WorkflowLoader::parse_yaml("id: wf-1").unwrap();
        assert_eq!(settings.id, "wf-1");
        assert!(!settings.enable_history);
        assert_eq!(settings.storage.max_sessions, 100);
    }

    #[test]
    fn test_parse_rejects_anonymous_workflow() {
        let err = WorkflowLoader::parse_yaml("enable_history: true").unwrap_err();
        assert!(matches!(err, KineticError::Config(_)));
    }

    #[test]
    fn test_parse_invalid_yaml() {
        let err = WorkflowLoader::parse_yaml("name: [unclosed").unwrap_err();
        assert!(matches!(err, KineticError::Yaml(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = WorkflowLoader::new()
            .load_settings("/nonexistent/workflow.yaml")
            .unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }
}
