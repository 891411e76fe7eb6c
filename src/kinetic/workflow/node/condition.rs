//! Binary branch node

use super::{resolve_identity, Node};
use crate::adk::cancel::CancelContext;
use crate::adk::error::WorkflowError;
use crate::kinetic::workflow::state::ExecutionContext;
use crate::kinetic::workflow::types::NodeType;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Predicate evaluated over the current execution context
pub type ConditionFn = Arc<dyn Fn(&ExecutionContext) -> bool + Send + Sync>;

#[derive(Default, Clone)]
pub struct ConditionConfig {
    pub id: String,
    pub name: String,
    pub condition: Option<ConditionFn>,
    pub true_node: Option<Arc<dyn Node>>,
    pub false_node: Option<Arc<dyn Node>>,
}

/// Runs `true_node` or `false_node` depending on a predicate.
/// A missing branch leaves the context unchanged.
pub struct Condition {
    id: String,
    name: String,
    condition: ConditionFn,
    true_node: Option<Arc<dyn Node>>,
    false_node: Option<Arc<dyn Node>>,
}

impl Condition {
    pub fn new(config: ConditionConfig) -> Result<Self, WorkflowError> {
        let condition = config
            .condition
            .ok_or_else(|| WorkflowError::config("condition function is required"))?;
        let (id, name) = resolve_identity("condition", config.id, config.name);
        Ok(Self {
            id,
            name,
            condition,
            true_node: config.true_node,
            false_node: config.false_node,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl Node for Condition {
    fn id(&self) -> &str {
        &self.id
    }

    fn node_type(&self) -> NodeType {
        NodeType::Condition
    }

    async fn execute(&self, ctx: &CancelContext, exec: &mut ExecutionContext) -> Result<(), WorkflowError> {
        let result = (self.condition)(exec);
        exec.set(format!("condition_{}_result", self.id), Value::Bool(result));

        let branch = if result {
            &self.true_node
        } else {
            &self.false_node
        };
        match branch {
            Some(node) => node.execute(ctx, exec).await,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinetic::workflow::node::testing::suffix_step;

    fn contains(needle: &'static str) -> ConditionFn {
        Arc::new(move |exec: &ExecutionContext| exec.current_input().contains(needle))
    }

    #[test]
    fn test_condition_requires_predicate() {
        assert!(matches!(
            Condition::new(ConditionConfig::default()),
            Err(WorkflowError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_condition_branches() {
        let node = Condition::new(ConditionConfig {
            name: "urgent".to_string(),
            condition: Some(contains("urgent")),
            true_node: Some(suffix_step("fast", " [fast]")),
            false_node: Some(suffix_step("slow", " [slow]")),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(node.id(), "condition-urgent");

        let mut exec = ExecutionContext::new("urgent ticket");
        node.execute(&CancelContext::new(), &mut exec).await.unwrap();
        assert_eq!(exec.output, "urgent ticket [fast]");
        assert_eq!(exec.get("condition_condition-urgent_result"), Some(&Value::Bool(true)));

        let mut exec = ExecutionContext::new("normal ticket");
        node.execute(&CancelContext::new(), &mut exec).await.unwrap();
        assert_eq!(exec.output, "normal ticket [slow]");
        assert_eq!(exec.get("condition_condition-urgent_result"), Some(&Value::Bool(false)));
    }

    #[tokio::test]
    async fn test_missing_branch_is_noop() {
        let node = Condition::new(ConditionConfig {
            id: "only-true".to_string(),
            condition: Some(contains("yes")),
            true_node: Some(suffix_step("t", "!")),
            ..Default::default()
        })
        .unwrap();

        let mut exec = ExecutionContext::new("no");
        node.execute(&CancelContext::new(), &mut exec).await.unwrap();
        assert!(exec.output.is_empty());
        assert_eq!(exec.input, "no");
    }
}
