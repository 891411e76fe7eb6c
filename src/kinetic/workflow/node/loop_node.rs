// SPDX-License-Identifier: MIT

//! Bounded iteration node

use super::{resolve_identity, Node};
use crate::adk::cancel::CancelContext;
use crate::adk::error::WorkflowError;
use crate::kinetic::workflow::state::ExecutionContext;
use crate::kinetic::workflow::types::NodeType;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

pub const DEFAULT_MAX_ITERATION: usize = 10;

/// Loop predicate, called with the zero-based index of the next iteration
pub type LoopConditionFn = Arc<dyn Fn(&ExecutionContext, usize) -> bool + Send + Sync>;

#[derive(Default, Clone)]
pub struct LoopConfig {
    pub id: String,
    pub name: String,
    pub body: Option<Arc<dyn Node>>,
    pub condition: Option<LoopConditionFn>,
    /// 0 falls back to `DEFAULT_MAX_ITERATION`
    pub max_iteration: usize,
}

/// Repeats `body` while the condition holds, never more than `max_iteration` times
pub struct Loop {
    id: String,
    name: String,
    body: Arc<dyn Node>,
    condition: LoopConditionFn,
    max_iteration: usize,
}

impl Loop {
    pub fn new(config: LoopConfig) -> Result<Self, WorkflowError> {
        let body = config
            .body
            .ok_or_else(|| WorkflowError::config("loop body is required"))?;
        let condition = config
            .condition
            .ok_or_else(|| WorkflowError::config("loop condition is required"))?;
        let (id, name) = resolve_identity("loop", config.id, config.name);
        let max_iteration = if config.max_iteration == 0 {
            DEFAULT_MAX_ITERATION
        } else {
            config.max_iteration
        };
        Ok(Self {
            id,
            name,
            body,
            condition,
            max_iteration,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_iteration(&self) -> usize {
        self.max_iteration
    }
}

#[async_trait]
impl Node for Loop {
    fn id(&self) -> &str {
        &self.id
    }

    fn node_type(&self) -> NodeType {
        NodeType::Loop
    }

    async fn execute(&self, ctx: &CancelContext, exec: &mut ExecutionContext) -> Result<(), WorkflowError> {
        let mut iteration = 0;
        while iteration < self.max_iteration {
            if !(self.condition)(exec, iteration) {
                break;
            }
            self.body
                .execute(ctx, exec)
                .await
                .map_err(|source| WorkflowError::Loop {
                    id: self.id.clone(),
                    iteration,
                    source: Box::new(source),
                })?;
            iteration += 1;
        }

        log::debug!("Loop {} finished after {} iterations", self.id, iteration);
        exec.set(format!("loop_{}_iterations", self.id), Value::from(iteration));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinetic::workflow::node::testing::{suffix_step, FailingAgent};
    use crate::kinetic::workflow::node::Step;

    fn always() -> LoopConditionFn {
        Arc::new(|_: &ExecutionContext, _: usize| true)
    }

    #[test]
    fn test_loop_requires_body_and_condition() {
        assert!(Loop::new(LoopConfig {
            condition: Some(always()),
            ..Default::default()
        })
        .is_err());
        assert!(Loop::new(LoopConfig {
            body: Some(suffix_step("b", "+")),
            ..Default::default()
        })
        .is_err());
    }

    #[test]
    fn test_loop_defaults() {
        let node = Loop::new(LoopConfig {
            name: "refine".to_string(),
            body: Some(suffix_step("b", "+")),
            condition: Some(always()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(node.id(), "loop-refine");
        assert_eq!(node.max_iteration(), DEFAULT_MAX_ITERATION);
    }

    #[tokio::test]
    async fn test_always_true_loop_stops_at_cap() {
        for cap in [1, 3, 7] {
            let node = Loop::new(LoopConfig {
                id: "capped".to_string(),
                body: Some(suffix_step("b", "+")),
                condition: Some(always()),
                max_iteration: cap,
                ..Default::default()
            })
            .unwrap();

            let mut exec = ExecutionContext::new("x");
            node.execute(&CancelContext::new(), &mut exec).await.unwrap();
            assert_eq!(exec.output, format!("x{}", "+".repeat(cap)));
            assert_eq!(exec.get("loop_capped_iterations"), Some(&Value::from(cap)));
        }
    }

    #[tokio::test]
    async fn test_condition_sees_iteration_and_context() {
        let node = Loop::new(LoopConfig {
            id: "grow".to_string(),
            body: Some(suffix_step("b", "ab")),
            condition: Some(Arc::new(|exec: &ExecutionContext, i: usize| {
                i < 5 && exec.current_input().len() < 6
            })),
            ..Default::default()
        })
        .unwrap();

        let mut exec = ExecutionContext::new("x");
        node.execute(&CancelContext::new(), &mut exec).await.unwrap();
        assert_eq!(exec.output, "xababab");
        assert_eq!(exec.get("loop_grow_iterations"), Some(&Value::from(3)));
    }

    #[tokio::test]
    async fn test_false_condition_runs_zero_times() {
        let node = Loop::new(LoopConfig {
            id: "never".to_string(),
            body: Some(suffix_step("b", "+")),
            condition: Some(Arc::new(|_: &ExecutionContext, _: usize| false)),
            ..Default::default()
        })
        .unwrap();
        let mut exec = ExecutionContext::new("x");
        node.execute(&CancelContext::new(), &mut exec).await.unwrap();
        assert!(exec.output.is_empty());
        assert_eq!(exec.get("loop_never_iterations"), Some(&Value::from(0)));
    }

    #[tokio::test]
    async fn test_body_failure_carries_iteration() {
        let node = Loop::new(LoopConfig {
            id: "fragile".to_string(),
            body: Some(Arc::new(Step::from_agent("bad", Arc::new(FailingAgent)))),
            condition: Some(always()),
            ..Default::default()
        })
        .unwrap();
        let err = node
            .execute(&CancelContext::new(), &mut ExecutionContext::new("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Loop { iteration: 0, .. }));
        assert!(err.to_string().starts_with("loop fragile iteration 0 failed"));
    }
}
