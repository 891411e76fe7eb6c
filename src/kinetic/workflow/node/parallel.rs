// SPDX-License-Identifier: MIT

//! Concurrent fan-out/fan-in node
//!
//! Each child runs as its own tokio task on a forked context with an
//! independent copy of session state. After every branch has finished the
//! results are folded back in declared order, so the merge is deterministic
//! even though completion order is not.

use super::{resolve_identity, Node};
use crate::adk::cancel::CancelContext;
use crate::adk::error::WorkflowError;
use crate::kinetic::workflow::state::{merge_parallel_session_states, ExecutionContext, SessionState};
use crate::kinetic::workflow::types::NodeType;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::task::JoinSet;

#[derive(Default, Clone)]
pub struct ParallelConfig {
    pub id: String,
    pub name: String,
    pub nodes: Vec<Arc<dyn Node>>,
}

pub struct Parallel {
    id: String,
    name: String,
    nodes: Vec<Arc<dyn Node>>,
}

impl Parallel {
    pub fn new(config: ParallelConfig) -> Result<Self, WorkflowError> {
        if config.nodes.is_empty() {
            return Err(WorkflowError::config(
                "parallel node requires at least one child node",
            ));
        }
        let (id, name) = resolve_identity("parallel", config.id, config.name);
        Ok(Self {
            id,
            name,
            nodes: config.nodes,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn branch_count(&self) -> usize {
        self.nodes.len()
    }

    fn branch_key(&self, index: usize, suffix: &str) -> String {
        format!("parallel_{}_branch_{}_{}", self.id, index, suffix)
    }
}

#[async_trait]
impl Node for Parallel {
    fn id(&self) -> &str {
        &self.id
    }

    fn node_type(&self) -> NodeType {
        NodeType::Parallel
    }

    async fn execute(&self, ctx: &CancelContext, exec: &mut ExecutionContext) -> Result<(), WorkflowError> {
        let mut tasks = JoinSet::new();
        for (index, node) in self.nodes.iter().enumerate() {
            let node = Arc::clone(node);
            let ctx = ctx.clone();
            let mut branch = exec.fork();
            tasks.spawn(async move {
                let result = node.execute(&ctx, &mut branch).await;
                (index, result.map(|_| branch))
            });
        }

        // Wait for every branch; keep the first failure by completion order
        let mut results: Vec<Option<ExecutionContext>> = self.nodes.iter().map(|_| None).collect();
        let mut first_error: Option<WorkflowError> = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, Ok(branch))) => results[index] = Some(branch),
                Ok((index, Err(err))) => {
                    log::warn!("Parallel {} branch {} failed: {}", self.id, index, err);
                    first_error.get_or_insert(err);
                }
                Err(join_err) => {
                    first_error.get_or_insert(WorkflowError::BranchPanicked {
                        id: self.id.clone(),
                        message: join_err.to_string(),
                    });
                }
            }
        }
        if let Some(err) = first_error {
            return Err(WorkflowError::Parallel {
                id: self.id.clone(),
                source: Box::new(err),
            });
        }

        let mut branches: Vec<ExecutionContext> = results.into_iter().flatten().collect();
        let states: Vec<SessionState> = branches
            .iter_mut()
            .map(|branch| std::mem::take(&mut branch.session_state))
            .collect();
        let merged = merge_parallel_session_states(&exec.session_state, &states);
        exec.session_state.replace_with(merged);

        let mut last_output = None;
        for (index, branch) in branches.into_iter().enumerate() {
            exec.set(
                self.branch_key(index, "output"),
                Value::String(branch.output.clone()),
            );
            for (key, value) in branch.data {
                exec.set(self.branch_key(index, &key), value);
            }
            last_output = Some(branch.output);
        }
        if let Some(output) = last_output {
            exec.output = output;
        }
        Ok(())
    }
}
