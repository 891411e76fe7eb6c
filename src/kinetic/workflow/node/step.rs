// SPDX-License-Identifier: MIT

//! Leaf node delegating to an agent

use super::{resolve_identity, Node};
use crate::adk::agent::{Agent, AgentInput};
use crate::adk::cancel::CancelContext;
use crate::adk::error::WorkflowError;
use crate::kinetic::workflow::history::{format_history, HistoryFormatOptions};
use crate::kinetic::workflow::state::ExecutionContext;
use crate::kinetic::workflow::types::{NodeType, DEFAULT_NUM_HISTORY_RUNS};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

#[derive(Default, Clone)]
pub struct StepConfig {
    pub id: String,
    pub name: String,
    pub agent: Option<Arc<dyn Agent>>,
    pub description: String,
    /// Overrides the workflow's `add_history_to_steps` for this step
    pub add_history_to_step: Option<bool>,
    /// Overrides the workflow's `num_history_runs` for this step
    pub num_history_runs: Option<usize>,
}

/// A workflow step backed by an `Agent`
pub struct Step {
    id: String,
    name: String,
    description: String,
    agent: Arc<dyn Agent>,
    add_history_to_step: Option<bool>,
    num_history_runs: Option<usize>,
}

impl Step {
    pub fn new(config: StepConfig) -> Result<Self, WorkflowError> {
        let agent = config
            .agent
            .ok_or_else(|| WorkflowError::config("agent is required for step"))?;
        let (id, name) = resolve_identity("step", config.id, config.name);
        Ok(Self {
            id,
            name,
            description: config.description,
            agent,
            add_history_to_step: config.add_history_to_step,
            num_history_runs: config.num_history_runs,
        })
    }

    /// Step with an explicit id and no history overrides
    pub fn from_agent(id: impl Into<String>, agent: Arc<dyn Agent>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            description: String::new(),
            agent,
            add_history_to_step: None,
            num_history_runs: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Step override first, then the workflow policy; off when neither is set
    fn should_add_history(&self, exec: &ExecutionContext) -> bool {
        self.add_history_to_step.unwrap_or_else(|| {
            exec.history_config
                .map(|cfg| cfg.add_history_to_steps)
                .unwrap_or(false)
        })
    }

    fn history_run_count(&self, exec: &ExecutionContext) -> usize {
        self.num_history_runs.unwrap_or_else(|| {
            exec.history_config
                .map(|cfg| cfg.num_history_runs)
                .unwrap_or(DEFAULT_NUM_HISTORY_RUNS)
        })
    }

    fn history_for(&self, exec: &ExecutionContext) -> String {
        // A step-level window renders its own view of the session
        if self.num_history_runs.is_some() {
            let count = self.history_run_count(exec);
            if let Some(session) = &exec.workflow_session {
                return session.get_history_context(count);
            }
            let history = &exec.workflow_history;
            let start = if count > 0 && history.len() > count {
                history.len() - count
            } else {
                0
            };
            return format_history(&history[start..], &HistoryFormatOptions::default());
        }
        if !exec.history_context.is_empty() {
            return exec.history_context.clone();
        }
        format_history(&exec.workflow_history, &HistoryFormatOptions::default())
    }
}

#[async_trait]
impl Node for Step {
    fn id(&self) -> &str {
        &self.id
    }

    fn node_type(&self) -> NodeType {
        NodeType::Step
    }

    async fn execute(&self, ctx: &CancelContext, exec: &mut ExecutionContext) -> Result<(), WorkflowError> {
        let mut input = AgentInput::new(exec.current_input());
        if self.should_add_history(exec) {
            input = input.with_history(self.history_for(exec));
        }

        let output = self
            .agent
            .run(ctx, input)
            .await
            .map_err(|source| WorkflowError::Step {
                id: self.id.clone(),
                source,
            })?;

        exec.set(
            format!("step_{}_output", self.id),
            Value::String(output.content.clone()),
        );
        exec.output = output.content;
        exec.add_messages(output.messages);
        Ok(())
    }
}
