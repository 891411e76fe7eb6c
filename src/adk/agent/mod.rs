// SPDX-License-Identifier: MIT

//! Agent module - the executable unit behind every workflow step
//!
//! A workflow never talks to a model directly; a `Step` hands its input to
//! an `Agent` and reads back `AgentOutput::content`. This module provides:
//! - `Agent` - the execution contract
//! - `EchoAgent` - returns its input, optionally prefixed
//! - `FnAgent` - wraps a closure

mod echo;

pub use echo::{EchoAgent, FnAgent};

use crate::adk::cancel::CancelContext;
use crate::adk::error::BoxError;
use crate::adk::message::Message;
use crate::kinetic::workflow::history::build_enhanced_instructions;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Input handed to an agent by a step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentInput {
    /// The text to act on
    pub content: String,
    /// Rendered workflow history, present only when history is injected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_context: Option<String>,
}

impl AgentInput {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            history_context: None,
        }
    }

    pub fn with_history(mut self, history_context: impl Into<String>) -> Self {
        let history_context = history_context.into();
        self.history_context = (!history_context.is_empty()).then_some(history_context);
        self
    }

    /// Agent instructions extended with the injected history block, if any
    pub fn instructions_with_history(&self, base: &str) -> String {
        match &self.history_context {
            Some(history) => build_enhanced_instructions(base, history),
            None => base.to_string(),
        }
    }
}

/// Result of an agent run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentOutput {
    pub content: String,
    /// Transcript produced while answering; recorded on the workflow run
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl AgentOutput {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            messages: Vec::new(),
        }
    }

    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }
}

/// Core agent trait for all executable units
#[async_trait]
pub trait Agent: Send + Sync {
    /// Returns the agent name
    fn name(&self) -> &str;

    /// Run the agent with the given input.
    ///
    /// Implementations that block on I/O should observe `ctx` and return its
    /// `CancelReason` (boxed) when it is done.
    async fn run(&self, ctx: &CancelContext, input: AgentInput) -> Result<AgentOutput, BoxError>;
}
