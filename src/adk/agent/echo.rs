// SPDX-License-Identifier: MIT

//! Reference agents with no external dependencies

use super::{Agent, AgentInput, AgentOutput};
use crate::adk::cancel::CancelContext;
use crate::adk::error::BoxError;
use crate::adk::message::Message;
use async_trait::async_trait;
use std::sync::Arc;

/// Returns its input unchanged, optionally prefixed
pub struct EchoAgent {
    name: String,
    prefix: String,
}

impl EchoAgent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefix: String::new(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }
}

#[async_trait]
impl Agent for EchoAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &CancelContext, input: AgentInput) -> Result<AgentOutput, BoxError> {
        ctx.check()?;
        let content = format!("{}{}", self.prefix, input.content);
        let messages = vec![
            Message::user(input.content),
            Message::assistant(content.clone()),
        ];
        Ok(AgentOutput::text(content).with_messages(messages))
    }
}

type AgentFn = dyn Fn(AgentInput) -> Result<String, BoxError> + Send + Sync;

/// Adapts a synchronous closure to the `Agent` contract
pub struct FnAgent {
    name: String,
    func: Arc<AgentFn>,
}

impl FnAgent {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(AgentInput) -> Result<String, BoxError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }
}

#[async_trait]
impl Agent for FnAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &CancelContext, input: AgentInput) -> Result<AgentOutput, BoxError> {
        ctx.check()?;
        (self.func)(input).map(AgentOutput::text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::cancel::CancelReason;

    #[tokio::test]
    async fn test_echo_agent_prefix_and_transcript() {
        let agent = EchoAgent::new("echo").with_prefix("Echo: ");
        let out = agent
            .run(&CancelContext::new(), AgentInput::new("hello"))
            .await
            .unwrap();
        assert_eq!(out.content, "Echo: hello");
        assert_eq!(out.messages.len(), 2);
        assert_eq!(out.messages[0].content, "hello");
    }

    #[tokio::test]
    async fn test_echo_agent_observes_cancellation() {
        let ctx = CancelContext::new();
        ctx.cancel();
        let err = EchoAgent::new("echo")
            .run(&ctx, AgentInput::new("x"))
            .await
            .unwrap_err();
        assert_eq!(err.downcast_ref::<CancelReason>(), Some(&CancelReason::Canceled));
    }

    #[tokio::test]
    async fn test_fn_agent() {
        let agent = FnAgent::new("upper", |input| Ok(input.content.to_uppercase()));
        let out = agent
            .run(&CancelContext::new(), AgentInput::new("abc"))
            .await
            .unwrap();
        assert_eq!(out.content, "ABC");

        let failing = FnAgent::new("fail", |_| Err("nope".into()));
        assert!(failing
            .run(&CancelContext::new(), AgentInput::new("abc"))
            .await
            .is_err());
    }
}
