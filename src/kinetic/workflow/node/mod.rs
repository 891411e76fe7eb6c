// SPDX-License-Identifier: MIT

//! Workflow nodes
//!
//! Every control-flow shape implements the same `Node` contract:
//! - `Step` - delegates to an `Agent`
//! - `Condition` - runs one of two branches
//! - `Loop` - repeats a body, hard-capped at `max_iteration`
//! - `Parallel` - fans out to concurrent branches and merges them back
//! - `Router` - runs the node registered under a computed key

mod condition;
mod loop_node;
mod parallel;
mod router;
mod step;

pub use condition::{Condition, ConditionConfig, ConditionFn};
pub use loop_node::{Loop, LoopConditionFn, LoopConfig, DEFAULT_MAX_ITERATION};
pub use parallel::{Parallel, ParallelConfig};
pub use router::{Router, RouterConfig, RouterFn};
pub use step::{Step, StepConfig};

use super::state::ExecutionContext;
use super::types::NodeType;
use crate::adk::cancel::CancelContext;
use crate::adk::error::WorkflowError;
use async_trait::async_trait;

/// Shared execution contract of all workflow nodes.
///
/// `execute` mutates `exec` in place; on success the updated context is the
/// node's result. Nodes must not keep references to `exec` after returning.
#[async_trait]
pub trait Node: Send + Sync {
    fn id(&self) -> &str;

    fn node_type(&self) -> NodeType;

    async fn execute(&self, ctx: &CancelContext, exec: &mut ExecutionContext) -> Result<(), WorkflowError>;
}

// `<kind>-<name>` unless an explicit id was given; name falls back to the id
pub(crate) fn resolve_identity(kind: &str, id: String, name: String) -> (String, String) {
    let id = if id.is_empty() {
        format!("{}-{}", kind, name)
    } else {
        id
    };
    let name = if name.is_empty() { id.clone() } else { name };
    (id, name)
}
