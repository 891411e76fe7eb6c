// SPDX-License-Identifier: MIT

//! State management for workflow runs
//!
//! This module provides:
//! - `SessionState` - lock-guarded key/value store, the unit of isolation across parallel branches
//! - `merge_parallel_session_states` - deterministic fold of branch states
//! - `ExecutionContext` - the per-run value threaded through nodes

mod context;
mod store;

pub use context::{ExecutionContext, MESSAGES_KEY};
pub use store::{merge_parallel_session_states, SessionState};
