// SPDX-License-Identifier: MIT

pub mod history;
pub mod loader;
pub mod metrics;
pub mod node;
pub mod options;
pub mod run;
pub mod session;
pub mod state;
pub mod storage;
pub mod types;
#[allow(clippy::module_inception)]
pub mod workflow;

pub use options::{RunContext, RunOptions};
pub use run::{CancellationRecord, RunStatus, WorkflowRun};
pub use session::WorkflowSession;
pub use state::{ExecutionContext, SessionState};
pub use types::{HistoryConfig, NodeType, WorkflowSettings};
pub use workflow::{Workflow, WorkflowConfig};
