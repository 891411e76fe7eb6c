// SPDX-License-Identifier: MIT

//! Typed error handling for kinetic-flow
//!
//! Three layers:
//! - `StorageError` - lookup and backend failures from a `WorkflowStorage`
//! - `WorkflowError` - construction, execution and persistence failures of a workflow
//! - `KineticError` - top-level error used by the loader and the CLI

use crate::adk::cancel::CancelReason;
use std::error::Error as StdError;
use thiserror::Error;

/// Error type returned by external agents
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Top-level error type for kinetic-flow
#[derive(Debug, Error)]
pub enum KineticError {
    /// Configuration errors (missing files, invalid settings)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Workflow-specific errors
    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    /// Generic error wrapper for compatibility
    #[error("{0}")]
    Other(String),
}

/// Errors surfaced by workflow storage backends
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("session not found")]
    SessionNotFound,

    #[error("session already exists")]
    SessionExists,

    #[error("invalid session ID")]
    InvalidSessionId,

    #[error("invalid workflow ID")]
    InvalidWorkflowId,

    /// The caller's context was already done when the call was made
    #[error(transparent)]
    Cancelled(#[from] CancelReason),

    /// Backend specific failure (connection, serialization, ...)
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Workflow-specific errors
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// A node or workflow was built with a missing or invalid field
    #[error("Configuration error: {0}")]
    Config(String),

    /// The run was rejected before any node executed
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// `resume_from` named a step that is not a top-level node
    #[error("resume step '{0}' not found in workflow")]
    ResumeStepNotFound(String),

    /// The run context was cancelled or its deadline passed
    #[error(transparent)]
    Cancelled(#[from] CancelReason),

    /// The agent behind a step failed
    #[error("step {id} execution failed: {source}")]
    Step {
        id: String,
        #[source]
        source: BoxError,
    },

    /// The body of a loop failed
    #[error("loop {id} iteration {iteration} failed: {source}")]
    Loop {
        id: String,
        iteration: usize,
        #[source]
        source: Box<WorkflowError>,
    },

    /// One branch of a parallel node failed
    #[error("parallel {id} execution failed: {source}")]
    Parallel {
        id: String,
        #[source]
        source: Box<WorkflowError>,
    },

    /// A parallel branch task panicked or was aborted
    #[error("parallel {id} branch task failed: {message}")]
    BranchPanicked { id: String, message: String },

    /// The router selected a key with no registered route
    #[error("router {router}: route '{route}' not found")]
    RouteNotFound { router: String, route: String },

    /// A top-level node failed during `Workflow::run`
    #[error("step {id} failed: {source}")]
    Node {
        id: String,
        #[source]
        source: Box<WorkflowError>,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl WorkflowError {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Returns the cancellation reason if this error, or anything it wraps,
    /// is a cancellation.
    pub fn cancel_reason(&self) -> Option<CancelReason> {
        match self {
            Self::Cancelled(reason) => Some(*reason),
            Self::Storage(err) => err.cancel_reason(),
            Self::Loop { source, .. } | Self::Parallel { source, .. } | Self::Node { source, .. } => {
                source.cancel_reason()
            }
            Self::Step { source, .. } => chain_cancel_reason(&**source),
            _ => None,
        }
    }

    /// True when the error chain contains a cancellation
    pub fn is_cancellation(&self) -> bool {
        self.cancel_reason().is_some()
    }
}

impl StorageError {
    pub fn cancel_reason(&self) -> Option<CancelReason> {
        match self {
            Self::Cancelled(reason) => Some(*reason),
            _ => None,
        }
    }
}

// Agent errors are opaque; look for a reason anywhere in their source chain
fn chain_cancel_reason(err: &(dyn StdError + 'static)) -> Option<CancelReason> {
    let mut current = Some(err);
    while let Some(err) = current {
        if let Some(reason) = err.downcast_ref::<CancelReason>() {
            return Some(*reason);
        }
        if let Some(err) = err.downcast_ref::<WorkflowError>() {
            return err.cancel_reason();
        }
        if let Some(err) = err.downcast_ref::<StorageError>() {
            return err.cancel_reason();
        }
        current = err.source();
    }
    None
}

impl KineticError {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create from a generic error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

impl From<&str> for KineticError {
    fn from(s: &str) -> Self {
        Self::Other(s.to_string())
    }
}

impl From<String> for KineticError {
    fn from(s: String) -> Self {
        Self::Other(s)
    }
}

impl From<StorageError> for KineticError {
    fn from(err: StorageError) -> Self {
        Self::Workflow(WorkflowError::Storage(err))
    }
}
