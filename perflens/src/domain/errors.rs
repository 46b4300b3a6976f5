//! Structured error types for perflens
//!
//! Using thiserror for automatic Display implementation and error chaining.
//!
//! Propagation policy: adapter failures are isolated (recorded in session
//! metadata, the session continues with the remaining sources); merge and
//! state-machine errors are fatal to the session and abort immediately.

use crate::domain::types::AdapterKind;
use crate::session::SessionState;
use thiserror::Error;

/// A single instrumentation source failed.
///
/// Never fatal to a session: the coordinator downgrades these to
/// missing-data and records the fault in `SessionMeta::adapters_failed`.
#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("instrumentation source unavailable: {0}")]
    Unavailable(String),

    #[error("malformed event stream: {0}")]
    Malformed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors merging per-adapter stat tables into one report.
#[derive(Error, Debug)]
pub enum MergeError {
    #[error("no instrumentation adapters were enabled for this session")]
    IncompleteSession,
}

/// State-machine and configuration errors. Always caller errors, always
/// fatal.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("a profiling session already holds the instrumentation hooks")]
    SessionInProgress,

    #[error("session is in state {0}, results are only available once complete")]
    SessionNotComplete(SessionState),

    #[error(transparent)]
    Merge(#[from] MergeError),
}

/// Errors saving or loading a report document.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("invalid report document: {0}")]
    InvalidDocument(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// One adapter's recorded fault, kept in session metadata so partial
/// coverage is visible to consumers rather than silently presented as
/// complete.
#[derive(
    Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize,
)]
pub struct AdapterFault {
    pub adapter_kind: AdapterKind,
    pub message: String,
}

impl AdapterFault {
    #[must_use]
    pub fn new(adapter_kind: AdapterKind, error: &AdapterError) -> Self {
        Self { adapter_kind, message: error.to_string() }
    }
}
