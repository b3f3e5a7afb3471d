// src/sandbox/error.rs

use thiserror::Error;

/// Faults inside the sandbox machinery itself.
///
/// These never reach callers of [`crate::sandbox::Sandbox::execute`]: they are
/// converted into an `internal` execution result at the boundary. They do
/// surface from [`crate::sandbox::Sandbox::new`] when the configuration is
/// unusable.
#[derive(Error, Debug)]
pub enum SandboxError {
    /// An extra builtin is not a valid identifier.
    #[error("invalid builtin name: {0:?}")]
    InvalidBuiltin(String),

    /// An extra builtin is on the deny-list.
    #[error("builtin {0:?} cannot be allowed in the sandbox")]
    ForbiddenBuiltin(String),

    /// The sandbox configuration is unusable.
    #[error("invalid sandbox configuration: {0}")]
    InvalidConfig(String),

    /// The interpreter could not be started.
    #[error("failed to launch `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// A worker pipe was not available after spawn.
    #[error("worker {0} pipe unavailable")]
    MissingPipe(&'static str),

    /// The request could not be serialised.
    #[error("failed to encode worker request: {0}")]
    Encode(#[source] serde_json::Error),

    /// The worker refused the request or its shim could not be loaded.
    #[error("worker rejected the request: {0}")]
    WorkerRejected(String),

    /// The worker exited without writing a report.
    #[error("worker produced no report")]
    MissingReport,

    /// The worker's report was not valid JSON.
    #[error("worker report is malformed: {0}")]
    MalformedReport(#[source] serde_json::Error),

    /// IO error while talking to the worker.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
