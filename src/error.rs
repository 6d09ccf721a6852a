//! Per-repository error types.
//!
//! Everything here is recoverable: the aggregator turns each variant into a
//! [`RepoFailure`](crate::models::RepoFailure) and moves on to the next
//! repository. Setup errors use `anyhow` instead.

use thiserror::Error;

use crate::models::RepoId;

/// Errors that can occur while processing a single repository.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Clone did not produce a local copy
    #[error("failed to acquire {repo}: {cause}")]
    AcquisitionFailed { repo: RepoId, cause: String },

    /// Analysis tool exited non-zero
    #[error("{tool} exited with status {status}: {stderr}")]
    AnalysisFailed {
        tool: String,
        status: i32,
        stderr: String,
    },

    /// Analysis tool output was not the expected JSON
    #[error("could not parse {tool} output: {source}")]
    MalformedOutput {
        tool: String,
        #[source]
        source: serde_json::Error,
    },

    /// External command exceeded its time budget
    #[error("{command} timed out after {secs}s")]
    ToolTimeout { command: String, secs: u64 },

    /// External command could not be started
    #[error("failed to run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type PipelineResult<T> = Result<T, PipelineError>;
