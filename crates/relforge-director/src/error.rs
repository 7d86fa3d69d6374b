//! Error types for director gateway operations.

use thiserror::Error;

/// Errors produced by director gateway implementations.
///
/// The orchestrator treats every variant as terminal; no variant is retried.
#[derive(Debug, Error)]
pub enum DirectorError {
    /// The request never produced a usable response (DNS, TLS, connect,
    /// mid-body transport failures).
    #[error("request to director failed: {0}")]
    Transport(String),

    /// The director answered with a status the operation does not accept.
    #[error("director responded with status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    /// The response arrived but could not be interpreted (bad JSON, missing
    /// redirect location, unparsable task reference).
    #[error("malformed director response: {0}")]
    MalformedResponse(String),

    /// A director task reached a terminal state other than `done`.
    #[error("director task {id} finished in state {state:?}")]
    TaskFailed { id: u64, state: String },

    /// I/O failure while streaming an upload payload.
    #[error("io error while streaming payload: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for DirectorError {
    fn from(err: reqwest::Error) -> Self {
        DirectorError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for DirectorError {
    fn from(err: serde_json::Error) -> Self {
        DirectorError::MalformedResponse(err.to_string())
    }
}

/// Result type for director gateway operations.
pub type DirectorResult<T> = std::result::Result<T, DirectorError>;
