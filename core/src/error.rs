use thiserror::Error;

/// Failure talking to the analytics API. Never crosses the reconciler's
/// public surface; it is logged and absorbed there.
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Remote returned HTTP {status} for {path}")]
    Status { status: u16, path: String },

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid remote URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Remote unavailable: {0}")]
    Unavailable(String),
}

impl RemoteError {
    /// True when the remote answered and said the resource does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::Status { status: 404, .. })
    }
}

/// Why an agent summary submission was rejected.
#[derive(Error, Debug)]
pub enum SubmissionError {
    #[error("Malformed JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Submission body must be a JSON object")]
    NotAnObject,
}

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Rejected submission: {0}")]
    Submission(#[from] SubmissionError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid bind address '{addr}'")]
    InvalidBindAddr { addr: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type WatchResult<T> = Result<T, WatchError>;
