use thiserror::Error;

/// Failure taxonomy for every fallible operation in the crate.
///
/// `Validation` never reaches the network; `Network` means the request could
/// not complete; `Rejected` carries the remote store's status and extracted
/// message; `InvalidState` covers mutations addressed at entries the store
/// cannot act on yet (pending optimistic entries, unknown keys mid-flight).
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("{0}")]
    Validation(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("server rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("invalid state: {0}")]
    InvalidState(String),
}

impl ApiError {
    /// True when retrying the same call without any local change could
    /// plausibly succeed (transport trouble rather than a rejected payload).
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Network(_) => true,
            ApiError::Rejected { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
