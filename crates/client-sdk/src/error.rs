use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

/// Failure of a single API call, as seen by callers of the client.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// The HTTP round trip failed or the server answered with an error status.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response echoed a different id than the request carried.
    #[error("response id mismatch: expected {expected}, got {actual}")]
    ProtocolMismatch { expected: u64, actual: String },

    /// The server reported an application error for this call.
    #[error("{message}")]
    Rpc { code: Option<i64>, message: String },

    #[error("no result returned")]
    EmptyResult,

    #[error("failed to decode answer: {0}")]
    Decode(String),

    #[error("not logged in")]
    Unauthenticated,
}

impl ApiError {
    pub fn rpc(message: impl Into<String>) -> Self {
        Self::Rpc {
            code: None,
            message: message.into(),
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
