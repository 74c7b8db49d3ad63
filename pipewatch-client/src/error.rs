//! Errors raised while talking to the pipeline backend
//!
//! Everything except a malformed payload means the backend could not be
//! used for this call. Callers surface those as transport failures and never
//! count them as run failures.

use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The backend could not be reached or the connection dropped mid-body
    #[error("backend unreachable: {0}")]
    Unreachable(#[from] reqwest::Error),

    /// The backend answered with a non-success HTTP status
    #[error("backend returned status {status}: {message}")]
    ApiError { status: u16, message: String },

    /// A command response, status snapshot or event line did not decode
    #[error("unexpected backend payload: {0}")]
    ParseError(String),

    /// Rejected before sending: the id cannot be placed in a URL path
    #[error("invalid pipeline id: {0}")]
    InvalidPipelineId(String),
}

impl ClientError {
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            status,
            message: message.into(),
        }
    }

    /// HTTP status of the backend's answer, if it answered
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::ApiError { status, .. } => Some(*status),
            Self::Unreachable(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether the call failed as a whole rather than on one payload
    ///
    /// A parse error on the event stream affects a single line and the
    /// stream stays usable.
    pub fn is_transport(&self) -> bool {
        !matches!(self, Self::ParseError(_))
    }
}
