//! Error types for remote API calls.

use thiserror::Error;

/// A result type using `ClientError`.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors returned by an [`InstanceClient`](crate::InstanceClient).
///
/// Callers only need to tell [`ClientError::NotFound`] apart from everything
/// else; the remaining variants carry detail for diagnostics.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// The addressed instance does not exist on the control plane.
    #[error("instance not found: {0}")]
    NotFound(String),

    /// The API answered with an error status.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code, or the per-item status of an error envelope.
        status: u16,
        /// Message reported by the API.
        message: String,
    },

    /// The request could not be sent or no response was received.
    #[error("request failed: {0}")]
    Request(String),

    /// The response could not be decoded.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ClientError {
    /// Returns true if the remote resource is absent.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns true if this error might be resolved by retrying.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        match self {
            Self::Request(_) => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            Self::NotFound(_) | Self::InvalidResponse(_) => false,
        }
    }
}
