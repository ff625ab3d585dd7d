//! Error types for the Opswatch client.

use thiserror::Error;

use crate::lifecycle::AlertAction;
use crate::types::{AlertStatus, VerificationStatus};

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors surfaced by the repository, the cache and the mutation pipeline.
///
/// Errors are cloneable so a single fetch failure can be recorded on the
/// cache entry and handed to every waiting subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The request never reached the server or no response came back.
    #[error("transport error: {0}")]
    Transport(String),

    /// The server answered with a non-2xx status.
    #[error("api error {status}: {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },

    /// A 2xx response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// A required field was missing from a write payload.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The requested alert action is not valid from the alert's current state.
    #[error("cannot {action} alert {id} in state ({status}, {verification})")]
    InvalidTransition {
        /// Alert id.
        id: i64,
        /// The rejected action.
        action: AlertAction,
        /// Current lifecycle status.
        status: AlertStatus,
        /// Current verification status.
        verification: VerificationStatus,
    },

    /// Invalid client configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// Creates an API error from a status code and body.
    #[must_use]
    pub fn api(status: u16, body: impl Into<String>) -> Self {
        Self::Api {
            status,
            body: body.into(),
        }
    }

    /// Returns the HTTP status for API errors.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns `true` if the server was never reached.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            Self::api(status.as_u16(), err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}
