//! Azure client errors

use thiserror::Error;

/// Errors that can occur when interacting with Azure Resource Manager
#[derive(Debug, Error)]
pub enum AzureError {
    /// HTTP request/response error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// ARM returned an error response
    #[error("Azure API error (status {status}, code {code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// The token issuer rejected the credentials
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The request could not be built, so it was never sent
    #[error("Failure sending request: {0}")]
    SendFailure(String),

    /// The request was sent but no response arrived (timeout, connection failure)
    #[error("Transport error: {0}")]
    Transport(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid request (malformed resource ID, missing parameter, ...)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl AzureError {
    /// Map a failed `send()`; only requests rejected before sending are `SendFailure`
    pub fn send(err: reqwest::Error) -> Self {
        if err.is_builder() {
            Self::SendFailure(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }

    /// HTTP status associated with the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::NotFound(_) => Some(404),
            Self::Authentication(_) => Some(401),
            Self::Http(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether the error means the resource does not exist
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}
