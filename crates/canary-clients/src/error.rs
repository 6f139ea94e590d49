//! Client error types

use thiserror::Error;

/// Errors returned by platform collaborators
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success API response
    #[error("API error: {status} - {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body
        message: String,
    },

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// JSON encoding or decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Response decoded but not usable
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Broker connection, subscription or publish failure
    #[error("Broker error: {0}")]
    Broker(String),

    /// Broker acknowledgement did not arrive in time
    #[error("Timed out waiting for {0}")]
    Timeout(String),

    /// Invalid endpoint or client configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// Whether the error is a decoding/encoding failure rather than a transport failure.
    pub fn is_decode(&self) -> bool {
        match self {
            ClientError::Json(_) | ClientError::UnexpectedResponse(_) => true,
            ClientError::Http(e) => e.is_decode(),
            _ => false,
        }
    }
}

impl From<rumqttc::ClientError> for ClientError {
    fn from(err: rumqttc::ClientError) -> Self {
        ClientError::Broker(err.to_string())
    }
}

impl From<url::ParseError> for ClientError {
    fn from(err: url::ParseError) -> Self {
        ClientError::Config(err.to_string())
    }
}

/// Result type for collaborator calls
pub type ClientResult<T> = Result<T, ClientError>;
