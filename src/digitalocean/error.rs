//! Error types for the DigitalOcean gateway.

use thiserror::Error;

/// Errors raised by the DigitalOcean gateway.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum DoGatewayError {
    /// Transport-level failure reaching the API.
    #[error("transport error: {message}")]
    Transport {
        /// Message reported by the HTTP client.
        message: String,
    },
    /// The API answered with a non-success status.
    #[error("api error ({status}): {message}")]
    Api {
        /// HTTP status code returned by the API.
        status: u16,
        /// Response body, prefixed with the resource being accessed.
        message: String,
    },
    /// A response body could not be decoded.
    #[error("failed to decode {resource} response: {message}")]
    Decode {
        /// Resource being decoded (for example `droplets`).
        resource: String,
        /// Parser error message.
        message: String,
    },
}

impl From<reqwest::Error> for DoGatewayError {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport {
            message: value.to_string(),
        }
    }
}
