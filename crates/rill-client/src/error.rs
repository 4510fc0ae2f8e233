//! Client error handling

use thiserror::Error;

/// Errors raised while talking to the TTS server or driving playback
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server returned {status}: {message}")]
    Status {
        status: reqwest::StatusCode,
        message: String,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Playback(#[from] rill_core::Error),
}

impl ClientError {
    /// Build a status error from a response body, keeping only the first line.
    pub fn status(status: reqwest::StatusCode, body: &str) -> Self {
        let message = body.lines().next().unwrap_or_default().trim();
        let message = if message.is_empty() {
            status.canonical_reason().unwrap_or("unknown error")
        } else {
            message
        };
        Self::Status {
            status,
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_status_message_first_line() {
        let err = ClientError::status(StatusCode::BAD_REQUEST, "text too short\ntrace...");
        assert_eq!(err.to_string(), "Server returned 400 Bad Request: text too short");
    }

    #[test]
    fn test_status_message_falls_back_to_reason() {
        let err = ClientError::status(StatusCode::SERVICE_UNAVAILABLE, "");
        assert!(err.to_string().ends_with("Service Unavailable"));
    }
}
