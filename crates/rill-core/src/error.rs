//! Error types for the rill playback engine

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Output sink rejected block: {0}")]
    SinkRejected(String),

    #[error("Upstream stream error: {0}")]
    Upstream(String),

    #[error("Session busy: {0}")]
    SessionBusy(String),

    #[error("No active session")]
    NoSession,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Audio encoding error: {0}")]
    AudioError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<hound::Error> for Error {
    fn from(e: hound::Error) -> Self {
        Error::AudioError(e.to_string())
    }
}

impl Error {
    /// Wrap any upstream failure (network abort, decode error) for surfacing.
    pub fn upstream(err: impl std::fmt::Display) -> Self {
        Error::Upstream(err.to_string())
    }
}
