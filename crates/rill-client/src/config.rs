//! Client configuration
//!
//! Values come from an optional `rill.toml`, then `RILL_*` environment
//! variables (`RILL_PLAYBACK__PRIMING_DURATION_MS=250` reaches nested
//! playback settings), then command-line flags.

use config::{Config, Environment, File};
use rill_core::PlaybackConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ClientError;

/// Settings for one synthesis request and its playback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the TTS server
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Streaming synthesis endpoint, relative to `server_url`
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_speaker")]
    pub speaker: String,

    #[serde(default = "default_language")]
    pub language: String,

    /// Rate of the server's PCM output. Must match the server, which is not
    /// told what rate to use.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_speed")]
    pub speed: f32,

    #[serde(default = "default_top_k")]
    pub top_k: u32,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    #[serde(default = "default_repetition_penalty")]
    pub repetition_penalty: f32,

    #[serde(default)]
    pub playback: PlaybackConfig,
}

fn default_server_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_endpoint() -> String {
    "/api/tts".to_string()
}

fn default_speaker() -> String {
    "Ana Florence".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_sample_rate() -> u32 {
    24000
}

fn default_temperature() -> f32 {
    0.75
}

fn default_speed() -> f32 {
    1.0
}

fn default_top_k() -> u32 {
    50
}

fn default_top_p() -> f32 {
    0.85
}

fn default_repetition_penalty() -> f32 {
    2.0
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            endpoint: default_endpoint(),
            speaker: default_speaker(),
            language: default_language(),
            sample_rate: default_sample_rate(),
            temperature: default_temperature(),
            speed: default_speed(),
            top_k: default_top_k(),
            top_p: default_top_p(),
            repetition_penalty: default_repetition_penalty(),
            playback: PlaybackConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from `path` (or the per-user default location)
    /// layered under the process environment.
    ///
    /// An explicit path must exist; the default location is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ClientError> {
        let (file, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (default_config_path(), false),
        };
        Self::from_sources(&file, required, environment())
    }

    fn from_sources(file: &Path, required: bool, env: Environment) -> Result<Self, ClientError> {
        let config: Self = Config::builder()
            .add_source(File::from(file).required(required))
            .add_source(env)
            .build()?
            .try_deserialize()?;
        config.playback.validate()?;
        Ok(config)
    }

    /// Full URL of the synthesis endpoint.
    pub fn endpoint_url(&self) -> String {
        format!(
            "{}/{}",
            self.server_url.trim_end_matches('/'),
            self.endpoint.trim_start_matches('/')
        )
    }
}

fn environment() -> Environment {
    Environment::with_prefix("RILL")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

/// `<config dir>/rill/rill.toml`, or `./rill.toml` when there is no config dir.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("rill"))
        .unwrap_or_default()
        .join("rill.toml")
}
