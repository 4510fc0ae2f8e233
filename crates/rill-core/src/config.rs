//! Configuration types for the rill playback engine

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};

/// Tuning knobs for jitter buffering, scheduling and cancellation.
///
/// None of these change semantics; they trade start-up latency against
/// robustness to network jitter and slow device wake-up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Audio withheld before the first scheduled block (0 disables priming)
    #[serde(default = "default_priming_duration_ms")]
    pub priming_duration_ms: u32,

    /// Safety margin ahead of the output clock for the first block of a session
    #[serde(default = "default_startup_delay_seconds")]
    pub startup_delay_seconds: f64,

    /// Safety margin used to resynchronise after an underrun
    #[serde(default = "default_underrun_epsilon_seconds")]
    pub underrun_epsilon_seconds: f64,

    /// Cooldown after `stop()` during which straggling frames are discarded
    #[serde(default = "default_stop_grace_ms")]
    pub stop_grace_ms: u64,

    /// Consecutive chunks a leftover byte may be carried before it is
    /// reported as an alignment anomaly. `None` disables the check.
    #[serde(default)]
    pub max_leftover_chunks: Option<u32>,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            priming_duration_ms: default_priming_duration_ms(),
            startup_delay_seconds: default_startup_delay_seconds(),
            underrun_epsilon_seconds: default_underrun_epsilon_seconds(),
            stop_grace_ms: default_stop_grace_ms(),
            max_leftover_chunks: None,
        }
    }
}

impl PlaybackConfig {
    /// Reject margins that would make the scheduler run backwards.
    pub fn validate(&self) -> Result<()> {
        check_margin("startup_delay_seconds", self.startup_delay_seconds)?;
        check_margin("underrun_epsilon_seconds", self.underrun_epsilon_seconds)?;
        if self.max_leftover_chunks == Some(0) {
            return Err(Error::ConfigError(
                "max_leftover_chunks must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }
}

fn check_margin(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(Error::ConfigError(format!(
            "{} must be a non-negative number of seconds, got {}",
            name, value
        )));
    }
    Ok(())
}

fn default_priming_duration_ms() -> u32 {
    500
}

fn default_startup_delay_seconds() -> f64 {
    0.1
}

fn default_underrun_epsilon_seconds() -> f64 {
    0.02
}

fn default_stop_grace_ms() -> u64 {
    100
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: PlaybackConfig = toml::from_str("priming_duration_ms = 0\n").unwrap();
        config.validate().unwrap();
        assert_eq!(config.priming_duration_ms, 0);
        assert_eq!(config.stop_grace_ms, 100);
        assert_eq!(config.max_leftover_chunks, None);
    }

    #[test]
    fn test_negative_margin_rejected() {
        let config = PlaybackConfig {
            underrun_epsilon_seconds: -0.01,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_zero_leftover_limit_rejected() {
        let config: PlaybackConfig = toml::from_str("max_leftover_chunks = 0").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_leftover_chunks"));
    }
}
