//! Player configuration

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry policy for fatal network failures reported by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Consecutive failures tolerated before the error becomes fatal
    pub max_attempts: u32,
    /// Delay before the first retry in milliseconds, doubled per attempt
    pub base_delay_ms: u64,
    /// Upper bound for a single retry delay in milliseconds
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 8000,
        }
    }
}

/// Player configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Network retry policy
    pub retry: RetryConfig,
    /// Engine-level recovery calls allowed for media errors
    pub media_recovery_attempts: u32,
    /// Inactivity before transport controls hide, in milliseconds
    pub controls_hide_delay_ms: u64,
    /// Step used by the skip back/forward buttons, in seconds
    pub seek_step_secs: f64,
    /// Speeds offered in the playback settings tab
    pub playback_speeds: Vec<f64>,
    /// Volume applied when a source is attached
    pub initial_volume: f64,
    /// Slider bounds for brightness, contrast and saturation (percent)
    pub filter_bounds: (f64, f64),
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            media_recovery_attempts: 1,
            controls_hide_delay_ms: 3000,
            seek_step_secs: 10.0,
            playback_speeds: vec![0.25, 0.5, 0.75, 1.0, 1.25, 1.5, 1.75, 2.0],
            initial_volume: 1.0,
            filter_bounds: (0.0, 200.0),
        }
    }
}

impl PlayerConfig {
    /// Parse and validate a JSON configuration; missing fields take defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: PlayerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            return Err(Error::InvalidConfig("retry.max_attempts must be at least 1".into()));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(Error::InvalidConfig(
                "retry.base_delay_ms exceeds retry.max_delay_ms".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.initial_volume) {
            return Err(Error::InvalidConfig(format!(
                "initial_volume {} outside [0, 1]",
                self.initial_volume
            )));
        }
        if !(self.seek_step_secs.is_finite() && self.seek_step_secs > 0.0) {
            return Err(Error::InvalidConfig("seek_step_secs must be positive".into()));
        }
        if let Some(speed) = self.playback_speeds.iter().find(|s| !(s.is_finite() && **s > 0.0)) {
            return Err(Error::InvalidConfig(format!("invalid playback speed {}", speed)));
        }
        let (low, high) = self.filter_bounds;
        if !(low >= 0.0 && low < high) {
            return Err(Error::InvalidConfig("filter_bounds must satisfy 0 <= low < high".into()));
        }
        Ok(())
    }

    pub fn controls_hide_delay(&self) -> Duration {
        Duration::from_millis(self.controls_hide_delay_ms)
    }
}
