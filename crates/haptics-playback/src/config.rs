//! Playback timing configuration.

use std::time::Duration;

use haptics_errors::{HapticResult, validate_range};
use serde::{Deserialize, Serialize};

const TIMEOUT_MAX_MS: u32 = 10_000;

/// Timeouts used by the playback controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// How long a new start waits for the previous completion task.
    ///
    /// Default: 100 ms.
    pub completion_wait_ms: u32,

    /// How long the completion task waits for the primary to report `Haptic`.
    ///
    /// Default: 20 ms.
    pub active_poll_ms: u32,

    /// Bound on the wait for `Stopped`. `None` waits for the firmware.
    pub stop_poll_ms: Option<u32>,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            completion_wait_ms: 100,
            active_poll_ms: 20,
            stop_poll_ms: None,
        }
    }
}

impl PlaybackConfig {
    #[must_use]
    pub fn builder() -> PlaybackConfigBuilder {
        PlaybackConfigBuilder::default()
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if a timeout is zero or above 10 s.
    pub fn validate(&self) -> HapticResult<()> {
        validate_range!("completion_wait_ms", self.completion_wait_ms, 1, TIMEOUT_MAX_MS);
        validate_range!("active_poll_ms", self.active_poll_ms, 1, TIMEOUT_MAX_MS);
        if let Some(ms) = self.stop_poll_ms {
            validate_range!("stop_poll_ms", ms, 1, TIMEOUT_MAX_MS);
        }
        Ok(())
    }

    pub fn completion_wait(&self) -> Duration {
        Duration::from_millis(u64::from(self.completion_wait_ms))
    }

    pub fn active_poll(&self) -> Duration {
        Duration::from_millis(u64::from(self.active_poll_ms))
    }

    pub fn stop_poll(&self) -> Option<Duration> {
        self.stop_poll_ms
            .map(|ms| Duration::from_millis(u64::from(ms)))
    }
}

/// Builder for [`PlaybackConfig`].
#[derive(Debug, Default)]
pub struct PlaybackConfigBuilder {
    config: PlaybackConfig,
}

impl PlaybackConfigBuilder {
    #[must_use]
    pub fn completion_wait_ms(mut self, ms: u32) -> Self {
        self.config.completion_wait_ms = ms;
        self
    }

    #[must_use]
    pub fn active_poll_ms(mut self, ms: u32) -> Self {
        self.config.active_poll_ms = ms;
        self
    }

    #[must_use]
    pub fn stop_poll_ms(mut self, ms: Option<u32>) -> Self {
        self.config.stop_poll_ms = ms;
        self
    }

    /// Build the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> HapticResult<PlaybackConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
