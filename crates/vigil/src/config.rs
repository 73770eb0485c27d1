//! Listener construction options

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default debounce window.
pub const DEFAULT_WAIT_FOR_DELAY: Duration = Duration::from_millis(100);

/// Smallest accepted debounce window.
///
/// The aggregation loop polls in small increments; a zero window would
/// degenerate into a busy loop, so anything below this is rejected as
/// `InvalidConfiguration`.
pub const MIN_WAIT_FOR_DELAY: Duration = Duration::from_millis(10);

/// Default scan interval for the polling source.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Listener options.
///
/// `ignore` seeds the cumulative ignore patterns, `ignore_replace` seeds
/// the wholesale override set, and `only` seeds the allow-list; all three
/// use gitignore-style globs and can be mutated later through the
/// listener's `ignore`/`ignore_replace`/`only` operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log every buffered raw change at debug level.
    #[serde(default)]
    pub debug: bool,

    /// Scan interval for the polling source (default: 1s).
    #[serde(default)]
    pub latency: Option<Duration>,

    /// Quiet window the aggregation loop waits after the last raw event
    /// before coalescing and delivering a batch (default: 100ms).
    #[serde(default = "default_wait_for_delay")]
    pub wait_for_delay: Duration,

    /// Skip native watch mechanisms and poll from the start.
    #[serde(default)]
    pub force_polling: bool,

    /// Surfaced once (as a warning) when native watching is unavailable
    /// and the listener falls back to polling.
    #[serde(default)]
    pub polling_fallback_message: Option<String>,

    /// Initial cumulative ignore patterns.
    #[serde(default)]
    pub ignore: Vec<String>,

    /// Initial override patterns; when set they replace the built-in
    /// defaults and any cumulative ignores.
    #[serde(default)]
    pub ignore_replace: Option<Vec<String>>,

    /// Initial allow-list; when set, paths are suppressed unless they
    /// match at least one pattern.
    #[serde(default)]
    pub only: Option<Vec<String>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debug: false,
            latency: None,
            wait_for_delay: DEFAULT_WAIT_FOR_DELAY,
            force_polling: false,
            polling_fallback_message: None,
            ignore: vec![],
            ignore_replace: None,
            only: None,
        }
    }
}

impl Config {
    /// Validate option values. Called from `Listener::new`.
    pub fn validate(&self) -> Result<()> {
        if self.wait_for_delay < MIN_WAIT_FOR_DELAY {
            return Err(Error::InvalidConfiguration(format!(
                "wait_for_delay must be at least {:?}, got {:?}",
                MIN_WAIT_FOR_DELAY, self.wait_for_delay
            )));
        }
        if let Some(latency) = self.latency {
            if latency.is_zero() {
                return Err(Error::InvalidConfiguration(
                    "latency must be non-zero".into(),
                ));
            }
        }
        Ok(())
    }

    /// Effective polling interval.
    pub fn poll_interval(&self) -> Duration {
        self.latency.unwrap_or(DEFAULT_POLL_INTERVAL)
    }
}

fn default_wait_for_delay() -> Duration {
    DEFAULT_WAIT_FOR_DELAY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.wait_for_delay, DEFAULT_WAIT_FOR_DELAY);
        assert_eq!(config.poll_interval(), DEFAULT_POLL_INTERVAL);
        assert!(!config.force_polling);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_wait_for_delay() {
        let config = Config {
            wait_for_delay: Duration::ZERO,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_rejects_sub_minimum_wait_for_delay() {
        let config = Config {
            wait_for_delay: Duration::from_millis(5),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_latency_overrides_poll_interval() {
        let config = Config {
            latency: Some(Duration::from_millis(250)),
            ..Default::default()
        };
        assert_eq!(config.poll_interval(), Duration::from_millis(250));
    }
}
