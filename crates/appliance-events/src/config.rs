//! Event bus configuration.
//!
//! Queue capacity and control-loop timing. Configuration is loaded from
//! environment variables with defaults matching the controller's main loop
//! (100 Hz, 2 ms of each cycle reserved for event dispatch).

use crate::error::{EventBusError, EventBusResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default number of events the queue can hold.
pub const DEFAULT_QUEUE_CAPACITY: usize = 32;

/// Default per-cycle dispatch budget in milliseconds.
pub const DEFAULT_PROCESS_BUDGET_MS: u64 = 2;

/// Default control-loop period in milliseconds.
pub const DEFAULT_LOOP_PERIOD_MS: u64 = 10;

/// Event bus configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventBusConfig {
    /// Maximum number of pending events.
    pub queue_capacity: usize,

    /// Wall-clock budget for one `process` call, in milliseconds.
    pub process_budget_ms: u64,

    /// Control-loop period, in milliseconds.
    pub loop_period_ms: u64,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            process_budget_ms: DEFAULT_PROCESS_BUDGET_MS,
            loop_period_ms: DEFAULT_LOOP_PERIOD_MS,
        }
    }
}

impl EventBusConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `EVENT_BUS_QUEUE_CAPACITY`: Queue capacity (default: 32)
    /// - `EVENT_BUS_PROCESS_BUDGET_MS`: Dispatch budget per cycle (default: 2)
    /// - `EVENT_BUS_LOOP_PERIOD_MS`: Control-loop period (default: 10)
    ///
    /// Missing or unparsable values fall back to the defaults.
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            queue_capacity: std::env::var("EVENT_BUS_QUEUE_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.queue_capacity),
            process_budget_ms: std::env::var("EVENT_BUS_PROCESS_BUDGET_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.process_budget_ms),
            loop_period_ms: std::env::var("EVENT_BUS_LOOP_PERIOD_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.loop_period_ms),
        }
    }

    /// Config with the given capacity and default timing.
    pub fn with_capacity(queue_capacity: usize) -> Self {
        Self {
            queue_capacity,
            ..Self::default()
        }
    }

    /// Dispatch budget as a Duration.
    pub fn process_budget(&self) -> Duration {
        Duration::from_millis(self.process_budget_ms)
    }

    /// Control-loop period as a Duration.
    pub fn loop_period(&self) -> Duration {
        Duration::from_millis(self.loop_period_ms)
    }

    /// Validate the configuration.
    ///
    /// The dispatch budget has to leave part of each cycle to the rest of
    /// the control loop.
    pub fn validate(&self) -> EventBusResult<()> {
        validate_capacity(self.queue_capacity)?;
        if self.loop_period_ms == 0 {
            return Err(EventBusError::InvalidConfig(
                "loop period must be non-zero".to_string(),
            ));
        }
        if self.process_budget_ms >= self.loop_period_ms {
            return Err(EventBusError::InvalidConfig(format!(
                "process budget ({} ms) must be shorter than the loop period ({} ms)",
                self.process_budget_ms, self.loop_period_ms
            )));
        }
        Ok(())
    }
}

/// Largest queue capacity the bounded channel can track.
pub const MAX_QUEUE_CAPACITY: usize = tokio::sync::Semaphore::MAX_PERMITS;

pub(crate) fn validate_capacity(capacity: usize) -> EventBusResult<()> {
    if capacity == 0 {
        return Err(EventBusError::InvalidConfig(
            "queue capacity must be non-zero".to_string(),
        ));
    }
    if capacity > MAX_QUEUE_CAPACITY {
        return Err(EventBusError::InvalidConfig(format!(
            "queue capacity {} exceeds the maximum of {}",
            capacity, MAX_QUEUE_CAPACITY
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EventBusConfig::default();
        assert_eq!(config.queue_capacity, 32);
        assert_eq!(config.process_budget(), Duration::from_millis(2));
        assert_eq!(config.loop_period(), Duration::from_millis(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let config = EventBusConfig::with_capacity(0);
        assert!(matches!(
            config.validate(),
            Err(EventBusError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_validate_rejects_oversized_capacity() {
        assert!(EventBusConfig::with_capacity(MAX_QUEUE_CAPACITY)
            .validate()
            .is_ok());

        for capacity in [MAX_QUEUE_CAPACITY + 1, usize::MAX] {
            let config = EventBusConfig::with_capacity(capacity);
            assert!(matches!(
                config.validate(),
                Err(EventBusError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn test_validate_rejects_budget_longer_than_period() {
        let config = EventBusConfig {
            process_budget_ms: 10,
            loop_period_ms: 10,
            ..EventBusConfig::default()
        };
        assert!(config.validate().is_err());

        let config = EventBusConfig {
            loop_period_ms: 0,
            ..EventBusConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_partial() {
        let config: EventBusConfig =
            serde_json::from_str(r#"{"queue_capacity": 64}"#).unwrap();
        assert_eq!(config.queue_capacity, 64);
        assert_eq!(config.process_budget_ms, DEFAULT_PROCESS_BUDGET_MS);
    }
}
