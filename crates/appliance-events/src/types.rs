//! Event types for inter-module communication
//!
//! This module defines the event envelope carried by the bus and the typed
//! events published by the controller's own modules (system, RTC, sensors,
//! actuators).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Delivery priority of an event.
///
/// Lower ordinal is served first: every pending `Critical` event is
/// dispatched before any `High` one, and so on down to `Low`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Priority {
    /// Safety events (emergency stop, compressor protection)
    Critical = 0,
    /// Important operational events
    High = 1,
    /// Regular events
    #[default]
    Normal = 2,
    /// Background events
    Low = 3,
}

impl Priority {
    /// All priorities, in dispatch order.
    pub const ALL: [Priority; 4] = [
        Priority::Critical,
        Priority::High,
        Priority::Normal,
        Priority::Low,
    ];

    /// Lowercase name of the priority.
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Normal => "normal",
            Priority::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown priority name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown priority: {0}")]
pub struct ParsePriorityError(String);

impl FromStr for Priority {
    type Err = ParsePriorityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "critical" => Ok(Priority::Critical),
            "high" => Ok(Priority::High),
            "normal" => Ok(Priority::Normal),
            "low" => Ok(Priority::Low),
            other => Err(ParsePriorityError(other.to_string())),
        }
    }
}

/// Event envelope.
///
/// An event is created at publish time, owned by the queue while pending and
/// dropped right after dispatch. Handlers only ever see `&Event`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Hierarchical type key (e.g., "system.rtc.initialized")
    pub event_type: String,

    /// Schema-less payload, defined per event type by producers and consumers
    pub payload: serde_json::Value,

    /// Delivery priority
    pub priority: Priority,

    /// Timestamp when the event was created
    pub timestamp: DateTime<Utc>,
}

impl Event {
    /// Create a new event with `Normal` priority.
    ///
    /// # Arguments
    ///
    /// * `event_type` - The event type string
    /// * `payload` - The event payload
    pub fn new(event_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
            priority: Priority::Normal,
            timestamp: Utc::now(),
        }
    }

    /// Set the delivery priority.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// First segment of the event type (e.g., "system" for "system.error").
    pub fn domain(&self) -> &str {
        self.event_type
            .split('.')
            .next()
            .unwrap_or(self.event_type.as_str())
    }

    /// Parse the payload into a specific type.
    pub fn parse_payload<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.payload)
    }
}

fn payload_of<T: Serialize>(event: &T) -> serde_json::Value {
    serde_json::to_value(event).unwrap_or(serde_json::Value::Null)
}

// ============================================================================
// System Events
// ============================================================================

/// Events published by the application core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SystemEvent {
    /// Controller finished booting
    Started { uptime_ms: u64, free_heap: u64 },
    /// Application state machine transitioned
    StateChanged { old_state: String, new_state: String },
    /// A component reported an error
    Error {
        component: String,
        error_code: i32,
        severity: u8,
        message: String,
    },
    /// Emergency mode was toggled
    EmergencyMode { enabled: bool, trigger: String },
    /// Real-time clock came up
    RtcInitialized { unix_time: i64 },
    /// Real-time clock was adjusted
    RtcTimeChanged { unix_time: i64 },
    /// A module's heartbeat status changed
    ModuleHealth { module: String, status: String },
}

impl SystemEvent {
    /// Event type key for this event.
    pub fn event_type(&self) -> &'static str {
        match self {
            SystemEvent::Started { .. } => "system.started",
            SystemEvent::StateChanged { .. } => "system.state.changed",
            SystemEvent::Error { .. } => "system.error",
            SystemEvent::EmergencyMode { .. } => "system.emergency_mode",
            SystemEvent::RtcInitialized { .. } => "system.rtc.initialized",
            SystemEvent::RtcTimeChanged { .. } => "system.rtc.time_changed",
            SystemEvent::ModuleHealth { .. } => "system.module_health",
        }
    }

    /// Default delivery priority for this event.
    pub fn priority(&self) -> Priority {
        match self {
            SystemEvent::Error { .. }
            | SystemEvent::EmergencyMode { .. }
            | SystemEvent::ModuleHealth { .. } => Priority::High,
            _ => Priority::Normal,
        }
    }

    /// Convert to generic event.
    pub fn to_event(&self) -> Event {
        Event::new(self.event_type(), payload_of(self)).with_priority(self.priority())
    }
}

/// Events published by the module manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModulesEvent {
    /// All modules went through their init phase
    Initialized {
        total: u32,
        initialized: u32,
        critical_failed: bool,
    },
    /// Periodic health summary
    Health {
        healthy: u32,
        degraded: u32,
        failed: u32,
        total: u32,
    },
}

impl ModulesEvent {
    /// Event type key for this event.
    pub fn event_type(&self) -> &'static str {
        match self {
            ModulesEvent::Initialized { .. } => "modules.initialized",
            ModulesEvent::Health { .. } => "modules.health",
        }
    }

    /// Default delivery priority for this event.
    pub fn priority(&self) -> Priority {
        Priority::Normal
    }

    /// Convert to generic event.
    pub fn to_event(&self) -> Event {
        Event::new(self.event_type(), payload_of(self)).with_priority(self.priority())
    }
}

// ============================================================================
// Hardware Events
// ============================================================================

/// Sensor events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SensorEvent {
    /// A sensor produced a new reading
    Reading {
        role: String,
        value: f64,
        unit: String,
    },
}

impl SensorEvent {
    /// Event type key for this event.
    pub fn event_type(&self) -> &'static str {
        match self {
            SensorEvent::Reading { .. } => "sensor.reading",
        }
    }

    /// Default delivery priority for this event.
    pub fn priority(&self) -> Priority {
        Priority::Normal
    }

    /// Convert to generic event.
    pub fn to_event(&self) -> Event {
        Event::new(self.event_type(), payload_of(self)).with_priority(self.priority())
    }
}

/// Actuator events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActuatorEvent {
    /// An actuator was commanded into a new state
    Command { role: String, state: bool },
    /// All actuators were forced off
    EmergencyStop,
}

impl ActuatorEvent {
    /// Event type key for this event.
    pub fn event_type(&self) -> &'static str {
        match self {
            ActuatorEvent::Command { .. } => "actuator.command",
            ActuatorEvent::EmergencyStop => "actuator.emergency_stop",
        }
    }

    /// Default delivery priority for this event.
    pub fn priority(&self) -> Priority {
        match self {
            ActuatorEvent::EmergencyStop => Priority::Critical,
            ActuatorEvent::Command { .. } => Priority::Normal,
        }
    }

    /// Convert to generic event.
    pub fn to_event(&self) -> Event {
        Event::new(self.event_type(), payload_of(self)).with_priority(self.priority())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_creation() {
        let payload = serde_json::json!({"key": "value"});
        let event = Event::new("test.event", payload.clone());

        assert_eq!(event.event_type, "test.event");
        assert_eq!(event.payload, payload);
        assert_eq!(event.priority, Priority::Normal);
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Critical < Priority::High);
        assert!(Priority::High < Priority::Normal);
        assert!(Priority::Normal < Priority::Low);
        assert_eq!(Priority::default(), Priority::Normal);

        let mut sorted = vec![Priority::Low, Priority::Critical, Priority::Normal, Priority::High];
        sorted.sort();
        assert_eq!(sorted, Priority::ALL.to_vec());
    }

    #[test]
    fn test_priority_parse() {
        assert_eq!("critical".parse::<Priority>(), Ok(Priority::Critical));
        assert_eq!("HIGH".parse::<Priority>(), Ok(Priority::High));
        assert!("urgent".parse::<Priority>().is_err());
        assert_eq!(Priority::Low.to_string(), "low");
    }

    #[test]
    fn test_event_domain() {
        let event = Event::new("sensor.temp.updated", serde_json::Value::Null);
        assert_eq!(event.domain(), "sensor");

        let event = Event::new("", serde_json::Value::Null);
        assert_eq!(event.domain(), "");
    }

    #[test]
    fn test_system_event() {
        let error = SystemEvent::Error {
            component: "compressor".to_string(),
            error_code: 0x103,
            severity: 2,
            message: "overcurrent".to_string(),
        };
        let event = error.to_event();
        assert_eq!(event.event_type, "system.error");
        assert_eq!(event.priority, Priority::High);
        assert_eq!(event.payload["component"], "compressor");

        let started = SystemEvent::Started {
            uptime_ms: 1200,
            free_heap: 180_000,
        };
        assert_eq!(started.to_event().priority, Priority::Normal);
    }

    #[test]
    fn test_emergency_stop_is_critical() {
        let event = ActuatorEvent::EmergencyStop.to_event();
        assert_eq!(event.event_type, "actuator.emergency_stop");
        assert_eq!(event.priority, Priority::Critical);
    }

    #[test]
    fn test_parse_payload_roundtrip() {
        let reading = SensorEvent::Reading {
            role: "chamber_temp".to_string(),
            value: 4.5,
            unit: "C".to_string(),
        };
        let event = reading.to_event();
        let decoded: SensorEvent = event.parse_payload().unwrap();
        assert_eq!(decoded, reading);
    }
}
