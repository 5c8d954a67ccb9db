//! Error types for event bus operations
//!
//! Admission and subscription errors are returned to the caller.
//! Drops that happen while re-queueing deferred work during dispatch are
//! never surfaced here; they only show up in the statistics counters.

use crate::registry::SubscriptionHandle;
use thiserror::Error;

/// Event bus error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventBusError {
    /// Operation attempted before `init` or after `deinit`
    #[error("Event bus is not initialized")]
    NotInitialized,

    /// Queue at capacity, the event was dropped
    #[error("Event queue is full")]
    ResourceExhausted,

    /// `unsubscribe` was given an unknown handle
    #[error("Subscription not found: {0}")]
    NotFound(SubscriptionHandle),

    /// Rejected capacity, budget or period
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for event bus operations.
pub type EventBusResult<T> = Result<T, EventBusError>;

impl EventBusError {
    /// Stable error code for diagnostics output.
    pub fn error_code(&self) -> &'static str {
        match self {
            EventBusError::NotInitialized => "NOT_INITIALIZED",
            EventBusError::ResourceExhausted => "RESOURCE_EXHAUSTED",
            EventBusError::NotFound(_) => "NOT_FOUND",
            EventBusError::InvalidConfig(_) => "INVALID_CONFIG",
        }
    }

    /// Whether the caller may reasonably try the same operation again later.
    ///
    /// A full queue drains on the next `process` call; the other errors
    /// do not go away by themselves.
    pub fn is_transient(&self) -> bool {
        matches!(self, EventBusError::ResourceExhausted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(EventBusError::NotInitialized.error_code(), "NOT_INITIALIZED");
        assert_eq!(
            EventBusError::ResourceExhausted.error_code(),
            "RESOURCE_EXHAUSTED"
        );
        assert_eq!(
            EventBusError::InvalidConfig("zero capacity".to_string()).error_code(),
            "INVALID_CONFIG"
        );
    }

    #[test]
    fn test_transient() {
        assert!(EventBusError::ResourceExhausted.is_transient());
        assert!(!EventBusError::NotInitialized.is_transient());
    }

    #[test]
    fn test_display() {
        let err = EventBusError::InvalidConfig("queue capacity must be non-zero".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid configuration: queue capacity must be non-zero"
        );
    }
}
