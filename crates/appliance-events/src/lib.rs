//! # Appliance Events
//!
//! In-process event bus for the refrigeration/appliance controller. It lets
//! independently initialized modules (network, RTC, sensors, UI) announce
//! what happened and react to each other without direct coupling.
//!
//! ## Overview
//!
//! - **Bounded queue**: fixed capacity set at `init`; a full queue drops the
//!   event and bumps a counter instead of blocking or growing
//! - **Interrupt-safe publish**: `publish_from_isr` never blocks or logs
//! - **Priority-aware dispatch**: `Critical` before `High` before `Normal`
//!   before `Low`, admission order within a priority
//! - **Time-boxed processing**: `process(budget_ms)` defers what it cannot
//!   dispatch in time to the next call
//! - **Filter, pause and statistics** controls
//!
//! ## Usage
//!
//! ```rust
//! use appliance_events::{Event, EventBus, Priority};
//! use serde_json::json;
//!
//! let mut bus = EventBus::new();
//! bus.init(32).unwrap();
//!
//! // Setup phase: only the owning handle can subscribe.
//! bus.subscribe("sensor.*", |event: &Event| {
//!     println!("{} -> {}", event.event_type, event.payload);
//! });
//!
//! // Any module, timer or ISR gets a publish-only handle.
//! let publisher = bus.publisher();
//! publisher.publish("sensor.temp.updated", json!({"celsius": 4.2})).unwrap();
//! publisher
//!     .publish_with_priority("actuator.emergency_stop", json!({}), Priority::Critical)
//!     .unwrap();
//!
//! // Control loop: dispatch for at most 10 ms this cycle.
//! assert_eq!(bus.process(10), 2);
//! ```
//!
//! ## Patterns
//!
//! - `*` matches every event type
//! - `system.rtc.*` matches every type starting with `system.rtc.`
//! - `system.error` matches only `system.error`
//!
//! ## Handlers
//!
//! Handlers run synchronously inside `process`. The dispatcher checks its
//! budget between events and cannot interrupt a running handler, so handlers
//! must be short. Handler failures are the handler's business; the bus does
//! not catch them.

pub mod bus;
pub mod config;
pub mod driver;
pub mod error;
pub mod pattern;
mod queue;
pub mod registry;
pub mod stats;
pub mod types;

// Re-export main types
pub use bus::{EventBus, EventFilter, IsrPublish, Publisher};
pub use config::EventBusConfig;
pub use driver::{run_dispatch_loop, DispatchLoopReport};
pub use error::{EventBusError, EventBusResult};
pub use pattern::Pattern;
pub use registry::{EventHandler, SubscriptionHandle};
pub use stats::EventBusStats;
pub use types::{
    ActuatorEvent, Event, ModulesEvent, ParsePriorityError, Priority, SensorEvent, SystemEvent,
};
