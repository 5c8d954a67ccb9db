//! Event bus implementation
//!
//! The bus is split into two capabilities:
//!
//! - [`EventBus`] is the owning handle. It is held by the control loop and is
//!   the only way to initialize the bus, manage subscriptions and dispatch.
//!   Registry mutation needs `&mut EventBus`, so it can never race dispatch.
//! - [`Publisher`] is a cheap, cloneable, `Send + Sync` handle handed to every
//!   module, timer and interrupt handler. It can publish, pause/resume
//!   dispatch, install a filter and read statistics, but cannot subscribe.
//!
//! Dispatch is cooperative: the control loop calls [`EventBus::process`] with
//! a small budget once per cycle. Each call snapshots the queue, orders the
//! snapshot by priority (stable, so equal priorities keep admission order),
//! and dispatches until the budget runs out. Whatever is left goes back into
//! the queue for the next call, or is dropped if producers filled the queue
//! in the meantime.

use crate::config::{validate_capacity, EventBusConfig};
use crate::error::{EventBusError, EventBusResult};
use crate::pattern::Pattern;
use crate::queue::{self, QueueConsumer, QueueProducer};
use crate::registry::{EventHandler, SubscriptionHandle, SubscriptionRegistry};
use crate::stats::{Counters, EventBusStats};
use crate::types::{Event, Priority};
use parking_lot::RwLock;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

/// Admission predicate evaluated once per publish, before queueing.
///
/// Returning `false` silently suppresses the event.
pub type EventFilter = Arc<dyn Fn(&Event) -> bool + Send + Sync>;

/// Outcome of a successful interrupt-context publish.
#[must_use = "a parked consumer stays asleep unless `Publisher::wake_consumer` is called"]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IsrPublish {
    /// The consumer was parked in [`EventBus::wait_for_events`]. The ISR path
    /// does not wake it (that takes a lock); call
    /// [`Publisher::wake_consumer`] once back in a normal context.
    pub wake_consumer: bool,
}

/// State shared by the owning handle and every publisher.
struct Shared {
    /// Producer end of the queue; `None` while uninitialized
    queue: RwLock<Option<QueueProducer>>,
    filter: RwLock<Option<EventFilter>>,
    paused: AtomicBool,
    consumer_waiting: AtomicBool,
    wakeup: Notify,
    counters: Counters,
}

// ============================================================================
// Publisher
// ============================================================================

/// Publish-only handle to the event bus.
#[derive(Clone)]
pub struct Publisher {
    shared: Arc<Shared>,
}

impl fmt::Debug for Publisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Publisher")
            .field("initialized", &self.is_initialized())
            .field("paused", &self.is_paused())
            .field("queue_len", &self.queue_len())
            .finish()
    }
}

impl Publisher {
    fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                queue: RwLock::new(None),
                filter: RwLock::new(None),
                paused: AtomicBool::new(false),
                consumer_waiting: AtomicBool::new(false),
                wakeup: Notify::new(),
                counters: Counters::default(),
            }),
        }
    }

    /// Publish an event with `Normal` priority.
    pub fn publish(
        &self,
        event_type: impl Into<String>,
        payload: serde_json::Value,
    ) -> EventBusResult<()> {
        self.publish_event(Event::new(event_type, payload))
    }

    /// Publish an event with an explicit priority.
    pub fn publish_with_priority(
        &self,
        event_type: impl Into<String>,
        payload: serde_json::Value,
        priority: Priority,
    ) -> EventBusResult<()> {
        self.publish_event(Event::new(event_type, payload).with_priority(priority))
    }

    /// Publish a pre-built event.
    ///
    /// # Errors
    ///
    /// - `NotInitialized` if the bus has no queue
    /// - `ResourceExhausted` if the queue is full; the event is dropped and
    ///   counted as both published and dropped
    ///
    /// An event rejected by the filter is not an error: the call succeeds
    /// without admitting the event or counting it as published.
    pub fn publish_event(&self, event: Event) -> EventBusResult<()> {
        if !self.is_initialized() {
            return Err(EventBusError::NotInitialized);
        }

        // Run the filter without holding the queue lock.
        let filter = self.shared.filter.read().clone();
        if let Some(filter) = filter {
            if !filter(&event) {
                return Ok(());
            }
        }

        // Counters move under the read guard so `init` cannot reset them
        // halfway through an admission.
        let rejected = {
            let queue = self.shared.queue.read();
            let producer = queue.as_ref().ok_or(EventBusError::NotInitialized)?;
            self.shared.counters.record_published();
            let rejected = producer.try_push(event).err();
            if rejected.is_some() {
                self.shared.counters.record_dropped();
            }
            rejected
        };

        match rejected {
            None => {
                self.notify_if_waiting();
                Ok(())
            }
            Some(event) => {
                warn!(
                    event_type = %event.event_type,
                    priority = %event.priority,
                    "Event queue full, dropping event"
                );
                Err(EventBusError::ResourceExhausted)
            }
        }
    }

    /// Publish from interrupt context.
    ///
    /// Never blocks, never logs, never consults the filter. Counters are
    /// updated with lock-free atomics only. If the bus is being
    /// re-initialized at this instant the queue lock is held for writing;
    /// the event is then dropped exactly as if the queue were full.
    ///
    /// Building the `Event` allocates; on the host an allocation failure
    /// aborts, on target the heap is sized so the queue can be filled.
    pub fn publish_from_isr(
        &self,
        event_type: impl Into<String>,
        payload: serde_json::Value,
        priority: Priority,
    ) -> EventBusResult<IsrPublish> {
        let event = Event::new(event_type, payload).with_priority(priority);
        let counters = &self.shared.counters;

        let Some(queue) = self.shared.queue.try_read() else {
            counters.record_published();
            counters.record_dropped();
            return Err(EventBusError::ResourceExhausted);
        };
        let Some(producer) = queue.as_ref() else {
            return Err(EventBusError::NotInitialized);
        };

        counters.record_published();
        if producer.push_from_isr(event).is_err() {
            counters.record_dropped();
            return Err(EventBusError::ResourceExhausted);
        }

        Ok(IsrPublish {
            wake_consumer: self.shared.consumer_waiting.swap(false, Ordering::AcqRel),
        })
    }

    /// Wake a consumer parked in [`EventBus::wait_for_events`].
    pub fn wake_consumer(&self) {
        self.shared.wakeup.notify_one();
    }

    fn notify_if_waiting(&self) {
        if self.shared.consumer_waiting.swap(false, Ordering::AcqRel) {
            self.shared.wakeup.notify_one();
        }
    }

    /// Stop `process` from dispatching. Publishing is unaffected.
    pub fn pause(&self) {
        self.shared.paused.store(true, Ordering::Release);
    }

    /// Let `process` dispatch again.
    pub fn resume(&self) {
        self.shared.paused.store(false, Ordering::Release);
    }

    /// Check if dispatch is paused.
    pub fn is_paused(&self) -> bool {
        self.shared.paused.load(Ordering::Acquire)
    }

    /// Install the admission filter, replacing any previous one.
    pub fn set_filter<F>(&self, filter: F)
    where
        F: Fn(&Event) -> bool + Send + Sync + 'static,
    {
        *self.shared.filter.write() = Some(Arc::new(filter));
    }

    /// Remove the admission filter.
    pub fn clear_filter(&self) {
        *self.shared.filter.write() = None;
    }

    /// Check if an admission filter is installed.
    pub fn has_filter(&self) -> bool {
        self.shared.filter.read().is_some()
    }

    /// Get event bus stats.
    pub fn stats(&self) -> EventBusStats {
        let (len, capacity) = self
            .shared
            .queue
            .read()
            .as_ref()
            .map(|producer| (producer.len(), producer.capacity()))
            .unwrap_or((0, 0));
        self.shared.counters.snapshot(len, capacity)
    }

    /// Events currently pending (0 when uninitialized).
    pub fn queue_len(&self) -> usize {
        self.shared
            .queue
            .read()
            .as_ref()
            .map_or(0, QueueProducer::len)
    }

    /// Check if the queue is at capacity (false when uninitialized).
    pub fn is_queue_full(&self) -> bool {
        self.shared
            .queue
            .read()
            .as_ref()
            .is_some_and(QueueProducer::is_full)
    }

    /// Check if the bus has a queue.
    pub fn is_initialized(&self) -> bool {
        self.shared.queue.read().is_some()
    }
}

// ============================================================================
// EventBus
// ============================================================================

struct LocalQueue {
    producer: QueueProducer,
    consumer: QueueConsumer,
}

/// Owning handle to the event bus.
///
/// Create it once at startup, call [`init`](Self::init) (or use
/// [`with_config`](Self::with_config)), hand [`publisher`](Self::publisher)
/// clones to the modules, and drive [`process`](Self::process) from the
/// control loop.
pub struct EventBus {
    publisher: Publisher,
    queue: Option<LocalQueue>,
    registry: SubscriptionRegistry,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("initialized", &self.queue.is_some())
            .field("registry", &self.registry)
            .field("publisher", &self.publisher)
            .finish()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Create an uninitialized event bus.
    pub fn new() -> Self {
        Self {
            publisher: Publisher::new(),
            queue: None,
            registry: SubscriptionRegistry::new(),
        }
    }

    /// Create and initialize an event bus from configuration.
    pub fn with_config(config: &EventBusConfig) -> EventBusResult<Self> {
        config.validate()?;
        let mut bus = Self::new();
        bus.init(config.queue_capacity)?;
        Ok(bus)
    }

    /// Get a publish-only handle sharing this bus.
    pub fn publisher(&self) -> Publisher {
        self.publisher.clone()
    }

    /// Initialize the bus with a fixed queue capacity.
    ///
    /// Calling this on an initialized bus is a full reset: pending events are
    /// destroyed, the queue is rebuilt with the new capacity, every
    /// subscription is discarded, counters are zeroed and handle numbering
    /// restarts at 1. The filter and the pause flag are kept.
    pub fn init(&mut self, capacity: usize) -> EventBusResult<()> {
        validate_capacity(capacity)?;
        let (producer, consumer) = queue::bounded(capacity);

        {
            let mut slot = self.publisher.shared.queue.write();
            match self.queue.take() {
                Some(previous) => {
                    info!(
                        old_capacity = previous.producer.capacity(),
                        new_capacity = capacity,
                        discarded_events = previous.producer.len(),
                        discarded_subscriptions = self.registry.len(),
                        "Event bus re-initialized"
                    );
                }
                None => {
                    info!(capacity, "Event bus initialized");
                }
            }
            *slot = Some(producer.clone());
            self.publisher.shared.counters.reset();
            self.publisher.shared.counters.set_subscribers(0);
        }

        self.registry.reset();
        self.queue = Some(LocalQueue { producer, consumer });
        Ok(())
    }

    /// Release the queue and every pending event, and clear the registry and
    /// filter. Publishing fails with `NotInitialized` until the next `init`.
    pub fn deinit(&mut self) {
        *self.publisher.shared.queue.write() = None;

        if let Some(previous) = self.queue.take() {
            info!(
                discarded_events = previous.producer.len(),
                discarded_subscriptions = self.registry.len(),
                "Event bus deinitialized"
            );
        }

        self.registry.reset();
        self.publisher.shared.counters.set_subscribers(0);
        self.publisher.clear_filter();
    }

    /// Check if the bus has a queue.
    pub fn is_initialized(&self) -> bool {
        self.queue.is_some()
    }

    // ------------------------------------------------------------------------
    // Subscriptions
    // ------------------------------------------------------------------------

    /// Subscribe a handler to an event type pattern.
    ///
    /// Patterns: `*` (everything), `prefix*` (types starting with `prefix`) or
    /// an exact type. Subscriptions are discarded by the next `init`, so
    /// register them after initialization.
    pub fn subscribe<H>(&mut self, pattern: impl Into<Pattern>, handler: H) -> SubscriptionHandle
    where
        H: EventHandler + 'static,
    {
        let pattern = pattern.into();
        debug!(pattern = %pattern, "Subscribing");
        let handle = self.registry.subscribe(pattern, Box::new(handler));
        self.publisher
            .shared
            .counters
            .set_subscribers(self.registry.len());
        handle
    }

    /// Remove a subscription.
    ///
    /// # Errors
    ///
    /// - `NotInitialized` if the bus has no queue
    /// - `NotFound` if the handle is unknown or already removed
    pub fn unsubscribe(&mut self, handle: SubscriptionHandle) -> EventBusResult<()> {
        if !self.is_initialized() {
            return Err(EventBusError::NotInitialized);
        }
        self.registry.unsubscribe(handle)?;
        self.publisher
            .shared
            .counters
            .set_subscribers(self.registry.len());
        debug!(handle = %handle, "Unsubscribed");
        Ok(())
    }

    /// Number of active subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.registry.len()
    }

    /// How many events a subscription has been handed so far.
    pub fn subscription_call_count(&self, handle: SubscriptionHandle) -> Option<u64> {
        self.registry.call_count(handle)
    }

    /// Pattern of a subscription.
    pub fn subscription_pattern(&self, handle: SubscriptionHandle) -> Option<&Pattern> {
        self.registry.pattern(handle)
    }

    // ------------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------------

    /// Dispatch pending events for at most `max_duration_ms` milliseconds.
    ///
    /// Returns the number of events dispatched. Returns 0 without touching
    /// the queue when paused or uninitialized.
    ///
    /// The budget is checked before each event, never during one: a slow
    /// handler overshoots it. Events not reached in time are pushed back in
    /// priority order; if producers filled the queue during this call such an
    /// event is dropped and counted in `total_dropped`.
    pub fn process(&mut self, max_duration_ms: u64) -> usize {
        if self.publisher.is_paused() {
            return 0;
        }
        let Some(queue) = self.queue.as_mut() else {
            return 0;
        };

        let started = Instant::now();
        let budget = Duration::from_millis(max_duration_ms);

        let pending = queue.producer.len();
        if pending == 0 {
            return 0;
        }
        let mut batch = queue.consumer.drain(pending);
        // Stable sort: equal priorities keep admission order.
        batch.sort_by_key(|event| event.priority);

        let counters = &self.publisher.shared.counters;
        let mut processed = 0;
        let mut deferred = 0;
        let mut dropped = 0;

        for event in batch {
            if started.elapsed() >= budget {
                match queue.producer.try_push(event) {
                    Ok(()) => deferred += 1,
                    Err(event) => {
                        counters.record_dropped();
                        dropped += 1;
                        warn!(
                            event_type = %event.event_type,
                            priority = %event.priority,
                            "Queue refilled during dispatch, dropping deferred event"
                        );
                    }
                }
                continue;
            }

            let handling = Instant::now();
            self.registry.dispatch(&event);
            counters.record_processed(handling.elapsed());
            processed += 1;
        }

        if deferred > 0 || dropped > 0 {
            debug!(
                processed,
                deferred,
                dropped,
                budget_ms = max_duration_ms,
                "Dispatch budget exhausted"
            );
        }

        processed
    }

    /// Destroy every pending event without dispatching it.
    ///
    /// Subscriptions and counters are untouched. Returns the number of
    /// events discarded.
    pub fn clear(&mut self) -> usize {
        let discarded = self
            .queue
            .as_mut()
            .map_or(0, |queue| queue.consumer.clear());
        if discarded > 0 {
            debug!(discarded, "Cleared pending events");
        }
        discarded
    }

    /// Wait until at least one event is pending.
    ///
    /// Resolves immediately if the queue is already non-empty or the bus is
    /// uninitialized. May resolve spuriously; callers re-check with
    /// `process`. The returned future does not borrow the bus.
    pub fn wait_for_events(&self) -> impl Future<Output = ()> + Send + 'static {
        let publisher = self.publisher.clone();
        async move {
            if publisher.queue_len() > 0 || !publisher.is_initialized() {
                return;
            }

            let shared = &publisher.shared;
            let notified = shared.wakeup.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            shared.consumer_waiting.store(true, Ordering::Release);
            // An event admitted between the first check and the flag store
            // would not have woken us.
            if publisher.queue_len() > 0 {
                shared.consumer_waiting.store(false, Ordering::Release);
                return;
            }

            notified.await;
            shared.consumer_waiting.store(false, Ordering::Release);
        }
    }

    // ------------------------------------------------------------------------
    // Delegated publisher operations
    // ------------------------------------------------------------------------

    /// Publish an event with `Normal` priority.
    pub fn publish(
        &self,
        event_type: impl Into<String>,
        payload: serde_json::Value,
    ) -> EventBusResult<()> {
        self.publisher.publish(event_type, payload)
    }

    /// Publish an event with an explicit priority.
    pub fn publish_with_priority(
        &self,
        event_type: impl Into<String>,
        payload: serde_json::Value,
        priority: Priority,
    ) -> EventBusResult<()> {
        self.publisher
            .publish_with_priority(event_type, payload, priority)
    }

    /// Publish a pre-built event.
    pub fn publish_event(&self, event: Event) -> EventBusResult<()> {
        self.publisher.publish_event(event)
    }

    /// Publish from interrupt context. See [`Publisher::publish_from_isr`].
    pub fn publish_from_isr(
        &self,
        event_type: impl Into<String>,
        payload: serde_json::Value,
        priority: Priority,
    ) -> EventBusResult<IsrPublish> {
        self.publisher
            .publish_from_isr(event_type, payload, priority)
    }

    /// Stop dispatching.
    pub fn pause(&self) {
        self.publisher.pause();
    }

    /// Resume dispatching.
    pub fn resume(&self) {
        self.publisher.resume();
    }

    /// Check if dispatch is paused.
    pub fn is_paused(&self) -> bool {
        self.publisher.is_paused()
    }

    /// Install the admission filter, replacing any previous one.
    pub fn set_filter<F>(&self, filter: F)
    where
        F: Fn(&Event) -> bool + Send + Sync + 'static,
    {
        self.publisher.set_filter(filter);
    }

    /// Remove the admission filter.
    pub fn clear_filter(&self) {
        self.publisher.clear_filter();
    }

    /// Get event bus stats.
    pub fn stats(&self) -> EventBusStats {
        self.publisher.stats()
    }

    /// Zero the published/processed/dropped counters and the average.
    /// Queue content and subscriptions are untouched.
    pub fn reset_stats(&self) {
        self.publisher.shared.counters.reset();
    }

    /// Events currently pending.
    pub fn queue_len(&self) -> usize {
        self.publisher.queue_len()
    }

    /// Check if the queue is at capacity.
    pub fn is_queue_full(&self) -> bool {
        self.publisher.is_queue_full()
    }
}

// ============================================================================
// Tests
// ============================================================================
