//! Subscription registry
//!
//! Ordered collection of `(handle, pattern, handler, call count)` entries.
//! The registry is not synchronized: it lives inside the owning
//! [`EventBus`](crate::EventBus) and is only reachable through `&mut` access,
//! so it is never mutated concurrently with dispatch.

use crate::error::{EventBusError, EventBusResult};
use crate::pattern::Pattern;
use crate::types::Event;
use std::fmt;
use std::num::NonZeroU64;

/// Handler invoked synchronously for every matching event.
///
/// Handlers run inside `process` on the control loop; the dispatcher cannot
/// preempt them, so a slow handler overshoots the dispatch budget. A handler
/// that can fail must deal with the failure itself: the bus does not catch
/// panics or inspect results.
pub trait EventHandler: Send {
    /// Handle an event.
    fn handle(&mut self, event: &Event);
}

impl<F> EventHandler for F
where
    F: FnMut(&Event) + Send,
{
    fn handle(&mut self, event: &Event) {
        self(event)
    }
}

/// Opaque subscription identifier.
///
/// Handles start at 1, strictly increase, and are never reused for the
/// lifetime of one initialization of the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionHandle(NonZeroU64);

impl SubscriptionHandle {
    /// Build a handle from its raw value. Returns `None` for `0`.
    pub fn from_raw(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    /// Raw numeric value.
    pub fn get(&self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

struct Subscription {
    handle: SubscriptionHandle,
    pattern: Pattern,
    handler: Box<dyn EventHandler>,
    call_count: u64,
}

pub(crate) struct SubscriptionRegistry {
    entries: Vec<Subscription>,
    /// `None` once every non-zero `u64` has been issued
    next_handle: Option<NonZeroU64>,
}

impl fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("subscriptions", &self.entries.len())
            .field("next_handle", &self.next_handle)
            .finish()
    }
}

impl SubscriptionRegistry {
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_handle: Some(NonZeroU64::MIN),
        }
    }

    /// Append a subscription and return its freshly assigned handle.
    ///
    /// Once `u64::MAX` has been issued the handle space is exhausted: debug
    /// builds panic, release builds keep handing out `u64::MAX`.
    pub(crate) fn subscribe(
        &mut self,
        pattern: Pattern,
        handler: Box<dyn EventHandler>,
    ) -> SubscriptionHandle {
        debug_assert!(
            self.next_handle.is_some(),
            "subscription handle space exhausted"
        );
        let handle = SubscriptionHandle(self.next_handle.unwrap_or(NonZeroU64::MAX));
        self.next_handle = self.next_handle.and_then(|next| next.checked_add(1));

        self.entries.push(Subscription {
            handle,
            pattern,
            handler,
            call_count: 0,
        });

        handle
    }

    pub(crate) fn unsubscribe(&mut self, handle: SubscriptionHandle) -> EventBusResult<()> {
        let index = self
            .entries
            .iter()
            .position(|sub| sub.handle == handle)
            .ok_or(EventBusError::NotFound(handle))?;

        // `remove`, not `swap_remove`: registry order is dispatch order.
        self.entries.remove(index);
        Ok(())
    }

    /// Invoke every matching handler in registration order.
    ///
    /// Returns the number of handlers invoked.
    pub(crate) fn dispatch(&mut self, event: &Event) -> usize {
        let mut invoked = 0;
        for sub in self.entries.iter_mut() {
            if sub.pattern.matches(&event.event_type) {
                sub.handler.handle(event);
                sub.call_count += 1;
                invoked += 1;
            }
        }
        invoked
    }

    pub(crate) fn call_count(&self, handle: SubscriptionHandle) -> Option<u64> {
        self.entries
            .iter()
            .find(|sub| sub.handle == handle)
            .map(|sub| sub.call_count)
    }

    pub(crate) fn pattern(&self, handle: SubscriptionHandle) -> Option<&Pattern> {
        self.entries
            .iter()
            .find(|sub| sub.handle == handle)
            .map(|sub| &sub.pattern)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Drop every subscription and restart handle numbering at 1.
    pub(crate) fn reset(&mut self) {
        self.entries.clear();
        self.next_handle = Some(NonZeroU64::MIN);
    }
}
