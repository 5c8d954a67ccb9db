//! Bounded event queue
//!
//! Fixed-capacity multi-producer/single-consumer buffer built on
//! `tokio::sync::mpsc`. Every operation here is an immediate attempt: a push
//! either lands or hands the event back, a pop either yields an event or
//! reports the queue empty. Nothing waits for space or data.

use crate::types::Event;
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};

/// Create a queue holding at most `capacity` events.
///
/// `capacity` must be non-zero; callers validate it first.
pub(crate) fn bounded(capacity: usize) -> (QueueProducer, QueueConsumer) {
    let (tx, rx) = mpsc::channel(capacity);
    (QueueProducer { tx, capacity }, QueueConsumer { rx })
}

/// Producer end. Cheap to clone; safe to use from any thread.
#[derive(Debug, Clone)]
pub(crate) struct QueueProducer {
    tx: mpsc::Sender<Event>,
    capacity: usize,
}

impl QueueProducer {
    /// Push from a normal execution context.
    ///
    /// On a full (or torn down) queue the event is handed back so the caller
    /// decides how to account for the drop.
    pub(crate) fn try_push(&self, event: Event) -> Result<(), Event> {
        self.tx.try_send(event).map_err(|err| match err {
            TrySendError::Full(event) | TrySendError::Closed(event) => event,
        })
    }

    /// Push from interrupt context.
    ///
    /// Kept apart from [`try_push`](Self::try_push) so its constraints stay
    /// auditable in one place: one atomic permit acquisition, one slot write,
    /// one lock-free waker notification. No logging, no lock, no retry. The
    /// channel may allocate a new slot block, so an allocation failure aborts
    /// like any other allocation failure on the host; embedded targets size
    /// the heap for `capacity` events up front.
    #[inline]
    pub(crate) fn push_from_isr(&self, event: Event) -> Result<(), Event> {
        match self.tx.try_send(event) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(event)) | Err(TrySendError::Closed(event)) => Err(event),
        }
    }

    /// Events currently pending.
    pub(crate) fn len(&self) -> usize {
        self.capacity.saturating_sub(self.tx.capacity())
    }

    pub(crate) fn is_full(&self) -> bool {
        self.tx.capacity() == 0
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Consumer end, owned by the single dispatching context.
#[derive(Debug)]
pub(crate) struct QueueConsumer {
    rx: mpsc::Receiver<Event>,
}

impl QueueConsumer {
    pub(crate) fn pop(&mut self) -> Option<Event> {
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Pop up to `limit` events, stopping early once the queue is empty.
    ///
    /// Bounding the drain by the depth observed at the start of a dispatch
    /// pass keeps events admitted during that pass out of it.
    pub(crate) fn drain(&mut self, limit: usize) -> Vec<Event> {
        let mut batch = Vec::with_capacity(limit);
        while batch.len() < limit {
            match self.pop() {
                Some(event) => batch.push(event),
                None => break,
            }
        }
        batch
    }

    /// Destroy everything pending. Returns how many events were discarded.
    pub(crate) fn clear(&mut self) -> usize {
        let mut discarded = 0;
        while self.pop().is_some() {
            discarded += 1;
        }
        discarded
    }
}
