//! The event bus — publish to the reader side, subscribe on the writer side.
//!
//! [`EventBus`] keeps its subscriber multimap inside a
//! [`LeftRight`](fanout_core::LeftRight): publishing observes (wait-free,
//! never blocked by writers), while subscribe/unsubscribe modify (apply to
//! both copies, serialized among themselves, draining in-flight publishes
//! of the old copy before reusing it).
//!
//! # Thread Safety
//!
//! Any number of threads may publish, subscribe, and unsubscribe
//! concurrently. Handlers are *not* serialized: two concurrent publishes
//! of the same type run the same handler concurrently with itself, so
//! handler-internal state must be synchronized by its owner.

use std::any::TypeId;

use fanout_core::{LeftRight, PoisonedWriter};

use crate::event::Event;
use crate::subscriber::{Cookie, SubscriberMap, TypeErasedSubscriber};

// ---------------------------------------------------------------------------
// BusError
// ---------------------------------------------------------------------------

/// Errors from bus write operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BusError {
    /// The subscriber map's writer path is poisoned; no further
    /// subscriptions can be made. Publishing keeps working.
    #[error("subscriber map unusable: {0}")]
    Poisoned(#[from] PoisonedWriter),
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Accepts events from publishers and delivers them to subscribers.
///
/// Delivery is synchronous on the publishing thread and fans out along the
/// event's dispatch chain: handlers of the event's own type first, then
/// handlers of each declared ancestor, and within one type in subscription
/// order.
///
/// # Example
///
/// ```rust
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use fanout_bus::EventBus;
///
/// struct JobDone {
///     exit_code: i32,
/// }
/// impl fanout_bus::Event for JobDone {}
///
/// let bus = EventBus::new();
/// let failures = Arc::new(AtomicUsize::new(0));
///
/// let tally = Arc::clone(&failures);
/// let cookie = bus
///     .subscribe(move |event: &JobDone| {
///         if event.exit_code != 0 {
///             tally.fetch_add(1, Ordering::Relaxed);
///         }
///     })
///     .unwrap();
///
/// bus.publish(&JobDone { exit_code: 1 });
/// assert_eq!(failures.load(Ordering::Relaxed), 1);
/// bus.unsubscribe(cookie).unwrap();
/// ```
pub struct EventBus {
    subscribers: LeftRight<SubscriberMap>,
}

impl EventBus {
    /// Creates an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscribers: LeftRight::from_fn(SubscriberMap::new),
        }
    }

    /// Subscribes `handler` to events of type `E`.
    ///
    /// The handler fires for every published `E` and for every published
    /// descendant that names `E` in its dispatch chain. It runs on
    /// whichever thread publishes, possibly concurrently with itself, and
    /// must not panic.
    ///
    /// The returned [`Cookie`] identifies this subscription until it is
    /// passed to [`unsubscribe`](Self::unsubscribe).
    ///
    /// # Errors
    ///
    /// [`BusError::Poisoned`] if a previous writer panicked.
    pub fn subscribe<E, H>(&self, handler: H) -> Result<Cookie, BusError>
    where
        E: Event,
        H: Fn(&E) + Send + Sync + 'static,
    {
        let key = TypeId::of::<E>();
        let record = TypeErasedSubscriber::wrap(handler);
        let id = record.id();

        // Both applications insert a clone of the same shared cell, so the
        // two map copies hold the same record under the same id.
        self.subscribers
            .modify(move |map| map.insert(key, record.clone()))?;

        tracing::trace!(?id, event = std::any::type_name::<E>(), "subscribed");
        Ok(Cookie { id, key })
    }

    /// Removes the subscription identified by `cookie`.
    ///
    /// Unknown, already-removed, and default cookies are a silent no-op.
    /// Once this returns, no publish that starts afterwards delivers to
    /// the handler; publishes already in flight may still do so.
    ///
    /// # Errors
    ///
    /// [`BusError::Poisoned`] if a previous writer panicked.
    pub fn unsubscribe(&self, cookie: Cookie) -> Result<(), BusError> {
        self.subscribers
            .modify(move |map| map.remove(cookie.key, cookie.id))?;

        tracing::trace!(id = ?cookie.id, "unsubscribed");
        Ok(())
    }

    /// Publishes an event, synchronously, on the calling thread.
    ///
    /// Walks the event's dispatch chain most-derived first; for each link,
    /// every handler subscribed to that link's type at the moment this
    /// publish began is invoked in subscription order. Never blocks on
    /// writers and never fails; publishing with no subscribers is fine.
    ///
    /// A handler may publish further events (they are delivered under the
    /// same subscriber snapshot), but it must not subscribe or unsubscribe
    /// on the publishing thread: those are writes, and a write drains
    /// in-flight readers — including the publish that invoked the handler,
    /// which would wait on itself.
    pub fn publish<E: Event>(&self, event: &E) {
        let chain = event.dispatch_chain();
        self.subscribers.observe(|map| {
            for link in &chain {
                for record in map.bucket(link.key()) {
                    record.deliver(link.erased());
                }
            }
        });
    }

    /// Number of live subscriber records, across all event types.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.observe(SubscriberMap::len)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
