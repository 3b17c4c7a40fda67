//! Scope-bound subscriptions — unsubscribe on drop.

use std::marker::PhantomData;

use crate::bus::{BusError, EventBus};
use crate::event::Event;
use crate::subscriber::Cookie;

/// An RAII handle for one bus subscription.
///
/// Holds a borrow of the bus and the subscription's [`Cookie`]; when the
/// handle drops, the subscription is released. Move-only — cloning a
/// subscription handle would make "who unsubscribes" ambiguous.
///
/// A default-constructed handle manages nothing and drops as a no-op.
///
/// # Example
///
/// ```rust
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use fanout_bus::{EventBus, ScopedSubscription};
///
/// struct Saved;
/// impl fanout_bus::Event for Saved {}
///
/// let bus = EventBus::new();
/// let saves = Arc::new(AtomicUsize::new(0));
///
/// {
///     let tally = Arc::clone(&saves);
///     let _sub = ScopedSubscription::subscribe(&bus, move |_: &Saved| {
///         tally.fetch_add(1, Ordering::Relaxed);
///     })
///     .unwrap();
///     bus.publish(&Saved);
/// }
///
/// // The handle left scope; the handler is gone.
/// bus.publish(&Saved);
/// assert_eq!(saves.load(Ordering::Relaxed), 1);
/// ```
pub struct ScopedSubscription<'bus, E: Event> {
    bus: Option<&'bus EventBus>,
    cookie: Cookie,
    _event: PhantomData<fn(&E)>,
}

impl<'bus, E: Event> ScopedSubscription<'bus, E> {
    /// Creates a handle managing no subscription.
    #[must_use]
    pub fn new() -> Self {
        Self {
            bus: None,
            cookie: Cookie::default(),
            _event: PhantomData,
        }
    }

    /// Subscribes `handler` to `E` on `bus` and binds the subscription's
    /// lifetime to the returned handle.
    ///
    /// # Errors
    ///
    /// [`BusError::Poisoned`] if the bus's writer path is poisoned.
    pub fn subscribe<H>(bus: &'bus EventBus, handler: H) -> Result<Self, BusError>
    where
        H: Fn(&E) + Send + Sync + 'static,
    {
        let cookie = bus.subscribe(handler)?;
        Ok(Self {
            bus: Some(bus),
            cookie,
            _event: PhantomData,
        })
    }

    /// Releases the current subscription (if any), then subscribes
    /// `handler` and manages the new subscription instead.
    ///
    /// # Errors
    ///
    /// [`BusError::Poisoned`] if the bus's writer path is poisoned; the
    /// handle is left managing nothing in that case.
    pub fn assign<H>(&mut self, bus: &'bus EventBus, handler: H) -> Result<(), BusError>
    where
        H: Fn(&E) + Send + Sync + 'static,
    {
        self.reset();
        self.cookie = bus.subscribe(handler)?;
        self.bus = Some(bus);
        Ok(())
    }

    /// Releases the managed subscription now, leaving the handle empty.
    ///
    /// A poisoned writer path cannot be reported from here meaningfully
    /// (drop glue takes the same path), so it is logged and swallowed.
    pub fn reset(&mut self) {
        if let Some(bus) = self.bus.take() {
            if let Err(error) = bus.unsubscribe(self.cookie) {
                tracing::warn!(%error, "scoped unsubscribe failed");
            }
            self.cookie = Cookie::default();
        }
    }

    /// Exchanges the managed subscriptions of two handles.
    pub fn swap(&mut self, other: &mut Self) {
        std::mem::swap(self, other);
    }
}

impl<E: Event> Default for ScopedSubscription<'_, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Event> Drop for ScopedSubscription<'_, E> {
    fn drop(&mut self) {
        self.reset();
    }
}

impl<E: Event> std::fmt::Debug for ScopedSubscription<'_, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedSubscription")
            .field("active", &self.bus.is_some())
            .finish()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
