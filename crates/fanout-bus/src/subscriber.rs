//! Subscriber records — type-erased handlers, their identities, and the
//! multimap the bus keeps them in.
//!
//! A handler subscribed for event type `E` is wrapped once into a
//! [`TypeErasedSubscriber`] so that handlers for many event types can
//! share one container. The wrapper owns the handler behind an `Arc`;
//! cloning the wrapper shares the cell, which is what lets the *same*
//! record (same id) sit in both Left-Right copies of the map.

use std::any::{Any, TypeId};
use std::sync::Arc;

use fxhash::FxHashMap;
use smallvec::SmallVec;

use crate::event::Event;

// ---------------------------------------------------------------------------
// SubscriberId
// ---------------------------------------------------------------------------

/// Stable identity of one subscriber record.
///
/// Derived from the address of the shared handler cell, so it is unique
/// among all records alive in the same bus and identical across the two
/// Left-Right copies holding the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(usize);

impl SubscriberId {
    /// The id no live record can have (no allocation sits at null).
    pub(crate) const VACANT: Self = Self(0);
}

// ---------------------------------------------------------------------------
// Cookie
// ---------------------------------------------------------------------------

/// Opaque handle identifying one subscription, returned by
/// [`subscribe`](crate::EventBus::subscribe) and consumed by
/// [`unsubscribe`](crate::EventBus::unsubscribe).
///
/// Trivially copyable. The default value holds nothing: unsubscribing it
/// is a no-op. A cookie is only meaningful against the bus that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cookie {
    pub(crate) id: SubscriberId,
    pub(crate) key: TypeId,
}

/// Never published or subscribed; keys the default cookie.
enum Vacant {}

impl Default for Cookie {
    fn default() -> Self {
        Self {
            id: SubscriberId::VACANT,
            key: TypeId::of::<Vacant>(),
        }
    }
}

// ---------------------------------------------------------------------------
// TypeErasedSubscriber
// ---------------------------------------------------------------------------

/// A handler for some concrete event type, erased so the map can hold it.
///
/// The delivery closure is chosen at wrap time, i.e. at the subscribe
/// call: chain-declaring event types take the static-dispatch path — an
/// unchecked downcast justified by [`EventRef`](crate::EventRef)'s
/// key/value invariant — while plain types take a checked downcast that
/// silently skips a mismatched delivery.
#[derive(Clone)]
pub(crate) struct TypeErasedSubscriber {
    deliver: Arc<dyn Fn(&dyn Any) + Send + Sync>,
}

impl TypeErasedSubscriber {
    pub(crate) fn wrap<E, H>(handler: H) -> Self
    where
        E: Event,
        H: Fn(&E) + Send + Sync + 'static,
    {
        let deliver: Arc<dyn Fn(&dyn Any) + Send + Sync> = if E::POLYMORPHIC {
            Arc::new(move |erased: &dyn Any| {
                // SAFETY: the bus looks this record up under the bucket key
                // `TypeId::of::<E>()`, and every erased value it delivers
                // comes out of an `EventRef` whose constructor pinned the
                // value's concrete type to that key. The value is an `E`.
                let event = unsafe { &*std::ptr::from_ref(erased).cast::<E>() };
                handler(event);
            })
        } else {
            Arc::new(move |erased: &dyn Any| {
                if let Some(event) = erased.downcast_ref::<E>() {
                    handler(event);
                }
            })
        };
        Self { deliver }
    }

    /// Invokes the handler on the erased event view.
    pub(crate) fn deliver(&self, erased: &dyn Any) {
        (self.deliver)(erased);
    }

    /// Identity of the shared handler cell.
    pub(crate) fn id(&self) -> SubscriberId {
        SubscriberId(Arc::as_ptr(&self.deliver).cast::<()>() as usize)
    }
}

impl std::fmt::Debug for TypeErasedSubscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeErasedSubscriber")
            .field("id", &self.id())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// SubscriberMap
// ---------------------------------------------------------------------------

/// Multimap from type identity to subscriber records.
///
/// Within a key, records keep insertion order — that order is the
/// delivery order the bus promises. The map itself is single-threaded;
/// all concurrency control lives in the Left-Right wrapper around it.
#[derive(Debug, Default)]
pub(crate) struct SubscriberMap {
    buckets: FxHashMap<TypeId, SmallVec<[TypeErasedSubscriber; 2]>>,
}

impl SubscriberMap {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Appends a record to its type's bucket.
    pub(crate) fn insert(&mut self, key: TypeId, record: TypeErasedSubscriber) {
        self.buckets.entry(key).or_default().push(record);
    }

    /// Removes the first record under `key` with the given id, preserving
    /// the order of the rest. Unknown keys and ids are a no-op.
    pub(crate) fn remove(&mut self, key: TypeId, id: SubscriberId) {
        if let Some(bucket) = self.buckets.get_mut(&key) {
            if let Some(position) = bucket.iter().position(|record| record.id() == id) {
                bucket.remove(position);
                if bucket.is_empty() {
                    self.buckets.remove(&key);
                }
            }
        }
    }

    /// The records subscribed for `key`, in insertion order.
    pub(crate) fn bucket(&self, key: TypeId) -> &[TypeErasedSubscriber] {
        self.buckets.get(&key).map_or(&[], SmallVec::as_slice)
    }

    /// Total number of records across all keys.
    pub(crate) fn len(&self) -> usize {
        self.buckets.values().map(SmallVec::len).sum()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
