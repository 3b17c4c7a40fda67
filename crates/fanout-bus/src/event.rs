//! Events and dispatch chains.
//!
//! An event is any `'static` type implementing [`Event`]. Types that want
//! *polymorphic delivery* — a publish that also reaches handlers of their
//! ancestors — declare a dispatch chain with [`dispatch_as!`]; everything
//! else dispatches as itself only.
//!
//! A chain is a list of [`EventRef`]s, most-derived first. Each link pairs
//! the ancestor's type identity with a borrowed view of that ancestor
//! inside the published value, so the bus can hand every subscriber a
//! reference of exactly the type it subscribed for without knowing the
//! family. Chains compose: a link's view is itself an event whose own
//! chain supplies the links further up, mirroring how the family was
//! declared parent by parent.

use std::any::{Any, TypeId};

use smallvec::SmallVec;

// ---------------------------------------------------------------------------
// EventRef
// ---------------------------------------------------------------------------

/// One link of a dispatch chain: a type identity plus a borrowed view of
/// the published event as that type.
///
/// The only constructor takes the view as a concrete `&T`, so a link's key
/// always equals the erased value's real type. Delivery relies on this
/// invariant for its unchecked downcast; since the fields are private it
/// cannot be broken from outside this crate, only restated.
#[derive(Clone, Copy)]
pub struct EventRef<'a> {
    key: TypeId,
    value: &'a dyn Any,
}

impl<'a> EventRef<'a> {
    /// Builds a link dispatching `value` as a `T`.
    #[must_use]
    pub fn new<T: Any>(value: &'a T) -> Self {
        Self {
            key: TypeId::of::<T>(),
            value,
        }
    }

    /// The type identity handlers must have subscribed to.
    #[must_use]
    pub fn key(&self) -> TypeId {
        self.key
    }

    /// The erased view; its concrete type is the one named by `key`.
    pub(crate) fn erased(&self) -> &'a dyn Any {
        self.value
    }
}

impl std::fmt::Debug for EventRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRef").field("key", &self.key).finish()
    }
}

/// A dispatch chain, most-derived type first.
///
/// Backed by a `SmallVec`, so families up to four levels deep publish
/// without allocating.
pub type DispatchChain<'a> = SmallVec<[EventRef<'a>; 4]>;

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// A publishable value.
///
/// The default implementation dispatches as `[Self]` only, which is the
/// right behavior for standalone event types:
///
/// ```rust
/// use fanout_bus::Event;
///
/// struct TickExpired;
/// impl Event for TickExpired {}
/// ```
///
/// Types participating in a family override the chain via [`dispatch_as!`]
/// rather than by hand.
pub trait Event: Any {
    /// Whether this type declared a dispatch chain with [`dispatch_as!`].
    ///
    /// Chain-declaring types get the static-dispatch delivery path;
    /// everything else goes through a checked downcast.
    const POLYMORPHIC: bool = false;

    /// Every view this event can be delivered as, most-derived first.
    fn dispatch_chain(&self) -> DispatchChain<'_>
    where
        Self: Sized,
    {
        let mut chain = DispatchChain::new();
        chain.push(EventRef::new(self));
        chain
    }
}

// ---------------------------------------------------------------------------
// dispatch_as!
// ---------------------------------------------------------------------------

/// Declares an event type's dispatch chain.
///
/// Two forms:
///
/// - `dispatch_as!(Root);` — `Root` is the root of a family and dispatches
///   as `[Root]`.
/// - `dispatch_as!(Derived => Base);` — `Derived` embeds a `Base` (exposed
///   through `AsRef<Base>`) and dispatches as `[Derived]` followed by the
///   whole of `Base`'s chain. Only the direct parent is named; deeper
///   ancestors come in through the parent's own declaration, so a
///   three-level family is three one-line declarations.
///
/// ```rust
/// use fanout_bus::dispatch_as;
///
/// #[derive(Default)]
/// struct Alarm;
/// dispatch_as!(Alarm);
///
/// #[derive(Default)]
/// struct SmokeAlarm {
///     base: Alarm,
/// }
///
/// impl AsRef<Alarm> for SmokeAlarm {
///     fn as_ref(&self) -> &Alarm {
///         &self.base
///     }
/// }
/// dispatch_as!(SmokeAlarm => Alarm);
/// ```
#[macro_export]
macro_rules! dispatch_as {
    ($event:ty) => {
        impl $crate::Event for $event {
            const POLYMORPHIC: bool = true;
        }
    };
    ($event:ty => $parent:ty) => {
        impl $crate::Event for $event {
            const POLYMORPHIC: bool = true;

            fn dispatch_chain(&self) -> $crate::DispatchChain<'_> {
                let parent: &$parent = ::core::convert::AsRef::<$parent>::as_ref(self);
                let mut chain = $crate::DispatchChain::new();
                chain.push($crate::EventRef::new(self));
                chain.extend($crate::Event::dispatch_chain(parent));
                chain
            }
        }
    };
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Root;
    dispatch_as!(Root);

    #[derive(Default)]
    struct Mid {
        root: Root,
    }

    impl AsRef<Root> for Mid {
        fn as_ref(&self) -> &Root {
            &self.root
        }
    }
    dispatch_as!(Mid => Root);

    #[derive(Default)]
    struct Leaf {
        mid: Mid,
    }

    impl AsRef<Mid> for Leaf {
        fn as_ref(&self) -> &Mid {
            &self.mid
        }
    }
    dispatch_as!(Leaf => Mid);

    struct Plain;
    impl Event for Plain {}

    fn keys(chain: &DispatchChain<'_>) -> Vec<TypeId> {
        chain.iter().map(EventRef::key).collect()
    }

    #[test]
    fn test_root_chain_is_single_link() {
        let chain = Root.dispatch_chain();
        assert_eq!(keys(&chain), vec![TypeId::of::<Root>()]);
    }

    #[test]
    fn test_two_level_chain_most_derived_first() {
        let mid = Mid::default();
        let chain = mid.dispatch_chain();
        assert_eq!(
            keys(&chain),
            vec![TypeId::of::<Mid>(), TypeId::of::<Root>()]
        );
    }

    #[test]
    fn test_three_level_chain_composes_through_parent() {
        let leaf = Leaf::default();
        let chain = leaf.dispatch_chain();
        assert_eq!(
            keys(&chain),
            vec![
                TypeId::of::<Leaf>(),
                TypeId::of::<Mid>(),
                TypeId::of::<Root>()
            ]
        );
    }

    #[test]
    fn test_plain_event_defaults_to_self_chain() {
        assert!(!Plain::POLYMORPHIC);
        let chain = Plain.dispatch_chain();
        assert_eq!(keys(&chain), vec![TypeId::of::<Plain>()]);
    }

    #[test]
    fn test_links_project_to_embedded_ancestors() {
        let leaf = Leaf::default();
        let chain = leaf.dispatch_chain();
        // The Mid link really is the embedded Mid, not a re-wrap.
        let mid_view = chain[1].erased().downcast_ref::<Mid>().unwrap();
        assert!(std::ptr::eq(mid_view, &leaf.mid));
    }
}
