//! # Fanout Bus
//!
//! A synchronous, in-process event bus with *polymorphic dispatch chains*:
//! publishing a derived event also reaches handlers subscribed to any
//! ancestor the event declares, most-derived first.
//!
//! The subscriber table lives inside a
//! [`LeftRight`](fanout_core::LeftRight) wrapper, so publishing is
//! wait-free and never blocked by subscribe/unsubscribe traffic; the
//! write operations serialize among themselves and pay the double-apply
//! cost, which is the right trade for a read-mostly subscriber set.
//!
//! ## Dispatch chains
//!
//! Rust has no struct inheritance, so an event family is declared by
//! embedding the parent and projecting to it with [`AsRef`]; the
//! [`dispatch_as!`] macro wires the chain:
//!
//! ```rust
//! use fanout_bus::{dispatch_as, EventBus};
//!
//! #[derive(Default)]
//! struct Connected;
//! dispatch_as!(Connected);
//!
//! #[derive(Default)]
//! struct TlsConnected {
//!     base: Connected,
//! }
//!
//! impl AsRef<Connected> for TlsConnected {
//!     fn as_ref(&self) -> &Connected {
//!         &self.base
//!     }
//! }
//! dispatch_as!(TlsConnected => Connected);
//!
//! let bus = EventBus::new();
//! let cookie = bus.subscribe(|_: &Connected| println!("any connection")).unwrap();
//!
//! // Reaches the Connected handler through the chain.
//! bus.publish(&TlsConnected::default());
//! bus.unsubscribe(cookie).unwrap();
//! ```
//!
//! Types that never opt in dispatch as themselves only; no declaration is
//! needed beyond `impl Event for Plain {}`.
//!
//! ## Threading model
//!
//! Plain shared-memory threads: no event loop, no async, no queueing.
//! Delivery is synchronous on the publishing thread, and the bus never
//! serializes handler execution — two concurrent publishes can run the
//! same handler concurrently with itself.

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
// Allow unsafe for the static-dispatch delivery downcast; the single use
// site carries a SAFETY note tied to the EventRef constructor invariant
#![allow(unsafe_code)]

mod bus;
mod event;
mod scoped;
mod subscriber;

pub use bus::{BusError, EventBus};
pub use event::{DispatchChain, Event, EventRef};
pub use scoped::ScopedSubscription;
pub use subscriber::{Cookie, SubscriberId};
