//! The Left-Right wrapper — wait-free reads, serialized dual-applied writes.
//!
//! [`LeftRight<T>`] keeps two full copies of `T`. An atomic side indicator
//! routes readers to one copy; a writer mutates the other copy first, flips
//! the indicator, waits for readers still on the old copy to drain, then
//! repeats the mutation there. Readers therefore never block and are never
//! blocked; writers serialize among themselves on an internal mutex.
//!
//! The cost is that every mutation runs twice and both copies exist at all
//! times, which limits the scheme to small amounts of read-mostly state —
//! a routing table, a subscriber map, a feature-flag set.
//!
//! # Draining
//!
//! Two reader registries take turns counting active readers. A writer
//! toggles which registry new readers bind to, and waits for the old one to
//! empty before touching the copy those readers were using. Waiting for the
//! *next* registry to empty before the toggle closes the window where a
//! reader picked the registry index but has not yet arrived; see
//! [`LeftRight::modify`] for the step-by-step argument.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::pad::CachePadded;
use crate::registry::{AtomicReaderRegistry, ReaderRegistry};

// ---------------------------------------------------------------------------
// PoisonedWriter
// ---------------------------------------------------------------------------

/// The write mutex was poisoned by a writer that panicked mid-`modify`.
///
/// A panicking modify closure violates the dual-application contract, so
/// the two copies may disagree; the instance is unusable for further
/// writes. Reads remain safe (they only ever see the side a completed
/// flip directed them at).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("left-right write mutex poisoned by a panicked writer")]
pub struct PoisonedWriter;

// ---------------------------------------------------------------------------
// LeftRight
// ---------------------------------------------------------------------------

const SPIN_LIMIT: u32 = 64;

/// Wraps any single-threaded data structure with Left-Right concurrency
/// control: wait-free population-oblivious reads, blocking writes, and
/// writers that never block readers.
///
/// `R` is the reader-registry implementation; the default single-counter
/// [`AtomicReaderRegistry`] is right for lightly contended reads, while
/// [`ShardedReaderRegistry`](crate::ShardedReaderRegistry) spreads heavy
/// reader traffic across cache lines.
///
/// Once constructed an instance is neither cloned nor swapped; mutate the
/// wrapped value through [`modify`](Self::modify) instead. Dropping the
/// instance requires ownership, so by Rust's aliasing rules it can only
/// happen once every reader and writer is gone.
pub struct LeftRight<T, R: ReaderRegistry = AtomicReaderRegistry> {
    /// The two copies. `read_side` names the one readers are directed at.
    sides: [CachePadded<UnsafeCell<T>>; 2],
    /// Which element of `sides` readers should use (0 or 1).
    read_side: AtomicUsize,
    /// Which element of `registries` arriving readers bind to (0 or 1).
    registry_index: AtomicUsize,
    registries: [R; 2],
    /// Serializes writers. Holds no data; the side copies are reached
    /// through `sides` once the drain protocol makes that exclusive.
    write_mutex: Mutex<()>,
}

// SAFETY: LeftRight can move to another thread if T can; the registries
// travel with it.
unsafe impl<T: Send, R: ReaderRegistry + Send> Send for LeftRight<T, R> {}

// SAFETY: Shared access hands out `&T` to readers (requires T: Sync) while
// a writer on another thread may hold `&mut T` — but only ever to the side
// the drain protocol proved no reader can still observe (requires T: Send
// for the value to be mutated from the writer's thread). The proof is the
// invariant documented on `modify`.
unsafe impl<T: Send + Sync, R: ReaderRegistry + Sync> Sync for LeftRight<T, R> {}

impl<T: Clone, R: ReaderRegistry> LeftRight<T, R> {
    /// Builds both copies from a seed: the seed is cloned into the second
    /// copy and moved into the first.
    #[must_use]
    pub fn new(seed: T) -> Self {
        let second = seed.clone();
        Self::from_parts(seed, second)
    }
}

impl<T, R: ReaderRegistry> LeftRight<T, R> {
    /// Builds the two copies independently, calling the factory once per
    /// side. Use this when `T` is not `Clone` or when cloning the seed is
    /// not the construction you want.
    #[must_use]
    pub fn from_fn(mut factory: impl FnMut() -> T) -> Self {
        let left = factory();
        let right = factory();
        Self::from_parts(left, right)
    }

    fn from_parts(left: T, right: T) -> Self {
        Self {
            sides: [
                CachePadded::new(UnsafeCell::new(left)),
                CachePadded::new(UnsafeCell::new(right)),
            ],
            read_side: AtomicUsize::new(0),
            registry_index: AtomicUsize::new(0),
            registries: [R::default(), R::default()],
            write_mutex: Mutex::new(()),
        }
    }

    /// Observes the current reader-side copy.
    ///
    /// Wait-free as long as the registry's `arrive`/`depart` are. Never
    /// blocked by a concurrent [`modify`](Self::modify). Panics propagate
    /// out of `f` unchanged; the reader still departs its registry on the
    /// way out, so a panicking observer cannot wedge a writer's drain.
    pub fn observe<F, O>(&self, f: F) -> O
    where
        F: FnOnce(&T) -> O,
    {
        let index = self.registry_index.load(Ordering::Acquire);
        let _guard = ReadGuard::arrive(&self.registries[index]);
        let side = self.read_side.load(Ordering::Acquire);
        // SAFETY: `read_side` was loaded after our arrival was published.
        // A writer flips `read_side` away from a copy *before* draining the
        // registries, and only mutates that copy after the drain completes;
        // our registration forces the drain to wait for `_guard` to drop.
        // Hence no `&mut` to this copy coexists with the reference below.
        let value = unsafe { &*self.sides[side].get().get() };
        f(value)
    }

    /// Mutates both copies by applying `f` to each in turn, returning the
    /// result of the second application.
    ///
    /// Serialized with other writers on an internal mutex; never blocks
    /// concurrent [`observe`](Self::observe) calls, though in-flight
    /// readers bound the drain phase's duration.
    ///
    /// # Contract
    ///
    /// `f` runs twice and **must apply the identical mutation both times**.
    /// Inserting a value computed fresh on each call (a timestamp, a random
    /// number) leaves the two copies disagreeing, and every future reader
    /// flip-flops between them. `f` must also not panic: a panic between
    /// the two applications poisons the writer path and the copies diverge
    /// permanently.
    ///
    /// # Errors
    ///
    /// [`PoisonedWriter`] if a previous writer panicked.
    pub fn modify<F, O>(&self, mut f: F) -> Result<O, PoisonedWriter>
    where
        F: FnMut(&mut T) -> O,
    {
        let guard = self.write_mutex.lock().map_err(|_| PoisonedWriter)?;

        // Relaxed is enough under the mutex: only writers store read_side,
        // and they do so while holding it.
        let active = self.read_side.load(Ordering::Relaxed);
        let inactive = 1 - active;

        // SAFETY: no reader has observed `inactive` since the previous
        // writer drained it (readers were redirected to `active` before
        // that drain), and we are the only writer by virtue of the mutex.
        let _ = f(unsafe { &mut *self.sides[inactive].get().get() });

        // Redirect new readers to the freshly written copy, then wait out
        // everyone who could still be reading the old one.
        self.read_side.store(inactive, Ordering::Release);
        self.toggle_registries();

        // SAFETY: after the toggle, every reader that arrived before the
        // redirect has departed, and every reader that arrived after it
        // reads `read_side == inactive`. Nobody holds `&T` into `active`.
        let output = f(unsafe { &mut *self.sides[active].get().get() });

        drop(guard);
        Ok(output)
    }

    /// Waits for the off registry to drain, flips which registry arriving
    /// readers bind to, then waits for the previously-on registry to drain.
    ///
    /// Ordering argument: the `read_side` store above is release, and this
    /// function's `registry_index` store is release and sequenced after it.
    /// A reader whose acquire load of `registry_index` sees the new value
    /// therefore also sees the new `read_side`, so every reader remaining
    /// after the second wait is on the new copy. A reader that loaded the
    /// *old* index but had not yet arrived lands in the pre-flip registry
    /// and is caught by the second wait; one that arrives even later into
    /// the stale registry is why the *first* wait exists — the registry a
    /// writer is about to point readers at must already be empty.
    fn toggle_registries(&self) {
        let current = self.registry_index.load(Ordering::Acquire);
        let next = 1 - current;

        Self::wait_empty(&self.registries[next]);
        self.registry_index.store(next, Ordering::Release);
        Self::wait_empty(&self.registries[current]);
    }

    /// Spins briefly, then yields. Bounded by the slowest in-flight reader.
    fn wait_empty(registry: &R) {
        let mut attempts = 0u32;
        while !registry.is_empty() {
            if attempts < SPIN_LIMIT {
                attempts += 1;
                std::hint::spin_loop();
            } else {
                std::thread::yield_now();
            }
        }
    }

    /// Exclusive access to both copies at once.
    ///
    /// Requires `&mut self`, so no concurrent reader or writer can exist;
    /// useful for seeding, draining at shutdown, and asserting the
    /// dual-application invariant in tests.
    pub fn sides_mut(&mut self) -> (&mut T, &mut T) {
        let [left, right] = &mut self.sides;
        (left.get_mut().get_mut(), right.get_mut().get_mut())
    }
}

impl<T: Default, R: ReaderRegistry> Default for LeftRight<T, R> {
    fn default() -> Self {
        Self::from_fn(T::default)
    }
}

impl<T, R: ReaderRegistry> std::fmt::Debug for LeftRight<T, R> {
    /// Prints only the routing indicators; the copies themselves are not
    /// touched, so `Debug` is safe under any concurrency.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeftRight")
            .field("read_side", &self.read_side.load(Ordering::Relaxed))
            .field(
                "registry_index",
                &self.registry_index.load(Ordering::Relaxed),
            )
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// ReadGuard
// ---------------------------------------------------------------------------

/// Scoped arrival: departs on drop, including during unwinding.
struct ReadGuard<'a, R: ReaderRegistry> {
    registry: &'a R,
}

impl<'a, R: ReaderRegistry> ReadGuard<'a, R> {
    fn arrive(registry: &'a R) -> Self {
        registry.arrive();
        Self { registry }
    }
}

impl<R: ReaderRegistry> Drop for ReadGuard<'_, R> {
    fn drop(&mut self) {
        self.registry.depart();
    }
}

// ===========================================================================
// Tests
// ===========================================================================
