//! Reader registries — tracking active readers so a writer can drain them.
//!
//! A registry is a concurrent counter-like object: readers `arrive` before
//! touching a copy and `depart` when done; a writer polls `is_empty` to
//! learn when every reader that could still see the old copy has left.
//!
//! Two implementations are provided:
//!
//! - [`AtomicReaderRegistry`] — one shared counter. Wait-free, but all
//!   readers contend on a single cache line.
//! - [`ShardedReaderRegistry`] — an array of padded counters indexed by a
//!   hash of the calling thread's identity, so concurrent arrivals are
//!   unlikely to collide.
//!
//! # Memory Ordering
//!
//! Arrivals and departures publish with release ordering (arrivals use
//! acquire-release so the subsequent side read cannot float above them);
//! `is_empty` observes with acquire ordering, or with relaxed per-shard
//! reads confirmed by an acquire fence. The contract a writer relies on:
//! `is_empty` may briefly report a stale `false`, but never a stale `true`.

use std::hash::{BuildHasher, BuildHasherDefault};
use std::sync::atomic::{fence, AtomicU32, Ordering};

use fxhash::FxHasher;

use crate::pad::CachePadded;

/// Default thread-identity hasher for [`ShardedReaderRegistry`].
pub type DefaultThreadHasher = BuildHasherDefault<FxHasher>;

// ---------------------------------------------------------------------------
// ReaderRegistry
// ---------------------------------------------------------------------------

/// Tracks active readers such that it can efficiently report whether any
/// reader is currently mid-read.
///
/// Implementations must be safe to call from any number of threads, and
/// `arrive`/`depart` must be wait-free and must not panic. Every `depart`
/// is preceded by exactly one `arrive` on the same instance *by the same
/// thread*; implementations may rely on that pairing.
///
/// `Default` is a supertrait because [`LeftRight`](crate::LeftRight)
/// constructs its two registries itself.
pub trait ReaderRegistry: Default {
    /// Notes the arrival of one reader.
    fn arrive(&self);

    /// Notes the departure of one reader.
    fn depart(&self);

    /// Returns `true` iff every arrival has been matched by a departure.
    ///
    /// A stale `false` is acceptable (the writer polls); a stale `true` is
    /// not — a `true` result must happen-after the departures it reports.
    fn is_empty(&self) -> bool;
}

// ---------------------------------------------------------------------------
// AtomicReaderRegistry
// ---------------------------------------------------------------------------

/// Single-counter reader registry.
///
/// Wait-free, but all readers contend on one cache line. Acceptable when
/// reader concurrency is light; prefer [`ShardedReaderRegistry`] when many
/// threads read in tight loops.
#[derive(Default)]
pub struct AtomicReaderRegistry {
    count: CachePadded<AtomicU32>,
}

impl ReaderRegistry for AtomicReaderRegistry {
    fn arrive(&self) {
        self.count.fetch_add(1, Ordering::AcqRel);
    }

    fn depart(&self) {
        self.count.fetch_sub(1, Ordering::Release);
    }

    fn is_empty(&self) -> bool {
        self.count.load(Ordering::Acquire) == 0
    }
}

impl std::fmt::Debug for AtomicReaderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AtomicReaderRegistry")
            .field("count", &self.count.load(Ordering::Relaxed))
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ShardedReaderRegistry
// ---------------------------------------------------------------------------

/// Sharded reader registry.
///
/// Keeps `SHARDS` cache-line-padded counters and spreads arrivals across
/// them by hashing the calling thread's [`ThreadId`](std::thread::ThreadId),
/// so concurrent readers are unlikely to touch the same line. Collision
/// likelihood depends on the number of concurrent readers relative to
/// `SHARDS`; power-of-two shard counts reduce the index to a bitmask.
///
/// The hasher is stored per instance, so a given thread's `arrive` and
/// `depart` always land on the same shard even with a randomized
/// `BuildHasher`.
///
/// # Panics
///
/// Construction panics if `SHARDS` is zero.
pub struct ShardedReaderRegistry<H = DefaultThreadHasher, const SHARDS: usize = 8> {
    counters: [CachePadded<AtomicU32>; SHARDS],
    hasher: H,
}

impl<H: BuildHasher + Default, const SHARDS: usize> Default for ShardedReaderRegistry<H, SHARDS> {
    fn default() -> Self {
        assert!(SHARDS > 0, "shard count must be > 0");
        Self {
            counters: std::array::from_fn(|_| CachePadded::new(AtomicU32::new(0))),
            hasher: H::default(),
        }
    }
}

impl<H: BuildHasher, const SHARDS: usize> ShardedReaderRegistry<H, SHARDS> {
    #[inline]
    fn shard(&self) -> &AtomicU32 {
        let hash = self.hasher.hash_one(std::thread::current().id());
        // For power-of-two SHARDS the compiler lowers this to a mask.
        #[allow(clippy::cast_possible_truncation)]
        let index = (hash % SHARDS as u64) as usize;
        self.counters[index].get()
    }
}

impl<H: BuildHasher + Default, const SHARDS: usize> ReaderRegistry
    for ShardedReaderRegistry<H, SHARDS>
{
    fn arrive(&self) {
        self.shard().fetch_add(1, Ordering::AcqRel);
    }

    fn depart(&self) {
        self.shard().fetch_sub(1, Ordering::Release);
    }

    fn is_empty(&self) -> bool {
        let empty = self
            .counters
            .iter()
            .all(|ctr| ctr.load(Ordering::Relaxed) == 0);
        // Pair the relaxed shard reads with the release departures.
        fence(Ordering::Acquire);
        empty
    }
}

impl<H, const SHARDS: usize> std::fmt::Debug for ShardedReaderRegistry<H, SHARDS> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let active: u32 = self
            .counters
            .iter()
            .map(|ctr| ctr.load(Ordering::Relaxed))
            .sum();
        f.debug_struct("ShardedReaderRegistry")
            .field("shards", &SHARDS)
            .field("active", &active)
            .finish()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
