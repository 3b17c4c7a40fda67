//! # Fanout Core
//!
//! Left-Right concurrency control: wrap any single-threaded data structure
//! so that reads are wait-free and never blocked by writes.
//!
//! This crate provides:
//! - **`LeftRight<T>`**: two full copies of `T`; readers are routed to one
//!   copy while writers mutate the other, then the sides swap
//! - **Reader registries**: concurrent objects that track active readers so
//!   a writer can drain them before touching a copy readers may still see
//!
//! ## Design Principles
//!
//! 1. **Readers never block** - no locks, no retries, no CAS loops on the
//!    read path
//! 2. **Writers never block readers** - a writer mutates only the copy no
//!    reader is directed at
//! 3. **Every mutation is applied twice** - once per copy, which bounds the
//!    scheme to small, read-mostly state
//!
//! The scheme is described in depth in A. Correia and P. Ramalhete,
//! *Left-Right: A Concurrency Control Technique with Wait-Free Population
//! Oblivious Reads*.
//!
//! ## Example
//!
//! ```rust
//! use fanout_core::LeftRight;
//!
//! let lr: LeftRight<Vec<u32>> = LeftRight::new(Vec::new());
//!
//! lr.modify(|v| v.push(7)).unwrap();
//! let len = lr.observe(Vec::len);
//! assert_eq!(len, 1);
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
// Allow unsafe for the double-buffer read path; every use carries a SAFETY note
#![allow(unsafe_code)]

mod leftright;
mod pad;
mod registry;

pub use leftright::{LeftRight, PoisonedWriter};
pub use pad::CachePadded;
pub use registry::{
    AtomicReaderRegistry, DefaultThreadHasher, ReaderRegistry, ShardedReaderRegistry,
};
