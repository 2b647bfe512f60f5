//! First-fit allocator over a fixed, pre-reserved arena.
//!
//! This crate hands out and reclaims variable-sized byte ranges of a single
//! buffer without going through the host allocator for each request. It is
//! `no_std` compatible (it needs `alloc` once, to reserve the arena).
//!
//! # Algorithm
//!
//! The arena is described by an **offset-ordered block list**. Every block
//! covers a contiguous byte range and is either free or in use; together the
//! blocks partition the arena.
//!
//! - **Allocation**: first fit. The list is scanned from offset zero and the
//!   first free block that is large enough is taken. A larger block is split
//!   into the allocation and a free remainder.
//! - **Deallocation**: the block is marked free and every run of neighbouring
//!   free blocks is merged, so no two free blocks are ever adjacent.
//!
//! Positions are plain byte offsets into the arena. Offsets are the only
//! handle callers receive and the only thing [`Allocator::free`] accepts.
//!
//! # Usage Example
//!
//! ```rust
//! use firstfit::{AllocErrorKind, Allocator};
//!
//! let allocator = Allocator::with_capacity(1000)?;
//!
//! let a = allocator.allocate(300)?;
//! let b = allocator.allocate(500)?;
//! assert_eq!((a, b), (0, 300));
//!
//! // only 200 bytes are left
//! let err = allocator.allocate(201).unwrap_err();
//! assert_eq!(err.kind(), AllocErrorKind::OutOfMemory);
//!
//! allocator.free(a)?;
//! allocator.free(b)?;
//! assert!(allocator.stats().is_idle());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Thread Safety
//!
//! [`Allocator`] is `Send + Sync`. A single spin lock serializes every
//! operation, including the list scan. [`BlockList`] is the unsynchronized
//! core for callers that bring their own locking.

#![cfg_attr(not(test), no_std)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

extern crate alloc;

mod allocator;
pub mod block;
pub mod config;
pub mod error;
mod stats;

pub use self::{
    allocator::Allocator,
    block::{BlockInfo, BlockList, InvariantError},
    config::{ArenaConfig, ConfigError},
    error::{AllocError, AllocErrorKind},
    stats::ArenaStats,
};
