//! In-memory hierarchical file store backed by a first-fit arena.
//!
//! File content is kept in a [`firstfit::Allocator`] rather than on the host
//! heap: writing a file allocates exactly its length from the arena, and
//! overwriting or removing it frees that allocation again. Only the tree
//! itself (names and offsets) lives on the heap.
//!
//! ```
//! use std::sync::Arc;
//!
//! use firstfit::Allocator;
//! use memfs::FileSystem;
//!
//! let allocator = Arc::new(Allocator::with_capacity(4096)?);
//! let fs = FileSystem::new(Arc::clone(&allocator));
//!
//! fs.create_dir("/notes")?;
//! fs.create_file("/notes/todo.txt", b"coalesce eagerly")?;
//! assert_eq!(fs.read_file("/notes/todo.txt")?, b"coalesce eagerly");
//! assert_eq!(allocator.stats().used_bytes, 16);
//!
//! fs.remove("/notes/todo.txt")?;
//! assert!(allocator.stats().is_idle());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![cfg_attr(not(test), no_std)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

extern crate alloc;

mod error;
mod fs;
mod path;

pub use self::{
    error::FsError,
    fs::{DirEntry, FileSystem, Metadata, NodeKind},
};
