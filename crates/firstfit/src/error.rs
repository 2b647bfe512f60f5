//! Error types returned by the allocator.

use core::borrow::Borrow;

use snafu::Snafu;
use snafu_utils::{HasLocation, Location};

/// Errors returned by [`Allocator`](crate::Allocator) and
/// [`BlockList`](crate::BlockList) operations.
///
/// Every failed operation leaves the block list exactly as it was before the
/// call.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AllocError {
    #[snafu(display("invalid allocation size: requests must be at least one byte"))]
    InvalidSize {
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display(
        "out of memory: requested {requested} bytes, largest free block is {largest_free} bytes"
    ))]
    OutOfMemory {
        requested: usize,
        largest_free: usize,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display(
        "invalid pointer: offset {offset} is not a live allocation{}",
        freed_suffix(already_freed)
    ))]
    InvalidPointer {
        offset: usize,
        /// `true` when a free block starts at `offset`, i.e. a double free.
        already_freed: bool,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display(
        "out of bounds: {len} bytes at {start} do not fit the {size}-byte allocation at offset {offset}"
    ))]
    OutOfBounds {
        offset: usize,
        start: usize,
        len: usize,
        size: usize,
        #[snafu(implicit)]
        location: Location,
    },
}

/// The class of an [`AllocError`], without its diagnostic payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AllocErrorKind {
    InvalidSize,
    OutOfMemory,
    InvalidPointer,
    OutOfBounds,
}

impl AllocError {
    #[must_use]
    pub fn kind(&self) -> AllocErrorKind {
        match self {
            Self::InvalidSize { .. } => AllocErrorKind::InvalidSize,
            Self::OutOfMemory { .. } => AllocErrorKind::OutOfMemory,
            Self::InvalidPointer { .. } => AllocErrorKind::InvalidPointer,
            Self::OutOfBounds { .. } => AllocErrorKind::OutOfBounds,
        }
    }
}

impl HasLocation for AllocError {
    fn location(&self) -> Location {
        match self {
            Self::InvalidSize { location }
            | Self::OutOfMemory { location, .. }
            | Self::InvalidPointer { location, .. }
            | Self::OutOfBounds { location, .. } => *location,
        }
    }
}

fn freed_suffix(already_freed: impl Borrow<bool>) -> &'static str {
    if *already_freed.borrow() {
        " (already freed)"
    } else {
        ""
    }
}
