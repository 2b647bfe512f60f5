//! Arena configuration.

use alloc::collections::TryReserveError;

use snafu::{Snafu, ensure};
use snafu_utils::{HasLocation, Location};

/// Configuration for an [`Allocator`](crate::Allocator).
///
/// The capacity is the only knob: it bounds both the sum of all live
/// allocations and the largest single allocation. It is fixed once the
/// allocator has been built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArenaConfig {
    /// Total arena size in bytes.
    ///
    /// Default: 1 MiB. Must be non-zero.
    pub capacity: usize,
}

impl ArenaConfig {
    pub const DEFAULT_CAPACITY: usize = 1024 * 1024;

    #[must_use]
    pub const fn new(capacity: usize) -> Self {
        Self { capacity }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure!(self.capacity > 0, ZeroCapacitySnafu);
        Ok(())
    }
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ConfigError {
    #[snafu(display("arena capacity must be at least one byte"))]
    ZeroCapacity {
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("failed to reserve {capacity} bytes for the arena"))]
    Reserve {
        capacity: usize,
        #[snafu(implicit)]
        location: Location,
        #[snafu(source)]
        source: TryReserveError,
    },
}

impl HasLocation for ConfigError {
    fn location(&self) -> Location {
        match self {
            Self::ZeroCapacity { location } | Self::Reserve { location, .. } => *location,
        }
    }
}
