use alloc::{boxed::Box, vec::Vec};
use core::{fmt, ops::Range};

use log::debug;
use snafu::ResultExt as _;
use spin::Mutex;

use crate::{
    block::{BlockInfo, BlockList, InvariantError},
    config::{ArenaConfig, ConfigError, ReserveSnafu},
    error::{AllocError, InvalidPointerSnafu, OutOfBoundsSnafu},
    stats::ArenaStats,
};

struct Arena {
    memory: Box<[u8]>,
    blocks: BlockList,
}

impl Arena {
    /// Translates `len` bytes at `start` within the allocation at `offset`
    /// into a range of the backing buffer.
    fn byte_range(
        &self,
        offset: usize,
        start: usize,
        len: usize,
    ) -> Result<Range<usize>, AllocError> {
        let Some(block) = self.blocks.allocation(offset) else {
            return InvalidPointerSnafu {
                offset,
                already_freed: self.blocks.get(offset).is_some(),
            }
            .fail();
        };

        match start.checked_add(len) {
            Some(end) if end <= block.size => Ok(block.offset + start..block.offset + end),
            _ => OutOfBoundsSnafu {
                offset,
                start,
                len,
                size: block.size,
            }
            .fail(),
        }
    }
}

/// A thread-safe first-fit allocator over a fixed arena.
///
/// Every operation takes one allocator-wide lock for its full duration, so
/// calls from different threads behave as if executed one after another.
///
/// Callers only ever see offsets into the arena. Bytes are moved in and out
/// with [`write`](Self::write) and [`read`](Self::read); the buffer itself is
/// never lent out. Freed ranges are zeroed, so a fresh allocation always
/// reads as zeros.
///
/// # Examples
///
/// ```
/// use firstfit::{AllocErrorKind, Allocator};
///
/// let allocator = Allocator::with_capacity(1024)?;
/// let offset = allocator.allocate(300)?;
/// allocator.write(offset, 0, b"hello")?;
///
/// let mut buf = [0; 5];
/// allocator.read(offset, 0, &mut buf)?;
/// assert_eq!(&buf, b"hello");
///
/// allocator.free(offset)?;
/// assert_eq!(
///     allocator.free(offset).unwrap_err().kind(),
///     AllocErrorKind::InvalidPointer
/// );
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Allocator {
    capacity: usize,
    arena: Mutex<Arena>,
}

impl Allocator {
    /// Reserves the arena described by `config`.
    ///
    /// Fails if the capacity is zero or the host cannot provide that many
    /// bytes.
    pub fn new(config: &ArenaConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let capacity = config.capacity;

        let mut memory = Vec::new();
        memory
            .try_reserve_exact(capacity)
            .context(ReserveSnafu { capacity })?;
        memory.resize(capacity, 0);

        Ok(Self {
            capacity,
            arena: Mutex::new(Arena {
                memory: memory.into_boxed_slice(),
                blocks: BlockList::new(capacity),
            }),
        })
    }

    pub fn with_capacity(capacity: usize) -> Result<Self, ConfigError> {
        Self::new(&ArenaConfig::new(capacity))
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Allocates `size` bytes and returns the offset of the allocation.
    ///
    /// Fails with [`AllocError::InvalidSize`] for a zero `size` and with
    /// [`AllocError::OutOfMemory`] if no free block is large enough.
    pub fn allocate(&self, size: usize) -> Result<usize, AllocError> {
        let offset = self.arena.lock().blocks.allocate(size)?;
        debug!("allocated {size} bytes at offset {offset}");
        Ok(offset)
    }

    /// Allocates exactly `content.len()` bytes and fills them with `content`.
    pub fn allocate_bytes(&self, content: &[u8]) -> Result<usize, AllocError> {
        let mut arena = self.arena.lock();
        let offset = arena.blocks.allocate(content.len())?;
        arena.memory[offset..offset + content.len()].copy_from_slice(content);
        drop(arena);

        debug!("allocated {} bytes at offset {offset}", content.len());
        Ok(offset)
    }

    /// Releases the allocation starting at `offset`.
    ///
    /// Fails with [`AllocError::InvalidPointer`] if `offset` is not the start
    /// of a live allocation, including when it was already freed.
    pub fn free(&self, offset: usize) -> Result<(), AllocError> {
        let mut arena = self.arena.lock();
        let range = arena.blocks.free(offset)?;
        arena.memory[range.clone()].fill(0);
        drop(arena);

        debug!("freed {} bytes at offset {offset}", range.len());
        Ok(())
    }

    /// Copies `bytes` into the allocation at `offset`, starting `start` bytes
    /// into it.
    pub fn write(&self, offset: usize, start: usize, bytes: &[u8]) -> Result<(), AllocError> {
        let mut arena = self.arena.lock();
        let range = arena.byte_range(offset, start, bytes.len())?;
        arena.memory[range].copy_from_slice(bytes);
        Ok(())
    }

    /// Fills `buf` from the allocation at `offset`, starting `start` bytes
    /// into it.
    pub fn read(&self, offset: usize, start: usize, buf: &mut [u8]) -> Result<(), AllocError> {
        let arena = self.arena.lock();
        let range = arena.byte_range(offset, start, buf.len())?;
        buf.copy_from_slice(&arena.memory[range]);
        Ok(())
    }

    /// Size of the live allocation starting at `offset`.
    #[must_use]
    pub fn allocation_size(&self, offset: usize) -> Option<usize> {
        self.arena
            .lock()
            .blocks
            .allocation(offset)
            .map(|block| block.size)
    }

    /// Snapshot of the block list in ascending offset order.
    #[must_use]
    pub fn blocks(&self) -> Vec<BlockInfo> {
        self.arena.lock().blocks.iter().collect()
    }

    #[must_use]
    pub fn stats(&self) -> ArenaStats {
        self.arena.lock().blocks.stats()
    }

    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        self.arena.lock().blocks.check_invariants()
    }

    /// Runs `f` on the block list while holding the allocator lock.
    ///
    /// No other operation can run until `f` returns. Calling back into this
    /// allocator from `f` deadlocks.
    pub fn inspect<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&BlockList) -> R,
    {
        f(&self.arena.lock().blocks)
    }
}

impl fmt::Debug for Allocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Allocator")
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}
