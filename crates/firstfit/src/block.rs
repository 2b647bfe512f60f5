//! Offset-ordered block list with first-fit allocation.
//!
//! The list partitions an arena of `capacity` bytes into blocks. Each block
//! covers a contiguous byte range and is either free or in use. Blocks are
//! kept in ascending offset order and linked by slot index rather than by
//! address, so the list never holds a pointer into the arena.
//!
//! ```text
//! capacity = 1000
//!
//! initial        [0..1000 free]
//! allocate(300)  [0..300 used] -> [300..1000 free]
//! allocate(500)  [0..300 used] -> [300..800 used] -> [800..1000 free]
//! free(300)      [0..300 used] -> [300..1000 free]
//! ```
//!
//! # Invariants
//!
//! After every operation, successful or not:
//!
//! 1. the blocks cover `0..capacity` with no gap and no overlap,
//! 2. no two neighbouring blocks are both free,
//! 3. every block is at least one byte long,
//! 4. offsets strictly increase along the list.
//!
//! [`BlockList::check_invariants`] verifies all four.
//!
//! # Performance Characteristics
//!
//! - **Allocation**: O(n) where n is the number of blocks
//! - **Deallocation**: O(n), the coalescing pass walks the whole list
//!
//! # Thread Safety
//!
//! `BlockList` has no internal locking. [`Allocator`](crate::Allocator) wraps
//! it in a mutex for shared use.

use alloc::vec::Vec;
use core::{fmt, ops::Range};

use log::trace;
use snafu::{Snafu, ensure};

use crate::{
    error::{AllocError, InvalidPointerSnafu, InvalidSizeSnafu, OutOfMemorySnafu},
    stats::ArenaStats,
};

/// Index of a block record in [`BlockList`]'s slot table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BlockId(usize);

#[derive(Debug, Clone, Copy)]
struct Block {
    offset: usize,
    size: usize,
    in_use: bool,
    next: Option<BlockId>,
}

impl Block {
    fn end(&self) -> usize {
        self.offset + self.size
    }

    fn info(&self) -> BlockInfo {
        BlockInfo {
            offset: self.offset,
            size: self.size,
            in_use: self.in_use,
        }
    }
}

/// A snapshot of one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockInfo {
    pub offset: usize,
    pub size: usize,
    pub in_use: bool,
}

impl BlockInfo {
    #[must_use]
    pub fn end(&self) -> usize {
        self.offset + self.size
    }

    #[must_use]
    pub fn range(&self) -> Range<usize> {
        self.offset..self.end()
    }
}

/// A violated block list invariant.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
pub enum InvariantError {
    /// A block does not start where its predecessor ended. Covers gaps,
    /// overlaps, out-of-order links and cycles.
    #[snafu(display("block starts at {found}, expected {expected}"))]
    Discontinuity { expected: usize, found: usize },
    #[snafu(display("block at offset {offset} is empty"))]
    ZeroSize { offset: usize },
    #[snafu(display("free block at offset {offset} follows another free block"))]
    AdjacentFree { offset: usize },
    #[snafu(display("blocks end at {end}, arena capacity is {capacity}"))]
    Truncated { end: usize, capacity: usize },
}

/// First-fit block list over an arena of fixed capacity.
///
/// Blocks live in a slot table. Slots released by coalescing are recycled by
/// later splits, so the table never grows beyond the peak block count.
pub struct BlockList {
    slots: Vec<Block>,
    vacant: Vec<BlockId>,
    head: BlockId,
    capacity: usize,
}

impl BlockList {
    /// Creates a list holding a single free block that spans the arena.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "arena capacity must be non-zero");
        let mut slots = Vec::new();
        slots.push(Block {
            offset: 0,
            size: capacity,
            in_use: false,
            next: None,
        });
        Self {
            slots,
            vacant: Vec::new(),
            head: BlockId(0),
            capacity,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of blocks, free and in use. Never zero.
    #[expect(clippy::len_without_is_empty)]
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len() - self.vacant.len()
    }

    /// Iterates over the blocks in ascending offset order.
    #[must_use]
    pub fn iter(&self) -> Blocks<'_> {
        Blocks {
            list: self,
            next: Some(self.head),
        }
    }

    /// Returns the block starting at `offset`, free or in use.
    #[must_use]
    pub fn get(&self, offset: usize) -> Option<BlockInfo> {
        self.find(offset).map(|id| self.block(id).info())
    }

    /// Returns the in-use block starting at `offset`.
    #[must_use]
    pub fn allocation(&self, offset: usize) -> Option<BlockInfo> {
        self.get(offset).filter(|block| block.in_use)
    }

    /// Allocates `size` bytes from the first free block large enough to hold
    /// them and returns the offset of the allocation.
    ///
    /// A block larger than `size` is split: its head becomes the allocation
    /// and the tail is linked in as a new free block right after it.
    pub fn allocate(&mut self, size: usize) -> Result<usize, AllocError> {
        ensure!(size > 0, InvalidSizeSnafu);

        let Some(id) = self.find_first_fit(size) else {
            return OutOfMemorySnafu {
                requested: size,
                largest_free: self.largest_free(),
            }
            .fail();
        };

        self.split(id, size);
        let block = self.block_mut(id);
        block.in_use = true;
        Ok(block.offset)
    }

    /// Releases the allocation starting at `offset` and merges neighbouring
    /// free blocks.
    ///
    /// Returns the byte range the allocation covered.
    pub fn free(&mut self, offset: usize) -> Result<Range<usize>, AllocError> {
        let Some(id) = self.find(offset) else {
            return InvalidPointerSnafu {
                offset,
                already_freed: false,
            }
            .fail();
        };

        let block = self.block_mut(id);
        ensure!(
            block.in_use,
            InvalidPointerSnafu {
                offset,
                already_freed: true,
            }
        );
        block.in_use = false;
        let range = block.offset..block.end();

        self.coalesce();
        Ok(range)
    }

    /// Size of the largest free block, zero if the arena is full.
    #[must_use]
    pub fn largest_free(&self) -> usize {
        self.iter()
            .filter(|block| !block.in_use)
            .map(|block| block.size)
            .max()
            .unwrap_or(0)
    }

    #[must_use]
    pub fn stats(&self) -> ArenaStats {
        let mut stats = ArenaStats {
            capacity: self.capacity,
            ..ArenaStats::default()
        };
        for block in self.iter() {
            stats.block_count += 1;
            if block.in_use {
                stats.used_bytes += block.size;
            } else {
                stats.free_bytes += block.size;
                stats.free_block_count += 1;
                stats.largest_free = stats.largest_free.max(block.size);
            }
        }
        stats
    }

    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        let mut expected = 0;
        let mut prev_free = false;
        let mut current = Some(self.head);
        while let Some(id) = current {
            let block = self.block(id);
            // a cycle revisits a lower offset and is caught here as well
            ensure!(
                block.offset == expected,
                DiscontinuitySnafu {
                    expected,
                    found: block.offset,
                }
            );
            ensure!(block.size > 0, ZeroSizeSnafu {
                offset: block.offset
            });
            ensure!(
                block.in_use || !prev_free,
                AdjacentFreeSnafu {
                    offset: block.offset
                }
            );
            prev_free = !block.in_use;
            expected = block.end();
            current = block.next;
        }
        ensure!(
            expected == self.capacity,
            TruncatedSnafu {
                end: expected,
                capacity: self.capacity,
            }
        );
        Ok(())
    }

    fn block(&self, id: BlockId) -> &Block {
        &self.slots[id.0]
    }

    fn block_mut(&mut self, id: BlockId) -> &mut Block {
        &mut self.slots[id.0]
    }

    fn insert_slot(&mut self, block: Block) -> BlockId {
        if let Some(id) = self.vacant.pop() {
            *self.block_mut(id) = block;
            id
        } else {
            let id = BlockId(self.slots.len());
            self.slots.push(block);
            id
        }
    }

    fn find(&self, offset: usize) -> Option<BlockId> {
        let mut current = Some(self.head);
        while let Some(id) = current {
            let block = self.block(id);
            if block.offset == offset {
                return Some(id);
            }
            if block.offset > offset {
                break;
            }
            current = block.next;
        }
        None
    }

    fn find_first_fit(&self, size: usize) -> Option<BlockId> {
        let mut current = Some(self.head);
        while let Some(id) = current {
            let block = self.block(id);
            if !block.in_use && block.size >= size {
                return Some(id);
            }
            current = block.next;
        }
        None
    }

    /// Shrinks the block to `size` bytes and links the remainder in after it.
    fn split(&mut self, id: BlockId, size: usize) {
        let block = *self.block(id);
        assert!(block.size >= size, "split target is too small");
        if block.size == size {
            return;
        }

        let remainder = Block {
            offset: block.offset + size,
            size: block.size - size,
            in_use: false,
            next: block.next,
        };
        trace!(
            "split block {}..{} at {}",
            block.offset,
            block.end(),
            remainder.offset
        );
        let remainder_id = self.insert_slot(remainder);

        let block = self.block_mut(id);
        block.size = size;
        block.next = Some(remainder_id);
    }

    /// Merges every run of neighbouring free blocks into one block.
    ///
    /// A single pass suffices: after a merge the walk stays on the merged
    /// block, so runs of any length collapse.
    fn coalesce(&mut self) {
        let mut current = self.head;
        while let Some(next_id) = self.block(current).next {
            let next = *self.block(next_id);
            let block = self.block_mut(current);
            if block.in_use || next.in_use {
                current = next_id;
                continue;
            }

            trace!(
                "coalesce {}..{} with {}..{}",
                block.offset,
                block.end(),
                next.offset,
                next.end()
            );
            block.size += next.size;
            block.next = next.next;
            self.vacant.push(next_id);
        }
    }
}

impl fmt::Debug for BlockList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<'a> IntoIterator for &'a BlockList {
    type Item = BlockInfo;
    type IntoIter = Blocks<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the blocks of a [`BlockList`], see [`BlockList::iter`].
pub struct Blocks<'a> {
    list: &'a BlockList,
    next: Option<BlockId>,
}

impl Iterator for Blocks<'_> {
    type Item = BlockInfo;

    fn next(&mut self) -> Option<Self::Item> {
        let block = self.list.block(self.next?);
        self.next = block.next;
        Some(block.info())
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use alloc::vec;

    use proptest::prelude::*;

    use super::*;
    use crate::error::AllocErrorKind;

    fn layout(list: &BlockList) -> Vec<(usize, usize, bool)> {
        list.iter()
            .map(|block| (block.offset, block.size, block.in_use))
            .collect()
    }

    #[test]
    fn test_new_list_is_one_free_block() {
        let list = BlockList::new(1000);
        assert_eq!(layout(&list), vec![(0, 1000, false)]);
        assert_eq!(list.len(), 1);
        list.check_invariants().unwrap();
    }

    #[test]
    #[should_panic(expected = "arena capacity must be non-zero")]
    fn test_zero_capacity_panics() {
        let _ = BlockList::new(0);
    }

    #[test]
    fn test_split_on_allocate() {
        let mut list = BlockList::new(1000);
        assert_eq!(list.allocate(300).unwrap(), 0);
        assert_eq!(layout(&list), vec![(0, 300, true), (300, 700, false)]);

        assert_eq!(list.allocate(500).unwrap(), 300);
        assert_eq!(
            layout(&list),
            vec![(0, 300, true), (300, 500, true), (800, 200, false)]
        );
        list.check_invariants().unwrap();
    }

    #[test]
    fn test_exact_fit_does_not_split() {
        let mut list = BlockList::new(256);
        let a = list.allocate(64).unwrap();
        let _b = list.allocate(64).unwrap();
        list.free(a).unwrap();
        assert_eq!(list.len(), 3);

        assert_eq!(list.allocate(64).unwrap(), a);
        assert_eq!(list.len(), 3);
        list.check_invariants().unwrap();
    }

    #[test]
    fn test_first_fit_takes_lowest_hole() {
        let mut list = BlockList::new(1000);
        let a = list.allocate(100).unwrap();
        let _b = list.allocate(100).unwrap();
        let c = list.allocate(300).unwrap();
        let _d = list.allocate(100).unwrap();
        list.free(a).unwrap();
        list.free(c).unwrap();

        // both holes fit; the lower one wins even though the upper is tighter
        assert_eq!(list.allocate(50).unwrap(), 0);
        // only the upper hole fits now
        assert_eq!(list.allocate(250).unwrap(), 200);
        list.check_invariants().unwrap();
    }

    #[test]
    fn test_zero_size_rejected() {
        let mut list = BlockList::new(64);
        let err = list.allocate(0).unwrap_err();
        assert_eq!(err.kind(), AllocErrorKind::InvalidSize);
        assert_eq!(layout(&list), vec![(0, 64, false)]);
    }

    #[test]
    fn test_out_of_memory_leaves_list_unchanged() {
        let mut list = BlockList::new(256);
        list.allocate(100).unwrap();
        list.allocate(100).unwrap();
        let before = layout(&list);

        let err = list.allocate(57).unwrap_err();
        assert!(matches!(
            err,
            AllocError::OutOfMemory {
                requested: 57,
                largest_free: 56,
                ..
            }
        ));
        assert_eq!(layout(&list), before);
    }

    #[test]
    fn test_free_middle_then_first_coalesces() {
        let mut list = BlockList::new(1000);
        let a = list.allocate(100).unwrap();
        let b = list.allocate(100).unwrap();
        let _c = list.allocate(100).unwrap();
        assert_eq!((a, b), (0, 100));

        list.free(b).unwrap();
        list.free(a).unwrap();
        assert_eq!(list.get(0), Some(BlockInfo {
            offset: 0,
            size: 200,
            in_use: false
        }));
        list.check_invariants().unwrap();

        assert_eq!(list.allocate(200).unwrap(), 0);
    }

    #[test]
    fn test_free_collapses_run_of_three() {
        let mut list = BlockList::new(400);
        let a = list.allocate(100).unwrap();
        let b = list.allocate(100).unwrap();
        let c = list.allocate(100).unwrap();
        let d = list.allocate(100).unwrap();
        list.free(a).unwrap();
        list.free(c).unwrap();
        assert_eq!(list.len(), 4);

        list.free(b).unwrap();
        assert_eq!(layout(&list), vec![(0, 300, false), (300, 100, true)]);

        list.free(d).unwrap();
        assert_eq!(layout(&list), vec![(0, 400, false)]);
        list.check_invariants().unwrap();
    }

    #[test]
    fn test_double_free_rejected() {
        let mut list = BlockList::new(256);
        let a = list.allocate(64).unwrap();
        let _b = list.allocate(64).unwrap();
        list.free(a).unwrap();
        let before = layout(&list);

        let err = list.free(a).unwrap_err();
        assert!(matches!(
            err,
            AllocError::InvalidPointer {
                offset: 0,
                already_freed: true,
                ..
            }
        ));
        assert_eq!(layout(&list), before);
        list.check_invariants().unwrap();
    }

    #[test]
    fn test_unknown_offset_rejected() {
        let mut list = BlockList::new(256);
        let _a = list.allocate(64).unwrap();
        let before = layout(&list);

        for offset in [1, 63, 200, 256, usize::MAX] {
            let err = list.free(offset).unwrap_err();
            assert!(matches!(
                err,
                AllocError::InvalidPointer {
                    already_freed: false,
                    ..
                }
            ));
        }
        assert_eq!(layout(&list), before);
    }

    #[test]
    fn test_exhaustion_boundary() {
        let mut list = BlockList::new(512);
        assert_eq!(list.allocate(512).unwrap(), 0);
        for size in [1, 16, 512] {
            assert_eq!(
                list.allocate(size).unwrap_err().kind(),
                AllocErrorKind::OutOfMemory
            );
        }
        list.free(0).unwrap();
        assert_eq!(list.allocate(512).unwrap(), 0);
    }

    #[test]
    fn test_slots_are_recycled() {
        let mut list = BlockList::new(1024);
        for _ in 0..16 {
            let offsets: Vec<_> = (0..8).map(|_| list.allocate(64).unwrap()).collect();
            for offset in offsets {
                list.free(offset).unwrap();
            }
        }
        assert_eq!(list.len(), 1);
        assert!(list.slots.len() <= 9);
    }

    #[test]
    fn test_stats() {
        let mut list = BlockList::new(1000);
        let a = list.allocate(100).unwrap();
        let _b = list.allocate(200).unwrap();
        list.free(a).unwrap();

        let stats = list.stats();
        assert_eq!(stats, ArenaStats {
            capacity: 1000,
            used_bytes: 200,
            free_bytes: 800,
            block_count: 3,
            free_block_count: 2,
            largest_free: 700,
        });
        assert_eq!(stats.live_allocations(), 1);
        assert!(!stats.is_idle());
    }

    #[test]
    fn test_check_invariants_detects_corruption() {
        let mut list = BlockList::new(300);
        list.allocate(100).unwrap();
        list.allocate(100).unwrap();

        let mut broken = BlockList {
            slots: list.slots.clone(),
            vacant: list.vacant.clone(),
            head: list.head,
            capacity: list.capacity,
        };
        broken.slots[1].in_use = false;
        assert_eq!(
            broken.check_invariants(),
            Err(InvariantError::AdjacentFree { offset: 200 })
        );

        broken.slots[1].offset = 150;
        assert_eq!(
            broken.check_invariants(),
            Err(InvariantError::Discontinuity {
                expected: 100,
                found: 150
            })
        );

        let mut short = BlockList::new(300);
        short.capacity = 400;
        assert_eq!(
            short.check_invariants(),
            Err(InvariantError::Truncated {
                end: 300,
                capacity: 400
            })
        );
    }

    #[derive(Debug, Clone)]
    enum Op {
        Allocate(usize),
        Free(usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (1usize..300).prop_map(Op::Allocate),
            (0usize..64).prop_map(Op::Free),
        ]
    }

    proptest! {
        #[test]
        fn invariants_hold_for_any_script(ops in proptest::collection::vec(op(), 1..200)) {
            let mut list = BlockList::new(2048);
            let mut live: Vec<(usize, usize)> = Vec::new();

            for op in ops {
                match op {
                    Op::Allocate(size) => {
                        if let Ok(offset) = list.allocate(size) {
                            live.push((offset, size));
                        } else {
                            prop_assert!(list.largest_free() < size);
                        }
                    }
                    Op::Free(pick) => {
                        if live.is_empty() {
                            prop_assert!(list.free(pick).is_err());
                        } else {
                            let (offset, _) = live.swap_remove(pick % live.len());
                            prop_assert!(list.free(offset).is_ok());
                            prop_assert!(list.free(offset).is_err());
                        }
                    }
                }

                prop_assert_eq!(list.check_invariants(), Ok(()));

                let mut ranges: Vec<_> = live.iter().map(|&(o, s)| o..o + s).collect();
                ranges.sort_by_key(|range| range.start);
                for pair in ranges.windows(2) {
                    prop_assert!(pair[0].end <= pair[1].start);
                }
                let used: usize = live.iter().map(|&(_, s)| s).sum();
                prop_assert_eq!(list.stats().used_bytes, used);
            }
        }

        #[test]
        fn allocate_free_allocate_reuses_offset(size in 1usize..=4096) {
            let mut list = BlockList::new(4096);
            let offset = list.allocate(size).unwrap();
            list.free(offset).unwrap();
            prop_assert_eq!(list.allocate(size).unwrap(), offset);
        }
    }
}
