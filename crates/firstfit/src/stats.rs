/// Point-in-time usage summary of an arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArenaStats {
    pub capacity: usize,
    pub used_bytes: usize,
    pub free_bytes: usize,
    pub block_count: usize,
    pub free_block_count: usize,
    /// Size of the largest free block, i.e. the largest request that would
    /// currently succeed.
    pub largest_free: usize,
}

impl ArenaStats {
    /// Number of live allocations.
    #[must_use]
    pub fn live_allocations(&self) -> usize {
        self.block_count - self.free_block_count
    }

    /// Returns `true` if nothing is allocated.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.used_bytes == 0
    }
}
