//! Arena usage statistics.
//!
//! [`ArenaStats`] is a point-in-time snapshot of an arena's block chain and
//! diagnostics counters, taken with [`Arena::stats`](crate::Arena::stats).

/// Memory and bookkeeping figures for a single arena.
///
/// All sizes are in bytes. Apart from `highest_used_mark`, every figure
/// describes the chain at the moment the snapshot was taken.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ArenaStats {
    /// Number of blocks on the chain, built-in block included.
    pub block_count: usize,
    /// Number of live blocks obtained from the block allocator.
    pub allocated_blocks: usize,
    /// Sum of `used` over every block on the chain.
    pub used_bytes: usize,
    /// Sum of `size` over every block on the chain.
    ///
    /// Blocks older than the current one count in full, although they
    /// only serve allocations again after a rollback makes them current.
    /// An arena from [`Arena::with_fixed_memory`](crate::Arena::with_fixed_memory)
    /// therefore reports the caller's buffer plus the
    /// [`BUILT_IN_BYTES`](crate::BUILT_IN_BYTES) block beneath it.
    pub capacity_bytes: usize,
    /// Largest `used` ever observed on a single block, kept across resets.
    pub highest_used_mark: usize,
    /// Number of regions begun and not yet ended.
    pub open_regions: u32,
}

impl ArenaStats {
    /// Bytes on the chain not yet handed out.
    pub fn free_bytes(&self) -> usize {
        self.capacity_bytes - self.used_bytes
    }
}
