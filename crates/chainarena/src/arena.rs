//! The block-chained bump arena.
//!
//! [`Arena`] serves allocations by bumping a cursor in its newest block.
//! When that block is full it links a new block from its
//! [`BlockAllocator`], sized to at least
//! [`ArenaConfig::min_block_size`]. A freshly constructed arena serves
//! small requests from a built-in buffer without calling any allocator.
//!
//! ```text
//! Arena
//! ├── built_in: [u8; 16 KiB]        (wrapped as the first block)
//! ├── BlockChain
//! │   current ──prev──▶ … ──prev──▶ top
//! └── allocator: Box<dyn BlockAllocator>   (heap by default)
//! ```

use std::fmt;

use crate::allocator::{BlockAllocator, HeapAllocator};
use crate::block::{Block, BlockId};
use crate::chain::BlockChain;
use crate::config::ArenaConfig;
use crate::error::ArenaError;
use crate::handle::Allocation;
use crate::stats::ArenaStats;

/// Size of the buffer embedded in every arena.
pub const BUILT_IN_BYTES: usize = 16 * 1024;

type DynAllocator<'m> = Box<dyn BlockAllocator + 'm>;

/// Block-chained bump allocator with scoped regions.
///
/// `'m` bounds caller-supplied memory attached with
/// [`reserve_from`](Arena::reserve_from) and any borrowed allocator.
/// Arenas that own all of their memory are `Arena<'static>`.
///
/// Not thread-safe: every mutation takes `&mut self`.
pub struct Arena<'m> {
    chain: BlockChain<'m>,
    allocator: Option<DynAllocator<'m>>,
    config: ArenaConfig,
    /// Largest `used` seen on any block.
    highest_used_mark: usize,
    /// Live blocks that came from `allocator`.
    allocated_blocks: usize,
    /// Regions begun and not yet ended.
    pub(crate) region_depth: u32,
    built_in: [u8; BUILT_IN_BYTES],
}

impl<'m> Arena<'m> {
    /// Create an arena that grows from the global heap.
    ///
    /// With `config.heap_fallback` disabled the arena never allocates
    /// block memory and only serves its built-in buffer plus any blocks
    /// attached with [`reserve_from`](Arena::reserve_from).
    pub fn new(config: ArenaConfig) -> Result<Self, ArenaError> {
        config.validate()?;
        let allocator: Option<DynAllocator<'m>> = if config.heap_fallback {
            Some(Box::new(HeapAllocator))
        } else {
            None
        };
        Ok(Self::from_parts(config, allocator))
    }

    /// Create an arena that grows through a custom block allocator.
    pub fn with_allocator(
        config: ArenaConfig,
        allocator: impl BlockAllocator + 'm,
    ) -> Result<Self, ArenaError> {
        config.validate()?;
        Ok(Self::from_parts(config, Some(Box::new(allocator))))
    }

    /// Create an arena over caller-owned memory that never grows.
    ///
    /// The memory is attached on top of the built-in block, so requests
    /// are served from `memory` only. Once it is exhausted, allocation
    /// fails with [`ArenaError::CapacityExceeded`]. The idle built-in block
    /// still counts towards [`ArenaStats::capacity_bytes`].
    pub fn with_fixed_memory(memory: &'m mut [u8]) -> Self {
        let config = ArenaConfig::new()
            .with_heap_fallback(false)
            .with_growable(false);
        let mut arena = Self::from_parts(config, None);
        arena.reserve_from(memory);
        arena
    }

    /// Create an arena holding exactly one heap block of `bytes` bytes.
    ///
    /// The block is allocated up front; the arena never grows past it.
    pub fn with_fixed_size(bytes: usize) -> Result<Self, ArenaError> {
        let config = ArenaConfig::new();
        let mut arena = Self::from_parts(config, Some(Box::new(HeapAllocator)));
        arena.push_allocated_block(bytes, bytes)?;
        arena.config.growable = false;
        Ok(arena)
    }

    fn from_parts(config: ArenaConfig, allocator: Option<DynAllocator<'m>>) -> Self {
        Self {
            chain: BlockChain::new(BUILT_IN_BYTES),
            allocator,
            config,
            highest_used_mark: 0,
            allocated_blocks: 0,
            region_depth: 0,
            built_in: [0; BUILT_IN_BYTES],
        }
    }

    /// The configuration this arena was built with.
    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    /// Whether a full current block can be followed by a new one.
    pub fn can_grow(&self) -> bool {
        self.config.growable && self.allocator.is_some()
    }

    /// The block new allocations are bumped from.
    pub fn current_block(&self) -> BlockId {
        self.chain.current()
    }

    /// The oldest block on the chain.
    pub fn top_block(&self) -> BlockId {
        self.chain.top()
    }

    /// Look up a live block.
    pub fn block(&self, id: BlockId) -> Option<&Block<'m>> {
        self.chain.get(id)
    }

    /// Walk the chain from the current block back to the top block.
    pub fn blocks(&self) -> impl Iterator<Item = (BlockId, &Block<'m>)> {
        self.chain.iter()
    }

    /// Number of blocks on the chain, built-in block included.
    pub fn block_count(&self) -> usize {
        self.chain.len()
    }

    /// Largest `used` ever observed on a single block.
    pub fn highest_used_mark(&self) -> usize {
        self.highest_used_mark
    }

    /// Forget the high-water mark; it restarts from the current block.
    pub fn reset_highest_used_mark(&mut self) {
        self.highest_used_mark = self.chain.current_block().used();
    }

    /// Snapshot of block and usage figures.
    pub fn stats(&self) -> ArenaStats {
        let (used_bytes, capacity_bytes) = self
            .chain
            .iter()
            .fold((0, 0), |(used, cap), (_, b)| (used + b.used(), cap + b.size()));
        ArenaStats {
            block_count: self.chain.len(),
            allocated_blocks: self.allocated_blocks,
            used_bytes,
            capacity_bytes,
            highest_used_mark: self.highest_used_mark,
            open_regions: self.region_depth,
        }
    }

    /// Bump-allocate `len` bytes.
    ///
    /// Served from the current block when it has room. Otherwise a new
    /// block of `max(len, min_block_size)` bytes is linked in front of it;
    /// the old block's `used` is left as it was. Zero-length requests
    /// always succeed.
    ///
    /// # Errors
    ///
    /// - [`ArenaError::CapacityExceeded`] if the current block is full and
    ///   the arena may not grow. No allocator is called.
    /// - [`ArenaError::OutOfMemory`] if the allocator refuses the block.
    pub fn alloc(&mut self, len: usize) -> Result<Allocation, ArenaError> {
        let current = self.chain.current();
        if len == 0 {
            let block = self.chain.current_block();
            return Ok(Allocation::new(current, block.used(), 0, block.epoch()));
        }

        let alignment = self.config.alignment;
        let block = self.chain.current_block_mut();
        if let Some(offset) = block.bump(len, alignment) {
            let epoch = block.epoch();
            self.note_used();
            return Ok(Allocation::new(current, offset, len, epoch));
        }

        let grown = self.grow(len)?;
        let block = self.chain.current_block_mut();
        let offset = block
            .bump(len, alignment)
            .expect("a fresh block is at least as large as the request");
        let epoch = block.epoch();
        self.note_used();
        Ok(Allocation::new(grown, offset, len, epoch))
    }

    /// Allocate `len` bytes and return them directly.
    ///
    /// The slice borrows the arena; use [`alloc`](Arena::alloc) for
    /// allocations that must coexist.
    pub fn alloc_bytes(&mut self, len: usize) -> Result<&mut [u8], ArenaError> {
        let allocation = self.alloc(len)?;
        Ok(self.current_range_mut(allocation))
    }

    /// Allocate `len` bytes filled with zeroes.
    pub fn alloc_zeroed(&mut self, len: usize) -> Result<Allocation, ArenaError> {
        let allocation = self.alloc(len)?;
        self.current_range_mut(allocation).fill(0);
        Ok(allocation)
    }

    /// Copy `src` into a new allocation.
    pub fn alloc_copy(&mut self, src: &[u8]) -> Result<Allocation, ArenaError> {
        let allocation = self.alloc(src.len())?;
        self.current_range_mut(allocation).copy_from_slice(src);
        Ok(allocation)
    }

    /// Format `args` into a new allocation.
    ///
    /// # Errors
    ///
    /// Fails like [`alloc`](Arena::alloc), or with [`ArenaError::Format`]
    /// if a formatting trait implementation returns an error or writes a
    /// different length on the second pass. Nothing stays allocated then.
    ///
    /// ```
    /// let mut arena = chainarena::Arena::default();
    /// let name = arena.alloc_fmt(format_args!("block-{}", 7)).unwrap();
    /// assert_eq!(arena.get_str(&name), Some("block-7"));
    /// ```
    pub fn alloc_fmt(&mut self, args: fmt::Arguments<'_>) -> Result<Allocation, ArenaError> {
        let mut counter = ByteCounter(0);
        fmt::write(&mut counter, args).map_err(|_| ArenaError::Format)?;
        let allocation = self.alloc(counter.0)?;
        let mut writer = SliceWriter {
            buf: self.current_range_mut(allocation),
            pos: 0,
        };
        let written = fmt::write(&mut writer, args).map(|()| writer.pos);
        if written != Ok(allocation.len) {
            self.pop(&allocation);
            return Err(ArenaError::Format);
        }
        Ok(allocation)
    }

    /// Resolve an allocation to its bytes.
    ///
    /// Returns `None` if the owning block was released or the allocation
    /// was rolled back, even when its bytes have since been handed out
    /// again.
    pub fn get(&self, allocation: &Allocation) -> Option<&[u8]> {
        let block = self.chain.get(allocation.block)?;
        if !block.holds(allocation.epoch, allocation.end()) {
            return None;
        }
        Some(&block.bytes(&self.built_in)[allocation.offset..allocation.end()])
    }

    /// Mutable counterpart of [`get`](Arena::get).
    pub fn get_mut(&mut self, allocation: &Allocation) -> Option<&mut [u8]> {
        let Arena {
            chain, built_in, ..
        } = self;
        let block = chain.get_mut(allocation.block)?;
        if !block.holds(allocation.epoch, allocation.end()) {
            return None;
        }
        Some(&mut block.bytes_mut(built_in)[allocation.offset..allocation.end()])
    }

    /// Resolve an allocation as UTF-8 text.
    pub fn get_str(&self, allocation: &Allocation) -> Option<&str> {
        std::str::from_utf8(self.get(allocation)?).ok()
    }

    /// Guarantee `len` bytes of headroom in the current block.
    ///
    /// Links a new, empty block when the current one is too small.
    /// Fails exactly like [`alloc`](Arena::alloc).
    pub fn reserve(&mut self, len: usize) -> Result<(), ArenaError> {
        if len == 0 {
            return Ok(());
        }
        if self
            .chain
            .current_block()
            .fit(len, self.config.alignment)
            .is_some()
        {
            return Ok(());
        }
        self.grow(len).map(|_| ())
    }

    /// Attach caller-owned memory as the new current block.
    ///
    /// The arena never hands this memory to its allocator. Allowed even
    /// when the arena may not grow.
    pub fn reserve_from(&mut self, memory: &'m mut [u8]) -> BlockId {
        let size = memory.len();
        let id = self.chain.push(Block::external(memory));
        tracing::debug!(block = %id, size, "attached external arena block");
        id
    }

    /// Reset every block's `used` to zero without releasing any block.
    pub fn clear_used(&mut self) {
        for block in self.chain.iter_mut_blocks() {
            block.rewind(0);
        }
    }

    /// Reset the current block's `used` to zero, optionally zeroing the
    /// bytes it had handed out.
    pub fn clear_current_block(&mut self, zero: bool) {
        let Arena {
            chain, built_in, ..
        } = self;
        let block = chain.current_block_mut();
        if zero {
            let used = block.used();
            block.bytes_mut(built_in)[..used].fill(0);
        }
        block.rewind(0);
    }

    /// Release the most recent allocation.
    ///
    /// Succeeds only if `allocation` is live and ends at the current
    /// block's cursor; returns `false` and changes nothing otherwise.
    pub fn pop(&mut self, allocation: &Allocation) -> bool {
        if allocation.block != self.chain.current() {
            return false;
        }
        let block = self.chain.current_block_mut();
        if allocation.end() != block.used() || !block.holds(allocation.epoch, allocation.end()) {
            return false;
        }
        block.rewind(allocation.offset);
        true
    }

    /// Destroy the current block, making its predecessor current.
    ///
    /// Returns `false` when only the built-in block remains.
    pub fn free_last_block(&mut self) -> bool {
        let current = self.chain.current();
        if self.chain.len() == 1 && self.chain.is_built_in(current) {
            return false;
        }
        self.release(current).is_ok()
    }

    /// Destroy a block at any position in the chain.
    ///
    /// Neighbouring blocks keep their memory, sizes and `used` counters.
    /// Releasing the last remaining block re-attaches an empty built-in
    /// block.
    ///
    /// # Errors
    ///
    /// [`ArenaError::UnknownBlock`] if `id` is stale or was never issued;
    /// the chain is left untouched.
    pub fn free_block(&mut self, id: BlockId) -> Result<(), ArenaError> {
        self.release(id)
    }

    /// Destroy every block and return to the freshly constructed state.
    ///
    /// Allocator-owned blocks go back to the allocator; externally owned
    /// ones are unlinked. The next small allocation is served from the
    /// built-in buffer.
    ///
    /// Open regions are discarded; ending one of them afterwards panics.
    pub fn free(&mut self) {
        if self.region_depth != 0 {
            tracing::warn!(open = self.region_depth, "freed arena with regions still open");
            self.region_depth = 0;
        }
        let released = self.chain.len();
        let Arena {
            chain,
            allocator,
            allocated_blocks,
            ..
        } = self;
        chain.drain(|block| return_block(allocator, allocated_blocks, block));
        tracing::debug!(released, "freed arena");
    }

    /// Destroy every block newer than `id` and rewind `id` to `used`.
    pub(crate) fn rollback_to(&mut self, id: BlockId, used: usize) -> usize {
        let mut released = 0;
        let Arena {
            chain,
            allocator,
            allocated_blocks,
            ..
        } = self;
        chain.truncate_to(id, |block| {
            released += 1;
            return_block(allocator, allocated_blocks, block);
        });
        chain.current_block_mut().rewind(used);
        released
    }

    pub(crate) fn contains_block(&self, id: BlockId) -> bool {
        self.chain.contains(id)
    }

    fn release(&mut self, id: BlockId) -> Result<(), ArenaError> {
        let block = self
            .chain
            .remove(id)
            .ok_or(ArenaError::UnknownBlock { block: id })?;
        tracing::debug!(block = %id, size = block.size(), "released arena block");
        return_block(&mut self.allocator, &mut self.allocated_blocks, block);
        Ok(())
    }

    /// Link a block big enough for `requested`, honouring the growth policy.
    fn grow(&mut self, requested: usize) -> Result<BlockId, ArenaError> {
        if !self.can_grow() {
            return Err(ArenaError::CapacityExceeded {
                requested,
                remaining: self.chain.current_block().remaining(),
            });
        }
        let size = requested.max(self.config.min_block_size);
        self.push_allocated_block(size, requested)
    }

    fn push_allocated_block(
        &mut self,
        size: usize,
        requested: usize,
    ) -> Result<BlockId, ArenaError> {
        let Some(allocator) = self.allocator.as_mut() else {
            return Err(ArenaError::CapacityExceeded {
                requested,
                remaining: self.chain.current_block().remaining(),
            });
        };
        let memory = match allocator.allocate(size) {
            Some(memory) if memory.len() >= size => memory,
            Some(short) => {
                allocator.release(short);
                tracing::warn!(size, "block allocator returned a short buffer");
                return Err(ArenaError::OutOfMemory { requested: size });
            }
            None => {
                tracing::warn!(size, requested, "block allocator out of memory");
                return Err(ArenaError::OutOfMemory { requested: size });
            }
        };
        let id = self.chain.push(Block::allocated(memory));
        self.allocated_blocks += 1;
        tracing::debug!(block = %id, size, requested, "allocated arena block");
        Ok(id)
    }

    /// Bytes of an allocation just made in the current block.
    fn current_range_mut(&mut self, allocation: Allocation) -> &mut [u8] {
        let Arena {
            chain, built_in, ..
        } = self;
        let block = chain.current_block_mut();
        &mut block.bytes_mut(built_in)[allocation.offset..allocation.end()]
    }

    fn note_used(&mut self) {
        let used = self.chain.current_block().used();
        self.highest_used_mark = self.highest_used_mark.max(used);
    }
}

/// Hand allocator-owned memory back; externally owned blocks are dropped.
fn return_block<'m>(
    allocator: &mut Option<DynAllocator<'m>>,
    allocated_blocks: &mut usize,
    block: Block<'m>,
) {
    if let Some(memory) = block.into_allocated() {
        *allocated_blocks -= 1;
        if let Some(allocator) = allocator.as_mut() {
            allocator.release(memory);
        }
    }
}

impl Default for Arena<'_> {
    fn default() -> Self {
        Self::from_parts(ArenaConfig::default(), Some(Box::new(HeapAllocator)))
    }
}

impl Drop for Arena<'_> {
    fn drop(&mut self) {
        self.free();
    }
}

impl fmt::Debug for Arena<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("config", &self.config)
            .field("current_block", &self.chain.current())
            .field("top_block", &self.chain.top())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

struct ByteCounter(usize);

impl fmt::Write for ByteCounter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0 += s.len();
        Ok(())
    }
}

struct SliceWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl fmt::Write for SliceWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let end = self.pos.checked_add(s.len()).ok_or(fmt::Error)?;
        let dst = self.buf.get_mut(self.pos..end).ok_or(fmt::Error)?;
        dst.copy_from_slice(s.as_bytes());
        self.pos = end;
        Ok(())
    }
}
