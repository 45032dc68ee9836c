//! Memory blocks and their identifiers.
//!
//! A [`Block`] is one contiguous buffer with a bump cursor and a link to
//! the block allocated before it. Blocks never resize once linked; growth
//! always creates a new block.

use std::fmt;

use smallvec::{smallvec, SmallVec};

/// Stable identifier of a block inside an arena's block table.
///
/// The generation is bumped whenever the slot's block is destroyed, so an
/// id kept past its block's lifetime never resolves to a newer block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlockId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl BlockId {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot index within the block table.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Slot generation this id was issued for.
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockId({}v{})", self.index, self.generation)
    }
}

/// Where a block's bytes come from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockOrigin {
    /// The buffer embedded in the arena itself.
    BuiltIn,
    /// Obtained from the arena's [`BlockAllocator`](crate::BlockAllocator).
    Allocated,
    /// Supplied by the caller through
    /// [`Arena::reserve_from`](crate::Arena::reserve_from).
    External,
}

/// Backing storage of a block.
pub(crate) enum BlockMemory<'m> {
    /// Bytes live in the arena's built-in buffer.
    BuiltIn,
    Allocated(Box<[u8]>),
    External(&'m mut [u8]),
}

/// Bytes bumped since a rewind, tagged with the epoch handed to
/// allocations made in them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Span {
    epoch: u64,
    start: usize,
}

/// A single contiguous memory block with bump allocation.
pub struct Block<'m> {
    memory: BlockMemory<'m>,
    size: usize,
    /// Bump pointer: next free byte.
    used: usize,
    prev: Option<BlockId>,
    /// Live spans, oldest first. Starts and epochs strictly increase.
    spans: SmallVec<[Span; 2]>,
    next_epoch: u64,
}

impl<'m> Block<'m> {
    /// Wrap the arena's built-in buffer of `size` bytes.
    pub(crate) fn built_in(size: usize) -> Self {
        Self::with_memory(BlockMemory::BuiltIn, size)
    }

    pub(crate) fn allocated(memory: Box<[u8]>) -> Self {
        let size = memory.len();
        Self::with_memory(BlockMemory::Allocated(memory), size)
    }

    pub(crate) fn external(memory: &'m mut [u8]) -> Self {
        let size = memory.len();
        Self::with_memory(BlockMemory::External(memory), size)
    }

    fn with_memory(memory: BlockMemory<'m>, size: usize) -> Self {
        Self {
            memory,
            size,
            used: 0,
            prev: None,
            spans: smallvec![Span { epoch: 0, start: 0 }],
            next_epoch: 1,
        }
    }

    /// Offset at which an allocation of `len` bytes would start, if it fits.
    pub(crate) fn fit(&self, len: usize, alignment: usize) -> Option<usize> {
        let start = align_up(self.used, alignment)?;
        let end = start.checked_add(len)?;
        if end > self.size {
            return None;
        }
        Some(start)
    }

    /// Bump-allocate `len` bytes, returning the start offset.
    ///
    /// Returns `None` (and leaves `used` untouched) when the request does
    /// not fit in the remaining space.
    pub(crate) fn bump(&mut self, len: usize, alignment: usize) -> Option<usize> {
        let start = self.fit(len, alignment)?;
        self.used = start + len;
        Some(start)
    }

    /// Move the bump pointer back to `used`.
    ///
    /// Allocations ending past `used` stop resolving for good, even once
    /// the space is bumped again.
    pub(crate) fn rewind(&mut self, used: usize) {
        debug_assert!(used <= self.size, "rewind past block end");
        if used < self.used {
            while self.spans.last().is_some_and(|span| span.start >= used) {
                self.spans.pop();
            }
            self.spans.push(Span {
                epoch: self.next_epoch,
                start: used,
            });
            self.next_epoch += 1;
        }
        self.used = used;
    }

    /// Epoch stamped on allocations bumped from here on.
    pub(crate) fn epoch(&self) -> u64 {
        self.spans.last().map_or(0, |span| span.epoch)
    }

    /// Whether an allocation stamped `epoch` and ending at `end` was not
    /// rewound since it was made.
    pub(crate) fn holds(&self, epoch: u64, end: usize) -> bool {
        let Ok(i) = self.spans.binary_search_by_key(&epoch, |span| span.epoch) else {
            return false;
        };
        let bound = self.spans.get(i + 1).map_or(self.used, |next| next.start);
        end <= bound
    }

    pub(crate) fn set_prev(&mut self, prev: Option<BlockId>) {
        self.prev = prev;
    }

    /// This block's bytes, resolving the built-in variant against `built_in`.
    pub(crate) fn bytes<'s>(&'s self, built_in: &'s [u8]) -> &'s [u8] {
        match &self.memory {
            BlockMemory::BuiltIn => &built_in[..self.size],
            BlockMemory::Allocated(memory) => memory,
            BlockMemory::External(memory) => memory,
        }
    }

    pub(crate) fn bytes_mut<'s>(&'s mut self, built_in: &'s mut [u8]) -> &'s mut [u8] {
        match &mut self.memory {
            BlockMemory::BuiltIn => &mut built_in[..self.size],
            BlockMemory::Allocated(memory) => memory,
            BlockMemory::External(memory) => memory,
        }
    }

    /// Hand back allocator-owned memory. Externally owned blocks yield `None`.
    pub(crate) fn into_allocated(self) -> Option<Box<[u8]>> {
        match self.memory {
            BlockMemory::Allocated(memory) => Some(memory),
            BlockMemory::BuiltIn | BlockMemory::External(_) => None,
        }
    }

    /// Total capacity in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Bytes currently consumed from the front of the block.
    pub fn used(&self) -> usize {
        self.used
    }

    /// Bytes still free at the end of the block.
    pub fn remaining(&self) -> usize {
        self.size - self.used
    }

    /// The block allocated immediately before this one.
    pub fn prev(&self) -> Option<BlockId> {
        self.prev
    }

    /// Where this block's bytes come from.
    pub fn origin(&self) -> BlockOrigin {
        match self.memory {
            BlockMemory::BuiltIn => BlockOrigin::BuiltIn,
            BlockMemory::Allocated(_) => BlockOrigin::Allocated,
            BlockMemory::External(_) => BlockOrigin::External,
        }
    }

    /// True if the arena must never release this block's memory.
    pub fn is_owned_externally(&self) -> bool {
        !matches!(self.memory, BlockMemory::Allocated(_))
    }
}

impl fmt::Debug for Block<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("origin", &self.origin())
            .field("size", &self.size)
            .field("used", &self.used)
            .field("prev", &self.prev)
            .finish()
    }
}

/// Round `offset` up to a multiple of the power-of-two `alignment`.
fn align_up(offset: usize, alignment: usize) -> Option<usize> {
    let mask = alignment - 1;
    Some(offset.checked_add(mask)? & !mask)
}
