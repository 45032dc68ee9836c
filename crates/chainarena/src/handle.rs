//! Allocation handles.
//!
//! An [`Allocation`] encodes where an arena allocation lives: the owning
//! block, a byte offset and a length. Resolving it back to bytes goes
//! through [`Arena::get`](crate::Arena::get), which rejects handles whose
//! block was released or whose range was rolled back, even after the
//! same bytes have been handed out again.

use std::fmt;

use crate::block::BlockId;

/// Location of an allocation within an arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Allocation {
    pub(crate) block: BlockId,
    pub(crate) offset: usize,
    pub(crate) len: usize,
    /// Rewind epoch of the owning block when this was bumped.
    pub(crate) epoch: u64,
}

impl Allocation {
    pub(crate) fn new(block: BlockId, offset: usize, len: usize, epoch: u64) -> Self {
        Self {
            block,
            offset,
            len,
            epoch,
        }
    }

    /// The block this allocation was bumped from.
    pub fn block(&self) -> BlockId {
        self.block
    }

    /// Byte offset within the owning block.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether this is a zero-length allocation.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// One past the last byte, relative to the block start.
    pub fn end(&self) -> usize {
        self.offset + self.len
    }
}

impl fmt::Display for Allocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Allocation({}, off={}, len={})",
            self.block, self.offset, self.len
        )
    }
}
