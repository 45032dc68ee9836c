//! Arena-specific error types.

use std::error::Error;
use std::fmt;

use crate::block::BlockId;

/// Errors that can occur during arena operations.
///
/// Allocation failures are recoverable and reported through these values.
/// Region nesting violations are programming errors and panic instead.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArenaError {
    /// The block allocator could not provide memory for a new block.
    OutOfMemory {
        /// Size in bytes of the block that was requested.
        requested: usize,
    },
    /// The arena may not grow and the current block has too little room.
    CapacityExceeded {
        /// Number of bytes requested.
        requested: usize,
        /// Bytes still free in the current block.
        remaining: usize,
    },
    /// A `BlockId` that is not on the arena's live chain.
    UnknownBlock {
        /// The unrecognised block.
        block: BlockId,
    },
    /// A formatting trait implementation failed while writing into
    /// [`Arena::alloc_fmt`](crate::Arena::alloc_fmt) memory.
    Format,
    /// The arena configuration failed validation.
    InvalidConfig {
        /// Human-readable description of the problem.
        reason: String,
    },
}

impl fmt::Display for ArenaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfMemory { requested } => {
                write!(f, "out of memory: block allocator refused {requested} bytes")
            }
            Self::CapacityExceeded {
                requested,
                remaining,
            } => {
                write!(
                    f,
                    "arena capacity exceeded: requested {requested} bytes, {remaining} bytes remaining"
                )
            }
            Self::UnknownBlock { block } => {
                write!(f, "unknown block: {block}")
            }
            Self::Format => {
                write!(f, "formatting into arena memory failed")
            }
            Self::InvalidConfig { reason } => {
                write!(f, "invalid arena config: {reason}")
            }
        }
    }
}

impl Error for ArenaError {}
