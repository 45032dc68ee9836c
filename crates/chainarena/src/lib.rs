//! Block-chained bump arena with scoped save/restore regions.
//!
//! An [`Arena`] hands out byte ranges by bumping a cursor in its newest
//! block. When the block is full a new one is linked in front of it, so
//! earlier allocations never move. Regions checkpoint the arena and roll
//! everything allocated since back in one step, including blocks created
//! in the meantime.
//!
//! # Architecture
//!
//! ```text
//! Arena (orchestrator)
//! ├── built-in buffer (16 KiB, first block, zero allocator calls)
//! ├── BlockChain → Block[] (slot table, generation-checked BlockIds)
//! ├── BlockAllocator (HeapAllocator by default, pluggable)
//! └── RegionMark / ScopedRegion (checkpoint + rollback)
//! ```
//!
//! # Backing modes
//!
//! - **Growable:** blocks come from a [`BlockAllocator`] once the built-in
//!   buffer is full. See [`Arena::new`] and [`Arena::with_allocator`].
//! - **Fixed memory:** caller-supplied bytes, never grows.
//!   See [`Arena::with_fixed_memory`] and [`Arena::reserve_from`].
//! - **Fixed size:** a single up-front heap block, never grows.
//!   See [`Arena::with_fixed_size`].
//!
//! # Example
//!
//! ```
//! use chainarena::{Arena, ArenaConfig};
//!
//! let mut arena = Arena::new(ArenaConfig::new().with_min_block_size(4096)).unwrap();
//! let header = arena.alloc_copy(b"header").unwrap();
//!
//! arena.with_region(|scratch| {
//!     // Temporary working memory, discarded when the closure returns.
//!     let work = scratch.alloc_zeroed(64 * 1024).unwrap();
//!     assert_eq!(scratch.get(&work).unwrap().len(), 64 * 1024);
//! });
//!
//! assert_eq!(arena.get(&header).unwrap(), b"header");
//! assert_eq!(arena.block_count(), 1);
//! ```
//!
//! Allocations are addressed through [`Allocation`] handles rather than
//! raw pointers; a handle whose block was released, or whose bytes were
//! rolled back, no longer resolves, even once those bytes are handed out
//! again.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod allocator;
pub mod arena;
pub mod block;
mod chain;
pub mod config;
pub mod error;
pub mod handle;
pub mod region;
pub mod stats;

// Public re-exports for the primary API surface.
pub use allocator::{BlockAllocator, HeapAllocator};
pub use arena::{Arena, BUILT_IN_BYTES};
pub use block::{Block, BlockId, BlockOrigin};
pub use config::ArenaConfig;
pub use error::ArenaError;
pub use handle::Allocation;
pub use region::{RegionMark, ScopedRegion};
pub use stats::ArenaStats;
