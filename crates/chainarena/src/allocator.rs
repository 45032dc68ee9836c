//! Pluggable backing-memory strategy for growable arenas.
//!
//! The arena never calls the global allocator for block memory directly.
//! Every block that is not built-in or caller-supplied comes from a
//! [`BlockAllocator`] and goes back to the same allocator when released.

/// Source of backing memory for arena blocks.
///
/// Implementations must be fallible: returning `None` from
/// [`allocate`](BlockAllocator::allocate) surfaces as
/// [`ArenaError::OutOfMemory`](crate::ArenaError::OutOfMemory) to the
/// caller of the arena operation, never as an abort.
pub trait BlockAllocator {
    /// Provide a buffer of exactly `bytes` bytes, or `None` on exhaustion.
    fn allocate(&mut self, bytes: usize) -> Option<Box<[u8]>>;

    /// Take back a buffer previously returned by `allocate`.
    fn release(&mut self, memory: Box<[u8]>);
}

impl<A: BlockAllocator + ?Sized> BlockAllocator for &mut A {
    fn allocate(&mut self, bytes: usize) -> Option<Box<[u8]>> {
        (**self).allocate(bytes)
    }

    fn release(&mut self, memory: Box<[u8]>) {
        (**self).release(memory)
    }
}

impl<A: BlockAllocator + ?Sized> BlockAllocator for Box<A> {
    fn allocate(&mut self, bytes: usize) -> Option<Box<[u8]>> {
        (**self).allocate(bytes)
    }

    fn release(&mut self, memory: Box<[u8]>) {
        (**self).release(memory)
    }
}

/// Default allocator backed by the global heap.
///
/// Uses `try_reserve_exact` so exhaustion is reported instead of aborting.
/// Returned buffers are zero-filled.
#[derive(Clone, Copy, Debug, Default)]
pub struct HeapAllocator;

impl BlockAllocator for HeapAllocator {
    fn allocate(&mut self, bytes: usize) -> Option<Box<[u8]>> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(bytes).ok()?;
        buf.resize(bytes, 0);
        Some(buf.into_boxed_slice())
    }

    fn release(&mut self, memory: Box<[u8]>) {
        drop(memory);
    }
}
