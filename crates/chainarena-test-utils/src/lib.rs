//! Test utilities and mock allocators for chainarena development.
//!
//! - [`CountingAllocator`]: heap-backed [`BlockAllocator`] that records
//!   every call in a shared [`AllocatorLedger`].
//! - [`FailingAllocator`]: succeeds a fixed number of times, then
//!   refuses every request.
//! - [`fill_fence`] / [`fence_intact`]: byte patterns for checking that
//!   memory was not disturbed.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chainarena::BlockAllocator;

/// Shared record of allocator traffic.
///
/// Cloned out of a [`CountingAllocator`] before the allocator is moved
/// into an arena, so assertions can run while the arena is alive and
/// after it is dropped.
#[derive(Default)]
pub struct AllocatorLedger {
    allocate_calls: AtomicUsize,
    release_calls: AtomicUsize,
    bytes_outstanding: AtomicUsize,
    requests: Mutex<Vec<usize>>,
}

impl AllocatorLedger {
    /// Number of `allocate` calls that returned memory.
    pub fn allocations(&self) -> usize {
        self.allocate_calls.load(Ordering::Relaxed)
    }

    /// Number of `release` calls.
    pub fn releases(&self) -> usize {
        self.release_calls.load(Ordering::Relaxed)
    }

    /// Bytes handed out and not yet released.
    pub fn bytes_outstanding(&self) -> usize {
        self.bytes_outstanding.load(Ordering::Relaxed)
    }

    /// Every requested size, in call order.
    pub fn requests(&self) -> Vec<usize> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// True if every allocation has been matched by one release.
    pub fn balanced(&self) -> bool {
        self.allocations() == self.releases() && self.bytes_outstanding() == 0
    }

    fn record_allocate(&self, bytes: usize) {
        self.allocate_calls.fetch_add(1, Ordering::Relaxed);
        self.bytes_outstanding.fetch_add(bytes, Ordering::Relaxed);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(bytes);
        }
    }

    fn record_release(&self, bytes: usize) {
        self.release_calls.fetch_add(1, Ordering::Relaxed);
        self.bytes_outstanding.fetch_sub(bytes, Ordering::Relaxed);
    }
}

/// Heap-backed allocator that records every call.
#[derive(Default)]
pub struct CountingAllocator {
    ledger: Arc<AllocatorLedger>,
}

impl CountingAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to this allocator's ledger.
    pub fn ledger(&self) -> Arc<AllocatorLedger> {
        Arc::clone(&self.ledger)
    }
}

impl BlockAllocator for CountingAllocator {
    fn allocate(&mut self, bytes: usize) -> Option<Box<[u8]>> {
        self.ledger.record_allocate(bytes);
        Some(vec![0; bytes].into_boxed_slice())
    }

    fn release(&mut self, memory: Box<[u8]>) {
        self.ledger.record_release(memory.len());
    }
}

/// Succeeds `succeed_count` times, then returns `None` for every request.
///
/// Useful for testing out-of-memory propagation.
pub struct FailingAllocator {
    pub succeed_count: usize,
    inner: CountingAllocator,
    refused: usize,
}

impl FailingAllocator {
    /// Create an allocator that serves `succeed_count` blocks then fails.
    pub fn new(succeed_count: usize) -> Self {
        Self {
            succeed_count,
            inner: CountingAllocator::new(),
            refused: 0,
        }
    }

    /// Ledger of the successful calls.
    pub fn ledger(&self) -> Arc<AllocatorLedger> {
        self.inner.ledger()
    }

    /// How many requests were refused so far.
    pub fn refused(&self) -> usize {
        self.refused
    }
}

impl BlockAllocator for FailingAllocator {
    fn allocate(&mut self, bytes: usize) -> Option<Box<[u8]>> {
        if self.inner.ledger.allocations() >= self.succeed_count {
            self.refused += 1;
            return None;
        }
        self.inner.allocate(bytes)
    }

    fn release(&mut self, memory: Box<[u8]>) {
        self.inner.release(memory);
    }
}

/// Fill `bytes` with a pattern derived from `seed` and the byte index.
pub fn fill_fence(bytes: &mut [u8], seed: u8) {
    for (i, b) in bytes.iter_mut().enumerate() {
        *b = fence_byte(seed, i);
    }
}

/// Whether `bytes` still holds the pattern written by [`fill_fence`].
pub fn fence_intact(bytes: &[u8], seed: u8) -> bool {
    bytes
        .iter()
        .enumerate()
        .all(|(i, &b)| b == fence_byte(seed, i))
}

fn fence_byte(seed: u8, index: usize) -> u8 {
    seed.wrapping_add((index % 251) as u8)
}
