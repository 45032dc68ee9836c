//! Integration test: bump allocation, growth policy and teardown.
//!
//! Uses a counting allocator to check exactly when the arena reaches for
//! new blocks and that every block it takes is handed back.

use std::sync::Arc;

use chainarena::{Arena, ArenaConfig, ArenaError, BlockOrigin, BUILT_IN_BYTES};
use chainarena_test_utils::{AllocatorLedger, CountingAllocator, FailingAllocator};

fn counting_arena(min_block_size: usize) -> (Arena<'static>, Arc<AllocatorLedger>) {
    let allocator = CountingAllocator::new();
    let ledger = allocator.ledger();
    let config = ArenaConfig::new().with_min_block_size(min_block_size);
    (Arena::with_allocator(config, allocator).unwrap(), ledger)
}

// ── Built-in buffer ──────────────────────────────────────────────────

#[test]
fn small_allocations_share_the_built_in_block() {
    let (mut arena, ledger) = counting_arena(4096);
    let sizes = [1, 17, 300, 2000, 64, 5000];
    for &size in &sizes {
        arena.alloc(size).unwrap();
    }
    assert_eq!(arena.block_count(), 1);
    let block = arena.block(arena.current_block()).unwrap();
    assert_eq!(block.origin(), BlockOrigin::BuiltIn);
    assert_eq!(block.used(), sizes.iter().sum::<usize>());
    assert_eq!(ledger.allocations(), 0);
}

#[test]
fn sixteen_kib_scenario() {
    let (mut arena, ledger) = counting_arena(4096);
    assert_eq!(BUILT_IN_BYTES, 16 * 1024);

    arena.alloc(2000).unwrap();
    assert_eq!(ledger.allocations(), 0);

    let big = arena.alloc(20_000).unwrap();
    assert_eq!(ledger.allocations(), 1);
    assert!(ledger.requests()[0] >= 20_000);
    assert!(arena.block(big.block()).unwrap().size() >= 20_000);

    arena.free();
    assert_eq!(ledger.releases(), ledger.allocations());
    assert!(ledger.balanced());
}

#[test]
fn free_then_small_alloc_uses_built_in_buffer() {
    let (mut arena, ledger) = counting_arena(4096);
    arena.alloc(BUILT_IN_BYTES).unwrap();
    arena.alloc(10_000).unwrap();
    arena.free();
    let calls_before = ledger.allocations();

    let a = arena.alloc(128).unwrap();
    assert_eq!(ledger.allocations(), calls_before);
    assert_eq!(arena.block(a.block()).unwrap().origin(), BlockOrigin::BuiltIn);
    assert_eq!(arena.block_count(), 1);
}

// ── Growth ───────────────────────────────────────────────────────────

#[test]
fn overflow_creates_block_and_leaves_old_used_alone() {
    let (mut arena, ledger) = counting_arena(4096);
    arena.alloc(BUILT_IN_BYTES - 100).unwrap();
    let old = arena.current_block();
    let old_used = arena.block(old).unwrap().used();

    let a = arena.alloc(200).unwrap();
    assert_ne!(a.block(), old);
    assert_eq!(arena.block(old).unwrap().used(), old_used);
    assert_eq!(arena.block(a.block()).unwrap().prev(), Some(old));
    assert_eq!(ledger.requests(), vec![4096]);
}

#[test]
fn exhausted_block_is_not_revisited() {
    let (mut arena, _ledger) = counting_arena(1024);
    arena.alloc(BUILT_IN_BYTES - 10).unwrap();
    arena.alloc(1020).unwrap();
    // Fits in the built-in block's tail, but only the current block is tried.
    let a = arena.alloc(8).unwrap();
    assert_ne!(a.block(), arena.top_block());
    assert_eq!(arena.block_count(), 3);
    assert_eq!(arena.block(arena.top_block()).unwrap().used(), BUILT_IN_BYTES - 10);
}

#[test]
fn oversized_requests_get_exact_blocks() {
    let (mut arena, ledger) = counting_arena(4096);
    arena.alloc(BUILT_IN_BYTES).unwrap();
    arena.alloc(100_000).unwrap();
    arena.alloc(50).unwrap();
    assert_eq!(ledger.requests(), vec![100_000, 4096]);
}

#[test]
fn earlier_allocations_survive_growth() {
    let (mut arena, _ledger) = counting_arena(1024);
    let handles: Vec<_> = (0..64u8)
        .map(|i| arena.alloc_copy(&[i; 700]).unwrap())
        .collect();
    assert!(arena.block_count() > 1);
    for (i, handle) in handles.iter().enumerate() {
        assert_eq!(arena.get(handle).unwrap(), &[i as u8; 700]);
    }
}

#[test]
fn highest_used_mark_persists_across_clear() {
    let (mut arena, _ledger) = counting_arena(4096);
    arena.alloc(12_000).unwrap();
    arena.clear_used();
    arena.alloc(10).unwrap();
    assert_eq!(arena.highest_used_mark(), 12_000);
    assert_eq!(arena.stats().used_bytes, 10);
}

// ── Teardown ─────────────────────────────────────────────────────────

#[test]
fn dropping_arena_releases_every_block() {
    let (mut arena, ledger) = counting_arena(2048);
    for _ in 0..20 {
        arena.alloc(3000).unwrap();
    }
    assert_eq!(ledger.allocations(), arena.stats().allocated_blocks);
    drop(arena);
    assert!(ledger.balanced());
}

#[test]
fn clear_used_does_not_release() {
    let (mut arena, ledger) = counting_arena(2048);
    arena.alloc(BUILT_IN_BYTES).unwrap();
    arena.alloc(2048).unwrap();
    arena.clear_used();
    assert_eq!(ledger.releases(), 0);
    assert_eq!(arena.block_count(), 2);
}

// ── Failure ──────────────────────────────────────────────────────────

#[test]
fn allocator_failure_surfaces_as_out_of_memory() {
    let allocator = FailingAllocator::new(1);
    let ledger = allocator.ledger();
    let config = ArenaConfig::new().with_min_block_size(1024);
    let mut arena = Arena::with_allocator(config, allocator).unwrap();

    arena.alloc(BUILT_IN_BYTES).unwrap();
    arena.alloc(1024).unwrap();
    let err = arena.alloc(1024).unwrap_err();
    assert_eq!(err, ArenaError::OutOfMemory { requested: 1024 });

    // The chain is intact and existing blocks still serve.
    assert_eq!(arena.block_count(), 2);
    assert!(matches!(
        arena.reserve(1),
        Err(ArenaError::OutOfMemory { .. })
    ));
    arena.free();
    assert!(ledger.balanced());
}
