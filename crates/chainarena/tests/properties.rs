//! Property tests over random allocation sequences.

use chainarena::{Arena, ArenaConfig, BlockId, BlockOrigin, BUILT_IN_BYTES};
use chainarena_test_utils::{fence_intact, fill_fence, CountingAllocator};
use proptest::prelude::*;

fn position(arena: &Arena<'_>) -> (BlockId, usize) {
    let current = arena.current_block();
    (current, arena.block(current).unwrap().used())
}

fn size_list(max_len: usize, max_count: usize) -> impl Strategy<Value = Vec<usize>> {
    proptest::collection::vec(1usize..max_len, 0..max_count)
}

proptest! {
    #[test]
    fn fitting_sequences_stay_in_one_block(sizes in size_list(512, 32)) {
        let allocator = CountingAllocator::new();
        let ledger = allocator.ledger();
        let mut arena = Arena::with_allocator(ArenaConfig::new(), allocator).unwrap();
        for &size in &sizes {
            arena.alloc(size).unwrap();
        }
        prop_assert_eq!(arena.block_count(), 1);
        prop_assert_eq!(position(&arena).1, sizes.iter().sum::<usize>());
        prop_assert_eq!(ledger.allocations(), 0);
    }

    #[test]
    fn overflow_leaves_previous_block_untouched(
        sizes in size_list(40_000, 40),
        min_block in 1usize..8192,
    ) {
        let config = ArenaConfig::new().with_min_block_size(min_block);
        let mut arena = Arena::new(config).unwrap();
        for &size in &sizes {
            let (before_block, before_used) = position(&arena);
            let remaining = arena.block(before_block).unwrap().remaining();
            let handle = arena.alloc(size).unwrap();
            if size > remaining {
                prop_assert_ne!(handle.block(), before_block);
                prop_assert!(arena.block(handle.block()).unwrap().size() >= size);
                prop_assert_eq!(arena.block(before_block).unwrap().used(), before_used);
            } else {
                prop_assert_eq!(handle.block(), before_block);
                prop_assert_eq!(handle.offset(), before_used);
            }
        }
    }

    #[test]
    fn region_restores_position(
        prefix in size_list(20_000, 8),
        inside in size_list(50_000, 24),
    ) {
        let allocator = CountingAllocator::new();
        let ledger = allocator.ledger();
        let config = ArenaConfig::new().with_min_block_size(4096);
        let mut arena = Arena::with_allocator(config, allocator).unwrap();
        for &size in &prefix {
            arena.alloc(size).unwrap();
        }
        let before = position(&arena);
        let blocks_before = arena.block_count();
        let released_before = ledger.releases();

        let mark = arena.begin_region();
        let created_before = ledger.allocations();
        for &size in &inside {
            arena.alloc(size).unwrap();
        }
        let created = ledger.allocations() - created_before;
        arena.end_region(mark);

        prop_assert_eq!(position(&arena), before);
        prop_assert_eq!(arena.block_count(), blocks_before);
        prop_assert_eq!(ledger.releases() - released_before, created);
    }

    #[test]
    fn nested_regions_restore_in_reverse(
        a in size_list(30_000, 6),
        b in size_list(30_000, 6),
        c in size_list(30_000, 6),
    ) {
        let mut arena = Arena::new(ArenaConfig::new().with_min_block_size(2048)).unwrap();
        let before = position(&arena);
        let stats_before = arena.stats();

        let r1 = arena.begin_region();
        for &size in &a {
            arena.alloc(size).unwrap();
        }
        let r2 = arena.begin_region();
        for &size in &b {
            arena.alloc(size).unwrap();
        }
        arena.end_region(r2);
        for &size in &c {
            arena.alloc(size).unwrap();
        }
        arena.end_region(r1);

        prop_assert_eq!(position(&arena), before);
        let stats_after = arena.stats();
        prop_assert_eq!(stats_after.block_count, stats_before.block_count);
        prop_assert_eq!(stats_after.used_bytes, stats_before.used_bytes);
        prop_assert_eq!(stats_after.allocated_blocks, 0);
    }

    #[test]
    fn fixed_memory_never_allocates(
        capacity in 1usize..4096,
        sizes in size_list(1024, 32),
    ) {
        let allocator = CountingAllocator::new();
        let ledger = allocator.ledger();
        let mut backing = vec![0u8; capacity];
        let config = ArenaConfig::new().with_growable(false);
        let mut arena = Arena::with_allocator(config, allocator).unwrap();
        arena.reserve_from(&mut backing);

        for &size in &sizes {
            let (block, used) = position(&arena);
            let fits = used + size <= capacity;
            let result = arena.alloc(size);
            prop_assert_eq!(result.is_ok(), fits);
            if !fits {
                prop_assert_eq!(position(&arena), (block, used));
            }
        }
        drop(arena);
        prop_assert_eq!(ledger.allocations(), 0);
        prop_assert_eq!(ledger.releases(), 0);
    }

    #[test]
    fn free_returns_to_built_in_state(sizes in size_list(40_000, 20), small in 1usize..1024) {
        let allocator = CountingAllocator::new();
        let ledger = allocator.ledger();
        let config = ArenaConfig::new().with_min_block_size(4096);
        let mut arena = Arena::with_allocator(config, allocator).unwrap();
        for &size in &sizes {
            arena.alloc(size).unwrap();
        }
        arena.free();
        prop_assert!(ledger.balanced());

        let calls = ledger.allocations();
        let handle = arena.alloc(small).unwrap();
        prop_assert_eq!(ledger.allocations(), calls);
        prop_assert_eq!(
            arena.block(handle.block()).unwrap().origin(),
            BlockOrigin::BuiltIn
        );
    }

    #[test]
    fn fences_survive_distant_region_end(
        kept in size_list(3000, 6),
        scratch in size_list(20_000, 12),
    ) {
        let mut arena = Arena::new(ArenaConfig::new().with_min_block_size(4096)).unwrap();
        let fences: Vec<_> = kept
            .iter()
            .enumerate()
            .map(|(i, &len)| {
                let handle = arena.alloc(len).unwrap();
                fill_fence(arena.get_mut(&handle).unwrap(), i as u8);
                handle
            })
            .collect();

        let mark = arena.begin_region();
        for (i, &len) in scratch.iter().enumerate() {
            let handle = arena.alloc(len).unwrap();
            fill_fence(arena.get_mut(&handle).unwrap(), 200u8.wrapping_add(i as u8));
        }
        arena.end_region(mark);

        for (i, handle) in fences.iter().enumerate() {
            prop_assert!(fence_intact(arena.get(handle).unwrap(), i as u8));
        }
    }

    #[test]
    fn every_block_taken_is_returned(sizes in size_list(3 * BUILT_IN_BYTES, 30)) {
        let allocator = CountingAllocator::new();
        let ledger = allocator.ledger();
        {
            let config = ArenaConfig::new().with_min_block_size(8192);
            let mut arena = Arena::with_allocator(config, allocator).unwrap();
            for &size in &sizes {
                arena.alloc(size).unwrap();
            }
            prop_assert_eq!(arena.stats().allocated_blocks, ledger.allocations());
        }
        prop_assert!(ledger.balanced());
    }
}
