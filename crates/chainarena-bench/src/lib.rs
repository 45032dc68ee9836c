//! Benchmark workloads for chainarena.
//!
//! - [`size_mix`]: deterministic request sizes skewed towards small
//!   allocations, with occasional block-sized outliers
//! - [`replay`]: run a size sequence against an arena

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use chainarena::{Arena, ArenaError};
use rand_chacha::rand_core::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// One in this many requests is an outlier of up to `max_len` bytes.
pub const OUTLIER_RATE: u32 = 64;

/// Upper bound of the common, small request sizes.
pub const SMALL_MAX: usize = 256;

/// Generate `count` request sizes from `seed`.
///
/// Most sizes fall in `1..=SMALL_MAX`; roughly one in [`OUTLIER_RATE`]
/// is drawn from `1..=max_len` instead.
pub fn size_mix(seed: u64, count: usize, max_len: usize) -> Vec<usize> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let max_len = max_len.max(1);
    (0..count)
        .map(|_| {
            let roll = rng.next_u32();
            let bound = if roll % OUTLIER_RATE == 0 {
                max_len
            } else {
                SMALL_MAX.min(max_len)
            };
            1 + (rng.next_u64() % bound as u64) as usize
        })
        .collect()
}

/// Allocate every size in `sizes` and return the total bytes requested.
pub fn replay(arena: &mut Arena<'_>, sizes: &[usize]) -> Result<usize, ArenaError> {
    let mut total = 0;
    for &len in sizes {
        arena.alloc(len)?;
        total += len;
    }
    Ok(total)
}
