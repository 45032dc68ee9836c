//! Arena configuration parameters.

use crate::error::ArenaError;

/// Configuration for a block-chained arena.
///
/// Controls growth sizing, offset alignment and whether the arena may
/// reach for heap memory once its built-in buffer is exhausted.
/// Validated at construction; all values are immutable after creation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArenaConfig {
    /// Minimum size in bytes of every block the arena grows into.
    ///
    /// Requests larger than this get a block sized exactly to the request.
    /// Default: 65_536 (64 KiB). Must be non-zero.
    pub min_block_size: usize,

    /// Start offsets inside a block are rounded up to a multiple of this.
    ///
    /// Default: 1 (tightly packed). Must be a power of two no larger
    /// than [`ArenaConfig::MAX_ALIGNMENT`].
    pub alignment: usize,

    /// Fall back to [`HeapAllocator`](crate::allocator::HeapAllocator)
    /// when no custom allocator is supplied.
    ///
    /// With this disabled and no custom allocator, the arena only ever
    /// serves memory from its built-in buffer and caller-attached blocks.
    pub heap_fallback: bool,

    /// Whether the arena may create new blocks when the current one is full.
    pub growable: bool,
}

impl ArenaConfig {
    /// Default growth size: 64 KiB.
    pub const DEFAULT_MIN_BLOCK_SIZE: usize = 64 * 1024;

    /// Default offset alignment.
    pub const DEFAULT_ALIGNMENT: usize = 1;

    /// Largest accepted alignment.
    pub const MAX_ALIGNMENT: usize = 4096;

    /// Create a config with default values.
    pub fn new() -> Self {
        Self {
            min_block_size: Self::DEFAULT_MIN_BLOCK_SIZE,
            alignment: Self::DEFAULT_ALIGNMENT,
            heap_fallback: true,
            growable: true,
        }
    }

    /// Set the minimum growth block size.
    pub fn with_min_block_size(mut self, bytes: usize) -> Self {
        self.min_block_size = bytes;
        self
    }

    /// Set the offset alignment.
    pub fn with_alignment(mut self, alignment: usize) -> Self {
        self.alignment = alignment;
        self
    }

    /// Enable or disable the default heap fallback.
    pub fn with_heap_fallback(mut self, enabled: bool) -> Self {
        self.heap_fallback = enabled;
        self
    }

    /// Enable or disable growth into new blocks.
    pub fn with_growable(mut self, growable: bool) -> Self {
        self.growable = growable;
        self
    }

    /// Check the documented constraints on every field.
    pub fn validate(&self) -> Result<(), ArenaError> {
        if self.min_block_size == 0 {
            return Err(ArenaError::InvalidConfig {
                reason: "min_block_size must be non-zero".into(),
            });
        }
        if !self.alignment.is_power_of_two() || self.alignment > Self::MAX_ALIGNMENT {
            return Err(ArenaError::InvalidConfig {
                reason: format!(
                    "alignment must be a power of two <= {} (got {})",
                    Self::MAX_ALIGNMENT,
                    self.alignment,
                ),
            });
        }
        Ok(())
    }
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self::new()
    }
}
