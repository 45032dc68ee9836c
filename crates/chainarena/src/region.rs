//! Scoped save/restore regions over an arena.
//!
//! A region captures the arena's current block and its `used` cursor.
//! Ending the region destroys every block linked after the capture and
//! rewinds the captured block, so everything allocated inside the region
//! is discarded in one step.
//!
//! Two ways to use them:
//!
//! - [`Arena::scoped_region`] returns a [`ScopedRegion`] guard that ends
//!   the region when dropped, on every exit path. Nested guards borrow
//!   their parent, so the borrow checker enforces stack order.
//! - [`Arena::begin_region`] / [`Arena::end_region`] hand out a plain
//!   [`RegionMark`]. Stack order is checked at runtime and violations
//!   panic.

use std::fmt;
use std::ops::{Deref, DerefMut};

use crate::arena::Arena;
use crate::block::BlockId;

/// Saved arena position returned by [`Arena::begin_region`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[must_use = "a region mark must be passed to Arena::end_region"]
pub struct RegionMark {
    block: BlockId,
    used: usize,
    top: BlockId,
    depth: u32,
}

impl RegionMark {
    /// The block that was current when the region began.
    pub fn block(&self) -> BlockId {
        self.block
    }

    /// That block's `used` cursor at the time.
    pub fn used(&self) -> usize {
        self.used
    }

    /// The chain's oldest block at the time.
    pub fn top_block(&self) -> BlockId {
        self.top
    }

    /// Nesting depth of this region, starting at 1.
    pub fn depth(&self) -> u32 {
        self.depth
    }
}

/// Ways a region can be ended incorrectly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum RegionFault {
    OutOfOrder { open: u32, ended: u32 },
    BlockReleased { block: BlockId },
}

impl fmt::Display for RegionFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfOrder { open, ended } => write!(
                f,
                "arena region ended out of order: {open} open, ending depth {ended}"
            ),
            Self::BlockReleased { block } => write!(
                f,
                "arena region ended after its block {block} was released"
            ),
        }
    }
}

impl<'m> Arena<'m> {
    /// Save the current arena position.
    ///
    /// Every region must be ended with [`end_region`](Arena::end_region),
    /// innermost first.
    pub fn begin_region(&mut self) -> RegionMark {
        let block = self.current_block();
        let used = self
            .block(block)
            .map(|b| b.used())
            .unwrap_or_default();
        self.region_depth += 1;
        RegionMark {
            block,
            used,
            top: self.top_block(),
            depth: self.region_depth,
        }
    }

    /// Roll the arena back to `mark`.
    ///
    /// Blocks linked after the mark are destroyed; the marked block becomes
    /// current again with its saved `used` cursor.
    ///
    /// # Panics
    ///
    /// Panics if `mark` is not the innermost open region, or if its block
    /// was released while the region was open.
    pub fn end_region(&mut self, mark: RegionMark) {
        if let Err(fault) = self.try_end_region(mark) {
            panic!("{fault}");
        }
    }

    fn try_end_region(&mut self, mark: RegionMark) -> Result<(), RegionFault> {
        if mark.depth != self.region_depth {
            return Err(RegionFault::OutOfOrder {
                open: self.region_depth,
                ended: mark.depth,
            });
        }
        if !self.contains_block(mark.block) {
            return Err(RegionFault::BlockReleased { block: mark.block });
        }
        let released = self.rollback_to(mark.block, mark.used);
        self.region_depth -= 1;
        if self.top_block() != mark.top {
            tracing::debug!(
                was = %mark.top,
                now = %self.top_block(),
                "arena top block changed inside region"
            );
        }
        tracing::debug!(released, depth = mark.depth, "ended arena region");
        Ok(())
    }

    /// Begin a region that ends when the returned guard is dropped.
    ///
    /// The guard dereferences to the arena, so allocate through it:
    ///
    /// ```
    /// let mut arena = chainarena::Arena::default();
    /// let before = arena.stats().used_bytes;
    /// {
    ///     let mut scratch = arena.scoped_region();
    ///     scratch.alloc(100_000).unwrap();
    /// }
    /// assert_eq!(arena.stats().used_bytes, before);
    /// ```
    pub fn scoped_region(&mut self) -> ScopedRegion<'_, 'm> {
        let mark = self.begin_region();
        ScopedRegion { arena: self, mark }
    }

    /// Run `f` inside a scoped region and return its result.
    ///
    /// The region ends even if `f` panics.
    pub fn with_region<R>(&mut self, f: impl FnOnce(&mut Arena<'m>) -> R) -> R {
        let mut region = self.scoped_region();
        f(&mut region)
    }
}

/// Guard returned by [`Arena::scoped_region`].
#[must_use = "dropping the guard immediately ends the region"]
pub struct ScopedRegion<'a, 'm> {
    arena: &'a mut Arena<'m>,
    mark: RegionMark,
}

impl ScopedRegion<'_, '_> {
    /// The position this region will roll back to.
    pub fn mark(&self) -> RegionMark {
        self.mark
    }
}

impl<'m> Deref for ScopedRegion<'_, 'm> {
    type Target = Arena<'m>;

    fn deref(&self) -> &Self::Target {
        &*self.arena
    }
}

impl<'m> DerefMut for ScopedRegion<'_, 'm> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.arena
    }
}

impl Drop for ScopedRegion<'_, '_> {
    fn drop(&mut self) {
        if let Err(fault) = self.arena.try_end_region(self.mark) {
            if std::thread::panicking() {
                tracing::error!(%fault, "arena region misuse during unwinding");
            } else {
                panic!("{fault}");
            }
        }
    }
}
