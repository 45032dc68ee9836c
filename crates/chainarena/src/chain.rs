//! Slot-indexed block table forming the arena's block chain.
//!
//! Blocks are stored in a free-list-backed slot table and linked through
//! [`BlockId`] back-references, newest first. Slot 0 is reserved for the
//! arena's built-in block. Removing the last block re-attaches a fresh
//! built-in block, so the chain is never empty.

use smallvec::SmallVec;

use crate::block::{Block, BlockId};

const BUILT_IN_SLOT: u32 = 0;

struct Slot<'m> {
    generation: u32,
    block: Option<Block<'m>>,
}

/// Singly linked stack of blocks with stable, generation-checked ids.
pub(crate) struct BlockChain<'m> {
    slots: SmallVec<[Slot<'m>; 4]>,
    /// Recycled slot indices (never contains the built-in slot).
    free_slots: SmallVec<[u32; 4]>,
    /// Newest block; allocations bump from here.
    current: BlockId,
    /// Oldest block on the chain.
    top: BlockId,
    len: usize,
    built_in_size: usize,
}

impl<'m> BlockChain<'m> {
    /// Create a chain holding only the built-in block.
    pub(crate) fn new(built_in_size: usize) -> Self {
        let mut slots = SmallVec::new();
        slots.push(Slot {
            generation: 0,
            block: Some(Block::built_in(built_in_size)),
        });
        let id = BlockId::new(BUILT_IN_SLOT, 0);
        Self {
            slots,
            free_slots: SmallVec::new(),
            current: id,
            top: id,
            len: 1,
            built_in_size,
        }
    }

    pub(crate) fn current(&self) -> BlockId {
        self.current
    }

    pub(crate) fn top(&self) -> BlockId {
        self.top
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// True if `id` names the built-in slot, regardless of generation.
    pub(crate) fn is_built_in(&self, id: BlockId) -> bool {
        id.index == BUILT_IN_SLOT
    }

    pub(crate) fn get(&self, id: BlockId) -> Option<&Block<'m>> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.block.as_ref()
    }

    pub(crate) fn get_mut(&mut self, id: BlockId) -> Option<&mut Block<'m>> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.block.as_mut()
    }

    /// Whether `id` is live. Every live block is on the chain.
    pub(crate) fn contains(&self, id: BlockId) -> bool {
        self.get(id).is_some()
    }

    pub(crate) fn current_block(&self) -> &Block<'m> {
        self.get(self.current)
            .expect("current block id always refers to a live block")
    }

    pub(crate) fn current_block_mut(&mut self) -> &mut Block<'m> {
        let id = self.current;
        self.get_mut(id)
            .expect("current block id always refers to a live block")
    }

    /// Link `block` as the new current block.
    pub(crate) fn push(&mut self, mut block: Block<'m>) -> BlockId {
        block.set_prev(Some(self.current));
        let id = match self.free_slots.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.block = Some(block);
                BlockId::new(index, slot.generation)
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    block: Some(block),
                });
                BlockId::new(index, 0)
            }
        };
        self.current = id;
        self.len += 1;
        id
    }

    /// Unlink `id` from anywhere in the chain and return its block.
    ///
    /// The newer neighbour (if any) is relinked to the removed block's
    /// predecessor. Returns `None` for stale or unknown ids.
    pub(crate) fn remove(&mut self, id: BlockId) -> Option<Block<'m>> {
        if !self.contains(id) {
            return None;
        }

        // The block whose `prev` points at `id`.
        let mut successor = None;
        let mut cursor = Some(self.current);
        while let Some(at) = cursor {
            if at == id {
                break;
            }
            successor = Some(at);
            cursor = self.get(at).and_then(Block::prev);
        }

        let slot = &mut self.slots[id.index as usize];
        let block = slot.block.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        if id.index != BUILT_IN_SLOT {
            self.free_slots.push(id.index);
        }
        self.len -= 1;

        let prev = block.prev();
        match successor {
            Some(newer) => {
                if let Some(newer_block) = self.get_mut(newer) {
                    newer_block.set_prev(prev);
                }
                if self.top == id {
                    self.top = newer;
                }
            }
            None => {
                if let Some(older) = prev {
                    self.current = older;
                }
            }
        }

        if self.len == 0 {
            self.bootstrap();
        }
        Some(block)
    }

    /// Remove every block newer than `id`, newest first.
    ///
    /// `id` must be live; it becomes the current block.
    pub(crate) fn truncate_to(&mut self, id: BlockId, mut release: impl FnMut(Block<'m>)) {
        debug_assert!(self.contains(id), "truncate_to target must be live");
        while self.current != id {
            let newest = self.current;
            match self.remove(newest) {
                Some(block) => release(block),
                None => break,
            }
        }
    }

    /// Remove every block, leaving a freshly bootstrapped built-in block.
    pub(crate) fn drain(&mut self, mut release: impl FnMut(Block<'m>)) {
        for _ in 0..self.len {
            let newest = self.current;
            if let Some(block) = self.remove(newest) {
                release(block);
            }
        }
    }

    /// Newest-to-oldest walk over the chain.
    pub(crate) fn iter(&self) -> ChainIter<'_, 'm> {
        ChainIter {
            chain: self,
            cursor: Some(self.current),
        }
    }

    pub(crate) fn iter_mut_blocks(&mut self) -> impl Iterator<Item = &mut Block<'m>> {
        self.slots.iter_mut().filter_map(|slot| slot.block.as_mut())
    }

    /// Re-attach the built-in block as the sole, empty block.
    fn bootstrap(&mut self) {
        let slot = &mut self.slots[BUILT_IN_SLOT as usize];
        if slot.block.is_some() {
            slot.generation = slot.generation.wrapping_add(1);
        }
        slot.block = Some(Block::built_in(self.built_in_size));
        let id = BlockId::new(BUILT_IN_SLOT, slot.generation);
        self.current = id;
        self.top = id;
        self.len = 1;
    }
}

/// Iterator returned by [`BlockChain::iter`].
pub(crate) struct ChainIter<'c, 'm> {
    chain: &'c BlockChain<'m>,
    cursor: Option<BlockId>,
}

impl<'c, 'm> Iterator for ChainIter<'c, 'm> {
    type Item = (BlockId, &'c Block<'m>);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.cursor?;
        let block = self.chain.get(id)?;
        self.cursor = block.prev();
        Some((id, block))
    }
}
