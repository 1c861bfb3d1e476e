use crate::block::{Block, Header};
use crate::coalesce::coalesce;
use crate::constants::{align, DSIZE, MIN_BLOCK_SIZE, SPLIT_MIN};
use crate::error::AllocError;
use crate::free_block::FreeBlock;
use crate::heap::Heap;
use crate::seg_lists::SegLists;
use crate::store::HeapStore;

impl<S: HeapStore> Heap<S> {
    /// Block size needed for a `size`-byte payload: header and footer added,
    /// rounded to the alignment, never below the minimum block.
    pub(crate) fn adjust_size(size: usize) -> Result<usize, AllocError> {
        let asize = size
            .checked_add(DSIZE)
            .and_then(align)
            .ok_or(AllocError::AllocOverflow)?
            .max(MIN_BLOCK_SIZE);

        if asize > u32::MAX as usize {
            return Err(AllocError::AllocOverflow);
        }

        Ok(asize)
    }

    /// Grows the heap by at least `size` bytes, turning the new space into a
    /// free block merged with a free tail block, if any.
    ///
    /// # Safety
    ///
    /// `lists` must be the directory of this initialized heap.
    pub(crate) unsafe fn extend_heap(
        &mut self,
        lists: &SegLists,
        size: usize,
    ) -> Result<FreeBlock, AllocError> {
        let asize = align(size).ok_or(AllocError::AllocOverflow)?;

        // every block must stay reachable through a 32-bit offset
        let fits = self
            .store
            .heap_size()
            .checked_add(asize)
            .is_some_and(|total| total <= u32::MAX as usize);

        if !fits {
            log::warn!("heap extension of {} bytes exceeds the offset range", asize);
            return Err(AllocError::OOM);
        }

        // the old epilogue header becomes the new block's header
        let block = Block::new(self.store.sbrk(asize)?);

        block.write_tags(asize, false);
        block.next().write_header(Header::EPILOGUE);

        let free = FreeBlock::new_unchecked(block);
        lists.insert(free);

        log::debug!("heap extended by {} bytes at {:p}", asize, block.as_ptr());

        Ok(coalesce(lists, free))
    }

    /// Allocates `asize` bytes out of `block`, splitting off the remainder
    /// unless it would be smaller than a useful block.
    ///
    /// # Safety
    ///
    /// `block` must be listed in `lists` and hold at least `asize` bytes.
    pub(crate) unsafe fn place(lists: &SegLists, block: FreeBlock, asize: usize) -> Block {
        let size = block.size();
        let remainder = size - asize;

        lists.remove(block);

        let block = block.block();

        if remainder < SPLIT_MIN {
            block.write_tags(size, true);
        } else {
            block.write_tags(asize, true);

            let rest = block.next();
            rest.write_tags(remainder, false);
            lists.insert(FreeBlock::new_unchecked(rest));
        }

        block
    }
}
