use crate::free_block::FreeBlock;
use crate::seg_lists::SegLists;

/// Merges a listed free block with whichever physical neighbours are free
/// and returns the block that now covers it.
///
/// # Safety
///
/// `block` must be free and linked into `lists`, and both neighbours must be
/// valid blocks (the prologue and epilogue guarantee this at the heap edges).
pub unsafe fn coalesce(lists: &SegLists, block: FreeBlock) -> FreeBlock {
    let prev = FreeBlock::new(block.block().prev());
    let next = FreeBlock::new(block.block().next());

    let (start, size) = match (prev, next) {
        (None, None) => return block,
        (None, Some(next)) => {
            lists.remove(block);
            lists.remove(next);

            (block, block.size() + next.size())
        }
        (Some(prev), None) => {
            lists.remove(block);
            lists.remove(prev);

            (prev, prev.size() + block.size())
        }
        (Some(prev), Some(next)) => {
            lists.remove(block);
            lists.remove(prev);
            lists.remove(next);

            (prev, prev.size() + block.size() + next.size())
        }
    };

    start.block().write_tags(size, false);
    lists.insert(start);

    start
}
