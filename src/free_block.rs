use crate::block::Block;
use crate::constants::WSIZE;
use core::num::NonZeroU32;
use core::ptr::NonNull;

/// A heap-relative reference to a block: its byte distance from the origin.
///
/// Stored as a raw `u32` inside free blocks, where 0 means no link.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Offset(NonZeroU32);

impl Offset {
    pub fn from_raw(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }

    pub fn into_raw(offset: Option<Self>) -> u32 {
        offset.map_or(0, |offset| offset.0.get())
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }
}

/// The fixed address every [`Offset`] is measured from.
///
/// No block payload can start at the origin itself, which keeps 0 free to
/// act as the null link.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Origin(NonNull<u8>);

impl Origin {
    pub fn new(ptr: NonNull<u8>) -> Self {
        Self(ptr)
    }

    /// The prologue block, whose payload the origin points at.
    pub fn prologue(self) -> Block {
        Block::new(self.0)
    }

    /// # Safety
    ///
    /// `offset` must have been produced by [`Origin::offset_of`] on this origin.
    pub unsafe fn resolve(self, offset: Offset) -> Block {
        Block::new(NonNull::new_unchecked(self.0.as_ptr().add(offset.get() as usize)))
    }

    pub fn offset_of(self, block: Block) -> Option<Offset> {
        let distance = block.addr().checked_sub(self.0.as_ptr() as usize)?;

        debug_assert!(distance <= u32::MAX as usize, "block {:p} out of offset range", block.as_ptr());

        u32::try_from(distance).ok().and_then(Offset::from_raw)
    }

    fn encode(self, block: Option<FreeBlock>) -> u32 {
        Offset::into_raw(block.and_then(|free| self.offset_of(free.block())))
    }
}

/// A block known to be free, whose first two payload words are list links.
///
/// Link fields only exist while the block is free, so they are reachable only
/// through this view.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FreeBlock(Block);

impl FreeBlock {
    /// Views `block` as free if its header says so.
    ///
    /// # Safety
    ///
    /// `block` must lie inside an initialized heap.
    pub unsafe fn new(block: Block) -> Option<Self> {
        (!block.is_allocated()).then_some(Self(block))
    }

    /// # Safety
    ///
    /// `block` must be free, or about to be marked free before its size or
    /// links are relied on.
    pub unsafe fn new_unchecked(block: Block) -> Self {
        Self(block)
    }

    pub fn block(self) -> Block {
        self.0
    }

    pub unsafe fn size(self) -> usize {
        self.0.size()
    }

    fn prev_link(self) -> *mut u32 {
        self.0.as_ptr().cast()
    }

    fn next_link(self) -> *mut u32 {
        self.0.as_ptr().wrapping_add(WSIZE).cast()
    }

    pub unsafe fn prev_offset(self) -> Option<Offset> {
        Offset::from_raw(self.prev_link().read())
    }

    pub unsafe fn next_offset(self) -> Option<Offset> {
        Offset::from_raw(self.next_link().read())
    }

    pub unsafe fn prev(self, origin: Origin) -> Option<FreeBlock> {
        self.prev_offset()
            .map(|offset| FreeBlock(origin.resolve(offset)))
    }

    pub unsafe fn next(self, origin: Origin) -> Option<FreeBlock> {
        self.next_offset()
            .map(|offset| FreeBlock(origin.resolve(offset)))
    }

    pub unsafe fn set_prev(self, origin: Origin, prev: Option<FreeBlock>) {
        self.prev_link().write(origin.encode(prev))
    }

    pub unsafe fn set_next(self, origin: Origin, next: Option<FreeBlock>) {
        self.next_link().write(origin.encode(next))
    }
}
