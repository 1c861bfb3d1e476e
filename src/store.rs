use crate::constants::{ALIGNMENT, DEFAULT_CAPACITY};
use crate::error::AllocError;
use std::alloc::{alloc, dealloc, Layout};
use std::ptr::NonNull;

/// A linearly growing memory region the heap is carved from.
pub trait HeapStore {
    /// Extends the region by `incr` bytes and returns the start of the new
    /// bytes. On failure the region is left unchanged.
    fn sbrk(&mut self, incr: usize) -> Result<NonNull<u8>, AllocError>;

    /// First byte of the region.
    fn heap_lo(&self) -> *const u8;

    /// Last byte of the region, one below `heap_lo` while empty.
    fn heap_hi(&self) -> *const u8;

    fn heap_size(&self) -> usize;
}

/// A fixed-capacity region reserved up front, with a break moving through it.
pub struct ArenaStore {
    start: NonNull<u8>,
    layout: Layout,
    brk: usize,
}

impl ArenaStore {
    pub fn new() -> Result<Self, AllocError> {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Result<Self, AllocError> {
        // list links are 32-bit offsets into the region
        if capacity > u32::MAX as usize {
            return Err(AllocError::AllocOverflow);
        }

        let layout = Layout::from_size_align(capacity.max(ALIGNMENT), ALIGNMENT)?;
        let ptr = unsafe { alloc(layout) };
        let start = NonNull::new(ptr).ok_or(AllocError::OOM)?;

        Ok(Self {
            start,
            layout,
            brk: 0,
        })
    }

    pub fn capacity(&self) -> usize {
        self.layout.size()
    }

    /// Rewinds the break, handing back every byte of the region.
    pub fn reset(&mut self) {
        self.brk = 0;
    }
}

impl HeapStore for ArenaStore {
    fn sbrk(&mut self, incr: usize) -> Result<NonNull<u8>, AllocError> {
        let new_brk = self.brk.checked_add(incr).ok_or(AllocError::OOM)?;

        if new_brk > self.capacity() {
            log::warn!(
                "arena exhausted: {} bytes requested, {} of {} in use",
                incr,
                self.brk,
                self.capacity()
            );
            return Err(AllocError::OOM);
        }

        let old_brk = unsafe { NonNull::new_unchecked(self.start.as_ptr().add(self.brk)) };
        self.brk = new_brk;

        Ok(old_brk)
    }

    fn heap_lo(&self) -> *const u8 {
        self.start.as_ptr()
    }

    fn heap_hi(&self) -> *const u8 {
        self.start.as_ptr().wrapping_add(self.brk).wrapping_sub(1)
    }

    fn heap_size(&self) -> usize {
        self.brk
    }
}

impl Drop for ArenaStore {
    fn drop(&mut self) {
        unsafe { dealloc(self.start.as_ptr(), self.layout) }
    }
}
