use crate::constants::{DSIZE, WSIZE};
use core::ptr::NonNull;

/// A boundary tag: block size and allocated bit packed into one word.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Header(u32);

impl Header {
    pub const EPILOGUE: Header = Header(1);

    const ALLOC_BIT: u32 = 0x1;
    const SIZE_MASK: u32 = !0x7;

    pub fn new(size: usize, allocated: bool) -> Self {
        debug_assert!(size % 8 == 0, "block size {size} is not a multiple of 8");
        debug_assert!(size <= u32::MAX as usize, "block size {size} overflows a tag");

        Self(size as u32 | allocated as u32)
    }

    pub fn size(self) -> usize {
        (self.0 & Self::SIZE_MASK) as usize
    }

    pub fn is_allocated(self) -> bool {
        self.0 & Self::ALLOC_BIT != 0
    }

    pub fn into_raw(self) -> u32 {
        self.0
    }
}

/// A block, addressed by its payload pointer.
///
/// The header sits one word before the payload and the footer one double
/// word before the next block's payload. All accessors read heap memory and
/// are only sound on blocks inside an initialized heap.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Block(NonNull<u8>);

impl Block {
    pub fn new(payload: NonNull<u8>) -> Self {
        Self(payload)
    }

    pub fn from_ptr(ptr: *mut u8) -> Option<Self> {
        NonNull::new(ptr).map(Self)
    }

    pub fn as_ptr(self) -> *mut u8 {
        self.0.as_ptr()
    }

    pub fn addr(self) -> usize {
        self.0.as_ptr() as usize
    }

    fn header_ptr(self) -> *mut u32 {
        self.0.as_ptr().wrapping_sub(WSIZE).cast()
    }

    unsafe fn footer_ptr(self) -> *mut u32 {
        self.0.as_ptr().add(self.size()).wrapping_sub(DSIZE).cast()
    }

    pub unsafe fn header(self) -> Header {
        Header(self.header_ptr().read())
    }

    pub unsafe fn footer(self) -> Header {
        Header(self.footer_ptr().read())
    }

    pub unsafe fn size(self) -> usize {
        self.header().size()
    }

    pub unsafe fn is_allocated(self) -> bool {
        self.header().is_allocated()
    }

    /// Payload bytes a caller may use.
    pub unsafe fn usable_size(self) -> usize {
        self.size() - DSIZE
    }

    pub unsafe fn write_header(self, header: Header) {
        self.header_ptr().write(header.0)
    }

    /// Writes the footer at the position implied by the current header.
    pub unsafe fn write_footer(self, footer: Header) {
        self.footer_ptr().write(footer.0)
    }

    /// Writes matching header and footer.
    pub unsafe fn write_tags(self, size: usize, allocated: bool) {
        let tag = Header::new(size, allocated);

        self.write_header(tag);
        self.write_footer(tag);
    }

    /// The physically following block.
    pub unsafe fn next(self) -> Block {
        Block(NonNull::new_unchecked(self.0.as_ptr().add(self.size())))
    }

    /// Footer of the physically preceding block.
    pub unsafe fn prev_footer(self) -> Header {
        Header(self.0.as_ptr().sub(DSIZE).cast::<u32>().read())
    }

    /// The physically preceding block, found through its footer.
    pub unsafe fn prev(self) -> Block {
        Block(NonNull::new_unchecked(self.0.as_ptr().sub(self.prev_footer().size())))
    }
}
