use crate::free_block::{FreeBlock, Offset, Origin};
use crate::size_class::SizeClass;
use core::ptr::NonNull;

/// The size-class directory: one list head per class, stored at the base of
/// the heap as raw offsets.
///
/// Each list is doubly linked through its blocks and kept in ascending size
/// order, so the first block that fits is the smallest fitting block of its
/// class.
#[derive(Clone, Copy, Debug)]
pub struct SegLists {
    heads: NonNull<u32>,
    origin: Origin,
}

impl SegLists {
    /// # Safety
    ///
    /// `heads` must point to `SizeClass::COUNT` writable, aligned words that
    /// outlive the returned value.
    pub unsafe fn new(heads: NonNull<u32>, origin: Origin) -> Self {
        Self { heads, origin }
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub unsafe fn clear(&self) {
        for class in SizeClass::all() {
            self.set_head(class, None);
        }
    }

    fn slot(&self, class: SizeClass) -> *mut u32 {
        self.heads.as_ptr().wrapping_add(class.index())
    }

    pub unsafe fn head_offset(&self, class: SizeClass) -> Option<Offset> {
        Offset::from_raw(self.slot(class).read())
    }

    pub unsafe fn head(&self, class: SizeClass) -> Option<FreeBlock> {
        self.head_offset(class)
            .map(|offset| FreeBlock::new_unchecked(self.origin.resolve(offset)))
    }

    pub(crate) unsafe fn set_head(&self, class: SizeClass, head: Option<FreeBlock>) {
        let offset = head.and_then(|block| self.origin.offset_of(block.block()));

        self.slot(class).write(Offset::into_raw(offset))
    }

    /// Links `block` into its class in front of the first block at least as
    /// large.
    pub unsafe fn insert(&self, block: FreeBlock) {
        let origin = self.origin;
        let size = block.size();
        let class = SizeClass::get_for_size(size);

        match self.head(class) {
            None => {
                block.set_prev(origin, None);
                block.set_next(origin, None);
                self.set_head(class, Some(block));
            }
            Some(head) if size <= head.size() => {
                block.set_prev(origin, None);
                block.set_next(origin, Some(head));
                head.set_prev(origin, Some(block));
                self.set_head(class, Some(block));
            }
            Some(head) => {
                let mut prev = head;
                let mut next = head.next(origin);

                while let Some(node) = next {
                    if size <= node.size() {
                        break;
                    }

                    prev = node;
                    next = node.next(origin);
                }

                block.set_prev(origin, Some(prev));
                block.set_next(origin, next);
                prev.set_next(origin, Some(block));

                if let Some(node) = next {
                    node.set_prev(origin, Some(block));
                }
            }
        }
    }

    /// Unlinks `block` from the class its current size selects.
    pub unsafe fn remove(&self, block: FreeBlock) {
        let origin = self.origin;
        let class = SizeClass::get_for_size(block.size());
        let prev = block.prev(origin);
        let next = block.next(origin);

        match prev {
            Some(node) => node.set_next(origin, next),
            None => self.set_head(class, next),
        }

        if let Some(node) = next {
            node.set_prev(origin, prev);
        }
    }

    pub unsafe fn iter(&self, class: SizeClass) -> Iter {
        Iter {
            next: self.head(class),
            origin: self.origin,
        }
    }

    /// First fit over the lists from the class of `size` upward.
    pub unsafe fn find_fit(&self, size: usize) -> Option<FreeBlock> {
        SizeClass::get_for_size(size)
            .and_larger()
            .find_map(|class| self.iter(class).find(|block| block.size() >= size))
    }
}

pub struct Iter {
    next: Option<FreeBlock>,
    origin: Origin,
}

impl Iterator for Iter {
    type Item = FreeBlock;

    fn next(&mut self) -> Option<FreeBlock> {
        let current = self.next?;

        self.next = unsafe { current.next(self.origin) };

        Some(current)
    }
}
