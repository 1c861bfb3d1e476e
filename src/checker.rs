use crate::block::{Block, Header};
use crate::constants::{ALIGNMENT, DSIZE, WSIZE};
use crate::free_block::FreeBlock;
use crate::heap::Heap;
use crate::seg_lists::SegLists;
use crate::size_class::SizeClass;
use crate::store::HeapStore;
use core::fmt;
use std::collections::BTreeSet;

/// One broken heap invariant. Blocks are identified by payload address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    Uninitialized,
    BadPrologue { header: u32 },
    TagMismatch { block: usize, header: u32, footer: u32 },
    Misaligned { block: usize },
    OutOfHeap { block: usize },
    ZeroSizeBlock { block: usize },
    BadEpilogue { block: usize },
    Uncoalesced { block: usize },
    AllocatedInList { block: usize, class: SizeClass },
    WrongClass { block: usize, size: usize, class: SizeClass },
    BrokenBackLink { block: usize, class: SizeClass },
    Unsorted { block: usize, class: SizeClass },
    ListCycle { class: SizeClass },
    Unlisted { free: usize, listed: usize },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "heap not initialized"),
            Self::BadPrologue { header } => write!(f, "corrupted prologue tag {header:#x}"),
            Self::TagMismatch { block, header, footer } => write!(
                f,
                "block {block:#x}: header {header:#x} differs from footer {footer:#x}"
            ),
            Self::Misaligned { block } => write!(f, "block {block:#x} not aligned"),
            Self::OutOfHeap { block } => write!(f, "block {block:#x} not in heap"),
            Self::ZeroSizeBlock { block } => write!(f, "block {block:#x} has size 0"),
            Self::BadEpilogue { block } => {
                write!(f, "epilogue {block:#x} not at the end of the heap")
            }
            Self::Uncoalesced { block } => write!(f, "free block {block:#x} not coalesced"),
            Self::AllocatedInList { block, class } => {
                write!(f, "allocated block {block:#x} in list {}", class.index())
            }
            Self::WrongClass { block, size, class } => write!(
                f,
                "block {block:#x} of size {size} in wrong list {}",
                class.index()
            ),
            Self::BrokenBackLink { block, class } => write!(
                f,
                "block {block:#x} in list {} has a stale previous link",
                class.index()
            ),
            Self::Unsorted { block, class } => write!(
                f,
                "block {block:#x} out of size order in list {}",
                class.index()
            ),
            Self::ListCycle { class } => write!(f, "list {} does not terminate", class.index()),
            Self::Unlisted { free, listed } => {
                write!(f, "{free} free blocks in heap but {listed} in lists")
            }
        }
    }
}

/// Result of one heap check, tagged with the caller's line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReport {
    pub line: u32,
    pub violations: Vec<Violation>,
}

impl CheckReport {
    pub fn is_ok(&self) -> bool {
        self.violations.is_empty()
    }
}

impl fmt::Display for CheckReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ok() {
            return write!(f, "line {}: heap consistent", self.line);
        }

        for (i, violation) in self.violations.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "line {}: {}", self.line, violation)?;
        }

        Ok(())
    }
}

/// Checks a heap, capturing the call-site line.
#[macro_export]
macro_rules! check_heap {
    ($heap:expr) => {
        $heap.check_heap(line!())
    };
}

impl<S: HeapStore> Heap<S> {
    /// Walks every block and every free list and reports what is broken.
    ///
    /// Never mutates the heap; meant for tests and debugging, not for the
    /// allocation path.
    pub fn check_heap(&self, line: u32) -> CheckReport {
        let mut violations = vec![];

        match self.lists {
            Some(lists) => unsafe {
                let free = self.check_blocks(&lists, &mut violations);
                let listed = self.check_lists(&lists, &free, &mut violations);

                if free.len() != listed {
                    violations.push(Violation::Unlisted { free: free.len(), listed });
                }
            },
            None => violations.push(Violation::Uninitialized),
        }

        for violation in &violations {
            log::error!("line {}: {}", line, violation);
        }

        CheckReport { line, violations }
    }

    fn in_heap(&self, ptr: *const u8) -> bool {
        self.store.heap_lo() <= ptr && ptr <= self.store.heap_hi()
    }

    /// A block whose preceding footer, header and first two payload words
    /// can be read.
    fn block_in_heap(&self, block: Block) -> bool {
        self.in_heap(block.as_ptr().wrapping_sub(DSIZE))
            && self.in_heap(block.as_ptr().wrapping_add(DSIZE - 1))
    }

    /// Physical walk from the prologue to the epilogue. Returns the payload
    /// addresses of the free blocks seen, in ascending order.
    unsafe fn check_blocks(&self, lists: &SegLists, violations: &mut Vec<Violation>) -> Vec<usize> {
        let prologue = lists.origin().prologue();
        let prologue_tag = Header::new(DSIZE, true);
        let mut free = vec![];

        if prologue.header() != prologue_tag || prologue.footer() != prologue_tag {
            violations.push(Violation::BadPrologue {
                header: prologue.header().into_raw(),
            });
            return free;
        }

        let mut prev_free = false;
        let mut block = prologue.next();

        loop {
            let addr = block.addr();

            if !self.in_heap(block.as_ptr().wrapping_sub(WSIZE)) {
                violations.push(Violation::OutOfHeap { block: addr });
                break;
            }

            let header = block.header();

            if header == Header::EPILOGUE {
                // the epilogue header is the last word of the heap
                if block.as_ptr().wrapping_sub(1) as *const u8 != self.store.heap_hi() {
                    violations.push(Violation::BadEpilogue { block: addr });
                }
                break;
            }

            if header.size() == 0 {
                violations.push(Violation::ZeroSizeBlock { block: addr });
                break;
            }

            if addr % ALIGNMENT != 0 {
                violations.push(Violation::Misaligned { block: addr });
            }

            // the footer is the furthest byte a walk would read
            if !self.in_heap(block.as_ptr().wrapping_add(header.size() - WSIZE - 1)) {
                violations.push(Violation::OutOfHeap { block: addr });
                break;
            }

            let footer = block.footer();

            if header != footer {
                violations.push(Violation::TagMismatch {
                    block: addr,
                    header: header.into_raw(),
                    footer: footer.into_raw(),
                });
            }

            if !header.is_allocated() {
                free.push(addr);

                if prev_free {
                    violations.push(Violation::Uncoalesced { block: addr });
                }
            }

            prev_free = !header.is_allocated();
            block = block.next();
        }

        free
    }

    /// Walks every class list. Returns the number of listed blocks.
    ///
    /// Neighbours count as free only if the physical walk saw them as free
    /// blocks, so a corrupted tag never leads the check outside the block
    /// area.
    unsafe fn check_lists(
        &self,
        lists: &SegLists,
        free: &[usize],
        violations: &mut Vec<Violation>,
    ) -> usize {
        let origin = lists.origin();
        let mut listed = 0;

        for class in SizeClass::all() {
            let mut seen = BTreeSet::new();
            let mut prev: Option<FreeBlock> = None;
            let mut next = lists.head_offset(class).map(|offset| origin.resolve(offset));

            while let Some(block) = next {
                let addr = block.addr();

                if !seen.insert(addr) {
                    violations.push(Violation::ListCycle { class });
                    break;
                }

                if !self.block_in_heap(block) {
                    violations.push(Violation::OutOfHeap { block: addr });
                    break;
                }

                let Some(node) = FreeBlock::new(block) else {
                    violations.push(Violation::AllocatedInList { block: addr, class });
                    break;
                };

                listed += 1;

                let size = node.size();
                let neighbours = [
                    addr.wrapping_sub(block.prev_footer().size()),
                    addr.wrapping_add(size),
                ];

                if neighbours
                    .iter()
                    .any(|&n| n != addr && free.binary_search(&n).is_ok())
                {
                    violations.push(Violation::Uncoalesced { block: addr });
                }

                if !class.contains(size) {
                    violations.push(Violation::WrongClass { block: addr, size, class });
                }

                if node.prev_offset() != prev.and_then(|p| origin.offset_of(p.block())) {
                    violations.push(Violation::BrokenBackLink { block: addr, class });
                }

                if let Some(p) = prev {
                    if p.size() > size {
                        violations.push(Violation::Unsorted { block: addr, class });
                    }
                }

                prev = Some(node);
                next = node.next_offset().map(|offset| origin.resolve(offset));
            }
        }

        listed
    }
}
