use crate::block::{Block, Header};
use crate::coalesce::coalesce;
use crate::constants::{
    CHUNK_SIZE, DSIZE, EPILOGUE_WORD, INIT_WORDS, PAD_WORD, PROLOGUE_HEADER_WORD, PROLOGUE_WORD,
    WSIZE,
};
use crate::error::AllocError;
use crate::free_block::{FreeBlock, Origin};
use crate::seg_lists::SegLists;
use crate::store::{ArenaStore, HeapStore};
use std::ptr::{self, NonNull};

/// An allocator instance owning one growable heap.
///
/// The heap starts with the size-class directory, followed by an allocated
/// prologue, the blocks, and a zero-size allocated epilogue. It is set up on
/// first use.
pub struct Heap<S: HeapStore = ArenaStore> {
    pub(crate) store: S,
    pub(crate) lists: Option<SegLists>,
}

impl Heap<ArenaStore> {
    pub fn new() -> Result<Self, AllocError> {
        Ok(Self::with_store(ArenaStore::new()?))
    }

    pub fn with_capacity(capacity: usize) -> Result<Self, AllocError> {
        Ok(Self::with_store(ArenaStore::with_capacity(capacity)?))
    }
}

impl<S: HeapStore> Heap<S> {
    pub fn with_store(store: S) -> Self {
        Self { store, lists: None }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Bytes obtained from the backing store so far.
    pub fn size(&self) -> usize {
        self.store.heap_size()
    }

    pub fn is_initialized(&self) -> bool {
        self.lists.is_some()
    }

    /// Lays out the directory, prologue and epilogue, then grows the heap by
    /// one chunk.
    ///
    /// Does nothing on an initialized heap, except that a first chunk that
    /// could not be obtained before is requested again.
    pub fn init(&mut self) -> Result<(), AllocError> {
        let lists = self.ready()?;

        if self.store.heap_size() == INIT_WORDS * WSIZE {
            self.first_chunk(&lists)?;
        }

        Ok(())
    }

    pub(crate) fn ready(&mut self) -> Result<SegLists, AllocError> {
        if let Some(lists) = self.lists {
            return Ok(lists);
        }

        let base = self.store.sbrk(INIT_WORDS * WSIZE).map_err(|err| {
            log::warn!("heap initialization failed: {}", err);
            AllocError::InitFailed
        })?;

        let lists = unsafe {
            let word = |index: usize| base.as_ptr().cast::<u32>().add(index);

            word(PAD_WORD).write(0);
            word(PROLOGUE_HEADER_WORD).write(Header::new(DSIZE, true).into_raw());
            word(PROLOGUE_WORD).write(Header::new(DSIZE, true).into_raw());
            word(EPILOGUE_WORD).write(Header::EPILOGUE.into_raw());

            let origin = Origin::new(NonNull::new_unchecked(word(PROLOGUE_WORD).cast()));
            let lists = SegLists::new(base.cast(), origin);
            lists.clear();
            lists
        };

        // the prologue and epilogue stay valid even if the first chunk fails
        self.lists = Some(lists);

        log::debug!("heap initialized at {:p}", base.as_ptr());

        self.first_chunk(&lists)?;

        Ok(lists)
    }

    fn first_chunk(&mut self, lists: &SegLists) -> Result<(), AllocError> {
        unsafe { self.extend_heap(lists, CHUNK_SIZE) }
            .map(|_| ())
            .map_err(|err| {
                log::warn!("initial heap chunk unavailable: {}", err);
                AllocError::InitFailed
            })
    }

    /// Allocates at least `size` usable bytes, 8-byte aligned.
    ///
    /// A zero-byte request returns `Ok` with a null pointer, even on a heap
    /// that failed to initialize.
    pub fn try_malloc(&mut self, size: usize) -> Result<*mut u8, AllocError> {
        let ready = self.ready();

        if size == 0 {
            return Ok(ptr::null_mut());
        }

        let lists = ready?;

        let asize = Self::adjust_size(size)?;
        let block = unsafe {
            let fit = match lists.find_fit(asize) {
                Some(block) => block,
                None => self.extend_heap(&lists, asize.max(CHUNK_SIZE))?,
            };

            Self::place(&lists, fit, asize)
        };

        log::trace!("malloc({}) -> {:p} ({} byte block)", size, block.as_ptr(), asize);
        self.debug_check(line!());

        Ok(block.as_ptr())
    }

    pub fn malloc(&mut self, size: usize) -> *mut u8 {
        self.try_malloc(size).unwrap_or_else(|err| {
            log::warn!("malloc({}) failed: {}", size, err);
            ptr::null_mut()
        })
    }

    /// Returns a block to the heap. Null is ignored.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a live pointer returned by this heap.
    pub unsafe fn free(&mut self, ptr: *mut u8) {
        let lists = match self.ready() {
            Ok(lists) => lists,
            Err(err) => {
                log::warn!("free({:p}) on unusable heap: {}", ptr, err);
                return;
            }
        };

        let Some(block) = Block::from_ptr(ptr) else {
            return;
        };

        let size = block.size();

        debug_assert!(block.is_allocated(), "free({:p}): block is not allocated", ptr);

        block.write_tags(size, false);

        let free = FreeBlock::new_unchecked(block);
        lists.insert(free);
        coalesce(&lists, free);

        log::trace!("free({:p}) ({} byte block)", ptr, size);
        self.debug_check(line!());
    }

    /// Moves an allocation into a block of at least `size` usable bytes.
    ///
    /// A null `ptr` allocates; a zero `size` frees and returns null. The old
    /// contents are kept up to the smaller of the two usable sizes. The block
    /// is never grown in place.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a live pointer returned by this heap.
    pub unsafe fn try_realloc(&mut self, ptr: *mut u8, size: usize) -> Result<*mut u8, AllocError> {
        if size == 0 {
            self.free(ptr);
            return Ok(ptr::null_mut());
        }

        let Some(old) = Block::from_ptr(ptr) else {
            return self.try_malloc(size);
        };

        let new_ptr = self.try_malloc(size)?;
        let Some(new) = Block::from_ptr(new_ptr) else {
            return Ok(new_ptr);
        };

        let copied = old.usable_size().min(new.usable_size());
        ptr::copy_nonoverlapping(ptr, new_ptr, copied);

        self.free(ptr);

        log::trace!("realloc({:p}, {}) -> {:p} ({} bytes kept)", ptr, size, new_ptr, copied);

        Ok(new_ptr)
    }

    /// # Safety
    ///
    /// See [`Heap::try_realloc`].
    pub unsafe fn realloc(&mut self, ptr: *mut u8, size: usize) -> *mut u8 {
        self.try_realloc(ptr, size).unwrap_or_else(|err| {
            log::warn!("realloc({:p}, {}) failed: {}", ptr, size, err);
            ptr::null_mut()
        })
    }

    /// Allocates `count * size` bytes and zeroes the whole usable region.
    pub fn try_calloc(&mut self, count: usize, size: usize) -> Result<*mut u8, AllocError> {
        let bytes = count.checked_mul(size).ok_or(AllocError::AllocOverflow)?;
        let ptr = self.try_malloc(bytes)?;

        if let Some(block) = Block::from_ptr(ptr) {
            unsafe { ptr::write_bytes(ptr, 0, block.usable_size()) };
        }

        Ok(ptr)
    }

    pub fn calloc(&mut self, count: usize, size: usize) -> *mut u8 {
        self.try_calloc(count, size).unwrap_or_else(|err| {
            log::warn!("calloc({}, {}) failed: {}", count, size, err);
            ptr::null_mut()
        })
    }

    /// Usable bytes behind a live allocation, 0 for null.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a live pointer returned by this heap.
    pub unsafe fn usable_size(&self, ptr: *mut u8) -> usize {
        Block::from_ptr(ptr).map_or(0, |block| block.usable_size())
    }

    #[cfg(feature = "paranoid")]
    fn debug_check(&self, line: u32) {
        let report = self.check_heap(line);

        assert!(report.is_ok(), "{}", report);
    }

    #[cfg(not(feature = "paranoid"))]
    #[inline(always)]
    fn debug_check(&self, _line: u32) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::MIN_BLOCK_SIZE;

    #[test]
    fn lazy_init() {
        let mut heap = Heap::with_capacity(1 << 16).unwrap();

        assert!(!heap.is_initialized());
        assert_eq!(heap.size(), 0);

        let ptr = heap.malloc(1);

        assert!(!ptr.is_null());
        assert!(heap.is_initialized());
        assert_eq!(heap.size(), INIT_WORDS * WSIZE + CHUNK_SIZE);
    }

    #[test]
    fn init_is_idempotent() {
        let mut heap = Heap::with_capacity(1 << 16).unwrap();

        heap.init().unwrap();
        let size = heap.size();
        heap.init().unwrap();

        assert_eq!(heap.size(), size);
    }

    #[test]
    fn init_fails_without_room() {
        let mut heap = Heap::with_capacity(INIT_WORDS * WSIZE - 8).unwrap();

        assert_eq!(heap.init(), Err(AllocError::InitFailed));
        assert!(!heap.is_initialized());
        assert!(heap.malloc(8).is_null());
    }

    #[test]
    fn init_fails_without_first_chunk() {
        let mut heap = Heap::with_capacity(INIT_WORDS * WSIZE + 64).unwrap();

        assert_eq!(heap.init(), Err(AllocError::InitFailed));
        assert!(heap.is_initialized());
        assert!(heap.check_heap(line!()).is_ok());

        // still no chunk, so a second call fails too
        assert_eq!(heap.init(), Err(AllocError::InitFailed));
        assert_eq!(heap.size(), INIT_WORDS * WSIZE);
    }

    /// An arena whose usable size can be raised after the fact.
    struct Capped {
        arena: ArenaStore,
        cap: usize,
    }

    impl HeapStore for Capped {
        fn sbrk(&mut self, incr: usize) -> Result<NonNull<u8>, AllocError> {
            if self.arena.heap_size() + incr > self.cap {
                return Err(AllocError::OOM);
            }
            self.arena.sbrk(incr)
        }

        fn heap_lo(&self) -> *const u8 {
            self.arena.heap_lo()
        }

        fn heap_hi(&self) -> *const u8 {
            self.arena.heap_hi()
        }

        fn heap_size(&self) -> usize {
            self.arena.heap_size()
        }
    }

    #[test]
    fn init_retries_first_chunk() {
        let arena = ArenaStore::with_capacity(1 << 16).unwrap();
        let mut heap = Heap::with_store(Capped { arena, cap: INIT_WORDS * WSIZE });

        assert_eq!(heap.init(), Err(AllocError::InitFailed));

        heap.store.cap = 1 << 16;

        assert_eq!(heap.init(), Ok(()));
        assert_eq!(heap.size(), INIT_WORDS * WSIZE + CHUNK_SIZE);
        assert!(heap.check_heap(line!()).is_ok());

        // already has its chunk
        assert_eq!(heap.init(), Ok(()));
        assert_eq!(heap.size(), INIT_WORDS * WSIZE + CHUNK_SIZE);
    }

    #[test]
    fn zero_size_on_failed_heap() {
        let mut heap = Heap::with_capacity(16).unwrap();

        assert_eq!(heap.try_malloc(0), Ok(ptr::null_mut()));
        assert!(!heap.is_initialized());
        assert_eq!(heap.try_malloc(1), Err(AllocError::InitFailed));
    }

    #[test]
    fn zero_size_is_null() {
        let mut heap = Heap::with_capacity(1 << 16).unwrap();

        assert_eq!(heap.try_malloc(0), Ok(ptr::null_mut()));
        assert!(heap.calloc(0, 8).is_null());
    }

    #[test]
    fn block_sizes() {
        let mut heap = Heap::with_capacity(1 << 16).unwrap();

        unsafe {
            let tiny = heap.malloc(1);
            assert_eq!(Block::from_ptr(tiny).unwrap().size(), MIN_BLOCK_SIZE);
            assert_eq!(heap.usable_size(tiny), 8);

            let exact = heap.malloc(8);
            assert_eq!(Block::from_ptr(exact).unwrap().size(), 16);

            let odd = heap.malloc(9);
            assert_eq!(Block::from_ptr(odd).unwrap().size(), 24);

            assert_eq!(heap.usable_size(ptr::null_mut()), 0);
        }
    }

    #[test]
    fn small_remainder_is_not_split() {
        let mut heap = Heap::with_capacity(1 << 16).unwrap();

        unsafe {
            // 40-byte hole between two allocated guards
            let hole = heap.malloc(32);
            let guard = heap.malloc(8);
            heap.free(hole);

            // 32-byte block leaves 8 bytes, too small to split off
            let ptr = heap.malloc(24);

            assert_eq!(ptr, hole);
            assert_eq!(Block::from_ptr(ptr).unwrap().size(), 40);
            assert!(heap.check_heap(line!()).is_ok());

            heap.free(ptr);
            heap.free(guard);
        }
    }

    #[test]
    fn oom_leaves_heap_untouched() {
        let mut heap = Heap::with_capacity(INIT_WORDS * WSIZE + CHUNK_SIZE).unwrap();
        let ptr = heap.malloc(100);
        let size = heap.size();

        assert!(!ptr.is_null());
        assert_eq!(heap.try_malloc(CHUNK_SIZE), Err(AllocError::OOM));
        assert!(heap.malloc(CHUNK_SIZE).is_null());
        assert_eq!(heap.size(), size);
        assert!(heap.check_heap(line!()).is_ok());
    }

    #[cfg(feature = "paranoid")]
    #[test]
    #[should_panic(expected = "in lists")]
    fn paranoid_mode_panics_on_corruption() {
        let mut heap = Heap::with_capacity(1 << 16).unwrap();
        let ptr = heap.malloc(8);
        let _guard = heap.malloc(8);

        // freed behind the allocator's back, so no list holds it
        unsafe { Block::from_ptr(ptr).unwrap().write_tags(MIN_BLOCK_SIZE, false) };

        heap.malloc(8);
    }

    #[test]
    fn oversized_requests_overflow() {
        let mut heap = Heap::with_capacity(1 << 16).unwrap();

        assert_eq!(heap.try_malloc(usize::MAX), Err(AllocError::AllocOverflow));
        assert_eq!(heap.try_calloc(usize::MAX, 2), Err(AllocError::AllocOverflow));
        assert!(heap.check_heap(line!()).is_ok());
    }
}
