/// Header/footer and free-list link size.
pub const WSIZE: usize = 4;
/// Header plus footer.
pub const DSIZE: usize = 8;
pub const ALIGNMENT: usize = 8;

/// Header, footer and two link words.
pub const MIN_BLOCK_SIZE: usize = 16;
/// A remainder smaller than this stays inside the allocated block.
pub const SPLIT_MIN: usize = 2 * DSIZE;

/// Default heap extension.
pub const CHUNK_SIZE: usize = 1 << 12;

pub const LIST_COUNT: usize = 10;

// directory slots, one pad word, prologue header and footer, epilogue header
pub const PAD_WORD: usize = LIST_COUNT;
pub const PROLOGUE_HEADER_WORD: usize = LIST_COUNT + 1;
pub const PROLOGUE_WORD: usize = LIST_COUNT + 2;
pub const EPILOGUE_WORD: usize = LIST_COUNT + 3;
pub const INIT_WORDS: usize = LIST_COUNT + 4;

pub const DEFAULT_CAPACITY: usize = 20 * (1 << 20);

/// Rounds `size` up to the alignment, `None` on overflow.
pub fn align(size: usize) -> Option<usize> {
    size.checked_add(ALIGNMENT - 1)
        .map(|padded| padded & !(ALIGNMENT - 1))
}
