use crate::constants::{LIST_COUNT, MIN_BLOCK_SIZE};

/// Index of one segregated free list.
///
/// Class 0 holds 16-byte blocks, class `k` in `1..=8` holds sizes in
/// `(16 << (k - 1), 16 << k]` and the last class holds everything larger.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SizeClass(u8);

impl SizeClass {
    pub const COUNT: usize = LIST_COUNT;
    pub const LAST: SizeClass = SizeClass(LIST_COUNT as u8 - 1);

    pub fn get_for_size(size: usize) -> SizeClass {
        (0..Self::LAST.0)
            .find(|&k| size <= MIN_BLOCK_SIZE << k)
            .map_or(Self::LAST, SizeClass)
    }

    pub fn from_index(index: usize) -> Option<SizeClass> {
        (index < Self::COUNT).then(|| SizeClass(index as u8))
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn all() -> impl Iterator<Item = SizeClass> {
        (0..Self::COUNT as u8).map(SizeClass)
    }

    /// This class followed by every larger one.
    pub fn and_larger(self) -> impl Iterator<Item = SizeClass> {
        (self.0..Self::COUNT as u8).map(SizeClass)
    }

    /// Exclusive lower bound.
    pub fn lower_bound(self) -> usize {
        match self.0 {
            0 => 0,
            k => MIN_BLOCK_SIZE << (k - 1),
        }
    }

    /// Inclusive upper bound, `None` for the last class.
    pub fn upper_bound(self) -> Option<usize> {
        (self != Self::LAST).then(|| MIN_BLOCK_SIZE << self.0)
    }

    pub fn contains(self, size: usize) -> bool {
        size > self.lower_bound() && self.upper_bound().map_or(true, |upper| size <= upper)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_boundaries() {
        assert_eq!(SizeClass::get_for_size(16).index(), 0);
        assert_eq!(SizeClass::get_for_size(24).index(), 1);
        assert_eq!(SizeClass::get_for_size(32).index(), 1);
        assert_eq!(SizeClass::get_for_size(40).index(), 2);
        assert_eq!(SizeClass::get_for_size(2048).index(), 7);
        assert_eq!(SizeClass::get_for_size(2056).index(), 8);
        assert_eq!(SizeClass::get_for_size(4096).index(), 8);
        assert_eq!(SizeClass::get_for_size(4104), SizeClass::LAST);
        assert_eq!(SizeClass::get_for_size(1 << 30), SizeClass::LAST);
    }

    #[test]
    fn bounds_agree_with_selection() {
        for size in (MIN_BLOCK_SIZE..=20_000).step_by(8) {
            let selected = SizeClass::get_for_size(size);

            for class in SizeClass::all() {
                assert_eq!(class.contains(size), class == selected, "size {size} class {class:?}");
            }
        }
    }

    #[test]
    fn and_larger_ends_at_last() {
        let classes: Vec<_> = SizeClass::get_for_size(3000).and_larger().collect();

        assert_eq!(classes, vec![SizeClass(8), SizeClass::LAST]);
        assert_eq!(SizeClass::from_index(SizeClass::COUNT), None);
    }
}
