//! Dense row-selection bitset attached to each page

use alloc::vec;
use alloc::vec::Vec;

/// One bit per row, set when the row is of interest
///
/// The mask only affects client iteration; writers emit every row regardless.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RowMask {
    words: Vec<u64>,
    len: usize,
}

impl RowMask {
    /// Mask of `len` rows, all selected
    pub fn all(len: usize) -> Self {
        let mut mask = Self {
            words: vec![u64::MAX; len.div_ceil(64)],
            len,
        };
        mask.clear_tail();
        mask
    }

    /// Mask of `len` rows, none selected
    pub fn none(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(64)],
            len,
        }
    }

    fn clear_tail(&mut self) {
        let rem = self.len % 64;
        if rem != 0 {
            if let Some(last) = self.words.last_mut() {
                *last &= (1u64 << rem) - 1;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether `row` is selected; rows past the end never are
    pub fn get(&self, row: usize) -> bool {
        row < self.len && self.words[row / 64] & (1 << (row % 64)) != 0
    }

    /// Set or clear one row, returning `false` if it is out of range
    pub fn set(&mut self, row: usize, selected: bool) -> bool {
        if row >= self.len {
            return false;
        }
        let bit = 1u64 << (row % 64);
        if selected {
            self.words[row / 64] |= bit;
        } else {
            self.words[row / 64] &= !bit;
        }
        true
    }

    pub fn select_all(&mut self) {
        self.words.fill(u64::MAX);
        self.clear_tail();
    }

    pub fn clear_all(&mut self) {
        self.words.fill(0);
    }

    /// Population count
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Selected row indices in ascending order
    pub fn iter_selected(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(i, &word)| {
            let mut rest = word;
            core::iter::from_fn(move || {
                if rest == 0 {
                    return None;
                }
                let bit = rest.trailing_zeros() as usize;
                rest &= rest - 1;
                Some(i * 64 + bit)
            })
        })
    }

    pub fn selected(&self) -> Vec<usize> {
        self.iter_selected().collect()
    }
}

impl FromIterator<bool> for RowMask {
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
        let mut mask = RowMask::default();
        for (row, selected) in iter.into_iter().enumerate() {
            if row % 64 == 0 {
                mask.words.push(0);
            }
            mask.len += 1;
            mask.set(row, selected);
        }
        mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_and_count() {
        let mask = RowMask::all(130);
        assert_eq!(mask.count(), 130);
        assert!(mask.get(129));
        assert!(!mask.get(130));
        assert_eq!(RowMask::all(0).count(), 0);
        assert_eq!(RowMask::none(70).count(), 0);
    }

    #[test]
    fn test_set_and_iterate() {
        let mut mask = RowMask::none(100);
        assert!(mask.set(3, true));
        assert!(mask.set(64, true));
        assert!(mask.set(99, true));
        assert!(!mask.set(100, true));
        assert_eq!(mask.selected(), [3, 64, 99]);
        mask.set(64, false);
        assert_eq!(mask.count(), 2);
        mask.select_all();
        assert_eq!(mask.count(), 100);
        mask.clear_all();
        assert!(mask.selected().is_empty());
    }

    #[test]
    fn test_from_bools() {
        let mask: RowMask = [true, false, true].into_iter().collect();
        assert_eq!(mask.len(), 3);
        assert_eq!(mask.selected(), [0, 2]);
    }
}
