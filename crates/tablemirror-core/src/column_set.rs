//! Compact set of column ordinals.
//!
//! Used per row to remember which update-eligible columns were edited since the
//! last accept. The set only grows until it is cleared: a column edited and then
//! edited back stays recorded, and the row status decides whether an UPDATE is
//! still needed.

/// A bitset over column ordinals `0..len`.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct ColumnSet {
    len: usize,
    bits: Vec<u64>,
}

impl ColumnSet {
    /// An empty set able to hold ordinals `0..len`.
    #[must_use]
    pub fn with_capacity(len: usize) -> Self {
        Self {
            len,
            bits: vec![0u64; len.div_ceil(64)],
        }
    }

    /// Insert an ordinal, growing the set if needed. Returns true if it was new.
    pub fn insert(&mut self, idx: usize) -> bool {
        if idx >= self.len {
            self.len = idx + 1;
            self.bits.resize(self.len.div_ceil(64), 0);
        }
        let (word, bit) = (idx / 64, idx % 64);
        let mask = 1u64 << bit;
        let was_set = self.bits[word] & mask != 0;
        self.bits[word] |= mask;
        !was_set
    }

    /// Check whether an ordinal is present.
    #[must_use]
    pub fn contains(&self, idx: usize) -> bool {
        if idx >= self.len {
            return false;
        }
        self.bits
            .get(idx / 64)
            .is_some_and(|w| w & (1u64 << (idx % 64)) != 0)
    }

    /// Number of ordinals present.
    #[must_use]
    pub fn count(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// True if no ordinal is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|w| *w == 0)
    }

    /// Present ordinals in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len).filter(|idx| self.contains(*idx))
    }

    /// Remove every ordinal.
    pub fn clear(&mut self) {
        self.bits.iter_mut().for_each(|w| *w = 0);
    }
}
