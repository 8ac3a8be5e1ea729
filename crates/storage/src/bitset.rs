//! Flat bitset over value-indices
//!
//! Selections over a facet are resolved to a set of value-indices once per
//! segment and then tested for every document, so membership has to be a
//! couple of bit operations. Indices beyond the capacity read back as unset.

/// Fixed-capacity bitset backed by `u64` words
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenBitSet {
    words: Vec<u64>,
    num_bits: usize,
}

impl OpenBitSet {
    /// Create an empty bitset able to hold indices `0..num_bits`
    pub fn with_capacity(num_bits: usize) -> Self {
        Self {
            words: vec![0u64; (num_bits + 63) / 64],
            num_bits,
        }
    }

    /// Number of addressable bits
    #[inline]
    pub fn capacity(&self) -> usize {
        self.num_bits
    }

    /// Set bit `index`
    ///
    /// # Panics
    ///
    /// Panics if `index` is outside the capacity.
    #[inline]
    pub fn set(&mut self, index: usize) {
        assert!(
            index < self.num_bits,
            "bit {} out of capacity {}",
            index,
            self.num_bits
        );
        self.words[index >> 6] |= 1u64 << (index & 63);
    }

    /// Clear bit `index`; out-of-capacity indices are ignored
    #[inline]
    pub fn clear(&mut self, index: usize) {
        if index < self.num_bits {
            self.words[index >> 6] &= !(1u64 << (index & 63));
        }
    }

    /// Test bit `index`
    #[inline]
    pub fn get(&self, index: usize) -> bool {
        index < self.num_bits && (self.words[index >> 6] & (1u64 << (index & 63))) != 0
    }

    /// Test the bit addressed by a signed value-index; negatives are unset
    #[inline]
    pub fn get_i32(&self, index: i32) -> bool {
        index >= 0 && self.get(index as usize)
    }

    /// Flip every bit in `start..end`
    pub fn flip_range(&mut self, start: usize, end: usize) {
        let end = end.min(self.num_bits);
        for index in start..end {
            self.words[index >> 6] ^= 1u64 << (index & 63);
        }
    }

    /// Number of set bits
    pub fn cardinality(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// True if no bit is set
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// First set bit at or after `from`
    pub fn next_set_bit(&self, from: usize) -> Option<usize> {
        if from >= self.num_bits {
            return None;
        }
        let mut word_idx = from >> 6;
        let mut word = self.words[word_idx] & (u64::MAX << (from & 63));
        loop {
            if word != 0 {
                let index = (word_idx << 6) + word.trailing_zeros() as usize;
                return (index < self.num_bits).then_some(index);
            }
            word_idx += 1;
            if word_idx >= self.words.len() {
                return None;
            }
            word = self.words[word_idx];
        }
    }

    /// Iterate over set bits in increasing order
    pub fn iter_ones(&self) -> impl Iterator<Item = usize> + '_ {
        let mut next = self.next_set_bit(0);
        std::iter::from_fn(move || {
            let current = next?;
            next = self.next_set_bit(current + 1);
            Some(current)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_clear() {
        let mut bits = OpenBitSet::with_capacity(130);
        assert!(bits.is_empty());
        bits.set(0);
        bits.set(64);
        bits.set(129);
        assert!(bits.get(0));
        assert!(bits.get(64));
        assert!(bits.get(129));
        assert!(!bits.get(1));
        assert_eq!(bits.cardinality(), 3);

        bits.clear(64);
        assert!(!bits.get(64));
        assert_eq!(bits.cardinality(), 2);
    }

    #[test]
    fn test_out_of_capacity_reads_unset() {
        let bits = OpenBitSet::with_capacity(10);
        assert!(!bits.get(10));
        assert!(!bits.get(1000));
        assert!(!bits.get_i32(-1));
    }

    #[test]
    #[should_panic]
    fn test_set_out_of_capacity_panics() {
        let mut bits = OpenBitSet::with_capacity(10);
        bits.set(10);
    }

    #[test]
    fn test_flip_range() {
        let mut bits = OpenBitSet::with_capacity(8);
        bits.set(2);
        bits.flip_range(1, 8);
        let ones: Vec<usize> = bits.iter_ones().collect();
        assert_eq!(ones, vec![1, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_flip_range_clamps_to_capacity() {
        let mut bits = OpenBitSet::with_capacity(3);
        bits.flip_range(0, 100);
        assert_eq!(bits.cardinality(), 3);
    }

    #[test]
    fn test_next_set_bit_across_words() {
        let mut bits = OpenBitSet::with_capacity(200);
        bits.set(5);
        bits.set(70);
        bits.set(199);
        assert_eq!(bits.next_set_bit(0), Some(5));
        assert_eq!(bits.next_set_bit(6), Some(70));
        assert_eq!(bits.next_set_bit(71), Some(199));
        assert_eq!(bits.next_set_bit(200), None);
    }

    #[test]
    fn test_empty_capacity() {
        let bits = OpenBitSet::with_capacity(0);
        assert_eq!(bits.next_set_bit(0), None);
        assert_eq!(bits.iter_ones().count(), 0);
    }
}
