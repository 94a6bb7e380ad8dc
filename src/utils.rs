#[inline(always)]
pub const fn split(x: u128) -> (u64, u64) {
    (x as u64, (x >> 64) as u64)
}

#[inline]
pub const fn num_bits_u64(n: u64) -> usize {
    (64 - n.leading_zeros()) as usize
}

#[inline(always)]
pub const fn bitreverse_index(n: usize, l: u32) -> usize {
    if l == 0 {
        assert!(n == 0);
        return 0;
    }
    let r = n.reverse_bits();
    // now we need to only use the bits that originally were "last" l, so shift

    r >> ((std::mem::size_of::<usize>() * 8) - l as usize)
}

/// Exact base-2 logarithm, `None` for zero and non-powers of two.
#[inline]
pub fn log2_exact(n: usize) -> Option<u32> {
    if n == 0 || n.is_power_of_two() == false {
        None
    } else {
        Some(n.trailing_zeros())
    }
}

pub struct LSBIterator<'a> {
    over: &'a [u64],
    n: usize,
}

impl<'a> LSBIterator<'a> {
    pub const fn new(source: &'a [u64]) -> Self {
        Self { over: source, n: 0 }
    }
}

impl<'a> Iterator for LSBIterator<'a> {
    type Item = bool;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.n >= self.over.len() * 64 {
            return None;
        }

        let word_idx = self.n / 64;
        let bit_idx = self.n % 64;

        self.n += 1;

        Some(self.over[word_idx] & (1u64 << bit_idx) != 0)
    }
}

impl<'a> ExactSizeIterator for LSBIterator<'a> {
    fn len(&self) -> usize {
        self.over.len() * 64 - self.n
    }
}

pub(crate) fn u64_from_lsb_first_bits(bits: &[bool]) -> u64 {
    let mut result = 0u64;
    for (shift, bit) in bits.iter().enumerate() {
        result |= (*bit as u64) << shift;
    }

    result
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_bitreverse_index() {
        assert_eq!(bitreverse_index(1, 3), 4);
        assert_eq!(bitreverse_index(6, 3), 3);
        assert_eq!(bitreverse_index(0, 0), 0);
        for i in 0..16 {
            assert_eq!(bitreverse_index(bitreverse_index(i, 4), 4), i);
        }
    }

    #[test]
    fn test_lsb_iterator() {
        let words = [0b1011u64];
        let bits: Vec<bool> = LSBIterator::new(&words).take(4).collect();
        assert_eq!(bits, vec![true, true, false, true]);
        assert_eq!(u64_from_lsb_first_bits(&bits), 0b1011);
    }

    #[test]
    fn test_log2_exact() {
        assert_eq!(log2_exact(0), None);
        assert_eq!(log2_exact(12), None);
        assert_eq!(log2_exact(128), Some(7));
    }
}
