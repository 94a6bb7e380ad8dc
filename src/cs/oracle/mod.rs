use blake2::digest::FixedOutputReset;
use blake2::Digest;

use crate::field::SmallField;

pub mod merkle_tree;

/// Hashing used by Merkle oracles. Leaves accumulate field elements as 8 byte
/// little-endian reduced values, nodes hash the concatenation of two children.
pub trait TreeHasher<F: SmallField>: 'static + Clone + Send + Sync {
    type Output: Sized
        + 'static
        + Clone
        + Copy
        + Sync
        + Send
        + Default
        + PartialEq
        + Eq
        + std::fmt::Debug
        + std::hash::Hash
        + serde::Serialize
        + serde::de::DeserializeOwned;

    fn new() -> Self;
    fn accumulate_into_leaf(&mut self, value: &F);
    fn finalize_into_leaf_hash_and_reset(&mut self) -> Self::Output;
    fn hash_into_leaf<'a, S: IntoIterator<Item = &'a F>>(source: S) -> Self::Output
    where
        F: 'a,
    {
        let mut hasher = Self::new();
        for el in source.into_iter() {
            hasher.accumulate_into_leaf(el);
        }

        hasher.finalize_into_leaf_hash_and_reset()
    }
    fn hash_into_node(left: &Self::Output, right: &Self::Output) -> Self::Output;
}

fn digest_to_array<D: Digest>(hasher: D) -> [u8; 32] {
    let mut output = [0u8; 32];
    output[..].copy_from_slice(hasher.finalize().as_slice());

    output
}

macro_rules! impl_byte_tree_hasher {
    ($hasher:ty) => {
        impl<F: SmallField> TreeHasher<F> for $hasher {
            type Output = [u8; 32];
            #[inline]
            fn new() -> Self {
                <$hasher as Digest>::new()
            }
            #[inline]
            fn accumulate_into_leaf(&mut self, value: &F) {
                let as_u64 = value.as_u64_reduced().to_le_bytes();
                Digest::update(self, as_u64);
            }
            #[inline]
            fn finalize_into_leaf_hash_and_reset(&mut self) -> Self::Output {
                let mut output = [0u8; 32];
                let raw_output = FixedOutputReset::finalize_fixed_reset(self);
                output[..].copy_from_slice(raw_output.as_slice());

                output
            }
            #[inline]
            fn hash_into_node(left: &Self::Output, right: &Self::Output) -> Self::Output {
                let mut hasher = <$hasher as Digest>::new();
                Digest::update(&mut hasher, &left[..]);
                Digest::update(&mut hasher, &right[..]);

                digest_to_array(hasher)
            }
        }
    };
}

impl_byte_tree_hasher!(blake2::Blake2s256);
impl_byte_tree_hasher!(sha3::Keccak256);

#[cfg(test)]
mod test {
    use super::*;
    use crate::field::goldilocks::GoldilocksField;
    use crate::field::Field;

    type F = GoldilocksField;

    #[test]
    fn test_leaf_hash_matches_streaming() {
        let values = [F::ONE, F::TWO, F::MINUS_ONE];
        let direct = <blake2::Blake2s256 as TreeHasher<F>>::hash_into_leaf(values.iter());
        let mut hasher = <blake2::Blake2s256 as TreeHasher<F>>::new();
        for el in values.iter() {
            TreeHasher::<F>::accumulate_into_leaf(&mut hasher, el);
        }
        assert_eq!(
            <blake2::Blake2s256 as TreeHasher<F>>::finalize_into_leaf_hash_and_reset(&mut hasher),
            direct
        );
        // reset leaves a fresh state
        assert_eq!(
            <blake2::Blake2s256 as TreeHasher<F>>::finalize_into_leaf_hash_and_reset(&mut hasher),
            <blake2::Blake2s256 as TreeHasher<F>>::hash_into_leaf(std::iter::empty())
        );

        let keccak = <sha3::Keccak256 as TreeHasher<F>>::hash_into_leaf(values.iter());
        assert_ne!(keccak, direct);
    }
}
