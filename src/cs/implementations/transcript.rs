use blake2::digest::FixedOutputReset;
use blake2::Digest;
use derivative::Derivative;

use crate::field::SmallField;
use crate::utils::LSBIterator;

/// Fiat-Shamir oracle. Two parties that absorb the same data in the same order
/// observe the same challenges.
pub trait Transcript<F: SmallField>: Clone + Send + Sync + std::fmt::Debug {
    type CompatibleCap: Clone;

    fn new() -> Self;
    fn witness_field_elements(&mut self, field_els: &[F]);
    fn witness_bytes(&mut self, bytes: &[u8]);
    fn witness_merkle_tree_cap(&mut self, cap: &[Self::CompatibleCap]);
    fn get_challenge(&mut self) -> F;
    fn get_challenge_bytes(&mut self, num_bytes: usize) -> Vec<u8>;

    fn get_multiple_challenges_fixed<const N: usize>(&mut self) -> [F; N] {
        let mut result = [F::ZERO; N];
        for dst in result.iter_mut() {
            *dst = self.get_challenge();
        }

        result
    }
    fn get_multiple_challenges(&mut self, num_challenges: usize) -> Vec<F> {
        let mut result = Vec::with_capacity(num_challenges);
        for _ in 0..num_challenges {
            let chal = self.get_challenge();
            result.push(chal);
        }

        result
    }
}

/// Byte-oriented transcript over a 32 byte digest. Pending input is hashed on the
/// first challenge request, then challenges are served from a chain of digests.
#[derive(Derivative)]
#[derivative(Clone, Debug)]
pub struct DigestTranscript<D: Digest + FixedOutputReset + Clone> {
    #[derivative(Debug = "ignore")]
    inner: D,
    buffer: Vec<u8>,
    available_challenge_bytes: Vec<u8>,
}

pub type Blake2sTranscript = DigestTranscript<blake2::Blake2s256>;
pub type Keccak256Transcript = DigestTranscript<sha3::Keccak256>;

impl<D: Digest + FixedOutputReset + Clone> DigestTranscript<D> {
    fn reseed(&mut self) {
        let output = self.inner.finalize_reset();
        Digest::update(&mut self.inner, &output);
        self.available_challenge_bytes.extend_from_slice(output.as_slice());
    }

    fn flush(&mut self) {
        if self.buffer.is_empty() == false {
            Digest::update(&mut self.inner, &self.buffer);
            self.buffer.clear();
            self.available_challenge_bytes.clear();
            self.reseed();
        }
    }

    fn take_bytes(&mut self, num_bytes: usize) -> Vec<u8> {
        self.flush();
        while self.available_challenge_bytes.len() < num_bytes {
            self.reseed();
        }

        self.available_challenge_bytes.drain(..num_bytes).collect()
    }
}

impl<F: SmallField, D: Digest + FixedOutputReset + Clone + Send + Sync> Transcript<F>
    for DigestTranscript<D>
{
    type CompatibleCap = [u8; 32];

    fn new() -> Self {
        Self {
            inner: D::new(),
            buffer: Vec::with_capacity(64),
            available_challenge_bytes: Vec::with_capacity(32),
        }
    }
    fn witness_field_elements(&mut self, field_els: &[F]) {
        for el in field_els.iter() {
            self.buffer.extend(el.as_u64_reduced().to_le_bytes());
        }
    }
    fn witness_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }
    fn witness_merkle_tree_cap(&mut self, cap: &[Self::CompatibleCap]) {
        for el in cap.iter() {
            self.buffer.extend_from_slice(&el[..]);
        }
    }
    fn get_challenge(&mut self) -> F {
        let bytes = self.take_bytes(8);
        let mut buffer = [0u8; 8];
        buffer.copy_from_slice(&bytes);

        F::from_u64_with_reduction(u64::from_le_bytes(buffer))
    }
    fn get_challenge_bytes(&mut self, num_bytes: usize) -> Vec<u8> {
        self.take_bytes(num_bytes)
    }
}

/// Source of query index bits.
#[derive(Clone, Debug, Default)]
pub struct BoolsBuffer {
    pub available: Vec<bool>,
    pub max_needed: usize,
}

impl BoolsBuffer {
    pub fn new(max_needed: usize) -> Self {
        Self {
            available: Vec::new(),
            max_needed,
        }
    }

    pub fn get_bits<F: SmallField, T: Transcript<F>>(
        &mut self,
        transcript: &mut T,
        num_bits: usize,
    ) -> Vec<bool> {
        while self.available.len() < num_bits {
            // we assume that transcript produces uniform BYTES
            let bytes = transcript.get_challenge_bytes(8);
            let mut buffer = [0u8; 8];
            buffer.copy_from_slice(&bytes);
            let t = [u64::from_le_bytes(buffer)];
            self.available.extend(LSBIterator::new(&t).take(64));
        }

        self.available.drain(..num_bits).collect()
    }

    /// Draws an index in `0..(1 << num_bits)`.
    pub fn get_index<F: SmallField, T: Transcript<F>>(
        &mut self,
        transcript: &mut T,
        num_bits: usize,
    ) -> usize {
        let bits = self.get_bits(transcript, num_bits);
        crate::utils::u64_from_lsb_first_bits(&bits) as usize
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::field::goldilocks::GoldilocksField;
    use crate::field::Field;

    type F = GoldilocksField;

    fn run_protocol<T: Transcript<F>>() -> Vec<F> {
        let mut transcript = T::new();
        transcript.witness_bytes(b"circuit");
        transcript.witness_field_elements(&[F::ONE, F::TWO]);
        let mut result = transcript.get_multiple_challenges(3);
        let [a, b] = transcript.get_multiple_challenges_fixed::<2>();
        result.push(a);
        result.push(b);
        // absorb a challenge back, as verifier subtranscripts do
        transcript.witness_field_elements(&[a]);
        result.push(transcript.get_challenge());

        result
    }

    #[test]
    fn test_transcript_determinism() {
        let a = run_protocol::<Blake2sTranscript>();
        let b = run_protocol::<Blake2sTranscript>();
        assert_eq!(a, b);

        let c = run_protocol::<Keccak256Transcript>();
        assert_ne!(a, c);
        // all challenges are distinct with overwhelming probability
        for i in 0..a.len() {
            for j in (i + 1)..a.len() {
                assert_ne!(a[i], a[j]);
            }
        }
    }

    #[test]
    fn test_absorbed_data_changes_challenges() {
        let mut t0 = <Blake2sTranscript as Transcript<F>>::new();
        let mut t1 = <Blake2sTranscript as Transcript<F>>::new();
        Transcript::<F>::witness_merkle_tree_cap(&mut t0, &[[0u8; 32]]);
        Transcript::<F>::witness_merkle_tree_cap(&mut t1, &[[1u8; 32]]);
        let c0: F = t0.get_challenge();
        let c1: F = t1.get_challenge();
        assert_ne!(c0, c1);
    }

    #[test]
    fn test_bools_buffer() {
        let mut transcript = <Keccak256Transcript as Transcript<F>>::new();
        Transcript::<F>::witness_bytes(&mut transcript, &[42u8]);
        let mut buffer = BoolsBuffer::new(10);
        for _ in 0..20 {
            let idx = buffer.get_index::<F, _>(&mut transcript, 10);
            assert!(idx < 1 << 10);
        }
        assert!(buffer.available.len() < 64);
    }
}
