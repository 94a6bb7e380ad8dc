use blake2::Blake2s256;
use blake2::Digest;
use sha3::Keccak256;

use crate::field::SmallField;
use crate::log;
use crate::worker::Worker;

/// Grinding: find a nonce such that `H(seed || nonce_le)` has at least `pow_bits`
/// trailing zero bits in its first 8 bytes read as little-endian u64.
pub trait PoWRunner: 'static + Send + Sync {
    fn run_from_field_elements<F: SmallField>(seed: Vec<F>, pow_bits: u32, worker: &Worker) -> u64 {
        Self::run_from_bytes(field_elements_to_bytes(seed), pow_bits, worker)
    }
    fn run_from_bytes(seed: Vec<u8>, pow_bits: u32, worker: &Worker) -> u64;
    fn verify_from_field_elements<F: SmallField>(
        seed: Vec<F>,
        pow_bits: u32,
        challenge: u64,
    ) -> bool {
        Self::verify_from_bytes(field_elements_to_bytes(seed), pow_bits, challenge)
    }
    fn verify_from_bytes(seed: Vec<u8>, pow_bits: u32, challenge: u64) -> bool;
}

fn field_elements_to_bytes<F: SmallField>(seed: Vec<F>) -> Vec<u8> {
    let mut buffer = Vec::with_capacity(seed.len() * 8);
    for el in seed.into_iter() {
        buffer.extend(el.as_u64_reduced().to_le_bytes());
    }

    buffer
}

const NO_RESULT: u64 = u64::MAX;
const ROUNDS_PER_INVOCATION: usize = 1 << 16u32;

fn passes<D: Digest + Clone>(base: &D, challenge: u64, pow_bits: u32) -> bool {
    let mut new_transcript = base.clone();
    new_transcript.update(challenge.to_le_bytes());
    let mut le_bytes = [0u8; 8];
    le_bytes.copy_from_slice(&new_transcript.finalize().as_slice()[..8]);

    u64::from_le_bytes(le_bytes).trailing_zeros() >= pow_bits
}

fn grind<D: Digest + Clone + Send + Sync>(seed: &[u8], pow_bits: u32, worker: &Worker) -> u64 {
    assert!(pow_bits <= 32);
    if pow_bits == 0 {
        return 0;
    }

    let mut base_transcript = D::new();
    base_transcript.update(seed);

    if pow_bits <= ROUNDS_PER_INVOCATION.trailing_zeros() {
        log!("Do serial PoW");
        for challenge in 0u64..(NO_RESULT - 1) {
            if passes(&base_transcript, challenge, pow_bits) {
                return challenge;
            }
        }
    }

    log!("Do parallel PoW");

    // blocks are scanned in rounds of `num_cores`, and the earliest block with a hit wins,
    // so the nonce is the same for any thread count
    let rounds_per_invocation = ROUNDS_PER_INVOCATION as u64;
    let num_workers = worker.num_cores as u64;
    let mut round = 0u64;
    loop {
        let found = worker.map_indexes(num_workers as usize, |worker_idx| {
            let base = (round * num_workers + worker_idx as u64) * rounds_per_invocation;
            (base..(base + rounds_per_invocation))
                .find(|challenge| passes(&base_transcript, *challenge, pow_bits))
        });
        if let Some(challenge) = found.into_iter().flatten().next() {
            return challenge;
        }
        round += 1;
    }
}

fn check<D: Digest + Clone>(seed: &[u8], pow_bits: u32, challenge: u64) -> bool {
    if pow_bits == 0 {
        return true;
    }
    let mut base = D::new();
    base.update(seed);

    passes(&base, challenge, pow_bits)
}

impl PoWRunner for Blake2s256 {
    fn run_from_bytes(seed: Vec<u8>, pow_bits: u32, worker: &Worker) -> u64 {
        grind::<Blake2s256>(&seed, pow_bits, worker)
    }

    fn verify_from_bytes(seed: Vec<u8>, pow_bits: u32, challenge: u64) -> bool {
        check::<Blake2s256>(&seed, pow_bits, challenge)
    }
}

impl PoWRunner for Keccak256 {
    fn run_from_bytes(seed: Vec<u8>, pow_bits: u32, worker: &Worker) -> u64 {
        grind::<Keccak256>(&seed, pow_bits, worker)
    }

    fn verify_from_bytes(seed: Vec<u8>, pow_bits: u32, challenge: u64) -> bool {
        check::<Keccak256>(&seed, pow_bits, challenge)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::field::goldilocks::GoldilocksField;
    use crate::field::Field;

    type F = GoldilocksField;

    #[test]
    fn test_serial_pow() {
        let worker = Worker::new_with_num_threads(2);
        let seed = vec![F::ONE, F::TWO, F::MINUS_ONE];
        let nonce = Blake2s256::run_from_field_elements(seed.clone(), 10, &worker);
        assert!(Blake2s256::verify_from_field_elements(seed.clone(), 10, nonce));
        // trailing zeros of other nonces are independent of the found one
        let wrong = (0..1000u64)
            .filter(|n| Blake2s256::verify_from_field_elements(seed.clone(), 10, *n) == false)
            .count();
        assert!(wrong > 900);
    }

    #[test]
    fn test_parallel_pow() {
        let worker = Worker::new_with_num_threads(4);
        let seed = b"placeholder".to_vec();
        let nonce = Keccak256::run_from_bytes(seed.clone(), 17, &worker);
        assert!(Keccak256::verify_from_bytes(seed.clone(), 17, nonce));

        let other_worker = Worker::new_with_num_threads(3);
        assert_eq!(Keccak256::run_from_bytes(seed, 17, &other_worker), nonce);
    }

    #[test]
    fn test_zero_bits_accepts_anything() {
        let worker = Worker::new_with_num_threads(1);
        assert_eq!(Blake2s256::run_from_bytes(vec![1, 2, 3], 0, &worker), 0);
        assert!(Blake2s256::verify_from_bytes(vec![1, 2, 3], 0, 12345));
    }
}
