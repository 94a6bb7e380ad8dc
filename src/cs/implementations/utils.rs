use crate::fft::bitreverse_enumeration_inplace;
use crate::field::{Field, LegendreSymbol, PrimeField};
use crate::worker::Worker;

pub fn domain_generator_for_size<F: PrimeField>(size: u64) -> F {
    debug_assert!(size.is_power_of_two());
    debug_assert!(size.trailing_zeros() as usize <= F::TWO_ADICITY);

    let mut omega = F::radix_2_subgroup_generator();
    for _ in size.trailing_zeros()..(F::TWO_ADICITY as u32) {
        omega.square();
    }

    debug_assert_eq!(omega.pow_u64(size), F::ONE);

    omega
}

pub fn materialize_powers_parallel<F: Field>(base: F, size: usize, worker: &Worker) -> Vec<F> {
    if size == 0 {
        return Vec::new();
    }
    let mut storage = vec![F::ZERO; size];
    worker.scope(size, |scope, chunk_size| {
        for (chunk_idx, chunk) in storage.chunks_mut(chunk_size).enumerate() {
            scope.spawn(move |_| {
                let mut current = base.pow_u64((chunk_idx * chunk_size) as u64);
                for el in chunk.iter_mut() {
                    *el = current;
                    current.mul_assign(&base);
                }
            });
        }
    });

    storage
}

/// First half of the powers of the domain generator, in bitreversed order, as the
/// Cooley-Tukey butterflies consume them. Prefixes serve all smaller power-of-two domains.
pub fn precompute_twiddles_for_fft<F: PrimeField, const INVERSED: bool>(
    fft_size: usize,
    worker: &Worker,
) -> Vec<F> {
    debug_assert!(fft_size.is_power_of_two());

    let mut omega = domain_generator_for_size::<F>(fft_size as u64);
    if INVERSED {
        omega = omega
            .inverse()
            .expect("must always exist for domain generator");
    }

    let num_powers = std::cmp::max(fft_size / 2, 1);
    let mut powers = materialize_powers_parallel(omega, num_powers, worker);
    bitreverse_enumeration_inplace(&mut powers);

    powers
}

/// Points `coset * omega^bitreverse(i)` of a domain of size `size`, matching
/// the enumeration of codewords produced by `fft_natural_to_bitreversed`.
pub fn bitreversed_coset_points<F: PrimeField>(size: usize, coset: F, worker: &Worker) -> Vec<F> {
    let omega = domain_generator_for_size::<F>(size as u64);
    let mut points = materialize_powers_parallel(omega, size, worker);
    bitreverse_enumeration_inplace(&mut points);
    if coset != F::ONE {
        for el in points.iter_mut() {
            el.mul_assign(&coset);
        }
    }

    points
}

/// Montgomery batch inversion. Returns `None` if any element is zero, leaving `input` untouched.
pub fn batch_inverse_inplace<F: PrimeField>(input: &mut [F]) -> Option<()> {
    if input.is_empty() {
        return Some(());
    }

    let mut into = Vec::with_capacity(input.len());

    into.push(F::ONE);
    let mut accumulator = input[0];
    for el in input[1..].iter() {
        into.push(accumulator);
        accumulator.mul_assign(el);
    }

    // for a set of a, b, c, d we have
    // - into = [1, a, ab, abc],
    // - accumulator = abcd

    let mut grand_inverse = accumulator.inverse()?;

    for (tmp, original) in into.into_iter().rev().zip(input.iter_mut().rev()) {
        let mut tmp = tmp; // abc
        tmp.mul_assign(&grand_inverse); // d^-1
        grand_inverse.mul_assign(original); // e.g. it's now a^-1 b^-1 c^-1

        *original = tmp;
    }

    Some(())
}

pub fn batch_inverse_inplace_parallel<F: PrimeField>(input: &mut [F], worker: &Worker) -> Option<()> {
    if input.iter().any(|el| el.is_zero()) {
        return None;
    }
    worker.scope(input.len(), |scope, chunk_size| {
        for dst in input.chunks_mut(chunk_size) {
            scope.spawn(move |_| {
                // no zeroes, so the inner inversion always succeeds
                let _ = batch_inverse_inplace(dst);
            });
        }
    });

    Some(())
}

/// Returns `num` quadratic non-residues that lie in pairwise distinct cosets of the
/// subgroup of size `domain_size`. The first element is always 1.
pub fn make_non_residues<F: PrimeField>(num: usize, domain_size: usize) -> Vec<F> {
    assert!(domain_size.is_power_of_two());
    if num == 0 {
        return vec![];
    }

    // we need to check that
    // - some k is not a residue
    // - it's NOT a part of coset formed as other_k * {1, omega^1, ...}

    // latter is just a * omega^i == b * omega^j, so a/b == omega^{j-i},
    // and then (a / b) ^ domain_size == 1

    let mut non_residues: Vec<F> = Vec::with_capacity(num);
    non_residues.push(F::ONE);
    let mut current = F::ONE;
    while non_residues.len() < num {
        current.add_assign(&F::ONE);

        if current.legendre() != LegendreSymbol::QuadraticNonResidue {
            continue;
        }

        let tmp = current.pow_u64(domain_size as u64);
        // X^N == other_k ^ N means we are in the same coset
        let is_unique = non_residues
            .iter()
            .all(|t| t.pow_u64(domain_size as u64) != tmp);
        if is_unique {
            non_residues.push(current);
        }
    }

    non_residues
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::field::goldilocks::GoldilocksField;
    use crate::field::rand_from_rng;

    type F = GoldilocksField;

    #[test]
    fn test_batch_inverse() {
        let worker = Worker::new_with_num_threads(3);
        let mut rng = rand::thread_rng();
        let original: Vec<F> = (0..100).map(|_| rand_from_rng(&mut rng)).collect();
        let mut inverses = original.clone();
        batch_inverse_inplace_parallel(&mut inverses, &worker).unwrap();
        for (a, b) in original.iter().zip(inverses.iter()) {
            let mut t = *a;
            t.mul_assign(b);
            assert_eq!(t, F::ONE);
        }

        let mut with_zero = vec![F::ONE, F::ZERO, F::TWO];
        assert!(batch_inverse_inplace(&mut with_zero).is_none());
        assert_eq!(with_zero, vec![F::ONE, F::ZERO, F::TWO]);
    }

    #[test]
    fn test_non_residues_are_in_distinct_cosets() {
        let domain_size = 1 << 4;
        let shifts = make_non_residues::<F>(5, domain_size);
        assert_eq!(shifts.len(), 5);
        assert_eq!(shifts[0], F::ONE);
        for i in 0..shifts.len() {
            for j in (i + 1)..shifts.len() {
                assert_ne!(
                    shifts[i].pow_u64(domain_size as u64),
                    shifts[j].pow_u64(domain_size as u64)
                );
            }
        }
    }

    #[test]
    fn test_bitreversed_coset_points() {
        let worker = Worker::new_with_num_threads(2);
        let coset = F::multiplicative_generator();
        let points = bitreversed_coset_points::<F>(8, coset, &worker);
        // (x, -x) are neighbours
        for pair in points.chunks(2) {
            let mut sum = pair[0];
            sum.add_assign(&pair[1]);
            assert!(sum.is_zero());
        }
    }
}
