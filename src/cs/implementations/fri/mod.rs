// FRI over a codeword of `(f(x) - f(z)) / (x - z)` combinations that are committed by the LPC.
//
// Folding by 2 uses the quasi-FFT split
// f(x) = f0(x^2) + x * f1(x^2)
// f0(x^2) = (f(x) + f(-x)) / 2
// f1(x^2) = (f(x) - f(-x)) / 2x
// and we compute f(x) + f(-x) + alpha * (f(x) - f(-x)) / x, that is 2 * (f0 + alpha * f1).
// The extra factor of 2 per fold does not change the degree, and verifier folds the same way.

// Codewords are enumerated in bitreversed order over `coset * <nu>`, so the pair (x, -x) sits at
// indexes (2k, 2k + 1), and x = coset * nu^bitreverse(k) in the domain of half size.
// Folding by 2^k is done as k consecutive folds by 2 with the challenge raised to the powers
// alpha, alpha^2, alpha^4, ..., so a leaf of 2^k consecutive elements folds into a single element
// of the next oracle.

use derivative::Derivative;

use crate::config::{FriParams, FriSchedule};
use crate::cs::implementations::polynomial::{
    evaluate_monomials_at, interpolate_over_coset, FftPrecomputations,
};
use crate::cs::implementations::pow::PoWRunner;
use crate::cs::implementations::proof::OracleQuery;
use crate::cs::implementations::transcript::{BoolsBuffer, Transcript};
use crate::cs::implementations::utils::{domain_generator_for_size, precompute_twiddles_for_fft};
use crate::cs::oracle::merkle_tree::MerkleTreeWithCap;
use crate::cs::oracle::TreeHasher;
use crate::error::{invariant_err, Result};
use crate::fft::bitreverse_enumeration_inplace;
use crate::field::SmallField;
use crate::utils::bitreverse_index;
use crate::worker::Worker;
use crate::{log, profile_fn};

#[derive(Derivative, serde::Serialize, serde::Deserialize)]
#[derivative(Clone(bound = ""), Debug(bound = ""), PartialEq(bound = ""), Eq(bound = ""))]
#[serde(bound = "")]
pub struct FriProof<F: SmallField, H: TreeHasher<F>> {
    /// Caps of the base oracle and of every intermediate one, one per folding step.
    pub oracle_caps: Vec<Vec<H::Output>>,
    /// Coefficients of the last folded polynomial, lowest first.
    pub final_monomials: Vec<F>,
    /// For every query, an opening of every oracle.
    pub query_rounds: Vec<Vec<OracleQuery<F, H>>>,
}

/// Transcript-derived data the verifier needs to check queries.
#[derive(Clone, Debug)]
pub struct FriVerifierChallenges<F: SmallField> {
    pub fold_challenges: Vec<F>,
    pub query_indexes: Vec<usize>,
}

#[inline(always)]
pub(crate) fn fold_pair<F: SmallField>(f_at_x: F, f_at_minus_x: F, challenge: &F, x_inverse: &F) -> F {
    let mut diff = f_at_x;
    diff.sub_assign(&f_at_minus_x);
    diff.mul_assign(x_inverse);
    diff.mul_assign(challenge);

    let mut result = f_at_x;
    result.add_assign(&f_at_minus_x);
    result.add_assign(&diff);

    result
}

fn fold_codeword<F: SmallField>(
    codeword: &[F],
    challenge: F,
    coset_inverse: F,
    roots: &[F],
    worker: &Worker,
) -> Vec<F> {
    let result_size = codeword.len() / 2;
    debug_assert!(roots.len() >= result_size);
    worker.map_indexes(result_size, |k| {
        let mut x_inverse = roots[k];
        x_inverse.mul_assign(&coset_inverse);
        fold_pair(codeword[2 * k], codeword[2 * k + 1], &challenge, &x_inverse)
    })
}

fn challenge_powers<F: SmallField>(challenge: F, num_folds: usize) -> Vec<F> {
    let mut result = Vec::with_capacity(num_folds);
    let mut current = challenge;
    for _ in 0..num_folds {
        result.push(current);
        current.square();
    }

    result
}

/// Runs FRI over `codeword` (bitreversed, over `multiplicative_generator * <nu>`), grinds and
/// draws query indexes. Returns the proof without the base oracle openings of committed batches,
/// the query indexes and the PoW nonce.
pub fn prove_fri<F: SmallField, H: TreeHasher<F> + PoWRunner, T: Transcript<F, CompatibleCap = H::Output>>(
    codeword: Vec<F>,
    params: &FriParams,
    schedule: &FriSchedule,
    precomputations: &FftPrecomputations<F>,
    transcript: &mut T,
    worker: &Worker,
) -> Result<(FriProof<F, H>, Vec<usize>, u64)> {
    profile_fn!(prove_fri);
    let now = std::time::Instant::now();

    let full_size = codeword.len();
    debug_assert_eq!(full_size, params.lde_domain_size());

    let roots = precompute_twiddles_for_fft::<F, true>(full_size, worker);
    let mut coset_inverse = F::multiplicative_generator()
        .inverse()
        .ok_or_else(|| invariant_err!("multiplicative generator is zero"))?;

    let mut oracles: Vec<(Vec<F>, MerkleTreeWithCap<F, H>)> =
        Vec::with_capacity(schedule.folding_schedule.len());
    let mut current = codeword;
    for reduction_degree_log_2 in schedule.folding_schedule.iter().copied() {
        log!("Fold degree by {}", 1 << reduction_degree_log_2);

        let oracle = MerkleTreeWithCap::<F, H>::construct_by_chunking_from_flat_sources(
            &[&current[..]],
            1 << reduction_degree_log_2,
            params.cap_size,
            worker,
        );
        transcript.witness_merkle_tree_cap(&oracle.get_cap());
        let challenge = transcript.get_challenge();

        let mut next = current.clone();
        for power in challenge_powers(challenge, reduction_degree_log_2) {
            next = fold_codeword(&next, power, coset_inverse, &roots, worker);
            coset_inverse.square();
        }

        oracles.push((current, oracle));
        current = next;
    }

    // we can now interpolate the last codeword to get monomial form
    let mut final_values = current;
    bitreverse_enumeration_inplace(&mut final_values);
    let coset = coset_inverse
        .inverse()
        .ok_or_else(|| invariant_err!("FRI coset is zero"))?;
    let monomials = interpolate_over_coset(final_values, coset, precomputations).into_storage();
    if monomials[schedule.final_degree..]
        .iter()
        .any(|el| el.is_zero() == false)
    {
        return Err(invariant_err!(
            "combined polynomial does not fold into degree {}",
            schedule.final_degree
        ));
    }
    let final_monomials = monomials[..schedule.final_degree].to_vec();
    transcript.witness_field_elements(&final_monomials);

    let pow_challenge = run_pow::<F, H, T>(schedule.pow_bits, transcript, worker);
    let query_indexes = draw_query_indexes(full_size, schedule.num_queries, transcript);

    let mut query_rounds = Vec::with_capacity(query_indexes.len());
    for idx in query_indexes.iter().copied() {
        let mut idx = idx;
        let mut round = Vec::with_capacity(oracles.len());
        for ((values, oracle), reduction_degree_log_2) in
            oracles.iter().zip(schedule.folding_schedule.iter())
        {
            let leaf_idx = idx >> reduction_degree_log_2;
            let elements_per_leaf = 1 << reduction_degree_log_2;
            let (_, proof) = oracle.get_proof(leaf_idx);
            round.push(OracleQuery {
                leaf_elements: values
                    [leaf_idx * elements_per_leaf..(leaf_idx + 1) * elements_per_leaf]
                    .to_vec(),
                proof,
            });
            idx = leaf_idx;
        }
        query_rounds.push(round);
    }

    log!(
        "FRI for base size 2^{} is done over {:?}",
        full_size.trailing_zeros(),
        now.elapsed()
    );

    let proof = FriProof {
        oracle_caps: oracles.iter().map(|(_, oracle)| oracle.get_cap()).collect(),
        final_monomials,
        query_rounds,
    };

    Ok((proof, query_indexes, pow_challenge))
}

fn pow_seed<F: SmallField, T: Transcript<F>>(transcript: &mut T) -> Vec<F> {
    transcript.get_multiple_challenges(4)
}

fn absorb_pow_challenge<F: SmallField, T: Transcript<F>>(transcript: &mut T, challenge: u64) {
    let low = F::from_u64_with_reduction(challenge & 0xffff_ffff);
    let high = F::from_u64_with_reduction(challenge >> 32);
    transcript.witness_field_elements(&[low, high]);
}

fn run_pow<F: SmallField, H: PoWRunner, T: Transcript<F>>(
    pow_bits: u32,
    transcript: &mut T,
    worker: &Worker,
) -> u64 {
    let now = std::time::Instant::now();
    let seed = pow_seed(transcript);
    let pow_challenge = H::run_from_field_elements(seed, pow_bits, worker);
    log!("PoW for {} bits taken {:?}", pow_bits, now.elapsed());
    absorb_pow_challenge(transcript, pow_challenge);

    pow_challenge
}

fn draw_query_indexes<F: SmallField, T: Transcript<F>>(
    domain_size: usize,
    num_queries: usize,
    transcript: &mut T,
) -> Vec<usize> {
    let num_bits = domain_size.trailing_zeros() as usize;
    let mut bools_buffer = BoolsBuffer::new(num_bits);

    (0..num_queries)
        .map(|_| bools_buffer.get_index::<F, T>(transcript, num_bits))
        .collect()
}

/// Replays the transcript part of FRI: absorbs oracle caps, draws folding challenges, absorbs
/// the final polynomial, checks grinding and draws query indexes. `None` if the proof shape is wrong
/// or PoW is invalid.
pub fn verify_fri_transcript<F: SmallField, H: TreeHasher<F> + PoWRunner, T: Transcript<F, CompatibleCap = H::Output>>(
    proof: &FriProof<F, H>,
    pow_challenge: u64,
    params: &FriParams,
    schedule: &FriSchedule,
    transcript: &mut T,
) -> Option<FriVerifierChallenges<F>> {
    if proof.oracle_caps.len() != schedule.folding_schedule.len() {
        log!("Invalid number of FRI oracles");
        return None;
    }
    if proof.final_monomials.len() != schedule.final_degree {
        log!("Invalid number of final FRI monomials");
        return None;
    }
    if proof.query_rounds.len() != schedule.num_queries {
        log!("Invalid number of FRI queries");
        return None;
    }

    let mut fold_challenges = Vec::with_capacity(schedule.folding_schedule.len());
    for cap in proof.oracle_caps.iter() {
        transcript.witness_merkle_tree_cap(cap);
        fold_challenges.push(transcript.get_challenge());
    }
    transcript.witness_field_elements(&proof.final_monomials);

    let seed = pow_seed(transcript);
    if H::verify_from_field_elements(seed, schedule.pow_bits, pow_challenge) == false {
        log!("PoW is invalid");
        return None;
    }
    absorb_pow_challenge(transcript, pow_challenge);

    let query_indexes = draw_query_indexes(params.lde_domain_size(), schedule.num_queries, transcript);

    Some(FriVerifierChallenges {
        fold_challenges,
        query_indexes,
    })
}

/// Checks one FRI query given the value of the combined polynomial at the queried point.
pub fn verify_fri_query<F: SmallField, H: TreeHasher<F>>(
    proof: &FriProof<F, H>,
    challenges: &FriVerifierChallenges<F>,
    query_number: usize,
    combined_value: F,
    params: &FriParams,
    schedule: &FriSchedule,
) -> bool {
    let full_size = params.lde_domain_size();
    let nu = domain_generator_for_size::<F>(full_size as u64);
    let nu_inverse = match nu.inverse() {
        Some(el) => el,
        None => return false,
    };
    let mut coset_inverse = match F::multiplicative_generator().inverse() {
        Some(el) => el,
        None => return false,
    };

    if proof.query_rounds[query_number].len() != schedule.folding_schedule.len() {
        log!("Invalid number of FRI oracle openings");
        return false;
    }

    let mut idx = challenges.query_indexes[query_number];
    let mut expected = combined_value;
    // size of the codeword at the current folding level and nu^-(full_size / level_size) is
    // the inverse generator of its domain
    let mut level_size = full_size;

    for (step, reduction_degree_log_2) in schedule.folding_schedule.iter().copied().enumerate() {
        let query = &proof.query_rounds[query_number][step];
        let elements_per_leaf = 1 << reduction_degree_log_2;
        if query.leaf_elements.len() != elements_per_leaf {
            log!("Invalid FRI leaf size at step {}", step);
            return false;
        }
        let leaf_idx = idx >> reduction_degree_log_2;
        let num_leafs = level_size >> reduction_degree_log_2;
        let cap = &proof.oracle_caps[step];
        let expected_cap_size = std::cmp::min(params.cap_size, num_leafs);
        if cap.len() != expected_cap_size
            || query.proof.len() != (num_leafs / expected_cap_size).trailing_zeros() as usize
        {
            log!("Invalid FRI oracle shape at step {}", step);
            return false;
        }
        let leaf_hash = H::hash_into_leaf(query.leaf_elements.iter());
        if MerkleTreeWithCap::<F, H>::verify_proof_over_cap(&query.proof, cap, leaf_hash, leaf_idx)
            == false
        {
            log!("FRI oracle {} Merkle proof is invalid", step);
            return false;
        }
        if query.leaf_elements[idx & (elements_per_leaf - 1)] != expected {
            log!("FRI folding is inconsistent at step {}", step);
            return false;
        }

        // fold the leaf down to a single element
        let mut values = query.leaf_elements.clone();
        let mut start = leaf_idx * elements_per_leaf;
        for power in challenge_powers(challenges.fold_challenges[step], reduction_degree_log_2) {
            let half_size = level_size / 2;
            let log_half_size = half_size.trailing_zeros();
            let step_nu_inverse = nu_inverse.pow_u64((full_size / level_size) as u64);
            let folded: Vec<F> = values
                .chunks(2)
                .enumerate()
                .map(|(i, pair)| {
                    let k = start / 2 + i;
                    let mut x_inverse =
                        step_nu_inverse.pow_u64(bitreverse_index(k, log_half_size) as u64);
                    x_inverse.mul_assign(&coset_inverse);
                    fold_pair(pair[0], pair[1], &power, &x_inverse)
                })
                .collect();
            values = folded;
            start /= 2;
            level_size = half_size;
            coset_inverse.square();
        }
        debug_assert_eq!(values.len(), 1);
        expected = values[0];
        idx = leaf_idx;
    }

    // and check the final polynomial at the remaining point
    let coset = match coset_inverse.inverse() {
        Some(el) => el,
        None => return false,
    };
    let level_nu = nu.pow_u64((full_size / level_size) as u64);
    let mut x = level_nu.pow_u64(bitreverse_index(idx, level_size.trailing_zeros()) as u64);
    x.mul_assign(&coset);
    if evaluate_monomials_at(&proof.final_monomials, &x) != expected {
        log!("Final FRI polynomial is inconsistent with the oracles");
        return false;
    }

    true
}
