use crate::cs::implementations::evaluation::{
    chunk_alphas, combine_identities, evaluate_identities, ArgumentChallenges, ClaimedValues,
};
use crate::cs::implementations::lpc::{BatchTag, ListPolynomialCommitment};
use crate::cs::implementations::pow::PoWRunner;
use crate::cs::implementations::preprocessor::CommonData;
use crate::cs::implementations::proof::{EvaluationClaims, Proof, ProofCommitments};
use crate::cs::implementations::transcript::Transcript;
use crate::cs::oracle::TreeHasher;
use crate::cs::{ConstraintSystem, TableDescription};
use crate::field::SmallField;
use crate::{log, profile_fn};

/// Checks `proof` against the preprocessed circuit and the public inputs, given as the leading
/// `public_input_sizes[i]` values of every public input column.
///
/// `lpc` only has to be configured with the same FRI parameters as the prover's. Its fixed
/// batch is registered from `common` on first use.
pub fn verify<
    F: SmallField,
    H: TreeHasher<F> + PoWRunner,
    T: Transcript<F, CompatibleCap = H::Output>,
>(
    cs: &ConstraintSystem<F>,
    desc: &TableDescription,
    common: &CommonData<F, H>,
    public_inputs: &[Vec<F>],
    proof: &Proof<F, H>,
    lpc: &mut ListPolynomialCommitment<F, H>,
) -> bool {
    profile_fn!(verify);
    let now = std::time::Instant::now();

    let mut transcript = T::new();
    let (challenges, y) =
        match replay_arguments(cs, desc, common, &proof.commitments, lpc, &mut transcript) {
            Some(el) => el,
            None => return false,
        };

    let evaluations = &proof.eval_proof.evaluations;
    if lpc.check_evaluations_shape(evaluations) == false {
        log!("Evaluations do not match the scheduled points");
        return false;
    }
    if check_public_inputs(common, public_inputs, evaluations, &y) == false {
        return false;
    }
    if check_identities(cs, common, &challenges, evaluations, &y) == false {
        return false;
    }
    if lpc.verify_eval(&proof.eval_proof, &mut transcript) == false {
        log!("Evaluation proof is invalid");
        return false;
    }

    log!("Verification taken {:?}", now.elapsed());

    true
}

fn register_commitment<F: SmallField, H: TreeHasher<F> + PoWRunner>(
    lpc: &mut ListPolynomialCommitment<F, H>,
    tag: BatchTag,
    num_polys: usize,
    cap: &[H::Output],
) -> bool {
    let expected_cap_size = if num_polys == 0 {
        0
    } else {
        std::cmp::min(lpc.params().cap_size, lpc.lde_domain_size())
    };
    if cap.len() != expected_cap_size {
        log!("Cap of batch {:?} is malformed", tag);
        return false;
    }
    if let Err(e) = lpc.register_commitment(tag, num_polys, cap.to_vec()) {
        log!("{}", e);
        return false;
    }

    true
}

/// Mirrors the prover's transcript up to the evaluation point: registers every commitment,
/// draws the argument challenges and schedules the openings at `y`. `None` if the circuit,
/// the parameters or the commitments do not fit together.
pub fn replay_arguments<
    F: SmallField,
    H: TreeHasher<F> + PoWRunner,
    T: Transcript<F, CompatibleCap = H::Output>,
>(
    cs: &ConstraintSystem<F>,
    desc: &TableDescription,
    common: &CommonData<F, H>,
    commitments: &ProofCommitments<F, H>,
    lpc: &mut ListPolynomialCommitment<F, H>,
    transcript: &mut T,
) -> Option<(ArgumentChallenges<F>, F)> {
    if desc != &common.desc {
        log!("Table description differs from the preprocessed one");
        return None;
    }
    match cs.constraint_system_with_params_hash(desc, common.fri_params(), common.max_quotient_chunks)
    {
        Ok(hash) if hash == common.circuit_hash => {}
        _ => {
            log!("Constraint system or parameters differ from the preprocessed ones");
            return None;
        }
    }

    lpc.reset_proof_session();
    transcript.witness_bytes(&common.circuit_hash);
    if let Err(e) = lpc.setup(transcript, &common.commitment_scheme_data) {
        log!("{}", e);
        return None;
    }

    let num_variable = desc.witness_columns + desc.public_input_columns;
    if register_commitment(
        lpc,
        BatchTag::VariableValues,
        num_variable,
        &commitments.variable_values,
    ) == false
    {
        return None;
    }
    transcript.witness_merkle_tree_cap(&commitments.variable_values);
    let [beta, gamma] = transcript.get_multiple_challenges_fixed::<2>();

    let lookup_theta = transcript.get_challenge();
    if register_commitment(
        lpc,
        BatchTag::Lookup,
        common.num_sorted_columns(),
        &commitments.lookup,
    ) == false
    {
        return None;
    }
    transcript.witness_merkle_tree_cap(&commitments.lookup);
    let [lookup_beta, lookup_gamma] = transcript.get_multiple_challenges_fixed::<2>();

    if register_commitment(
        lpc,
        BatchTag::Permutation,
        common.permutation_polys_count() + common.lookup_polys_count(),
        &commitments.permutation,
    ) == false
    {
        return None;
    }
    transcript.witness_merkle_tree_cap(&commitments.permutation);

    let permutation_alphas = chunk_alphas(
        transcript.get_multiple_challenges(common.permutation_polys_count().saturating_sub(1)),
    );
    let lookup_alphas = chunk_alphas(
        transcript.get_multiple_challenges(common.lookup_polys_count().saturating_sub(1)),
    );
    let adjacency_alphas =
        transcript.get_multiple_challenges(common.num_sorted_columns().saturating_sub(1));
    let gates_theta = transcript.get_challenge();
    let alphas = transcript.get_multiple_challenges_fixed::<8>();

    if register_commitment(
        lpc,
        BatchTag::Quotient,
        common.quotient_chunks,
        &commitments.quotient,
    ) == false
    {
        return None;
    }
    transcript.witness_merkle_tree_cap(&commitments.quotient);

    let y = transcript.get_challenge();
    if common.vanishing_at(&y).is_zero() {
        log!("Evaluation point lies in the basic domain");
        return None;
    }
    if let Err(e) = common.schedule_evaluation_points(lpc, &y) {
        log!("{}", e);
        return None;
    }

    let challenges = ArgumentChallenges {
        beta,
        gamma,
        lookup_theta,
        lookup_beta,
        lookup_gamma,
        permutation_alphas,
        lookup_alphas,
        adjacency_alphas,
        gates_theta,
        alphas,
    };

    Some((challenges, y))
}

/// `PI_i(y) == sum_j v_j * L_j(y)` over the given leading values of every public input column,
/// with `L_j(y) = omega^j * (y^n - 1) / (n * (y - omega^j))`.
pub fn check_public_inputs<F: SmallField, H: TreeHasher<F>>(
    common: &CommonData<F, H>,
    public_inputs: &[Vec<F>],
    evaluations: &EvaluationClaims<F>,
    y: &F,
) -> bool {
    if public_inputs.len() != common.public_input_sizes.len() {
        log!("Invalid number of public input columns");
        return false;
    }
    let n = common.rows_amount();
    let omega = common.omega();
    let mut scale = common.vanishing_at(y);
    match F::from_u64_with_reduction(n as u64).inverse() {
        Some(el) => {
            scale.mul_assign(&el);
        }
        None => return false,
    }
    let schedule = common.evaluation_schedule();

    for (i, (values, size)) in public_inputs
        .iter()
        .zip(common.public_input_sizes.iter())
        .enumerate()
    {
        if values.len() != *size {
            log!(
                "Public input column {} has {} values, expected {}",
                i,
                values.len(),
                size
            );
            return false;
        }
        let mut expected = F::ZERO;
        let mut omega_power = F::ONE;
        for value in values.iter() {
            let mut denominator = *y;
            denominator.sub_assign(&omega_power);
            let denominator = match denominator.inverse() {
                Some(el) => el,
                None => return false,
            };
            let mut tmp = *value;
            tmp.mul_assign(&omega_power);
            tmp.mul_assign(&scale);
            tmp.mul_assign(&denominator);
            expected.add_assign(&tmp);
            omega_power.mul_assign(&omega);
        }

        let (tag, index) = common.column_position(crate::cs::ColumnType::PublicInput, i);
        let position = schedule[tag.index()][index].iter().position(|el| *el == 0);
        let claimed = position.and_then(|el| evaluations[tag.index()][index].get(el));
        if claimed != Some(&expected) {
            log!("Public input column {} does not match the claimed value", i);
            return false;
        }
    }

    true
}

/// `sum_i alpha_i * F_i(y) == T(y) * Z(y)` with `T(y) = sum_j y^(j * n) * T_j(y)`.
pub fn check_identities<F: SmallField, H: TreeHasher<F>>(
    cs: &ConstraintSystem<F>,
    common: &CommonData<F, H>,
    challenges: &ArgumentChallenges<F>,
    evaluations: &EvaluationClaims<F>,
    y: &F,
) -> bool {
    let lagrange_0 = match common.lagrange_0_at(y) {
        Some(el) => el,
        None => return false,
    };
    let schedule = common.evaluation_schedule();
    let src = ClaimedValues {
        schedule: &schedule,
        evaluations,
        lagrange_0,
    };
    let identities = evaluate_identities(common, cs, challenges, &src);
    let lhs = combine_identities(&identities, &challenges.alphas);

    let y_in_n = y.pow_u64(common.rows_amount() as u64);
    let mut quotient = F::ZERO;
    let mut current = F::ONE;
    for chunk in evaluations[BatchTag::Quotient.index()].iter() {
        let mut tmp = match chunk.first() {
            Some(el) => *el,
            None => return false,
        };
        tmp.mul_assign(&current);
        quotient.add_assign(&tmp);
        current.mul_assign(&y_in_n);
    }
    let mut rhs = quotient;
    rhs.mul_assign(&common.vanishing_at(y));

    if lhs != rhs {
        log!("Quotient identity does not hold at the evaluation point");
        return false;
    }

    true
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cs::implementations::prover::test::setup;
    use crate::cs::implementations::prover::prove;
    use crate::cs::implementations::test_circuits;
    use crate::cs::implementations::transcript::Blake2sTranscript;
    use crate::field::goldilocks::GoldilocksField;
    use crate::field::Field;
    use crate::worker::Worker;

    type F = GoldilocksField;
    type H = blake2::Blake2s256;

    #[test]
    fn test_verifier_scheme_is_reusable() {
        let worker = Worker::new_with_num_threads(2);
        let sequence = test_circuits::fibonacci_values();
        let mut setup = setup(test_circuits::fibonacci(&sequence), 0, &worker).unwrap();
        let proof = prove::<F, H, Blake2sTranscript>(
            &setup.cs,
            &setup.desc,
            &setup.public_data,
            &setup.private_data,
            &mut setup.lpc,
            &worker,
        )
        .unwrap();

        let mut lpc = ListPolynomialCommitment::<F, H>::new(test_circuits::test_params(), &worker)
            .unwrap();
        let common = &setup.public_data.common_data;
        for _ in 0..2 {
            assert!(verify::<F, H, Blake2sTranscript>(
                &setup.cs,
                &setup.desc,
                common,
                &setup.public_inputs,
                &proof,
                &mut lpc,
            ));
        }

        // the prover's own scheme verifies as well
        assert!(verify::<F, H, Blake2sTranscript>(
            &setup.cs,
            &setup.desc,
            common,
            &setup.public_inputs,
            &proof,
            &mut setup.lpc,
        ));
    }

    #[test]
    fn test_mismatched_verifier_inputs() {
        let worker = Worker::new_with_num_threads(2);
        let mut setup = setup(test_circuits::adder(&test_circuits::ADDER_OUTPUT), 0, &worker).unwrap();
        let proof = prove::<F, H, Blake2sTranscript>(
            &setup.cs,
            &setup.desc,
            &setup.public_data,
            &setup.private_data,
            &mut setup.lpc,
            &worker,
        )
        .unwrap();
        let common = &setup.public_data.common_data;
        let mut lpc = ListPolynomialCommitment::<F, H>::new(test_circuits::test_params(), &worker)
            .unwrap();

        // other FRI parameters
        let mut params = test_circuits::test_params();
        params.lde_factor = 8;
        let mut other_lpc = ListPolynomialCommitment::<F, H>::new(params, &worker).unwrap();
        assert!(
            verify::<F, H, Blake2sTranscript>(
                &setup.cs,
                &setup.desc,
                common,
                &[],
                &proof,
                &mut other_lpc,
            ) == false
        );

        // other circuit
        let (other_cs, _, _) = test_circuits::copy_circuit(1, 1);
        assert!(
            verify::<F, H, Blake2sTranscript>(&other_cs, &setup.desc, common, &[], &proof, &mut lpc)
                == false
        );

        // malformed cap
        let mut tampered = proof.clone();
        tampered.commitments.quotient.pop();
        assert!(
            verify::<F, H, Blake2sTranscript>(
                &setup.cs,
                &setup.desc,
                common,
                &[],
                &tampered,
                &mut lpc,
            ) == false
        );

        // missing claimed value
        let mut tampered = proof.clone();
        tampered.eval_proof.evaluations[BatchTag::FixedValues.index()][0].pop();
        assert!(
            verify::<F, H, Blake2sTranscript>(
                &setup.cs,
                &setup.desc,
                common,
                &[],
                &tampered,
                &mut lpc,
            ) == false
        );

        // the untouched proof still passes with the same scheme
        assert!(verify::<F, H, Blake2sTranscript>(
            &setup.cs,
            &setup.desc,
            common,
            &[],
            &proof,
            &mut lpc,
        ));
    }

    #[test]
    fn test_lagrange_basis_at_domain_points() {
        let worker = Worker::new_with_num_threads(1);
        let sequence = test_circuits::fibonacci_values();
        let setup = setup(test_circuits::fibonacci(&sequence), 0, &worker).unwrap();
        let common = &setup.public_data.common_data;

        // PI(y) from its monomials agrees with the Lagrange sum over the first values
        let y = F::from_u64_with_reduction(123456789);
        let pi = &setup.public_data.public_inputs[0];
        let mut evaluations = common
            .evaluation_schedule()
            .iter()
            .map(|batch| batch.iter().map(|el| vec![F::ZERO; el.len()]).collect())
            .collect::<EvaluationClaims<F>>();
        let (tag, index) = common.column_position(crate::cs::ColumnType::PublicInput, 0);
        evaluations[tag.index()][index][0] = pi.monomials.evaluate_at(&y);
        assert!(check_public_inputs(common, &setup.public_inputs, &evaluations, &y));

        let mut wrong = setup.public_inputs.clone();
        wrong[0][0].add_assign(&F::ONE);
        assert!(check_public_inputs(common, &wrong, &evaluations, &y) == false);

        // y in the domain
        assert!(check_public_inputs(common, &setup.public_inputs, &evaluations, &F::ONE) == false);
    }
}
