use crate::cs::implementations::copy_permutation::compute_permutation_polys;
use crate::cs::implementations::evaluation::{
    chunk_alphas, combine_identities, evaluate_identities, ArgumentChallenges, CosetValues,
};
use crate::cs::implementations::lookup_argument::{compute_lookup_polys, compute_sorted_columns};
use crate::cs::implementations::lpc::{BatchTag, ListPolynomialCommitment};
use crate::cs::implementations::polynomial::{
    batch_ifft, interpolate_over_coset, FftPrecomputations, GenericPolynomial, LagrangeForm,
    MonomialForm,
};
use crate::cs::implementations::pow::PoWRunner;
use crate::cs::implementations::preprocessor::{
    CommonData, PolynomialTable, PreprocessedPrivateData, PreprocessedPublicData,
};
use crate::cs::implementations::proof::{Proof, ProofCommitments};
use crate::cs::implementations::transcript::Transcript;
use crate::cs::implementations::utils::{batch_inverse_inplace, domain_generator_for_size};
use crate::cs::oracle::TreeHasher;
use crate::cs::{ConstraintSystem, TableDescription};
use crate::error::{commitment_err, config_err, invariant_err, shape_err, Result};
use crate::field::SmallField;
use crate::worker::Worker;
use crate::{log, log_elapsed, profile_fn, profile_section};

/// Produces a proof that the assignment behind `private_data` satisfies `cs`.
///
/// `lpc` must be the commitment scheme `public_data` was preprocessed with, or any scheme with
/// the same parameters and fixed batch.
pub fn prove<
    F: SmallField,
    H: TreeHasher<F> + PoWRunner,
    T: Transcript<F, CompatibleCap = H::Output>,
>(
    cs: &ConstraintSystem<F>,
    desc: &TableDescription,
    public_data: &PreprocessedPublicData<F, H>,
    private_data: &PreprocessedPrivateData<F>,
    lpc: &mut ListPolynomialCommitment<F, H>,
    worker: &Worker,
) -> Result<Proof<F, H>> {
    profile_fn!(prove);
    let now = std::time::Instant::now();

    let mut transcript = T::new();
    let commitments = prove_arguments(
        cs,
        desc,
        public_data,
        private_data,
        lpc,
        &mut transcript,
        worker,
    )?;
    let eval_proof = lpc.proof_eval(&mut transcript, worker)?;

    log_elapsed!("Proving", now);

    Ok(Proof {
        commitments,
        eval_proof,
    })
}

/// Runs every argument, commits the quotient and schedules all openings, leaving the
/// evaluation proof to the caller.
pub fn prove_arguments<
    F: SmallField,
    H: TreeHasher<F> + PoWRunner,
    T: Transcript<F, CompatibleCap = H::Output>,
>(
    cs: &ConstraintSystem<F>,
    desc: &TableDescription,
    public_data: &PreprocessedPublicData<F, H>,
    private_data: &PreprocessedPrivateData<F>,
    lpc: &mut ListPolynomialCommitment<F, H>,
    transcript: &mut T,
    worker: &Worker,
) -> Result<ProofCommitments<F, H>> {
    let common = &public_data.common_data;
    if desc != &common.desc {
        return Err(shape_err!(
            "table description {:?} differs from the preprocessed one {:?}",
            desc,
            common.desc
        ));
    }
    let circuit_hash =
        cs.constraint_system_with_params_hash(desc, common.fri_params(), common.max_quotient_chunks)?;
    if circuit_hash != common.circuit_hash {
        return Err(config_err!(
            "constraint system or parameters differ from the preprocessed ones"
        ));
    }
    if private_data.witnesses.len() != desc.witness_columns {
        return Err(shape_err!(
            "{} witness columns given, expected {}",
            private_data.witnesses.len(),
            desc.witness_columns
        ));
    }

    let n = desc.rows_amount;
    let polys = PolynomialTable {
        public: public_data,
        private: private_data,
    };
    let precomputations = FftPrecomputations::new(n, worker);

    lpc.reset_proof_session();
    transcript.witness_bytes(&common.circuit_hash);
    lpc.setup(transcript, &common.commitment_scheme_data)?;

    // witnesses and public inputs
    let now = std::time::Instant::now();
    let variable_polys: Vec<GenericPolynomial<F, MonomialForm>> = polys.batch_columns()
        [BatchTag::VariableValues.index()]
    .iter()
    .map(|el| el.monomials.clone())
    .collect();
    lpc.append_many_to_batch(BatchTag::VariableValues, variable_polys)?;
    let variable_values = lpc.commit(BatchTag::VariableValues, worker)?;
    transcript.witness_merkle_tree_cap(&variable_values);
    let [beta, gamma] = transcript.get_multiple_challenges_fixed::<2>();
    log_elapsed!("Variable values commitment", now);

    // sorted columns of the lookup argument
    let lookup_theta = transcript.get_challenge();
    let mut columns = polys.batch_values();
    let sorted_values = compute_sorted_columns(common, cs, &columns, &lookup_theta, worker)?;
    let sorted_polys = interpolate_columns(&sorted_values, &precomputations, worker);
    lpc.append_many_to_batch(BatchTag::Lookup, sorted_polys.clone())?;
    let lookup = lpc.commit(BatchTag::Lookup, worker)?;
    transcript.witness_merkle_tree_cap(&lookup);
    let [lookup_beta, lookup_gamma] = transcript.get_multiple_challenges_fixed::<2>();

    let mut challenges = ArgumentChallenges {
        beta,
        gamma,
        lookup_theta,
        lookup_beta,
        lookup_gamma,
        permutation_alphas: vec![],
        lookup_alphas: vec![],
        adjacency_alphas: vec![],
        gates_theta: F::ZERO,
        alphas: [F::ZERO; 8],
    };

    // grand products
    let permutation_values = compute_permutation_polys(common, &columns, &beta, &gamma, worker)?;
    columns[BatchTag::Lookup.index()] = sorted_values.iter().map(|el| &el[..]).collect();
    let lookup_values = compute_lookup_polys(common, cs, &columns, &challenges, worker)?;
    let mut grand_product_values = permutation_values;
    grand_product_values.extend(lookup_values);
    debug_assert_eq!(
        grand_product_values.len(),
        common.permutation_polys_count() + common.lookup_polys_count()
    );
    let grand_product_polys = interpolate_columns(&grand_product_values, &precomputations, worker);
    drop(columns);
    drop(sorted_values);
    drop(grand_product_values);
    lpc.append_many_to_batch(BatchTag::Permutation, grand_product_polys.clone())?;
    let permutation = lpc.commit(BatchTag::Permutation, worker)?;
    transcript.witness_merkle_tree_cap(&permutation);

    challenges.permutation_alphas = chunk_alphas(
        transcript.get_multiple_challenges(common.permutation_polys_count().saturating_sub(1)),
    );
    challenges.lookup_alphas = chunk_alphas(
        transcript.get_multiple_challenges(common.lookup_polys_count().saturating_sub(1)),
    );
    challenges.adjacency_alphas =
        transcript.get_multiple_challenges(common.num_sorted_columns().saturating_sub(1));
    challenges.gates_theta = transcript.get_challenge();
    challenges.alphas = transcript.get_multiple_challenges_fixed::<8>();

    // quotient
    let mut batch_monomials: Vec<Vec<&GenericPolynomial<F, MonomialForm>>> = polys
        .batch_columns()
        .into_iter()
        .map(|batch| batch.into_iter().map(|el| &el.monomials).collect())
        .collect();
    batch_monomials[BatchTag::Permutation.index()] = grand_product_polys.iter().collect();
    batch_monomials[BatchTag::Lookup.index()] = sorted_polys.iter().collect();
    let quotient_chunks = compute_quotient(common, cs, &challenges, &batch_monomials, worker)?;
    drop(batch_monomials);
    lpc.append_many_to_batch(BatchTag::Quotient, quotient_chunks)?;
    let quotient = lpc.commit(BatchTag::Quotient, worker)?;
    transcript.witness_merkle_tree_cap(&quotient);

    let y = transcript.get_challenge();
    if common.vanishing_at(&y).is_zero() {
        return Err(commitment_err!("evaluation point lies in the basic domain"));
    }
    common.schedule_evaluation_points(lpc, &y)?;

    Ok(ProofCommitments {
        variable_values,
        permutation,
        lookup,
        quotient,
        _marker: std::marker::PhantomData,
    })
}

fn interpolate_columns<F: SmallField>(
    columns: &[Vec<F>],
    precomputations: &FftPrecomputations<F>,
    worker: &Worker,
) -> Vec<GenericPolynomial<F, MonomialForm>> {
    let values: Vec<GenericPolynomial<F, LagrangeForm>> = columns
        .iter()
        .map(|el| GenericPolynomial::from_storage(el.clone()))
        .collect();

    batch_ifft(values, precomputations, worker)
}

/// Naturally ordered values of every polynomial over `coset * <nu>` with `|nu| = size`.
fn batch_evaluate_over_coset<F: SmallField>(
    polys: &[&GenericPolynomial<F, MonomialForm>],
    coset: F,
    size: usize,
    precomputations: &FftPrecomputations<F>,
    worker: &Worker,
) -> Vec<Vec<F>> {
    let mut result = vec![vec![]; polys.len()];
    worker.scope(polys.len(), |scope, chunk_size| {
        for (src, dst) in polys.chunks(chunk_size).zip(result.chunks_mut(chunk_size)) {
            scope.spawn(move |_| {
                for (src, dst) in src.iter().zip(dst.iter_mut()) {
                    *dst = src.evaluate_over_coset_naturally_ordered(coset, size, precomputations);
                }
            });
        }
    });

    result
}

/// `T = (sum_i alpha_i * F_i) / Z`, split into `quotient_chunks` pieces of `rows_amount`
/// coefficients. Identities are evaluated over the coset `g * <nu>` of size
/// `quotient_degree_factor * rows_amount`, where rotation by `omega` is a shift by
/// `quotient_degree_factor` positions.
pub fn compute_quotient<F: SmallField, H: TreeHasher<F>>(
    common: &CommonData<F, H>,
    cs: &ConstraintSystem<F>,
    challenges: &ArgumentChallenges<F>,
    batch_monomials: &[Vec<&GenericPolynomial<F, MonomialForm>>],
    worker: &Worker,
) -> Result<Vec<GenericPolynomial<F, MonomialForm>>> {
    profile_fn!(compute_quotient);
    let now = std::time::Instant::now();

    let n = common.rows_amount();
    let factor = common.quotient_degree_factor;
    let extended_size = n * factor;
    let coset = F::multiplicative_generator();
    let precomputations = FftPrecomputations::new(extended_size, worker);
    log!("Will evaluate identities over a coset of factor {}", factor);

    let extended_values: Vec<Vec<Vec<F>>> = {
        profile_section!(extended_values);
        batch_monomials
            .iter()
            .map(|batch| {
                batch_evaluate_over_coset(batch, coset, extended_size, &precomputations, worker)
            })
            .collect()
    };
    let columns: Vec<Vec<&[F]>> = extended_values
        .iter()
        .map(|batch| batch.iter().map(|el| &el[..]).collect())
        .collect();

    // L_0 has all monomials equal to 1/n
    let n_inverse = F::from_u64_with_reduction(n as u64)
        .inverse()
        .ok_or_else(|| invariant_err!("domain size is not invertible"))?;
    let lagrange_0 = GenericPolynomial::<F, MonomialForm>::from_storage(vec![n_inverse; n])
        .evaluate_over_coset_naturally_ordered(coset, extended_size, &precomputations);

    // Z(g * nu^i) = g^n * (nu^n)^i - 1 only depends on i mod factor
    let coset_in_n = coset.pow_u64(n as u64);
    let nu_in_n = domain_generator_for_size::<F>(factor as u64);
    let mut vanishing_inversed: Vec<F> = (0..factor)
        .map(|i| {
            let mut tmp = nu_in_n.pow_u64(i as u64);
            tmp.mul_assign(&coset_in_n);
            tmp.sub_assign(&F::ONE);
            tmp
        })
        .collect();
    batch_inverse_inplace(&mut vanishing_inversed)
        .ok_or_else(|| invariant_err!("vanishing polynomial is zero on the extended coset"))?;

    let quotient_values = {
        profile_section!(quotient_values);
        worker.map_indexes(extended_size, |row| {
            let src = CosetValues {
                columns: &columns,
                factor,
                row,
                lagrange_0: lagrange_0[row],
            };
            let identities = evaluate_identities(common, cs, challenges, &src);
            let mut result = combine_identities(&identities, &challenges.alphas);
            result.mul_assign(&vanishing_inversed[row % factor]);

            result
        })
    };
    drop(columns);
    drop(extended_values);

    let mut quotient = interpolate_over_coset(quotient_values, coset, &precomputations);
    let quotient_size = common.quotient_chunks * n;
    if let Some(degree) = quotient.degree() {
        if degree >= quotient_size {
            return Err(invariant_err!(
                "quotient has degree {}, at most {} is expected: the constraints are not satisfied",
                degree,
                quotient_size - 1
            ));
        }
    }
    quotient.storage.truncate(quotient_size);

    log_elapsed!("Quotient computation", now);

    Ok(quotient.chunk_into_subpolys_of_degree(n, common.quotient_chunks))
}
