//! Aggregation of several Placeholder proofs under one FRI proof.
//!
//! Every instance runs its arguments with its own transcript and commitment scheme. Their
//! combined polynomials are summed with consecutive powers of a shared `theta`, so a single
//! FRI run covers all of them, and every scheme opens its own batches at the shared query indexes.

use itertools::izip;

use crate::cs::implementations::fri::{verify_fri_query, verify_fri_transcript};
use crate::cs::implementations::lpc::ListPolynomialCommitment;
use crate::cs::implementations::pow::PoWRunner;
use crate::cs::implementations::preprocessor::{
    CommonData, PreprocessedPrivateData, PreprocessedPublicData,
};
use crate::cs::implementations::proof::{AggregatedEvalProof, AggregatedProof, PartialProof};
use crate::cs::implementations::prover::prove_arguments;
use crate::cs::implementations::transcript::Transcript;
use crate::cs::implementations::verifier::{
    check_identities, check_public_inputs, replay_arguments,
};
use crate::cs::oracle::TreeHasher;
use crate::cs::{ConstraintSystem, TableDescription};
use crate::error::{config_err, Result};
use crate::field::SmallField;
use crate::worker::Worker;
use crate::{log, log_elapsed, profile_fn};

pub struct ProverInstance<'a, F: SmallField, H: TreeHasher<F> + PoWRunner> {
    pub cs: &'a ConstraintSystem<F>,
    pub desc: &'a TableDescription,
    pub public_data: &'a PreprocessedPublicData<F, H>,
    pub private_data: &'a PreprocessedPrivateData<F>,
    pub lpc: &'a mut ListPolynomialCommitment<F, H>,
}

pub struct VerifierInstance<'a, F: SmallField, H: TreeHasher<F> + PoWRunner> {
    pub cs: &'a ConstraintSystem<F>,
    pub desc: &'a TableDescription,
    pub common: &'a CommonData<F, H>,
    pub public_inputs: &'a [Vec<F>],
    pub lpc: &'a mut ListPolynomialCommitment<F, H>,
}

/// `theta` of the aggregated combined polynomial, derived from the last challenge of every
/// instance transcript.
fn aggregation_transcript<F: SmallField, T: Transcript<F>>(instance_challenges: &[F]) -> (T, F) {
    let mut aggregation = T::new();
    aggregation.witness_field_elements(instance_challenges);
    let seed = aggregation.get_challenge();

    let mut transcript = T::new();
    transcript.witness_field_elements(&[seed]);
    let theta = transcript.get_challenge();

    (transcript, theta)
}

pub fn prove_aggregated<
    F: SmallField,
    H: TreeHasher<F> + PoWRunner,
    T: Transcript<F, CompatibleCap = H::Output>,
>(
    instances: &mut [ProverInstance<'_, F, H>],
    worker: &Worker,
) -> Result<AggregatedProof<F, H>> {
    profile_fn!(prove_aggregated);
    let now = std::time::Instant::now();

    let params = match instances.first() {
        Some(el) => el.lpc.params().clone(),
        None => return Err(config_err!("nothing to aggregate")),
    };
    if instances.iter().any(|el| el.lpc.params() != &params) {
        return Err(config_err!(
            "aggregated instances must share commitment scheme parameters"
        ));
    }

    let mut partial_proofs = Vec::with_capacity(instances.len());
    let mut instance_challenges = Vec::with_capacity(instances.len());
    for instance in instances.iter_mut() {
        let mut transcript = T::new();
        let commitments = prove_arguments(
            instance.cs,
            instance.desc,
            instance.public_data,
            instance.private_data,
            instance.lpc,
            &mut transcript,
            worker,
        )?;
        let evaluations = instance.lpc.evaluate_scheduled_points(worker)?;
        ListPolynomialCommitment::<F, H>::absorb_evaluations(&mut transcript, &evaluations);
        instance_challenges.push(transcript.get_challenge());
        partial_proofs.push(PartialProof {
            commitments,
            evaluations,
        });
    }

    let (mut transcript, theta) = aggregation_transcript::<F, T>(&instance_challenges);
    let mut combined_q = vec![F::ZERO; params.lde_domain_size()];
    let mut theta_offset = 0;
    for instance in instances.iter() {
        let partial = instance.lpc.prepare_combined_Q(theta, theta_offset, worker)?;
        for (dst, src) in combined_q.iter_mut().zip(partial.iter()) {
            dst.add_assign(src);
        }
        theta_offset += instance.lpc.compute_theta_power_for_combined_Q();
    }

    let (fri_proof, query_indexes, proof_of_work) =
        instances[0]
            .lpc
            .proof_eval_FRI_proof(combined_q, &mut transcript, worker)?;
    let mut lpc_proofs = Vec::with_capacity(instances.len());
    for instance in instances.iter_mut() {
        lpc_proofs.push(instance.lpc.proof_eval_lpc_proof(&query_indexes)?);
    }

    log_elapsed!(
        format!("Aggregated proving of {} instances", instances.len()),
        now
    );

    Ok(AggregatedProof {
        partial_proofs,
        aggregated_proof: AggregatedEvalProof {
            lpc_proofs,
            fri_proof,
            proof_of_work,
        },
    })
}

/// Checks every instance's identities at its own evaluation point, then the shared FRI proof
/// of the summed combined polynomials. Instances must come in the order they were proven.
pub fn verify_aggregated<
    F: SmallField,
    H: TreeHasher<F> + PoWRunner,
    T: Transcript<F, CompatibleCap = H::Output>,
>(
    instances: &mut [VerifierInstance<'_, F, H>],
    proof: &AggregatedProof<F, H>,
) -> bool {
    profile_fn!(verify_aggregated);
    let aggregated = &proof.aggregated_proof;
    if instances.is_empty()
        || proof.partial_proofs.len() != instances.len()
        || aggregated.lpc_proofs.len() != instances.len()
    {
        log!("Invalid number of aggregated instances");
        return false;
    }
    let params = instances[0].lpc.params().clone();
    if instances.iter().any(|el| el.lpc.params() != &params) {
        log!("Aggregated instances use different commitment scheme parameters");
        return false;
    }

    let mut instance_challenges = Vec::with_capacity(instances.len());
    for (i, (instance, partial)) in instances
        .iter_mut()
        .zip(proof.partial_proofs.iter())
        .enumerate()
    {
        let mut transcript = T::new();
        let (challenges, y) = match replay_arguments(
            instance.cs,
            instance.desc,
            instance.common,
            &partial.commitments,
            instance.lpc,
            &mut transcript,
        ) {
            Some(el) => el,
            None => return false,
        };
        if instance.lpc.check_evaluations_shape(&partial.evaluations) == false {
            log!("Evaluations of instance {} do not match the scheduled points", i);
            return false;
        }
        if check_public_inputs(instance.common, instance.public_inputs, &partial.evaluations, &y)
            == false
            || check_identities(
                instance.cs,
                instance.common,
                &challenges,
                &partial.evaluations,
                &y,
            ) == false
        {
            log!("Instance {} is not satisfied", i);
            return false;
        }
        ListPolynomialCommitment::<F, H>::absorb_evaluations(&mut transcript, &partial.evaluations);
        instance_challenges.push(transcript.get_challenge());
    }

    let (mut transcript, theta) = aggregation_transcript::<F, T>(&instance_challenges);
    let fri_challenges = match verify_fri_transcript(
        &aggregated.fri_proof,
        aggregated.proof_of_work,
        &params,
        instances[0].lpc.schedule(),
        &mut transcript,
    ) {
        Some(el) => el,
        None => return false,
    };
    let num_queries = fri_challenges.query_indexes.len();
    if aggregated
        .lpc_proofs
        .iter()
        .any(|el| el.queries.len() != num_queries)
    {
        log!("Invalid number of LPC queries");
        return false;
    }

    for (query_number, idx) in fri_challenges.query_indexes.iter().copied().enumerate() {
        let mut combined_value = F::ZERO;
        let mut theta_offset = 0;
        for (instance, partial, lpc_proof) in izip!(
            instances.iter(),
            proof.partial_proofs.iter(),
            aggregated.lpc_proofs.iter()
        ) {
            match instance.lpc.combined_Q_at_query(
                &partial.evaluations,
                &lpc_proof.queries[query_number],
                idx,
                theta,
                theta_offset,
            ) {
                Some(el) => combined_value.add_assign(&el),
                None => return false,
            };
            theta_offset += instance.lpc.compute_theta_power_for_combined_Q();
        }
        if verify_fri_query(
            &aggregated.fri_proof,
            &fri_challenges,
            query_number,
            combined_value,
            &params,
            instances[0].lpc.schedule(),
        ) == false
        {
            return false;
        }
    }

    true
}
