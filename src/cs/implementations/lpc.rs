//! Batched list polynomial commitment.
//!
//! Polynomials are appended to one of five batches, every batch is committed as a Merkle tree
//! over the LDE with one element per polynomial in each leaf. All scheduled openings are proven
//! together: claimed values are absorbed, a challenge `theta` combines all
//! `(f(x) - f(z)) / (x - z)` terms into one codeword, and that codeword goes through FRI.
//! The same query indexes then open every batch tree.

use derivative::Derivative;

use crate::config::{FriParams, FriSchedule};
use crate::cs::implementations::fri::{
    prove_fri, verify_fri_query, verify_fri_transcript, FriProof,
};
use crate::cs::implementations::polynomial::{
    batch_lde, FftPrecomputations, GenericPolynomial, MonomialForm,
};
use crate::cs::implementations::pow::PoWRunner;
use crate::cs::implementations::proof::{EvalProof, EvaluationClaims, LpcProof, OracleQuery};
use crate::cs::implementations::transcript::Transcript;
use crate::cs::implementations::utils::{
    batch_inverse_inplace_parallel, bitreversed_coset_points, domain_generator_for_size,
};
use crate::cs::oracle::merkle_tree::MerkleTreeWithCap;
use crate::cs::oracle::TreeHasher;
use crate::error::{commitment_err, config_err, Result};
use crate::field::SmallField;
use crate::utils::bitreverse_index;
use crate::worker::Worker;
use crate::{log, profile_fn};

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub enum BatchTag {
    FixedValues,
    VariableValues,
    Permutation,
    Lookup,
    Quotient,
}

impl BatchTag {
    pub const ALL: [BatchTag; 5] = [
        BatchTag::FixedValues,
        BatchTag::VariableValues,
        BatchTag::Permutation,
        BatchTag::Lookup,
        BatchTag::Quotient,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BatchState {
    Open,
    Committed,
    Proven,
}

#[derive(Derivative)]
#[derivative(Debug(bound = ""))]
struct Batch<F: SmallField, H: TreeHasher<F>> {
    state: BatchState,
    num_polys: usize,
    #[derivative(Debug = "ignore")]
    polys: Vec<GenericPolynomial<F, MonomialForm>>,
    #[derivative(Debug = "ignore")]
    ldes: Vec<Vec<F>>,
    #[derivative(Debug = "ignore")]
    tree: Option<MerkleTreeWithCap<F, H>>,
    cap: Vec<H::Output>,
    eval_points: Vec<Vec<F>>,
}

impl<F: SmallField, H: TreeHasher<F>> Batch<F, H> {
    fn new() -> Self {
        Self {
            state: BatchState::Open,
            num_polys: 0,
            polys: Vec::new(),
            ldes: Vec::new(),
            tree: None,
            cap: Vec::new(),
            eval_points: Vec::new(),
        }
    }
}

/// What a verifier needs to mirror the prover's commitment scheme state.
/// It holds the FRI parameters, the number of fixed polynomials and their commitment.
#[derive(Derivative, serde::Serialize, serde::Deserialize)]
#[derivative(Clone(bound = ""), Debug(bound = ""), PartialEq(bound = ""), Eq(bound = ""))]
#[serde(bound = "")]
pub struct CommitmentSchemeData<F: SmallField, H: TreeHasher<F>> {
    pub fri_params: FriParams,
    pub fixed_batch_size: usize,
    pub fixed_commitment: Vec<H::Output>,
    #[serde(skip)]
    #[derivative(Debug = "ignore", PartialEq = "ignore")]
    pub _marker: std::marker::PhantomData<F>,
}

/// One scheduled opening in the canonical order.
#[derive(Clone, Copy, Debug)]
struct ScheduledOpening<F: SmallField> {
    batch: usize,
    poly: usize,
    point_idx: usize,
    value: F,
}

#[derive(Derivative)]
#[derivative(Debug(bound = ""))]
pub struct ListPolynomialCommitment<F: SmallField, H: TreeHasher<F> + PoWRunner> {
    params: FriParams,
    schedule: FriSchedule,
    #[derivative(Debug = "ignore")]
    precomputations: FftPrecomputations<F>,
    batches: Vec<Batch<F, H>>,
    #[derivative(Debug = "ignore")]
    evaluations: Option<EvaluationClaims<F>>,
}

impl<F: SmallField, H: TreeHasher<F> + PoWRunner> ListPolynomialCommitment<F, H> {
    pub fn new(params: FriParams, worker: &Worker) -> Result<Self> {
        let schedule = params.schedule()?;
        let precomputations = FftPrecomputations::new(params.lde_domain_size(), worker);

        Ok(Self {
            params,
            schedule,
            precomputations,
            batches: BatchTag::ALL.iter().map(|_| Batch::new()).collect(),
            evaluations: None,
        })
    }

    pub fn params(&self) -> &FriParams {
        &self.params
    }

    pub fn schedule(&self) -> &FriSchedule {
        &self.schedule
    }

    pub fn lde_domain_size(&self) -> usize {
        self.params.lde_domain_size()
    }

    pub fn batch_state(&self, tag: BatchTag) -> BatchState {
        self.batches[tag.index()].state
    }

    pub fn batch_size(&self, tag: BatchTag) -> usize {
        self.batches[tag.index()].num_polys
    }

    pub fn commitment(&self, tag: BatchTag) -> &[H::Output] {
        &self.batches[tag.index()].cap
    }

    pub fn append_to_batch(
        &mut self,
        tag: BatchTag,
        poly: GenericPolynomial<F, MonomialForm>,
    ) -> Result<()> {
        let degree_bound = self.params.degree_bound();
        let batch = &mut self.batches[tag.index()];
        if batch.state != BatchState::Open {
            return Err(commitment_err!(
                "can not append to batch {:?} in state {:?}",
                tag,
                batch.state
            ));
        }
        let mut poly = poly;
        if poly.storage.len() > degree_bound {
            if poly.storage[degree_bound..].iter().any(|el| el.is_zero() == false) {
                return Err(commitment_err!(
                    "polynomial of degree {:?} exceeds the degree bound {} of batch {:?}",
                    poly.degree(),
                    degree_bound,
                    tag
                ));
            }
            poly.storage.truncate(degree_bound);
        }
        batch.polys.push(poly);
        batch.num_polys += 1;

        Ok(())
    }

    pub fn append_many_to_batch(
        &mut self,
        tag: BatchTag,
        polys: Vec<GenericPolynomial<F, MonomialForm>>,
    ) -> Result<()> {
        for poly in polys.into_iter() {
            self.append_to_batch(tag, poly)?;
        }

        Ok(())
    }

    /// LDEs the batch and builds its tree. An empty batch gets an empty commitment.
    pub fn commit(&mut self, tag: BatchTag, worker: &Worker) -> Result<Vec<H::Output>> {
        profile_fn!(lpc_commit);
        let now = std::time::Instant::now();
        let lde_size = self.params.lde_domain_size();
        let cap_size = self.params.cap_size;
        let batch = &mut self.batches[tag.index()];
        if batch.state != BatchState::Open {
            return Err(commitment_err!("batch {:?} is already committed", tag));
        }

        if batch.polys.is_empty() == false {
            let ldes = batch_lde(
                &batch.polys,
                F::multiplicative_generator(),
                lde_size,
                &self.precomputations,
                worker,
            );
            batch.ldes = ldes.into_iter().map(|el| el.into_storage()).collect();
            let sources: Vec<&[F]> = batch.ldes.iter().map(|el| &el[..]).collect();
            let tree = MerkleTreeWithCap::<F, H>::construct_by_chunking_from_flat_sources(
                &sources, 1, cap_size, worker,
            );
            batch.cap = tree.get_cap();
            batch.tree = Some(tree);
        }
        batch.eval_points = vec![vec![]; batch.num_polys];
        batch.state = BatchState::Committed;

        log!(
            "Commitment to {} polynomials of batch {:?} taken {:?}",
            batch.num_polys,
            tag,
            now.elapsed()
        );

        Ok(batch.cap.clone())
    }

    /// Verifier side counterpart of `commit`: the batch becomes known by its size and commitment.
    pub fn register_commitment(
        &mut self,
        tag: BatchTag,
        num_polys: usize,
        cap: Vec<H::Output>,
    ) -> Result<()> {
        let batch = &mut self.batches[tag.index()];
        if batch.state != BatchState::Open || batch.num_polys != 0 {
            return Err(commitment_err!("batch {:?} is already committed", tag));
        }
        batch.num_polys = num_polys;
        batch.cap = cap;
        batch.eval_points = vec![vec![]; num_polys];
        batch.state = BatchState::Committed;

        Ok(())
    }

    pub fn commitment_scheme_data(&self) -> Result<CommitmentSchemeData<F, H>> {
        let fixed = &self.batches[BatchTag::FixedValues.index()];
        if fixed.state == BatchState::Open {
            return Err(commitment_err!("fixed values are not committed"));
        }

        Ok(CommitmentSchemeData {
            fri_params: self.params.clone(),
            fixed_batch_size: fixed.num_polys,
            fixed_commitment: fixed.cap.clone(),
            _marker: std::marker::PhantomData,
        })
    }

    /// Makes the state consistent with `data`, registering the fixed batch on the verifier side,
    /// and absorbs `data` into the transcript.
    pub fn setup<T: Transcript<F>>(
        &mut self,
        transcript: &mut T,
        data: &CommitmentSchemeData<F, H>,
    ) -> Result<()> {
        if data.fri_params != self.params {
            return Err(config_err!(
                "commitment scheme is configured with {:?}, but data was produced for {:?}",
                self.params,
                data.fri_params
            ));
        }
        let fixed = &self.batches[BatchTag::FixedValues.index()];
        if fixed.state == BatchState::Open && fixed.num_polys == 0 {
            self.register_commitment(
                BatchTag::FixedValues,
                data.fixed_batch_size,
                data.fixed_commitment.clone(),
            )?;
        } else if fixed.num_polys != data.fixed_batch_size || fixed.cap != data.fixed_commitment {
            return Err(commitment_err!(
                "fixed values commitment differs from the preprocessed one"
            ));
        }

        let encoding = bincode::serialize(data)
            .map_err(|e| commitment_err!("failed to serialize commitment scheme data: {}", e))?;
        transcript.witness_bytes(&encoding);

        Ok(())
    }

    pub fn append_eval_point(&mut self, tag: BatchTag, index: usize, point: F) -> Result<()> {
        let batch = &mut self.batches[tag.index()];
        if batch.state != BatchState::Committed {
            return Err(commitment_err!(
                "can not schedule openings for batch {:?} in state {:?}",
                tag,
                batch.state
            ));
        }
        if index >= batch.num_polys {
            return Err(commitment_err!(
                "batch {:?} has {} polynomials, can not open polynomial {}",
                tag,
                batch.num_polys,
                index
            ));
        }
        batch.eval_points[index].push(point);
        self.evaluations = None;

        Ok(())
    }

    pub fn append_eval_point_to_all(&mut self, tag: BatchTag, point: F) -> Result<()> {
        for index in 0..self.batch_size(tag) {
            self.append_eval_point(tag, index, point)?;
        }

        Ok(())
    }

    pub fn eval_points(&self, tag: BatchTag) -> &[Vec<F>] {
        &self.batches[tag.index()].eval_points
    }

    /// Horner evaluation of every scheduled opening.
    pub fn evaluate_scheduled_points(&mut self, worker: &Worker) -> Result<EvaluationClaims<F>> {
        profile_fn!(evaluate_scheduled_points);
        let mut result = Vec::with_capacity(self.batches.len());
        for (tag, batch) in BatchTag::ALL.iter().zip(self.batches.iter()) {
            let scheduled = batch.eval_points.iter().any(|el| el.is_empty() == false);
            if scheduled && batch.polys.len() != batch.num_polys {
                return Err(commitment_err!(
                    "batch {:?} is known only by commitment and can not be evaluated",
                    tag
                ));
            }
            let mut batch_values = vec![vec![]; batch.eval_points.len()];
            worker.scope(batch.eval_points.len(), |scope, chunk_size| {
                for ((dst, points), polys) in batch_values
                    .chunks_mut(chunk_size)
                    .zip(batch.eval_points.chunks(chunk_size))
                    .zip(batch.polys.chunks(chunk_size))
                {
                    scope.spawn(move |_| {
                        for ((dst, points), poly) in
                            dst.iter_mut().zip(points.iter()).zip(polys.iter())
                        {
                            *dst = points.iter().map(|z| poly.evaluate_at(z)).collect();
                        }
                    });
                }
            });
            result.push(batch_values);
        }
        self.evaluations = Some(result.clone());

        Ok(result)
    }

    #[allow(non_snake_case)]
    pub fn compute_theta_power_for_combined_Q(&self) -> usize {
        self.batches
            .iter()
            .map(|batch| batch.eval_points.iter().map(|el| el.len()).sum::<usize>())
            .sum()
    }

    fn scheduled_openings(
        &self,
        evaluations: &EvaluationClaims<F>,
    ) -> (Vec<ScheduledOpening<F>>, Vec<F>) {
        let mut distinct_points: Vec<F> = Vec::new();
        let mut openings = Vec::with_capacity(self.compute_theta_power_for_combined_Q());
        for (batch_idx, batch) in self.batches.iter().enumerate() {
            for (poly_idx, points) in batch.eval_points.iter().enumerate() {
                for (k, point) in points.iter().enumerate() {
                    let point_idx = match distinct_points.iter().position(|el| el == point) {
                        Some(pos) => pos,
                        None => {
                            distinct_points.push(*point);
                            distinct_points.len() - 1
                        }
                    };
                    openings.push(ScheduledOpening {
                        batch: batch_idx,
                        poly: poly_idx,
                        point_idx,
                        value: evaluations[batch_idx][poly_idx][k],
                    });
                }
            }
        }

        (openings, distinct_points)
    }

    /// Codeword of `sum_k theta^(offset + k) * (f_k(x) - f_k(z_k)) / (x - z_k)` over the LDE domain.
    #[allow(non_snake_case)]
    pub fn prepare_combined_Q(
        &self,
        theta: F,
        theta_offset: usize,
        worker: &Worker,
    ) -> Result<Vec<F>> {
        profile_fn!(prepare_combined_q);
        let now = std::time::Instant::now();
        let evaluations = self
            .evaluations
            .as_ref()
            .ok_or_else(|| commitment_err!("scheduled points are not evaluated"))?;
        for (tag, batch) in BatchTag::ALL.iter().zip(self.batches.iter()) {
            if batch.eval_points.iter().any(|el| el.is_empty() == false) && batch.ldes.is_empty() {
                return Err(commitment_err!("batch {:?} has no codewords to open", tag));
            }
        }

        let lde_size = self.params.lde_domain_size();
        let (openings, distinct_points) = self.scheduled_openings(evaluations);
        let domain = bitreversed_coset_points(lde_size, F::multiplicative_generator(), worker);

        let mut denominators_inversed = Vec::with_capacity(distinct_points.len());
        for z in distinct_points.iter() {
            let mut denominators = domain.clone();
            for el in denominators.iter_mut() {
                el.sub_assign(z);
            }
            batch_inverse_inplace_parallel(&mut denominators, worker).ok_or_else(|| {
                commitment_err!("evaluation point {} lies in the LDE domain", z)
            })?;
            denominators_inversed.push(denominators);
        }

        let mut theta_powers = Vec::with_capacity(openings.len());
        let mut current = theta.pow_u64(theta_offset as u64);
        for _ in 0..openings.len() {
            theta_powers.push(current);
            current.mul_assign(&theta);
        }

        let batches = &self.batches;
        let result = worker.map_indexes(lde_size, |i| {
            let mut acc = F::ZERO;
            for (opening, theta_power) in openings.iter().zip(theta_powers.iter()) {
                let mut tmp = batches[opening.batch].ldes[opening.poly][i];
                tmp.sub_assign(&opening.value);
                tmp.mul_assign(&denominators_inversed[opening.point_idx][i]);
                tmp.mul_assign(theta_power);
                acc.add_assign(&tmp);
            }

            acc
        });

        log!(
            "Combined quotient of {} openings at {} points taken {:?}",
            openings.len(),
            distinct_points.len(),
            now.elapsed()
        );

        Ok(result)
    }

    pub fn absorb_evaluations<T: Transcript<F>>(transcript: &mut T, evaluations: &EvaluationClaims<F>) {
        for batch in evaluations.iter() {
            for poly in batch.iter() {
                transcript.witness_field_elements(poly);
            }
        }
    }

    pub fn proof_eval<T: Transcript<F, CompatibleCap = H::Output>>(
        &mut self,
        transcript: &mut T,
        worker: &Worker,
    ) -> Result<EvalProof<F, H>> {
        let evaluations = self.evaluate_scheduled_points(worker)?;
        Self::absorb_evaluations(transcript, &evaluations);
        let theta = transcript.get_challenge();
        let combined_q = self.prepare_combined_Q(theta, 0, worker)?;
        let (fri_proof, query_indexes, proof_of_work) =
            self.proof_eval_FRI_proof(combined_q, transcript, worker)?;
        let lpc_proof = self.proof_eval_lpc_proof(&query_indexes)?;

        Ok(EvalProof {
            evaluations,
            lpc_proof,
            fri_proof,
            proof_of_work,
        })
    }

    #[allow(non_snake_case)]
    pub fn proof_eval_FRI_proof<T: Transcript<F, CompatibleCap = H::Output>>(
        &self,
        combined_Q: Vec<F>,
        transcript: &mut T,
        worker: &Worker,
    ) -> Result<(FriProof<F, H>, Vec<usize>, u64)> {
        if combined_Q.len() != self.params.lde_domain_size() {
            return Err(commitment_err!(
                "combined polynomial codeword has size {}, expected {}",
                combined_Q.len(),
                self.params.lde_domain_size()
            ));
        }
        prove_fri::<F, H, T>(
            combined_Q,
            &self.params,
            &self.schedule,
            &self.precomputations,
            transcript,
            worker,
        )
    }

    /// Opens every non-empty batch at the query indexes and marks batches as proven.
    pub fn proof_eval_lpc_proof(&mut self, query_indexes: &[usize]) -> Result<LpcProof<F, H>> {
        let mut queries = Vec::with_capacity(query_indexes.len());
        for idx in query_indexes.iter().copied() {
            let mut round = Vec::new();
            for (tag, batch) in BatchTag::ALL.iter().zip(self.batches.iter()) {
                if batch.num_polys == 0 {
                    continue;
                }
                let tree = batch
                    .tree
                    .as_ref()
                    .ok_or_else(|| commitment_err!("batch {:?} is not committed", tag))?;
                let (_, proof) = tree.get_proof(idx);
                round.push(OracleQuery {
                    leaf_elements: batch.ldes.iter().map(|el| el[idx]).collect(),
                    proof,
                });
            }
            queries.push(round);
        }
        for batch in self.batches.iter_mut() {
            if batch.state == BatchState::Committed {
                batch.state = BatchState::Proven;
            }
        }

        Ok(LpcProof { queries })
    }

    pub fn check_evaluations_shape(&self, evaluations: &EvaluationClaims<F>) -> bool {
        evaluations.len() == self.batches.len()
            && evaluations
                .iter()
                .zip(self.batches.iter())
                .all(|(values, batch)| {
                    values.len() == batch.eval_points.len()
                        && values
                            .iter()
                            .zip(batch.eval_points.iter())
                            .all(|(v, p)| v.len() == p.len())
                })
    }

    /// Checks openings of all batches at query index `idx` and returns this instance's
    /// contribution to the combined polynomial at the queried point.
    #[allow(non_snake_case)]
    pub fn combined_Q_at_query(
        &self,
        evaluations: &EvaluationClaims<F>,
        openings: &[OracleQuery<F, H>],
        idx: usize,
        theta: F,
        theta_offset: usize,
    ) -> Option<F> {
        let lde_size = self.params.lde_domain_size();
        let non_empty: Vec<usize> = (0..self.batches.len())
            .filter(|el| self.batches[*el].num_polys > 0)
            .collect();
        if openings.len() != non_empty.len() {
            log!("Invalid number of batch openings");
            return None;
        }
        let mut opened_values: Vec<&[F]> = vec![&[]; self.batches.len()];
        for (batch_idx, opening) in non_empty.iter().copied().zip(openings.iter()) {
            let batch = &self.batches[batch_idx];
            let expected_cap_size = std::cmp::min(self.params.cap_size, lde_size);
            if opening.leaf_elements.len() != batch.num_polys
                || batch.cap.len() != expected_cap_size
                || opening.proof.len() != (lde_size / expected_cap_size).trailing_zeros() as usize
            {
                log!("Invalid opening shape for batch {:?}", BatchTag::ALL[batch_idx]);
                return None;
            }
            let leaf_hash = H::hash_into_leaf(opening.leaf_elements.iter());
            if MerkleTreeWithCap::<F, H>::verify_proof_over_cap(
                &opening.proof,
                &batch.cap,
                leaf_hash,
                idx,
            ) == false
            {
                log!("Merkle proof for batch {:?} is invalid", BatchTag::ALL[batch_idx]);
                return None;
            }
            opened_values[batch_idx] = &opening.leaf_elements;
        }

        let nu = domain_generator_for_size::<F>(lde_size as u64);
        let mut x = nu.pow_u64(bitreverse_index(idx, lde_size.trailing_zeros()) as u64);
        x.mul_assign(&F::multiplicative_generator());

        let (scheduled, distinct_points) = self.scheduled_openings(evaluations);
        let mut denominators_inversed = Vec::with_capacity(distinct_points.len());
        for z in distinct_points.iter() {
            let mut tmp = x;
            tmp.sub_assign(z);
            denominators_inversed.push(tmp.inverse()?);
        }

        let mut theta_power = theta.pow_u64(theta_offset as u64);
        let mut acc = F::ZERO;
        for opening in scheduled.iter() {
            let mut tmp = opened_values[opening.batch][opening.poly];
            tmp.sub_assign(&opening.value);
            tmp.mul_assign(&denominators_inversed[opening.point_idx]);
            tmp.mul_assign(&theta_power);
            acc.add_assign(&tmp);
            theta_power.mul_assign(&theta);
        }

        Some(acc)
    }

    /// Mirrors `proof_eval`. Batches must be committed or registered and have the same points
    /// scheduled as on the prover side.
    pub fn verify_eval<T: Transcript<F, CompatibleCap = H::Output>>(
        &self,
        proof: &EvalProof<F, H>,
        transcript: &mut T,
    ) -> bool {
        if self.check_evaluations_shape(&proof.evaluations) == false {
            log!("Evaluations do not match the scheduled points");
            return false;
        }
        Self::absorb_evaluations(transcript, &proof.evaluations);
        let theta = transcript.get_challenge();

        let challenges = match verify_fri_transcript(
            &proof.fri_proof,
            proof.proof_of_work,
            &self.params,
            &self.schedule,
            transcript,
        ) {
            Some(el) => el,
            None => return false,
        };
        if proof.lpc_proof.queries.len() != challenges.query_indexes.len() {
            log!("Invalid number of LPC queries");
            return false;
        }

        for (query_number, idx) in challenges.query_indexes.iter().copied().enumerate() {
            let combined_value = match self.combined_Q_at_query(
                &proof.evaluations,
                &proof.lpc_proof.queries[query_number],
                idx,
                theta,
                0,
            ) {
                Some(el) => el,
                None => return false,
            };
            if verify_fri_query(
                &proof.fri_proof,
                &challenges,
                query_number,
                combined_value,
                &self.params,
                &self.schedule,
            ) == false
            {
                return false;
            }
        }

        true
    }

    /// Drops everything but the fixed batch, so the next proof can be produced.
    pub fn reset_proof_session(&mut self) {
        for (tag, batch) in BatchTag::ALL.iter().zip(self.batches.iter_mut()) {
            if *tag == BatchTag::FixedValues {
                for points in batch.eval_points.iter_mut() {
                    points.clear();
                }
                if batch.state == BatchState::Proven {
                    batch.state = BatchState::Committed;
                }
            } else {
                *batch = Batch::new();
            }
        }
        self.evaluations = None;
    }
}
