use crate::cs::implementations::fri::FriProof;
use crate::cs::oracle::TreeHasher;
use crate::field::SmallField;

/// Claimed values of committed polynomials, indexed as `[batch][polynomial][point]`
/// in the order the points were scheduled.
pub type EvaluationClaims<F> = Vec<Vec<Vec<F>>>;

#[derive(derivative::Derivative, serde::Serialize, serde::Deserialize)]
#[derivative(
    Clone(bound = ""),
    Debug(bound = ""),
    Hash(bound = ""),
    PartialEq(bound = ""),
    Eq(bound = "")
)]
#[serde(bound = "")]
pub struct OracleQuery<F: SmallField, H: TreeHasher<F>> {
    pub leaf_elements: Vec<F>,
    pub proof: Vec<H::Output>,
}

/// Openings of every non-empty committed batch at every query index, `[query][batch]`.
#[derive(derivative::Derivative, serde::Serialize, serde::Deserialize)]
#[derivative(Clone(bound = ""), Debug(bound = ""), PartialEq(bound = ""), Eq(bound = ""))]
#[serde(bound = "")]
pub struct LpcProof<F: SmallField, H: TreeHasher<F>> {
    pub queries: Vec<Vec<OracleQuery<F, H>>>,
}

#[derive(derivative::Derivative, serde::Serialize, serde::Deserialize)]
#[derivative(Clone(bound = ""), Debug(bound = ""), PartialEq(bound = ""), Eq(bound = ""))]
#[serde(bound = "")]
pub struct EvalProof<F: SmallField, H: TreeHasher<F>> {
    pub evaluations: EvaluationClaims<F>,
    pub lpc_proof: LpcProof<F, H>,
    pub fri_proof: FriProof<F, H>,
    pub proof_of_work: u64,
}

/// Commitments that are produced while proving. The fixed one lives in `CommonData`.
#[derive(derivative::Derivative, serde::Serialize, serde::Deserialize)]
#[derivative(Clone(bound = ""), Debug(bound = ""), PartialEq(bound = ""), Eq(bound = ""))]
#[serde(bound = "")]
pub struct ProofCommitments<F: SmallField, H: TreeHasher<F>> {
    pub variable_values: Vec<H::Output>,
    pub permutation: Vec<H::Output>,
    pub lookup: Vec<H::Output>,
    pub quotient: Vec<H::Output>,
    #[serde(skip)]
    #[derivative(Debug = "ignore", PartialEq = "ignore")]
    pub _marker: std::marker::PhantomData<F>,
}

#[derive(derivative::Derivative, serde::Serialize, serde::Deserialize)]
#[derivative(Clone(bound = ""), Debug(bound = ""), PartialEq(bound = ""), Eq(bound = ""))]
#[serde(bound = "")]
pub struct Proof<F: SmallField, H: TreeHasher<F>> {
    pub commitments: ProofCommitments<F, H>,
    pub eval_proof: EvalProof<F, H>,
}

/// Per-instance part of an aggregated proof: everything except the evaluation proof.
#[derive(derivative::Derivative, serde::Serialize, serde::Deserialize)]
#[derivative(Clone(bound = ""), Debug(bound = ""), PartialEq(bound = ""), Eq(bound = ""))]
#[serde(bound = "")]
pub struct PartialProof<F: SmallField, H: TreeHasher<F>> {
    pub commitments: ProofCommitments<F, H>,
    pub evaluations: EvaluationClaims<F>,
}

#[derive(derivative::Derivative, serde::Serialize, serde::Deserialize)]
#[derivative(Clone(bound = ""), Debug(bound = ""), PartialEq(bound = ""), Eq(bound = ""))]
#[serde(bound = "")]
pub struct AggregatedEvalProof<F: SmallField, H: TreeHasher<F>> {
    pub lpc_proofs: Vec<LpcProof<F, H>>,
    pub fri_proof: FriProof<F, H>,
    pub proof_of_work: u64,
}

#[derive(derivative::Derivative, serde::Serialize, serde::Deserialize)]
#[derivative(Clone(bound = ""), Debug(bound = ""), PartialEq(bound = ""), Eq(bound = ""))]
#[serde(bound = "")]
pub struct AggregatedProof<F: SmallField, H: TreeHasher<F>> {
    pub partial_proofs: Vec<PartialProof<F, H>>,
    pub aggregated_proof: AggregatedEvalProof<F, H>,
}
