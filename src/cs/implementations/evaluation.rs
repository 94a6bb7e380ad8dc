//! Values of committed polynomials at a single point, as the argument identities consume them.
//!
//! The prover reads them from tables of values over a (possibly extended) coset, the verifier
//! from the claimed evaluations of the proof. Identities are written once against
//! [`PointValues`] and shared by both.

use crate::cs::implementations::lpc::BatchTag;
use crate::cs::implementations::preprocessor::CommonData;
use crate::cs::implementations::proof::EvaluationClaims;
use crate::cs::oracle::TreeHasher;
use crate::cs::{ConstraintSystem, Expression, Variable};
use crate::cs::implementations::{copy_permutation, gates_argument, lookup_argument};
use crate::field::SmallField;

pub trait PointValues<F: SmallField> {
    /// Value of polynomial `index` of batch `tag` at `omega^rotation * x`.
    fn value(&self, tag: BatchTag, index: usize, rotation: i32) -> F;
    fn lagrange_0(&self) -> F;
}

/// Row `row` of naturally ordered values over `coset * <nu>`, where `nu^factor` is the
/// generator of the basic domain. `factor == 1` is the basic domain itself.
pub struct CosetValues<'a, F: SmallField> {
    pub columns: &'a [Vec<&'a [F]>],
    pub factor: usize,
    pub row: usize,
    pub lagrange_0: F,
}

impl<'a, F: SmallField> PointValues<F> for CosetValues<'a, F> {
    #[inline]
    fn value(&self, tag: BatchTag, index: usize, rotation: i32) -> F {
        let column = self.columns[tag.index()][index];
        let size = column.len() as i64;
        let position = (self.row as i64 + rotation as i64 * self.factor as i64).rem_euclid(size);

        column[position as usize]
    }

    #[inline]
    fn lagrange_0(&self) -> F {
        self.lagrange_0
    }
}

/// Claimed evaluations at `y * omega^r`, laid out by `CommonData::evaluation_schedule`.
pub struct ClaimedValues<'a, F: SmallField> {
    pub schedule: &'a [Vec<Vec<i32>>],
    pub evaluations: &'a EvaluationClaims<F>,
    pub lagrange_0: F,
}

impl<'a, F: SmallField> PointValues<F> for ClaimedValues<'a, F> {
    fn value(&self, tag: BatchTag, index: usize, rotation: i32) -> F {
        let position = self.schedule[tag.index()][index]
            .iter()
            .position(|el| *el == rotation);
        debug_assert!(
            position.is_some(),
            "rotation {} of polynomial {} in {:?} is not scheduled",
            rotation,
            index,
            tag
        );
        position
            .and_then(|el| self.evaluations[tag.index()][index].get(el))
            .copied()
            .unwrap_or(F::ZERO)
    }

    fn lagrange_0(&self) -> F {
        self.lagrange_0
    }
}

/// Everything the prover draws from the transcript before the quotient is committed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArgumentChallenges<F: SmallField> {
    pub beta: F,
    pub gamma: F,
    pub lookup_theta: F,
    pub lookup_beta: F,
    pub lookup_gamma: F,
    /// One per permutation chunk, the first one is 1.
    pub permutation_alphas: Vec<F>,
    /// One per lookup chunk, the first one is 1.
    pub lookup_alphas: Vec<F>,
    /// One per pair of adjacent sorted columns.
    pub adjacency_alphas: Vec<F>,
    pub gates_theta: F,
    pub alphas: [F; 8],
}

pub fn variable_value<F: SmallField, H: TreeHasher<F>, S: PointValues<F>>(
    common: &CommonData<F, H>,
    src: &S,
    variable: &Variable,
) -> F {
    let (tag, index) = common.column_position(variable.column_type, variable.index);

    src.value(tag, index, variable.rotation)
}

pub fn evaluate_expression<F: SmallField, H: TreeHasher<F>, S: PointValues<F>>(
    common: &CommonData<F, H>,
    src: &S,
    expression: &Expression<F>,
) -> F {
    expression.evaluate(&|variable| variable_value(common, src, variable))
}

/// `1 - q_last - q_blind`, one exactly on the usable rows.
pub fn usable_rows_mask<F: SmallField, H: TreeHasher<F>, S: PointValues<F>>(
    common: &CommonData<F, H>,
    src: &S,
) -> F {
    let mut result = F::ONE;
    result.sub_assign(&src.value(BatchTag::FixedValues, common.q_last_poly_index(), 0));
    result.sub_assign(&src.value(BatchTag::FixedValues, common.q_blind_poly_index(), 0));

    result
}

/// `F_0 .. F_7`: permutation boundary, step and terminal, lookup boundary, step, terminal and
/// adjacency, gates.
pub fn evaluate_identities<F: SmallField, H: TreeHasher<F>, S: PointValues<F>>(
    common: &CommonData<F, H>,
    cs: &ConstraintSystem<F>,
    challenges: &ArgumentChallenges<F>,
    src: &S,
) -> [F; 8] {
    let [f0, f1, f2] = copy_permutation::permutation_identities(common, challenges, src);
    let [f3, f4, f5, f6] = lookup_argument::lookup_identities(common, cs, challenges, src);
    let f7 = gates_argument::gates_identity(common, cs, &challenges.gates_theta, src);

    [f0, f1, f2, f3, f4, f5, f6, f7]
}

pub fn combine_identities<F: SmallField>(identities: &[F; 8], alphas: &[F; 8]) -> F {
    let mut result = F::ZERO;
    for (identity, alpha) in identities.iter().zip(alphas.iter()) {
        let mut tmp = *identity;
        tmp.mul_assign(alpha);
        result.add_assign(&tmp);
    }

    result
}

/// `[1, challenges...]`.
pub(crate) fn chunk_alphas<F: SmallField>(drawn: Vec<F>) -> Vec<F> {
    let mut result = Vec::with_capacity(drawn.len() + 1);
    result.push(F::ONE);
    result.extend(drawn);

    result
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::field::goldilocks::GoldilocksField;
    use crate::field::Field;

    type F = GoldilocksField;

    #[test]
    fn test_coset_rotation() {
        let values: Vec<F> = (0..16).map(F::from_u64_with_reduction).collect();
        let empty: Vec<&[F]> = vec![];
        let columns = vec![
            empty.clone(),
            vec![&values[..]],
            empty.clone(),
            empty.clone(),
            empty,
        ];
        let src = CosetValues {
            columns: &columns,
            factor: 4,
            row: 14,
            lagrange_0: F::ZERO,
        };
        assert_eq!(
            src.value(BatchTag::VariableValues, 0, 0),
            F::from_u64_with_reduction(14)
        );
        assert_eq!(
            src.value(BatchTag::VariableValues, 0, 1),
            F::from_u64_with_reduction(2)
        );
        assert_eq!(
            src.value(BatchTag::VariableValues, 0, -4),
            F::from_u64_with_reduction(14)
        );
    }

    #[test]
    fn test_claimed_values_follow_schedule() {
        let schedule = vec![vec![], vec![vec![-1, 0, 3]], vec![], vec![], vec![]];
        let evaluations = vec![
            vec![],
            vec![vec![F::ONE, F::TWO, F::MINUS_ONE]],
            vec![],
            vec![],
            vec![],
        ];
        let src = ClaimedValues {
            schedule: &schedule,
            evaluations: &evaluations,
            lagrange_0: F::TWO,
        };
        assert_eq!(src.value(BatchTag::VariableValues, 0, 3), F::MINUS_ONE);
        assert_eq!(src.value(BatchTag::VariableValues, 0, -1), F::ONE);
        assert_eq!(src.lagrange_0(), F::TWO);
        assert_eq!(
            combine_identities(&[F::ONE; 8], &[F::TWO; 8]),
            F::from_u64_with_reduction(16)
        );
    }
}
