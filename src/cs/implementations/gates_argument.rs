use crate::cs::implementations::evaluation::{
    evaluate_expression, usable_rows_mask, variable_value, PointValues,
};
use crate::cs::implementations::preprocessor::CommonData;
use crate::cs::oracle::TreeHasher;
use crate::cs::{ConstraintSystem, Variable};
use crate::field::SmallField;

/// `F_7 = mask * sum_gates selector * sum_constraints theta^i * constraint`, where `i` runs over
/// all constraints of all gates.
pub fn gates_identity<F: SmallField, H: TreeHasher<F>, S: PointValues<F>>(
    common: &CommonData<F, H>,
    cs: &ConstraintSystem<F>,
    theta: &F,
    src: &S,
) -> F {
    if cs.gates.is_empty() {
        return F::ZERO;
    }

    let mut result = F::ZERO;
    let mut current_theta = F::ONE;
    for gate in cs.gates.iter() {
        let mut gate_result = F::ZERO;
        for constraint in gate.constraints.iter() {
            let mut tmp = evaluate_expression(common, src, constraint);
            tmp.mul_assign(&current_theta);
            gate_result.add_assign(&tmp);
            current_theta.mul_assign(theta);
        }
        gate_result.mul_assign(&variable_value(
            common,
            src,
            &Variable::selector(gate.selector_index),
        ));
        result.add_assign(&gate_result);
    }
    result.mul_assign(&usable_rows_mask(common, src));

    result
}
