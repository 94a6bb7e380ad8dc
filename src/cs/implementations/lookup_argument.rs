use std::collections::BTreeMap;

use crate::cs::implementations::copy_permutation::{
    compute_chunked_grand_product, transpose_factors,
};
use crate::cs::implementations::evaluation::{
    evaluate_expression, usable_rows_mask, variable_value, ArgumentChallenges, CosetValues,
    PointValues,
};
use crate::cs::implementations::lpc::BatchTag;
use crate::cs::implementations::preprocessor::CommonData;
use crate::cs::oracle::TreeHasher;
use crate::cs::{ConstraintSystem, Variable};
use crate::error::{invariant_err, Result};
use crate::field::SmallField;
use crate::worker::Worker;
use crate::{log, profile_fn};

/// `tag * (table_id + sum_j theta^(j + 1) * values_j)`.
fn compress<F: SmallField>(tag: F, table_id: usize, values: impl Iterator<Item = F>, theta: &F) -> F {
    let mut result = F::from_u64_with_reduction(table_id as u64);
    let mut current = *theta;
    for value in values {
        let mut tmp = value;
        tmp.mul_assign(&current);
        result.add_assign(&tmp);
        current.mul_assign(theta);
    }
    result.mul_assign(&tag);

    result
}

/// One compressed value per lookup constraint, in the order of lookup gates.
pub fn compressed_lookup_inputs<F: SmallField, H: TreeHasher<F>, S: PointValues<F>>(
    common: &CommonData<F, H>,
    cs: &ConstraintSystem<F>,
    theta: &F,
    src: &S,
) -> Vec<F> {
    let mut result = Vec::with_capacity(common.num_lookup_inputs);
    for gate in cs.lookup_gates.iter() {
        let tag = variable_value(common, src, &Variable::selector(gate.tag_index));
        for constraint in gate.constraints.iter() {
            let values = constraint
                .lookup_input
                .iter()
                .map(|el| evaluate_expression(common, src, el));
            result.push(compress(tag, constraint.table_id, values, theta));
        }
    }

    result
}

/// One compressed value per option of every table, read at `rotation`.
pub fn compressed_table_options<F: SmallField, H: TreeHasher<F>, S: PointValues<F>>(
    common: &CommonData<F, H>,
    cs: &ConstraintSystem<F>,
    theta: &F,
    src: &S,
    rotation: i32,
) -> Vec<F> {
    let mut result = Vec::with_capacity(common.num_lookup_options());
    for (table_idx, table) in cs.lookup_tables.iter().enumerate() {
        let tag = variable_value(
            common,
            src,
            &Variable::selector(table.tag_index).rotated(rotation),
        );
        for option in table.lookup_options.iter() {
            let values = option
                .iter()
                .map(|el| variable_value(common, src, &el.rotated(rotation)));
            result.push(compress(tag, table_idx + 1, values, theta));
        }
    }

    result
}

/// Products of the lookup grand product factors over the pairs of every chunk.
///
/// Pair `k < L` has numerator `(1 + beta) * (gamma + A_k)`, the remaining pairs have numerators
/// `gamma * (1 + beta) + S_t + beta * S_t(omega * x)` of the table options. Pair `k` has
/// denominator `gamma * (1 + beta) + s_k + beta * s_k(omega * x)` of sorted column `k`.
pub fn lookup_factors<F: SmallField, H: TreeHasher<F>, S: PointValues<F>>(
    common: &CommonData<F, H>,
    cs: &ConstraintSystem<F>,
    challenges: &ArgumentChallenges<F>,
    src: &S,
) -> (Vec<F>, Vec<F>) {
    let theta = &challenges.lookup_theta;
    let beta = &challenges.lookup_beta;
    let gamma = &challenges.lookup_gamma;
    let mut one_plus_beta = F::ONE;
    one_plus_beta.add_assign(beta);
    let mut gamma_by_one_plus_beta = *gamma;
    gamma_by_one_plus_beta.mul_assign(&one_plus_beta);

    let adjacent_sum = |current: F, next: F| -> F {
        let mut result = next;
        result.mul_assign(beta);
        result.add_assign(&current);
        result.add_assign(&gamma_by_one_plus_beta);
        result
    };

    let mut numerators = Vec::with_capacity(common.num_sorted_columns());
    for input in compressed_lookup_inputs(common, cs, theta, src) {
        let mut tmp = input;
        tmp.add_assign(gamma);
        tmp.mul_assign(&one_plus_beta);
        numerators.push(tmp);
    }
    let current = compressed_table_options(common, cs, theta, src, 0);
    let next = compressed_table_options(common, cs, theta, src, 1);
    for (current, next) in current.into_iter().zip(next.into_iter()) {
        numerators.push(adjacent_sum(current, next));
    }

    let denominators = (0..common.num_sorted_columns()).map(|i| {
        adjacent_sum(
            src.value(BatchTag::Lookup, i, 0),
            src.value(BatchTag::Lookup, i, 1),
        )
    });

    let mut part_numerators = Vec::with_capacity(common.lookup_parts.len());
    let mut part_denominators = Vec::with_capacity(common.lookup_parts.len());
    let mut pairs = numerators.into_iter().zip(denominators);
    for part in common.lookup_parts.iter() {
        let mut numerator = F::ONE;
        let mut denominator = F::ONE;
        for (num, den) in pairs.by_ref().take(*part) {
            numerator.mul_assign(&num);
            denominator.mul_assign(&den);
        }
        part_numerators.push(numerator);
        part_denominators.push(denominator);
    }

    (part_numerators, part_denominators)
}

/// Sorted columns over the basic domain.
///
/// The table sequence is every option's compressed values over rows `0..usable_rows`, one option
/// after another, closed by a zero. Inputs are inserted right after the first occurrence of
/// their value. The result of `(L + T) * usable_rows + 1` elements is split into columns of
/// `usable_rows + 1` rows, where the last row of a column repeats the first row of the next one.
pub fn compute_sorted_columns<F: SmallField, H: TreeHasher<F>>(
    common: &CommonData<F, H>,
    cs: &ConstraintSystem<F>,
    columns: &[Vec<&[F]>],
    theta: &F,
    worker: &Worker,
) -> Result<Vec<Vec<F>>> {
    profile_fn!(compute_sorted_columns);
    if common.has_lookups() == false {
        return Ok(vec![]);
    }
    let usable_rows = common.desc.usable_rows;
    let rows = worker.map_indexes(usable_rows, |row| {
        let src = CosetValues {
            columns,
            factor: 1,
            row,
            lagrange_0: F::ZERO,
        };
        (
            compressed_lookup_inputs(common, cs, theta, &src),
            compressed_table_options(common, cs, theta, &src, 0),
        )
    });

    let mut multiplicities: BTreeMap<u64, usize> = BTreeMap::new();
    for (inputs, _) in rows.iter() {
        for input in inputs.iter() {
            *multiplicities.entry(input.as_u64_reduced()).or_insert(0) += 1;
        }
    }

    let num_options = common.num_lookup_options();
    let mut sorted = Vec::with_capacity(common.num_sorted_columns() * usable_rows + 1);
    let table_values = (0..num_options)
        .flat_map(|option| rows.iter().map(move |(_, values)| values[option]))
        .chain(std::iter::once(F::ZERO));
    for value in table_values {
        sorted.push(value);
        if let Some(count) = multiplicities.remove(&value.as_u64_reduced()) {
            sorted.extend(std::iter::repeat(value).take(count));
        }
    }
    if let Some((value, count)) = multiplicities.into_iter().next() {
        return Err(invariant_err!(
            "compressed lookup input {} is used {} times, but does not belong to any table",
            value,
            count
        ));
    }
    debug_assert_eq!(sorted.len(), common.num_sorted_columns() * usable_rows + 1);

    let result = (0..common.num_sorted_columns())
        .map(|i| {
            let mut column = vec![F::ZERO; common.rows_amount()];
            column[..=usable_rows].copy_from_slice(&sorted[i * usable_rows..=(i + 1) * usable_rows]);
            column
        })
        .collect();

    Ok(result)
}

/// Values of `V_L` and its chunk products over the basic domain. `columns` must contain the
/// fixed, variable and sorted columns over the basic domain.
pub fn compute_lookup_polys<F: SmallField, H: TreeHasher<F>>(
    common: &CommonData<F, H>,
    cs: &ConstraintSystem<F>,
    columns: &[Vec<&[F]>],
    challenges: &ArgumentChallenges<F>,
    worker: &Worker,
) -> Result<Vec<Vec<F>>> {
    profile_fn!(compute_lookup_polys);
    if common.has_lookups() == false {
        return Ok(vec![]);
    }
    let now = std::time::Instant::now();

    let usable_rows = common.desc.usable_rows;
    let factors = worker.map_indexes(usable_rows, |row| {
        let src = CosetValues {
            columns,
            factor: 1,
            row,
            lagrange_0: F::ZERO,
        };
        lookup_factors(common, cs, challenges, &src)
    });
    let (numerators, denominators) = transpose_factors(factors, common.lookup_parts.len());
    let result = compute_chunked_grand_product(
        numerators,
        denominators,
        usable_rows,
        common.rows_amount(),
        worker,
        "lookup",
    )?;

    log!(
        "Lookup argument over {} inputs and {} table options taken {:?}",
        common.num_lookup_inputs,
        common.num_lookup_options(),
        now.elapsed()
    );

    Ok(result)
}

/// `F_3 = L_0 * (1 - V_L)`, the chunked step `F_4`, `F_5 = q_last * (V_L^2 - V_L)`, and
/// `F_6 = L_0 * sum_i alpha_i * (s_{i + 1} - s_i(omega^usable_rows * x))`.
pub fn lookup_identities<F: SmallField, H: TreeHasher<F>, S: PointValues<F>>(
    common: &CommonData<F, H>,
    cs: &ConstraintSystem<F>,
    challenges: &ArgumentChallenges<F>,
    src: &S,
) -> [F; 4] {
    if common.has_lookups() == false {
        return [F::ZERO; 4];
    }
    let offset = common.lookup_grand_product_index();
    let num_parts = common.lookup_parts.len();
    let grand_product = src.value(BatchTag::Permutation, offset, 0);
    let lagrange_0 = src.lagrange_0();

    let mut boundary = F::ONE;
    boundary.sub_assign(&grand_product);
    boundary.mul_assign(&lagrange_0);

    let (numerators, denominators) = lookup_factors(common, cs, challenges, src);
    let mut step = F::ZERO;
    for p in 0..num_parts {
        let current = src.value(BatchTag::Permutation, offset + p, 0);
        let next = if p + 1 == num_parts {
            src.value(BatchTag::Permutation, offset, 1)
        } else {
            src.value(BatchTag::Permutation, offset + p + 1, 0)
        };
        let mut tmp = next;
        tmp.mul_assign(&denominators[p]);
        let mut subtrahend = current;
        subtrahend.mul_assign(&numerators[p]);
        tmp.sub_assign(&subtrahend);
        tmp.mul_assign(&challenges.lookup_alphas[p]);
        step.add_assign(&tmp);
    }
    step.mul_assign(&usable_rows_mask(common, src));

    let mut terminal = grand_product;
    terminal.square();
    terminal.sub_assign(&grand_product);
    terminal.mul_assign(&src.value(BatchTag::FixedValues, common.q_last_poly_index(), 0));

    let usable_rows = common.desc.usable_rows as i32;
    let mut adjacency = F::ZERO;
    for (i, alpha) in challenges.adjacency_alphas.iter().enumerate() {
        let mut tmp = src.value(BatchTag::Lookup, i + 1, 0);
        tmp.sub_assign(&src.value(BatchTag::Lookup, i, usable_rows));
        tmp.mul_assign(alpha);
        adjacency.add_assign(&tmp);
    }
    adjacency.mul_assign(&lagrange_0);

    [boundary, step, terminal, adjacency]
}
