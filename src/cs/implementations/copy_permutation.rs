use crate::cs::implementations::evaluation::{
    usable_rows_mask, ArgumentChallenges, CosetValues, PointValues,
};
use crate::cs::implementations::lpc::BatchTag;
use crate::cs::implementations::preprocessor::CommonData;
use crate::cs::implementations::utils::batch_inverse_inplace_parallel;
use crate::cs::oracle::TreeHasher;
use crate::error::{invariant_err, Result};
use crate::field::SmallField;
use crate::worker::Worker;
use crate::{log, profile_fn};

/// Products of `f_k + beta * id_k + gamma` and `f_k + beta * sigma_k + gamma` over the columns of
/// every permutation chunk.
pub fn permutation_factors<F: SmallField, H: TreeHasher<F>, S: PointValues<F>>(
    common: &CommonData<F, H>,
    beta: &F,
    gamma: &F,
    src: &S,
) -> (Vec<F>, Vec<F>) {
    let mut numerators = Vec::with_capacity(common.permutation_parts.len());
    let mut denominators = Vec::with_capacity(common.permutation_parts.len());
    let mut k = 0;
    for part in common.permutation_parts.iter() {
        let mut numerator = F::ONE;
        let mut denominator = F::ONE;
        for _ in 0..*part {
            let (tag, index) = common.global_column_position(common.permuted_columns[k]);
            let mut value = src.value(tag, index, 0);
            value.add_assign(gamma);

            let mut tmp = src.value(BatchTag::FixedValues, common.identity_poly_index(k), 0);
            tmp.mul_assign(beta);
            tmp.add_assign(&value);
            numerator.mul_assign(&tmp);

            let mut tmp = src.value(BatchTag::FixedValues, common.sigma_poly_index(k), 0);
            tmp.mul_assign(beta);
            tmp.add_assign(&value);
            denominator.mul_assign(&tmp);

            k += 1;
        }
        numerators.push(numerator);
        denominators.push(denominator);
    }

    (numerators, denominators)
}

/// Running product over `ratio_p = numerators[p] / denominators[p]` on the usable rows.
///
/// Returns the grand product `V` with `V(0) = 1` and `V(j + 1) = V(j) * prod_p ratio_p(j)`, followed
/// by the chunk products `W_{p + 1}(j) = W_p(j) * ratio_p(j)` for every chunk but the last one,
/// with `W_0 = V`. `V` must return to 1 at row `usable_rows`. Rows past it are zero.
pub(crate) fn compute_chunked_grand_product<F: SmallField>(
    numerators: Vec<Vec<F>>,
    mut denominators: Vec<Vec<F>>,
    usable_rows: usize,
    domain_size: usize,
    worker: &Worker,
    argument: &str,
) -> Result<Vec<Vec<F>>> {
    profile_fn!(compute_chunked_grand_product);
    let num_parts = numerators.len();
    debug_assert_eq!(num_parts, denominators.len());

    for dst in denominators.iter_mut() {
        batch_inverse_inplace_parallel(dst, worker).ok_or_else(|| {
            invariant_err!("{} grand product has a zero denominator", argument)
        })?;
    }
    let mut ratios = numerators;
    for (ratio, inverse) in ratios.iter_mut().zip(denominators.iter()) {
        worker.scope(usable_rows, |scope, chunk_size| {
            for (dst, src) in ratio.chunks_mut(chunk_size).zip(inverse.chunks(chunk_size)) {
                scope.spawn(move |_| {
                    for (dst, src) in dst.iter_mut().zip(src.iter()) {
                        dst.mul_assign(src);
                    }
                });
            }
        });
    }

    let mut grand_product = vec![F::ZERO; domain_size];
    let mut current = F::ONE;
    for row in 0..usable_rows {
        grand_product[row] = current;
        for ratio in ratios.iter() {
            current.mul_assign(&ratio[row]);
        }
    }
    if current != F::ONE {
        return Err(invariant_err!(
            "{} grand product does not return to 1 at row {}",
            argument,
            usable_rows
        ));
    }
    grand_product[usable_rows] = current;

    let mut result = Vec::with_capacity(num_parts);
    result.push(grand_product);
    for ratio in ratios.iter().take(num_parts.saturating_sub(1)) {
        let previous = &result[result.len() - 1];
        let mut next = vec![F::ZERO; domain_size];
        for row in 0..usable_rows {
            next[row] = previous[row];
            next[row].mul_assign(&ratio[row]);
        }
        result.push(next);
    }

    Ok(result)
}

pub(crate) fn transpose_factors<F: SmallField>(
    rows: Vec<(Vec<F>, Vec<F>)>,
    num_parts: usize,
) -> (Vec<Vec<F>>, Vec<Vec<F>>) {
    let mut numerators = vec![Vec::with_capacity(rows.len()); num_parts];
    let mut denominators = vec![Vec::with_capacity(rows.len()); num_parts];
    for (num, den) in rows.into_iter() {
        for (p, (num, den)) in num.into_iter().zip(den.into_iter()).enumerate() {
            numerators[p].push(num);
            denominators[p].push(den);
        }
    }

    (numerators, denominators)
}

/// Values of `V_P` and the chunk products over the basic domain. `columns` are the fixed
/// and variable batches over the basic domain.
pub fn compute_permutation_polys<F: SmallField, H: TreeHasher<F>>(
    common: &CommonData<F, H>,
    columns: &[Vec<&[F]>],
    beta: &F,
    gamma: &F,
    worker: &Worker,
) -> Result<Vec<Vec<F>>> {
    profile_fn!(compute_permutation_polys);
    if common.permutation_size() == 0 {
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
        permutation_factors(common, beta, gamma, &src)
    });
    let (numerators, denominators) = transpose_factors(factors, common.permutation_parts.len());
    let result = compute_chunked_grand_product(
        numerators,
        denominators,
        usable_rows,
        common.rows_amount(),
        worker,
        "permutation",
    )?;

    log!(
        "Permutation argument over {} columns taken {:?}",
        common.permutation_size(),
        now.elapsed()
    );

    Ok(result)
}

/// `F_0 = L_0 * (1 - V_P)`, `F_1 = mask * sum_i alpha_i * (W_{i + 1} * H_i - W_i * G_i)` with
/// `W_P = V_P(omega * x)`, and `F_2 = q_last * (V_P^2 - V_P)`.
pub fn permutation_identities<F: SmallField, H: TreeHasher<F>, S: PointValues<F>>(
    common: &CommonData<F, H>,
    challenges: &ArgumentChallenges<F>,
    src: &S,
) -> [F; 3] {
    if common.permutation_size() == 0 {
        return [F::ZERO; 3];
    }
    let (numerators, denominators) =
        permutation_factors(common, &challenges.beta, &challenges.gamma, src);
    let grand_product = src.value(BatchTag::Permutation, 0, 0);
    let num_parts = common.permutation_parts.len();

    let mut boundary = F::ONE;
    boundary.sub_assign(&grand_product);
    boundary.mul_assign(&src.lagrange_0());

    let mut step = F::ZERO;
    for p in 0..num_parts {
        let current = src.value(BatchTag::Permutation, p, 0);
        let next = if p + 1 == num_parts {
            src.value(BatchTag::Permutation, 0, 1)
        } else {
            src.value(BatchTag::Permutation, p + 1, 0)
        };
        let mut tmp = next;
        tmp.mul_assign(&denominators[p]);
        let mut subtrahend = current;
        subtrahend.mul_assign(&numerators[p]);
        tmp.sub_assign(&subtrahend);
        tmp.mul_assign(&challenges.permutation_alphas[p]);
        step.add_assign(&tmp);
    }
    step.mul_assign(&usable_rows_mask(common, src));

    let mut terminal = grand_product;
    terminal.square();
    terminal.sub_assign(&grand_product);
    terminal.mul_assign(&src.value(BatchTag::FixedValues, common.q_last_poly_index(), 0));

    [boundary, step, terminal]
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::PlaceholderError;
    use crate::field::goldilocks::GoldilocksField;
    use crate::field::{Field, PrimeField};

    type F = GoldilocksField;

    fn f(value: u64) -> F {
        F::from_u64_with_reduction(value)
    }

    #[test]
    fn test_chunked_grand_product() {
        let worker = Worker::new_with_num_threads(2);
        // two chunks, ratios multiply to 1 over three rows
        let numerators = vec![vec![f(2), f(3), f(5)], vec![f(7), f(1), f(1)]];
        let denominators = vec![vec![f(3), f(5), f(7)], vec![f(1), f(2), f(1)]];
        let result =
            compute_chunked_grand_product(numerators, denominators, 3, 8, &worker, "test").unwrap();
        assert_eq!(result.len(), 2);

        let grand_product = &result[0];
        assert_eq!(grand_product[0], F::ONE);
        // V(1) = 2/3 * 7
        let mut expected = f(14);
        expected.mul_assign(&f(3).inverse().unwrap());
        assert_eq!(grand_product[1], expected);
        assert_eq!(grand_product[3], F::ONE);
        assert!(grand_product[4..].iter().all(|el| el.is_zero()));

        // W_1(0) = V(0) * 2/3
        let mut expected = f(2);
        expected.mul_assign(&f(3).inverse().unwrap());
        assert_eq!(result[1][0], expected);
    }

    #[test]
    fn test_grand_product_must_close() {
        let worker = Worker::new_with_num_threads(1);
        let result = compute_chunked_grand_product(
            vec![vec![f(2), f(3)]],
            vec![vec![f(3), f(3)]],
            2,
            4,
            &worker,
            "test",
        );
        assert!(matches!(result, Err(PlaceholderError::ProverInvariant(_))));

        let result = compute_chunked_grand_product(
            vec![vec![f(2)]],
            vec![vec![F::ZERO]],
            1,
            4,
            &worker,
            "test",
        );
        assert!(matches!(result, Err(PlaceholderError::ProverInvariant(_))));
    }
}
