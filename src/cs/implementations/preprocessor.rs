use derivative::Derivative;

use crate::config::FriParams;
use crate::cs::implementations::lpc::{BatchTag, CommitmentSchemeData, ListPolynomialCommitment};
use crate::cs::implementations::polynomial::{
    batch_ifft, FftPrecomputations, GenericPolynomial, LagrangeForm, MonomialForm,
};
use crate::cs::implementations::pow::PoWRunner;
use crate::cs::implementations::utils::{
    domain_generator_for_size, make_non_residues, materialize_powers_parallel,
};
use crate::cs::oracle::TreeHasher;
use crate::cs::{
    ColumnType, ColumnsRotations, ConstraintSystem, PrivateAssignmentTable,
    PublicAssignmentTable, TableDescription,
};
use crate::error::{config_err, shape_err, Result};
use crate::field::SmallField;
use crate::worker::Worker;
use crate::{log, profile_fn};

/// Column in both representations. Arguments read values over the basic domain,
/// the quotient and the commitment scheme work with coefficients.
#[derive(Derivative, serde::Serialize, serde::Deserialize)]
#[derivative(Clone, Debug, PartialEq, Eq)]
#[serde(bound = "")]
pub struct PolynomialColumn<F: SmallField> {
    pub values: GenericPolynomial<F, LagrangeForm>,
    pub monomials: GenericPolynomial<F, MonomialForm>,
}

pub fn make_polynomial_columns<F: SmallField>(
    columns: Vec<Vec<F>>,
    precomputations: &FftPrecomputations<F>,
    worker: &Worker,
) -> Vec<PolynomialColumn<F>> {
    let values: Vec<GenericPolynomial<F, LagrangeForm>> = columns
        .into_iter()
        .map(GenericPolynomial::from_storage)
        .collect();
    let monomials = batch_ifft(values.clone(), precomputations, worker);

    values
        .into_iter()
        .zip(monomials)
        .map(|(values, monomials)| PolynomialColumn { values, monomials })
        .collect()
}

/// Public description of a preprocessed circuit, shared by prover and verifier.
#[derive(Derivative, serde::Serialize, serde::Deserialize)]
#[derivative(Clone(bound = ""), Debug(bound = ""), PartialEq(bound = ""), Eq(bound = ""))]
#[serde(bound = "")]
pub struct CommonData<F: SmallField, H: TreeHasher<F>> {
    pub desc: TableDescription,
    pub max_quotient_chunks: usize,
    /// Number of committed quotient pieces of `rows_amount` coefficients each.
    pub quotient_chunks: usize,
    /// The identities are evaluated over a coset of size `rows_amount * quotient_degree_factor`.
    pub quotient_degree_factor: usize,
    pub permuted_columns: Vec<usize>,
    pub permutation_shifts: Vec<F>,
    /// Number of permuted columns in every chunk of the permutation grand product.
    pub permutation_parts: Vec<usize>,
    /// Number of (numerator, denominator) factor pairs in every chunk of the lookup grand product.
    pub lookup_parts: Vec<usize>,
    pub num_lookup_inputs: usize,
    pub lookup_options_per_table: Vec<usize>,
    pub columns_rotations: ColumnsRotations,
    pub public_input_sizes: Vec<usize>,
    pub circuit_hash: [u8; 32],
    pub commitment_scheme_data: CommitmentSchemeData<F, H>,
}

impl<F: SmallField, H: TreeHasher<F>> CommonData<F, H> {
    pub fn rows_amount(&self) -> usize {
        self.desc.rows_amount
    }

    pub fn omega(&self) -> F {
        domain_generator_for_size::<F>(self.desc.rows_amount as u64)
    }

    pub fn fri_params(&self) -> &FriParams {
        &self.commitment_scheme_data.fri_params
    }

    pub fn fixed_commitment(&self) -> &[H::Output] {
        &self.commitment_scheme_data.fixed_commitment
    }

    /// `Z(y) = y^n - 1`.
    pub fn vanishing_at(&self, y: &F) -> F {
        let mut result = y.pow_u64(self.desc.rows_amount as u64);
        result.sub_assign(&F::ONE);

        result
    }

    /// `L_0(y) = (y^n - 1) / (n * (y - 1))`, `None` if `y` is in the basic domain.
    pub fn lagrange_0_at(&self, y: &F) -> Option<F> {
        let mut denominator = *y;
        denominator.sub_assign(&F::ONE);
        denominator.mul_assign(&F::from_u64_with_reduction(self.desc.rows_amount as u64));
        let mut result = self.vanishing_at(y);
        if result.is_zero() {
            return None;
        }
        result.mul_assign(&denominator.inverse()?);

        Some(result)
    }

    pub fn permutation_size(&self) -> usize {
        self.permuted_columns.len()
    }

    pub fn has_lookups(&self) -> bool {
        self.num_lookup_inputs > 0
    }

    pub fn num_lookup_options(&self) -> usize {
        self.lookup_options_per_table.iter().sum()
    }

    pub fn num_sorted_columns(&self) -> usize {
        if self.has_lookups() {
            self.num_lookup_inputs + self.num_lookup_options()
        } else {
            0
        }
    }

    // layout of the fixed batch: identities, permutations, q_last, q_blind, constants, selectors

    pub fn identity_poly_index(&self, k: usize) -> usize {
        k
    }

    pub fn sigma_poly_index(&self, k: usize) -> usize {
        self.permutation_size() + k
    }

    pub fn q_last_poly_index(&self) -> usize {
        2 * self.permutation_size()
    }

    pub fn q_blind_poly_index(&self) -> usize {
        2 * self.permutation_size() + 1
    }

    pub fn fixed_batch_size(&self) -> usize {
        2 * self.permutation_size() + 2 + self.desc.constant_columns + self.desc.selector_columns
    }

    /// Batch and position of a table column: witnesses then public inputs are variable values,
    /// constants then selectors are fixed values.
    pub fn column_position(&self, column_type: ColumnType, index: usize) -> (BatchTag, usize) {
        let fixed_offset = 2 * self.permutation_size() + 2;
        match column_type {
            ColumnType::Witness => (BatchTag::VariableValues, index),
            ColumnType::PublicInput => (BatchTag::VariableValues, self.desc.witness_columns + index),
            ColumnType::Constant => (BatchTag::FixedValues, fixed_offset + index),
            ColumnType::Selector => (
                BatchTag::FixedValues,
                fixed_offset + self.desc.constant_columns + index,
            ),
        }
    }

    /// Same as `column_position`, for a global column index.
    pub fn global_column_position(&self, global_index: usize) -> (BatchTag, usize) {
        let num_variable = self.desc.witness_columns + self.desc.public_input_columns;
        if global_index < num_variable {
            (BatchTag::VariableValues, global_index)
        } else {
            (
                BatchTag::FixedValues,
                2 * self.permutation_size() + 2 + global_index - num_variable,
            )
        }
    }

    // layout of the permutation batch: V_P and its chunk products, then V_L and its chunk products

    pub fn permutation_polys_count(&self) -> usize {
        if self.permutation_size() == 0 {
            0
        } else {
            self.permutation_parts.len()
        }
    }

    pub fn lookup_grand_product_index(&self) -> usize {
        self.permutation_polys_count()
    }

    pub fn lookup_polys_count(&self) -> usize {
        if self.has_lookups() {
            self.lookup_parts.len()
        } else {
            0
        }
    }

    /// Rotations every committed polynomial is opened at, `[batch][polynomial]`.
    pub fn evaluation_schedule(&self) -> Vec<Vec<Vec<i32>>> {
        let mut schedule = vec![vec![]; BatchTag::ALL.len()];

        let fixed = &mut schedule[BatchTag::FixedValues.index()];
        for _ in 0..(2 * self.permutation_size()) {
            fixed.push(vec![0]);
        }
        fixed.push(vec![0, 1]);
        fixed.push(vec![0, 1]);
        fixed.extend(self.columns_rotations.constant.iter().cloned());
        fixed.extend(self.columns_rotations.selector.iter().cloned());

        let variable = &mut schedule[BatchTag::VariableValues.index()];
        variable.extend(self.columns_rotations.witness.iter().cloned());
        variable.extend(self.columns_rotations.public_input.iter().cloned());

        // grand products are read at the next row, their chunk products only at the current one
        let permutation = &mut schedule[BatchTag::Permutation.index()];
        for count in [self.permutation_polys_count(), self.lookup_polys_count()] {
            for i in 0..count {
                permutation.push(if i == 0 { vec![0, 1] } else { vec![0] });
            }
        }

        let sorted = &mut schedule[BatchTag::Lookup.index()];
        let num_sorted = self.num_sorted_columns();
        let usable_rows = self.desc.usable_rows as i32;
        for i in 0..num_sorted {
            let mut rotations = vec![0, 1];
            // all but the last sorted column are linked to the next one
            if i + 1 < num_sorted && usable_rows > 1 {
                rotations.push(usable_rows);
            }
            sorted.push(rotations);
        }

        schedule[BatchTag::Quotient.index()] = vec![vec![0]; self.quotient_chunks];

        schedule
    }

    pub fn rotated_point(&self, y: &F, rotation: i32) -> F {
        let n = self.desc.rows_amount as i64;
        let power = (rotation as i64).rem_euclid(n) as u64;
        let mut result = self.omega().pow_u64(power);
        result.mul_assign(y);

        result
    }

    pub fn schedule_evaluation_points(
        &self,
        lpc: &mut ListPolynomialCommitment<F, H>,
        y: &F,
    ) -> Result<()>
    where
        H: PoWRunner,
    {
        for (tag, batch) in BatchTag::ALL.iter().zip(self.evaluation_schedule()) {
            for (poly_idx, rotations) in batch.iter().enumerate() {
                for rotation in rotations.iter() {
                    lpc.append_eval_point(*tag, poly_idx, self.rotated_point(y, *rotation))?;
                }
            }
        }

        Ok(())
    }
}

#[derive(Derivative, serde::Serialize, serde::Deserialize)]
#[derivative(Clone(bound = ""), Debug(bound = ""))]
#[serde(bound = "")]
pub struct PreprocessedPublicData<F: SmallField, H: TreeHasher<F>> {
    pub common_data: CommonData<F, H>,
    pub public_inputs: Vec<PolynomialColumn<F>>,
    pub constants: Vec<PolynomialColumn<F>>,
    pub selectors: Vec<PolynomialColumn<F>>,
    pub identity_polys: Vec<PolynomialColumn<F>>,
    pub permutation_polys: Vec<PolynomialColumn<F>>,
    pub q_last: PolynomialColumn<F>,
    pub q_blind: PolynomialColumn<F>,
}

#[derive(Derivative, serde::Serialize, serde::Deserialize)]
#[derivative(Clone(bound = ""), Debug(bound = ""))]
#[serde(bound = "")]
pub struct PreprocessedPrivateData<F: SmallField> {
    pub witnesses: Vec<PolynomialColumn<F>>,
}

/// Preprocessed columns of one proof, grouped by commitment batch.
pub struct PolynomialTable<'a, F: SmallField, H: TreeHasher<F>> {
    pub public: &'a PreprocessedPublicData<F, H>,
    pub private: &'a PreprocessedPrivateData<F>,
}

impl<'a, F: SmallField, H: TreeHasher<F>> PolynomialTable<'a, F, H> {
    /// Fixed then variable columns in batch layout, see `CommonData::column_position`.
    pub fn batch_columns(&self) -> Vec<Vec<&'a PolynomialColumn<F>>> {
        let public = self.public;
        let mut result = vec![vec![]; BatchTag::ALL.len()];
        result[BatchTag::FixedValues.index()] = public
            .identity_polys
            .iter()
            .chain(public.permutation_polys.iter())
            .chain([&public.q_last, &public.q_blind])
            .chain(public.constants.iter())
            .chain(public.selectors.iter())
            .collect();
        result[BatchTag::VariableValues.index()] = self
            .private
            .witnesses
            .iter()
            .chain(public.public_inputs.iter())
            .collect();

        result
    }

    /// Values over the basic domain in batch layout.
    pub fn batch_values(&self) -> Vec<Vec<&'a [F]>> {
        self.batch_columns()
            .into_iter()
            .map(|batch| batch.into_iter().map(|el| &el.values.storage[..]).collect())
            .collect()
    }
}

/// Values of the permutation polynomials: every copy constraint class becomes a cycle, and
/// `sigma_k` at a cell holds the identity value of the next cell of its cycle.
pub fn compute_permutation_values<F: SmallField>(
    cs: &ConstraintSystem<F>,
    desc: &TableDescription,
    permuted_columns: &[usize],
    identity_values: &[Vec<F>],
) -> Vec<Vec<F>> {
    let n = desc.rows_amount;
    let num_cells = permuted_columns.len() * n;
    let cell_index = |global_column: usize, row: usize| -> usize {
        // permuted columns are sorted and contain every column of every copy constraint
        let k = permuted_columns
            .binary_search(&global_column)
            .unwrap_or_default();
        k * n + row
    };

    let mut parent: Vec<usize> = (0..num_cells).collect();
    fn find(parent: &mut [usize], mut x: usize) -> usize {
        while parent[x] != x {
            parent[x] = parent[parent[x]];
            x = parent[x];
        }
        x
    }
    for copy in cs.copy_constraints.iter() {
        let a = cell_index(
            desc.global_index(copy.a.column_type, copy.a.index),
            copy.a.rotation as usize,
        );
        let b = cell_index(
            desc.global_index(copy.b.column_type, copy.b.index),
            copy.b.rotation as usize,
        );
        let (ra, rb) = (find(&mut parent, a), find(&mut parent, b));
        if ra != rb {
            parent[std::cmp::max(ra, rb)] = std::cmp::min(ra, rb);
        }
    }

    // cycles follow the cell enumeration order, so the result is deterministic
    let mut cycle_of_root = vec![usize::MAX; num_cells];
    let mut cycles: Vec<Vec<usize>> = vec![];
    for cell in 0..num_cells {
        let root = find(&mut parent, cell);
        if cycle_of_root[root] == usize::MAX {
            cycle_of_root[root] = cycles.len();
            cycles.push(vec![]);
        }
        cycles[cycle_of_root[root]].push(cell);
    }

    let mut sigma: Vec<Vec<F>> = identity_values.to_vec();
    for cycle in cycles.iter().filter(|el| el.len() > 1) {
        for (i, cell) in cycle.iter().enumerate() {
            let next = cycle[(i + 1) % cycle.len()];
            sigma[cell / n][cell % n] = identity_values[next / n][next % n];
        }
    }

    sigma
}

/// Splits `num_columns` permuted columns into chunks whose step identity stays under the
/// quotient chunk cap.
pub fn compute_permutation_parts(num_columns: usize, max_quotient_chunks: usize) -> Vec<usize> {
    if num_columns == 0 {
        return vec![];
    }
    let chunk_len = if max_quotient_chunks == 0 {
        num_columns
    } else {
        max_quotient_chunks - 3
    };
    let mut parts = vec![chunk_len; num_columns / chunk_len];
    if num_columns % chunk_len != 0 {
        parts.push(num_columns % chunk_len);
    }

    parts
}

/// Degrees of the lookup grand product factors: numerators are lookup inputs then table
/// options, every denominator is a sorted column.
pub fn lookup_factor_degrees<F: SmallField>(cs: &ConstraintSystem<F>) -> (Vec<usize>, Vec<usize>) {
    let mut numerators = vec![];
    for gate in cs.lookup_gates.iter() {
        for constraint in gate.constraints.iter() {
            let input_degree = constraint
                .lookup_input
                .iter()
                .map(|el| el.degree())
                .max()
                .unwrap_or(0);
            // tag selector times the input
            numerators.push(1 + input_degree);
        }
    }
    for table in cs.lookup_tables.iter() {
        for _ in table.lookup_options.iter() {
            numerators.push(2);
        }
    }
    let denominators = vec![1; numerators.len()];

    (numerators, denominators)
}

pub fn compute_lookup_parts<F: SmallField>(
    cs: &ConstraintSystem<F>,
    max_quotient_chunks: usize,
) -> Result<(Vec<usize>, usize)> {
    if cs.has_lookups() == false {
        return Ok((vec![], 0));
    }
    let (numerators, denominators) = lookup_factor_degrees(cs);
    if max_quotient_chunks == 0 {
        let degree = std::cmp::max(
            numerators.iter().sum::<usize>(),
            denominators.iter().sum::<usize>(),
        );
        return Ok((vec![numerators.len()], degree));
    }

    let cap = max_quotient_chunks - 3;
    let mut parts = vec![];
    let mut max_part_degree = 0;
    let (mut count, mut num_degree, mut den_degree) = (0usize, 0usize, 0usize);
    for (num, den) in numerators.iter().zip(denominators.iter()) {
        if std::cmp::max(*num, *den) > cap {
            return Err(config_err!(
                "lookup factor of degree {} does not fit {} quotient chunks",
                std::cmp::max(*num, *den),
                max_quotient_chunks
            ));
        }
        if std::cmp::max(num_degree + num, den_degree + den) > cap {
            parts.push(count);
            max_part_degree = std::cmp::max(max_part_degree, std::cmp::max(num_degree, den_degree));
            count = 0;
            num_degree = 0;
            den_degree = 0;
        }
        count += 1;
        num_degree += num;
        den_degree += den;
    }
    parts.push(count);
    max_part_degree = std::cmp::max(max_part_degree, std::cmp::max(num_degree, den_degree));

    Ok((parts, max_part_degree))
}

pub fn preprocess_public<F: SmallField, H: TreeHasher<F> + PoWRunner>(
    cs: &ConstraintSystem<F>,
    public_table: &PublicAssignmentTable<F>,
    desc: &TableDescription,
    lpc: &mut ListPolynomialCommitment<F, H>,
    max_quotient_chunks: usize,
    worker: &Worker,
) -> Result<PreprocessedPublicData<F, H>> {
    profile_fn!(preprocess_public);
    let now = std::time::Instant::now();

    cs.validate(desc)?;
    public_table.validate(desc)?;

    let n = desc.rows_amount;
    let usable_rows = desc.usable_rows;
    if n > lpc.params().degree_bound() {
        return Err(config_err!(
            "domain of size {} exceeds the commitment degree bound {}",
            n,
            lpc.params().degree_bound()
        ));
    }
    if max_quotient_chunks != 0 && max_quotient_chunks < 4 {
        return Err(config_err!(
            "at least 4 quotient chunks are required, got {}",
            max_quotient_chunks
        ));
    }

    let public_input_sizes: Vec<usize> = (0..desc.public_input_columns)
        .map(|i| cs.public_input_size(i, desc))
        .collect();
    for (i, (column, size)) in public_table
        .public_inputs
        .iter()
        .zip(public_input_sizes.iter())
        .enumerate()
    {
        if column[*size..].iter().any(|el| el.is_zero() == false) {
            return Err(shape_err!(
                "public input column {} has nonzero values past its first {} rows",
                i,
                size
            ));
        }
    }
    for (t, table) in cs.lookup_tables.iter().enumerate() {
        let tag = &public_table.selectors[table.tag_index];
        if tag[0].is_zero() == false || tag[usable_rows..].iter().any(|el| el.is_zero() == false) {
            return Err(shape_err!(
                "tag selector {} of lookup table {} must vanish at row 0 and past usable rows",
                table.tag_index,
                t + 1
            ));
        }
    }

    // special selectors
    let mut q_last = vec![F::ZERO; n];
    q_last[usable_rows] = F::ONE;
    let mut q_blind = vec![F::ZERO; n];
    for el in q_blind[(usable_rows + 1)..].iter_mut() {
        *el = F::ONE;
    }

    // copy constraints
    let permuted_columns = cs.permuted_columns(desc);
    let permutation_shifts = make_non_residues::<F>(permuted_columns.len(), n);
    let omega = domain_generator_for_size::<F>(n as u64);
    let domain = materialize_powers_parallel(omega, n, worker);
    let identity_values: Vec<Vec<F>> = permutation_shifts
        .iter()
        .map(|shift| {
            domain
                .iter()
                .map(|el| {
                    let mut tmp = *el;
                    tmp.mul_assign(shift);
                    tmp
                })
                .collect()
        })
        .collect();
    let sigma_values =
        compute_permutation_values(cs, desc, &permuted_columns, &identity_values);

    // chunking of the grand products and the quotient degree
    let permutation_parts = compute_permutation_parts(permuted_columns.len(), max_quotient_chunks);
    let (lookup_parts, max_lookup_part_degree) = compute_lookup_parts(cs, max_quotient_chunks)?;
    let mut max_identity_degree = 2;
    if cs.gates.is_empty() == false {
        max_identity_degree = std::cmp::max(max_identity_degree, cs.max_gates_degree() + 2);
    }
    if let Some(max_chunk) = permutation_parts.iter().max() {
        max_identity_degree = std::cmp::max(max_identity_degree, std::cmp::max(3, max_chunk + 2));
    }
    if cs.has_lookups() {
        max_identity_degree =
            std::cmp::max(max_identity_degree, std::cmp::max(3, max_lookup_part_degree + 2));
    }
    if max_quotient_chunks != 0 && max_identity_degree > max_quotient_chunks - 1 {
        return Err(config_err!(
            "identities of degree {} do not fit {} quotient chunks",
            max_identity_degree,
            max_quotient_chunks
        ));
    }
    let quotient_chunks = max_identity_degree - 1;
    let quotient_degree_factor = max_identity_degree.next_power_of_two();

    // interpolation
    let precomputations = FftPrecomputations::new(n, worker);
    let public_inputs =
        make_polynomial_columns(public_table.public_inputs.clone(), &precomputations, worker);
    let constants = make_polynomial_columns(public_table.constants.clone(), &precomputations, worker);
    let selectors = make_polynomial_columns(public_table.selectors.clone(), &precomputations, worker);
    let identity_polys = make_polynomial_columns(identity_values, &precomputations, worker);
    let permutation_polys = make_polynomial_columns(sigma_values, &precomputations, worker);
    let mut special = make_polynomial_columns(vec![q_last, q_blind], &precomputations, worker);
    let q_blind = special.pop().ok_or_else(|| shape_err!("missing q_blind"))?;
    let q_last = special.pop().ok_or_else(|| shape_err!("missing q_last"))?;

    for column in identity_polys
        .iter()
        .chain(permutation_polys.iter())
        .chain([&q_last, &q_blind])
        .chain(constants.iter())
        .chain(selectors.iter())
    {
        lpc.append_to_batch(BatchTag::FixedValues, column.monomials.clone())?;
    }
    lpc.commit(BatchTag::FixedValues, worker)?;
    let commitment_scheme_data = lpc.commitment_scheme_data()?;
    let circuit_hash =
        cs.constraint_system_with_params_hash(desc, lpc.params(), max_quotient_chunks)?;

    let common_data = CommonData {
        desc: *desc,
        max_quotient_chunks,
        quotient_chunks,
        quotient_degree_factor,
        permuted_columns,
        permutation_shifts,
        permutation_parts,
        lookup_parts,
        num_lookup_inputs: cs.num_lookup_inputs(),
        lookup_options_per_table: cs
            .lookup_tables
            .iter()
            .map(|el| el.lookup_options.len())
            .collect(),
        columns_rotations: cs.columns_rotations(desc),
        public_input_sizes,
        circuit_hash,
        commitment_scheme_data,
    };

    log!(
        "Public preprocessing of 2^{} rows taken {:?}",
        n.trailing_zeros(),
        now.elapsed()
    );

    Ok(PreprocessedPublicData {
        common_data,
        public_inputs,
        constants,
        selectors,
        identity_polys,
        permutation_polys,
        q_last,
        q_blind,
    })
}

pub fn preprocess_private<F: SmallField>(
    cs: &ConstraintSystem<F>,
    private_table: &PrivateAssignmentTable<F>,
    desc: &TableDescription,
    worker: &Worker,
) -> Result<PreprocessedPrivateData<F>> {
    profile_fn!(preprocess_private);
    cs.validate(desc)?;
    private_table.validate(desc)?;
    let precomputations = FftPrecomputations::new(desc.rows_amount, worker);

    Ok(PreprocessedPrivateData {
        witnesses: make_polynomial_columns(private_table.witnesses.clone(), &precomputations, worker),
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cs::implementations::test_circuits;
    use crate::cs::implementations::transcript::{Blake2sTranscript, Transcript};
    use crate::cs::{AssignmentTable, CopyConstraint, Expression, Gate, Variable};
    use crate::error::PlaceholderError;
    use crate::field::goldilocks::GoldilocksField;
    use crate::field::Field;

    type F = GoldilocksField;
    type H = blake2::Blake2s256;

    fn params() -> FriParams {
        FriParams {
            lde_factor: 4,
            max_degree_log2: 4,
            cap_size: 4,
            security_level: 32,
            pow_bits: 0,
            folding_schedule: None,
        }
    }

    fn desc() -> TableDescription {
        TableDescription {
            witness_columns: 2,
            public_input_columns: 1,
            constant_columns: 1,
            selector_columns: 1,
            usable_rows: 5,
            rows_amount: 8,
        }
    }

    fn copy_circuit() -> ConstraintSystem<F> {
        ConstraintSystem::new(
            vec![Gate {
                selector_index: 0,
                constraints: vec![
                    Expression::from(Variable::witness(0)) - Variable::witness(1).into(),
                ],
            }],
            vec![
                CopyConstraint {
                    a: Variable::witness(0).at_row(1),
                    b: Variable::public_input(0).at_row(0),
                },
                CopyConstraint {
                    a: Variable::public_input(0).at_row(0),
                    b: Variable::witness(0).at_row(3),
                },
                CopyConstraint {
                    a: Variable::witness(0).at_row(4),
                    b: Variable::witness(0).at_row(2),
                },
            ],
            vec![],
            vec![],
        )
        .with_public_input_sizes(vec![1])
    }

    #[test]
    fn test_permutation_cycles() {
        let cs = copy_circuit();
        let desc = desc();
        let permuted = cs.permuted_columns(&desc);
        assert_eq!(permuted, vec![0, 2]);
        let identity: Vec<Vec<F>> = (0..2)
            .map(|k| {
                (0..8)
                    .map(|j| F::from_u64_with_reduction(100 * k + j))
                    .collect()
            })
            .collect();
        let sigma = compute_permutation_values(&cs, &desc, &permuted, &identity);
        let id = |k: u64, j: u64| F::from_u64_with_reduction(100 * k + j);
        // cycle w0[1] -> w0[3] -> pi[0] -> w0[1], enumerated in cell order
        assert_eq!(sigma[0][1], id(0, 3));
        assert_eq!(sigma[0][3], id(1, 0));
        assert_eq!(sigma[1][0], id(0, 1));
        // w0[2] <-> w0[4]
        assert_eq!(sigma[0][2], id(0, 4));
        assert_eq!(sigma[0][4], id(0, 2));
        // untouched cells map to themselves
        assert_eq!(sigma[0][0], id(0, 0));
        assert_eq!(sigma[1][5], id(1, 5));
    }

    #[test]
    fn test_parts() {
        assert_eq!(compute_permutation_parts(0, 8), Vec::<usize>::new());
        assert_eq!(compute_permutation_parts(7, 0), vec![7]);
        assert_eq!(compute_permutation_parts(7, 6), vec![3, 3, 1]);

        let (cs, _, _) = test_circuits::lookup_circuit(&[7, 13, 42, 7, 13, 42, 7, 13]);
        // one input of degree 1 plus the tag, one table option
        assert_eq!(lookup_factor_degrees(&cs), (vec![2, 2], vec![1, 1]));
        assert_eq!(compute_lookup_parts(&cs, 0).unwrap(), (vec![2], 4));
        assert_eq!(compute_lookup_parts(&cs, 5).unwrap(), (vec![1, 1], 2));
        assert!(matches!(
            compute_lookup_parts(&cs, 4),
            Err(PlaceholderError::Config(_))
        ));
    }

    fn preprocess(
        cs: &ConstraintSystem<F>,
        table: &AssignmentTable<F>,
        max_quotient_chunks: usize,
    ) -> Result<PreprocessedPublicData<F, H>> {
        let worker = Worker::new_with_num_threads(2);
        let mut lpc = ListPolynomialCommitment::<F, H>::new(params(), &worker)?;
        preprocess_public(
            cs,
            &table.public_table,
            &desc(),
            &mut lpc,
            max_quotient_chunks,
            &worker,
        )
    }

    #[test]
    fn test_preprocessing_is_idempotent() {
        let cs = copy_circuit();
        let mut table = AssignmentTable::new(&desc());
        table.set(Variable::selector(0), 1, F::ONE).unwrap();
        table.set(Variable::public_input(0), 0, F::TWO).unwrap();
        let a = preprocess(&cs, &table, 0).unwrap();
        let b = preprocess(&cs, &table, 0).unwrap();
        assert_eq!(
            bincode::serialize(&a.common_data).unwrap(),
            bincode::serialize(&b.common_data).unwrap()
        );
        let common = &a.common_data;
        // permutation step of degree 4 over two columns
        assert_eq!(common.quotient_chunks, 3);
        assert_eq!(common.quotient_degree_factor, 4);
        assert_eq!(common.permutation_parts, vec![2]);
        assert_eq!(common.fixed_batch_size(), 8);
        assert_eq!(common.commitment_scheme_data.fixed_batch_size, 8);
        assert_eq!(a.q_last.values.storage[5], F::ONE);
        assert_eq!(a.q_blind.values.storage[5], F::ZERO);
        assert_eq!(a.q_blind.values.storage[7], F::ONE);

        let schedule = common.evaluation_schedule();
        assert_eq!(schedule[BatchTag::FixedValues.index()].len(), 8);
        assert_eq!(schedule[BatchTag::Permutation.index()], vec![vec![0, 1]]);
        assert!(schedule[BatchTag::Lookup.index()].is_empty());

        // the verifier restores the same commitment scheme state
        let worker = Worker::new_with_num_threads(1);
        let mut verifier_lpc = ListPolynomialCommitment::<F, H>::new(params(), &worker).unwrap();
        let mut transcript = <Blake2sTranscript as Transcript<F>>::new();
        verifier_lpc
            .setup(&mut transcript, &common.commitment_scheme_data)
            .unwrap();
        assert_eq!(
            verifier_lpc.commitment(BatchTag::FixedValues),
            common.fixed_commitment()
        );

        let y = F::from_u64_with_reduction(1234567);
        let l0 = common.lagrange_0_at(&y).unwrap();
        let mut basis = vec![F::ZERO; 8];
        basis[0] = F::ONE;
        let l0_poly = GenericPolynomial::<F, LagrangeForm>::from_storage(basis)
            .ifft(&FftPrecomputations::new(8, &worker));
        assert_eq!(l0, l0_poly.evaluate_at(&y));
        assert!(common.lagrange_0_at(&common.omega()).is_none());
    }

    #[test]
    fn test_preprocessing_errors() {
        let cs = copy_circuit();
        let mut table = AssignmentTable::new(&desc());
        table.set(Variable::public_input(0), 3, F::ONE).unwrap();
        assert!(matches!(
            preprocess(&cs, &table, 0),
            Err(PlaceholderError::Shape(_))
        ));

        let table = AssignmentTable::new(&desc());
        assert!(matches!(
            preprocess(&cs, &table, 3),
            Err(PlaceholderError::Config(_))
        ));

        let mut cs = copy_circuit();
        cs.gates[0].constraints[0] = Expression::from(Variable::witness(0)).pow(4);
        assert!(matches!(
            preprocess(&cs, &table, 5),
            Err(PlaceholderError::Config(_))
        ));

        let mut big = desc();
        big.rows_amount = 32;
        let worker = Worker::new_with_num_threads(1);
        let mut lpc = ListPolynomialCommitment::<F, H>::new(params(), &worker).unwrap();
        let table = AssignmentTable::new(&big);
        assert!(matches!(
            preprocess_public(&copy_circuit(), &table.public_table, &big, &mut lpc, 0, &worker),
            Err(PlaceholderError::Config(_))
        ));
    }
}
