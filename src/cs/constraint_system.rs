use blake2::{Blake2s256, Digest};
use derivative::Derivative;

use super::{ColumnType, Expression, TableDescription, Variable};
use crate::config::FriParams;
use crate::error::{config_err, shape_err, Result};
use crate::field::SmallField;

/// Constraints `selector * constraint == 0` over every row.
#[derive(Derivative, serde::Serialize, serde::Deserialize)]
#[derivative(Clone, Debug, PartialEq, Eq)]
#[serde(bound = "")]
pub struct Gate<F: SmallField> {
    pub selector_index: usize,
    pub constraints: Vec<Expression<F>>,
}

/// Two absolute cells that must hold the same value.
#[derive(Derivative, serde::Serialize, serde::Deserialize)]
#[derivative(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CopyConstraint {
    pub a: Variable,
    pub b: Variable,
}

#[derive(Derivative, serde::Serialize, serde::Deserialize)]
#[derivative(Clone, Debug, PartialEq, Eq)]
#[serde(bound = "")]
pub struct LookupConstraint<F: SmallField> {
    /// 1-based index of the table in `ConstraintSystem::lookup_tables`.
    pub table_id: usize,
    pub lookup_input: Vec<Expression<F>>,
}

/// Wherever the tag selector is one, every input tuple must be a row of its table.
#[derive(Derivative, serde::Serialize, serde::Deserialize)]
#[derivative(Clone, Debug, PartialEq, Eq)]
#[serde(bound = "")]
pub struct LookupGate<F: SmallField> {
    pub tag_index: usize,
    pub constraints: Vec<LookupConstraint<F>>,
}

/// Table rows are the tuples of constant columns of every option, at rows where the tag
/// selector is one. The tag selector has to vanish at row 0 and past the usable rows.
#[derive(Derivative, serde::Serialize, serde::Deserialize)]
#[derivative(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LookupTable {
    pub tag_index: usize,
    pub lookup_options: Vec<Vec<Variable>>,
}

impl LookupTable {
    pub fn width(&self) -> usize {
        self.lookup_options.first().map(|el| el.len()).unwrap_or(0)
    }
}

/// Sorted set of rotations every column is used with. Always contains zero.
#[derive(Derivative, serde::Serialize, serde::Deserialize)]
#[derivative(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ColumnsRotations {
    pub witness: Vec<Vec<i32>>,
    pub public_input: Vec<Vec<i32>>,
    pub constant: Vec<Vec<i32>>,
    pub selector: Vec<Vec<i32>>,
}

impl ColumnsRotations {
    fn new(desc: &TableDescription) -> Self {
        let make = |num: usize| vec![vec![0i32]; num];
        Self {
            witness: make(desc.witness_columns),
            public_input: make(desc.public_input_columns),
            constant: make(desc.constant_columns),
            selector: make(desc.selector_columns),
        }
    }

    fn of_mut(&mut self, column_type: ColumnType) -> &mut Vec<Vec<i32>> {
        match column_type {
            ColumnType::Witness => &mut self.witness,
            ColumnType::PublicInput => &mut self.public_input,
            ColumnType::Constant => &mut self.constant,
            ColumnType::Selector => &mut self.selector,
        }
    }

    fn add(&mut self, column_type: ColumnType, index: usize, rotation: i32) {
        let set = &mut self.of_mut(column_type)[index];
        if let Err(pos) = set.binary_search(&rotation) {
            set.insert(pos, rotation);
        }
    }
}

#[derive(Derivative, serde::Serialize, serde::Deserialize)]
#[derivative(Clone, Debug, PartialEq, Eq, Default(bound = ""))]
#[serde(bound = "")]
pub struct ConstraintSystem<F: SmallField> {
    pub gates: Vec<Gate<F>>,
    pub copy_constraints: Vec<CopyConstraint>,
    pub lookup_gates: Vec<LookupGate<F>>,
    pub lookup_tables: Vec<LookupTable>,
    /// Number of leading rows of every public input column the verifier is given.
    /// All rows of every public input column if `None`.
    pub public_input_sizes: Option<Vec<usize>>,
}

impl<F: SmallField> ConstraintSystem<F> {
    pub fn new(
        gates: Vec<Gate<F>>,
        copy_constraints: Vec<CopyConstraint>,
        lookup_gates: Vec<LookupGate<F>>,
        lookup_tables: Vec<LookupTable>,
    ) -> Self {
        Self {
            gates,
            copy_constraints,
            lookup_gates,
            lookup_tables,
            public_input_sizes: None,
        }
    }

    pub fn with_public_input_sizes(mut self, sizes: Vec<usize>) -> Self {
        self.public_input_sizes = Some(sizes);
        self
    }

    pub fn public_input_size(&self, column: usize, desc: &TableDescription) -> usize {
        match &self.public_input_sizes {
            Some(sizes) => sizes.get(column).copied().unwrap_or(0),
            None => desc.rows_amount,
        }
    }

    pub fn max_gates_degree(&self) -> usize {
        self.gates
            .iter()
            .flat_map(|gate| gate.constraints.iter())
            .map(|el| el.degree())
            .max()
            .unwrap_or(0)
    }

    pub fn has_lookups(&self) -> bool {
        self.lookup_gates.is_empty() == false
    }

    pub fn num_lookup_inputs(&self) -> usize {
        self.lookup_gates.iter().map(|el| el.constraints.len()).sum()
    }

    pub fn num_lookup_options(&self) -> usize {
        self.lookup_tables
            .iter()
            .map(|el| el.lookup_options.len())
            .sum()
    }

    /// Global indexes of the columns under copy constraints, ascending.
    pub fn permuted_columns(&self, desc: &TableDescription) -> Vec<usize> {
        let mut columns: Vec<usize> = self
            .copy_constraints
            .iter()
            .flat_map(|el| [el.a, el.b])
            .map(|el| desc.global_index(el.column_type, el.index))
            .collect();
        columns.sort_unstable();
        columns.dedup();

        columns
    }

    pub fn validate(&self, desc: &TableDescription) -> Result<()> {
        desc.validate()?;
        let check_relative = |variable: &Variable| -> Result<()> {
            if variable.relative == false {
                return Err(shape_err!(
                    "gates and lookups must use relative variables, got {:?}",
                    variable
                ));
            }
            desc.check_variable(variable)
        };
        let check_selector = |index: usize| -> Result<()> {
            desc.check_variable(&Variable::selector(index))
        };

        for gate in self.gates.iter() {
            check_selector(gate.selector_index)?;
            for constraint in gate.constraints.iter() {
                let mut result = Ok(());
                constraint.visit_variables(&mut |el| {
                    if result.is_ok() {
                        result = check_relative(el);
                    }
                });
                result?;
            }
        }

        for copy in self.copy_constraints.iter() {
            for variable in [copy.a, copy.b] {
                if variable.relative {
                    return Err(shape_err!(
                        "copy constraints must use absolute variables, got {:?}",
                        variable
                    ));
                }
                desc.check_variable(&variable)?;
            }
        }

        for (table_idx, table) in self.lookup_tables.iter().enumerate() {
            check_selector(table.tag_index)?;
            if table.width() == 0 {
                return Err(shape_err!("lookup table {} has no columns", table_idx + 1));
            }
            for option in table.lookup_options.iter() {
                if option.len() != table.width() {
                    return Err(shape_err!(
                        "options of lookup table {} differ in width",
                        table_idx + 1
                    ));
                }
                for variable in option.iter() {
                    desc.check_variable(variable)?;
                    if variable.column_type != ColumnType::Constant
                        || variable.rotation != 0
                        || variable.relative == false
                    {
                        return Err(shape_err!(
                            "lookup table {} must consist of unrotated constant columns, got {:?}",
                            table_idx + 1,
                            variable
                        ));
                    }
                }
            }
        }

        for gate in self.lookup_gates.iter() {
            check_selector(gate.tag_index)?;
            for constraint in gate.constraints.iter() {
                if constraint.table_id == 0 || constraint.table_id > self.lookup_tables.len() {
                    return Err(shape_err!(
                        "lookup to table {}, but only {} tables exist",
                        constraint.table_id,
                        self.lookup_tables.len()
                    ));
                }
                let width = self.lookup_tables[constraint.table_id - 1].width();
                if constraint.lookup_input.len() != width {
                    return Err(shape_err!(
                        "lookup input of {} expressions into table {} of width {}",
                        constraint.lookup_input.len(),
                        constraint.table_id,
                        width
                    ));
                }
                for expr in constraint.lookup_input.iter() {
                    let mut result = Ok(());
                    expr.visit_variables(&mut |el| {
                        if result.is_ok() {
                            result = check_relative(el);
                        }
                    });
                    result?;
                }
            }
        }
        if self.has_lookups() && self.num_lookup_options() == 0 {
            return Err(shape_err!("lookup gates are present, but there are no tables"));
        }

        if let Some(sizes) = &self.public_input_sizes {
            if sizes.len() != desc.public_input_columns {
                return Err(shape_err!(
                    "{} public input sizes for {} public input columns",
                    sizes.len(),
                    desc.public_input_columns
                ));
            }
            if let Some(size) = sizes.iter().find(|el| **el > desc.rows_amount) {
                return Err(shape_err!(
                    "public input size {} exceeds {} rows",
                    size,
                    desc.rows_amount
                ));
            }
        }

        Ok(())
    }

    pub fn columns_rotations(&self, desc: &TableDescription) -> ColumnsRotations {
        let mut result = ColumnsRotations::new(desc);
        let add_expression = |expr: &Expression<F>, result: &mut ColumnsRotations| {
            expr.visit_variables(&mut |el| result.add(el.column_type, el.index, el.rotation));
        };
        for gate in self.gates.iter() {
            for constraint in gate.constraints.iter() {
                add_expression(constraint, &mut result);
            }
        }
        for gate in self.lookup_gates.iter() {
            for constraint in gate.constraints.iter().flat_map(|el| el.lookup_input.iter()) {
                add_expression(constraint, &mut result);
            }
        }
        // tables are also read at the next row by the lookup grand product
        for table in self.lookup_tables.iter() {
            result.add(ColumnType::Selector, table.tag_index, 1);
            for variable in table.lookup_options.iter().flatten() {
                result.add(variable.column_type, variable.index, 1);
            }
        }

        result
    }

    /// Domain separator of the proof system instance, absorbed first into every transcript.
    pub fn constraint_system_with_params_hash(
        &self,
        desc: &TableDescription,
        fri_params: &FriParams,
        max_quotient_chunks: usize,
    ) -> Result<[u8; 32]> {
        let mut hasher = Blake2s256::new();
        for bytes in [
            bincode::serialize(self),
            bincode::serialize(desc),
            bincode::serialize(fri_params),
            bincode::serialize(&(max_quotient_chunks as u64)),
        ] {
            let bytes =
                bytes.map_err(|e| config_err!("failed to serialize circuit parameters: {}", e))?;
            hasher.update(&bytes);
        }

        Ok(hasher.finalize().into())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::PlaceholderError;
    use crate::field::goldilocks::GoldilocksField;
    use crate::field::Field;

    type F = GoldilocksField;

    fn desc() -> TableDescription {
        TableDescription {
            witness_columns: 2,
            public_input_columns: 1,
            constant_columns: 2,
            selector_columns: 2,
            usable_rows: 5,
            rows_amount: 8,
        }
    }

    fn lookup_circuit() -> ConstraintSystem<F> {
        let w0 = Expression::from(Variable::witness(0));
        let w1_next = Expression::from(Variable::witness(1).rotated(1));
        ConstraintSystem::new(
            vec![Gate {
                selector_index: 0,
                constraints: vec![w0.clone() * w1_next - Expression::constant(F::TWO)],
            }],
            vec![CopyConstraint {
                a: Variable::witness(1).at_row(2),
                b: Variable::public_input(0).at_row(0),
            }],
            vec![LookupGate {
                tag_index: 1,
                constraints: vec![LookupConstraint {
                    table_id: 1,
                    lookup_input: vec![Expression::from(Variable::witness(0).rotated(-1))],
                }],
            }],
            vec![LookupTable {
                tag_index: 0,
                lookup_options: vec![vec![Variable::constant(0)], vec![Variable::constant(1)]],
            }],
        )
    }

    #[test]
    fn test_rotations_and_permuted_columns() {
        let cs = lookup_circuit();
        let desc = desc();
        cs.validate(&desc).unwrap();
        assert_eq!(cs.max_gates_degree(), 2);
        assert_eq!(cs.num_lookup_options(), 2);
        assert_eq!(cs.permuted_columns(&desc), vec![1, 2]);

        let rotations = cs.columns_rotations(&desc);
        assert_eq!(rotations.witness, vec![vec![-1, 0], vec![0, 1]]);
        assert_eq!(rotations.constant, vec![vec![0, 1], vec![0, 1]]);
        assert_eq!(rotations.selector, vec![vec![0, 1], vec![0]]);
        assert_eq!(rotations.public_input, vec![vec![0]]);
    }

    #[test]
    fn test_invalid_constraint_systems() {
        let desc = desc();

        let mut cs = lookup_circuit();
        cs.lookup_gates[0].constraints[0].table_id = 2;
        assert!(matches!(cs.validate(&desc), Err(PlaceholderError::Shape(_))));

        let mut cs = lookup_circuit();
        cs.copy_constraints[0].a = Variable::witness(1).at_row(5);
        assert!(matches!(cs.validate(&desc), Err(PlaceholderError::Shape(_))));

        let mut cs = lookup_circuit();
        cs.lookup_tables[0].lookup_options[1] = vec![Variable::witness(0)];
        assert!(matches!(cs.validate(&desc), Err(PlaceholderError::Shape(_))));

        let mut cs = lookup_circuit();
        cs.gates[0].selector_index = 2;
        assert!(matches!(cs.validate(&desc), Err(PlaceholderError::Shape(_))));

        let cs = lookup_circuit().with_public_input_sizes(vec![1, 1]);
        assert!(matches!(cs.validate(&desc), Err(PlaceholderError::Shape(_))));
    }

    #[test]
    fn test_circuit_hash() {
        let cs = lookup_circuit();
        let desc = desc();
        let params = FriParams::default();
        let a = cs.constraint_system_with_params_hash(&desc, &params, 0).unwrap();
        let b = cs.constraint_system_with_params_hash(&desc, &params, 0).unwrap();
        assert_eq!(a, b);
        let c = cs.constraint_system_with_params_hash(&desc, &params, 8).unwrap();
        assert_ne!(a, c);
        let mut other = cs.clone();
        other.gates[0].selector_index = 1;
        assert_ne!(
            a,
            other
                .constraint_system_with_params_hash(&desc, &params, 0)
                .unwrap()
        );
    }
}
