//! Small circuits shared by the tests of the arguments, the prover and dFRI.

use crate::config::FriParams;
use crate::cs::{
    AssignmentTable, ColumnType, ConstraintSystem, CopyConstraint, Expression, Gate, LookupConstraint,
    LookupGate, LookupTable, TableDescription, Variable,
};
use crate::field::goldilocks::GoldilocksField;
use crate::field::Field;

type F = GoldilocksField;

pub fn test_params() -> FriParams {
    FriParams {
        lde_factor: 4,
        max_degree_log2: 7,
        cap_size: 4,
        security_level: 32,
        pow_bits: 4,
        folding_schedule: None,
    }
}

fn values(values: &[u64]) -> Vec<F> {
    values.iter().map(|el| F::from_u64_with_reduction(*el)).collect()
}

/// Leading rows of every public input column, as the verifier is given them.
pub fn public_inputs(
    cs: &ConstraintSystem<F>,
    desc: &TableDescription,
    table: &AssignmentTable<F>,
) -> Vec<Vec<F>> {
    table
        .public_table
        .public_inputs
        .iter()
        .enumerate()
        .map(|(i, column)| column[..cs.public_input_size(i, desc)].to_vec())
        .collect()
}

/// `w2 - w0 - w1 = 0` on the first 8 of 16 rows.
pub fn adder(w2: &[u64]) -> (ConstraintSystem<F>, TableDescription, AssignmentTable<F>) {
    let desc = TableDescription {
        witness_columns: 3,
        public_input_columns: 0,
        constant_columns: 0,
        selector_columns: 1,
        usable_rows: 8,
        rows_amount: 16,
    };
    let cs = ConstraintSystem::new(
        vec![Gate {
            selector_index: 0,
            constraints: vec![
                Expression::from(Variable::witness(2))
                    - Variable::witness(0).into()
                    - Variable::witness(1).into(),
            ],
        }],
        vec![],
        vec![],
        vec![],
    );

    let mut table = AssignmentTable::new(&desc);
    let columns = [
        (ColumnType::Witness, 0, values(&[1, 2, 3, 4, 5, 6, 7, 8])),
        (ColumnType::Witness, 1, values(&[1; 8])),
        (ColumnType::Witness, 2, values(w2)),
        (ColumnType::Selector, 0, values(&[1; 8])),
    ];
    for (column_type, index, values) in columns.iter() {
        table
            .set_column(*column_type, *index, values)
            .expect("column fits the table");
    }

    (cs, desc, table)
}

pub const ADDER_OUTPUT: [u64; 8] = [2, 3, 4, 5, 6, 7, 8, 9];

/// `w0[0] == w1[0]`, with no gates.
pub fn copy_circuit(a: u64, b: u64) -> (ConstraintSystem<F>, TableDescription, AssignmentTable<F>) {
    let desc = TableDescription {
        witness_columns: 2,
        public_input_columns: 0,
        constant_columns: 0,
        selector_columns: 0,
        usable_rows: 4,
        rows_amount: 8,
    };
    let cs = ConstraintSystem::new(
        vec![],
        vec![CopyConstraint {
            a: Variable::witness(0).at_row(0),
            b: Variable::witness(1).at_row(0),
        }],
        vec![],
        vec![],
    );
    let mut table = AssignmentTable::new(&desc);
    table
        .set_column(ColumnType::Witness, 0, &values(&[a, 5, 6, 7]))
        .expect("column fits the table");
    table
        .set_column(ColumnType::Witness, 1, &values(&[b, 1, 2, 3]))
        .expect("column fits the table");

    (cs, desc, table)
}

/// `w0` belongs to `{7, 13, 42}` on the rows where `values` are placed.
pub fn lookup_circuit(
    looked_up: &[u64],
) -> (ConstraintSystem<F>, TableDescription, AssignmentTable<F>) {
    let desc = TableDescription {
        witness_columns: 1,
        public_input_columns: 0,
        constant_columns: 1,
        selector_columns: 2,
        usable_rows: 10,
        rows_amount: 16,
    };
    let cs = ConstraintSystem::new(
        vec![],
        vec![],
        vec![LookupGate {
            tag_index: 1,
            constraints: vec![LookupConstraint {
                table_id: 1,
                lookup_input: vec![Variable::witness(0).into()],
            }],
        }],
        vec![LookupTable {
            tag_index: 0,
            lookup_options: vec![vec![Variable::constant(0)]],
        }],
    );

    let mut table = AssignmentTable::new(&desc);
    // table rows start at 1, row 0 holds the zero of the table
    table
        .set_column(ColumnType::Constant, 0, &values(&[0, 7, 13, 42]))
        .expect("column fits the table");
    table
        .set_column(ColumnType::Selector, 0, &values(&[0, 1, 1, 1]))
        .expect("column fits the table");
    table
        .set_column(ColumnType::Selector, 1, &vec![F::ONE; looked_up.len()])
        .expect("column fits the table");
    table
        .set_column(ColumnType::Witness, 0, &values(looked_up))
        .expect("column fits the table");

    (cs, desc, table)
}

pub const FIBONACCI_LENGTH: usize = 100;

pub fn fibonacci_values() -> Vec<F> {
    let mut result = vec![F::ZERO, F::ONE];
    while result.len() < FIBONACCI_LENGTH {
        let mut next = result[result.len() - 1];
        next.add_assign(&result[result.len() - 2]);
        result.push(next);
    }

    result
}

/// `w0(+2) = w0(+1) + w0` over 100 rows of 128. The first two and the last value are
/// copied into the public input column.
pub fn fibonacci(
    sequence: &[F],
) -> (ConstraintSystem<F>, TableDescription, AssignmentTable<F>) {
    let desc = TableDescription {
        witness_columns: 1,
        public_input_columns: 1,
        constant_columns: 0,
        selector_columns: 1,
        usable_rows: FIBONACCI_LENGTH,
        rows_amount: 128,
    };
    let w0 = |rotation: i32| -> Expression<F> { Variable::witness(0).rotated(rotation).into() };
    let last = FIBONACCI_LENGTH - 1;
    let cs = ConstraintSystem::new(
        vec![Gate {
            selector_index: 0,
            constraints: vec![w0(2) - w0(1) - w0(0)],
        }],
        vec![
            CopyConstraint {
                a: Variable::witness(0).at_row(0),
                b: Variable::public_input(0).at_row(0),
            },
            CopyConstraint {
                a: Variable::witness(0).at_row(1),
                b: Variable::public_input(0).at_row(1),
            },
            CopyConstraint {
                a: Variable::witness(0).at_row(last),
                b: Variable::public_input(0).at_row(2),
            },
        ],
        vec![],
        vec![],
    )
    .with_public_input_sizes(vec![3]);

    let mut table = AssignmentTable::new(&desc);
    table
        .set_column(ColumnType::Witness, 0, sequence)
        .expect("column fits the table");
    table
        .set_column(
            ColumnType::PublicInput,
            0,
            &[sequence[0], sequence[1], sequence[last]],
        )
        .expect("column fits the table");
    table
        .set_column(ColumnType::Selector, 0, &vec![F::ONE; FIBONACCI_LENGTH - 2])
        .expect("column fits the table");

    (cs, desc, table)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::field::SmallField;

    #[test]
    fn test_fibonacci_values() {
        let sequence = fibonacci_values();
        assert_eq!(sequence.len(), FIBONACCI_LENGTH);
        assert_eq!(sequence[10].as_u64_reduced(), 55);
        // f(93) is the last fibonacci number below 2^64
        assert_eq!(sequence[93].as_u64_reduced(), 12200160415121876738 % F::CHAR);
    }
}
