use derivative::Derivative;

use super::{ColumnType, TableDescription, Variable};
use crate::error::{shape_err, Result};
use crate::field::SmallField;

/// Public inputs, constants and selectors. Known to the verifier up to the public inputs,
/// which are committed by the prover.
#[derive(Derivative, serde::Serialize, serde::Deserialize)]
#[derivative(Clone, Debug, PartialEq, Eq, Default(bound = ""))]
#[serde(bound = "")]
pub struct PublicAssignmentTable<F: SmallField> {
    pub public_inputs: Vec<Vec<F>>,
    pub constants: Vec<Vec<F>>,
    pub selectors: Vec<Vec<F>>,
}

#[derive(Derivative, serde::Serialize, serde::Deserialize)]
#[derivative(Clone, Debug, PartialEq, Eq, Default(bound = ""))]
#[serde(bound = "")]
pub struct PrivateAssignmentTable<F: SmallField> {
    pub witnesses: Vec<Vec<F>>,
}

#[derive(Derivative, serde::Serialize, serde::Deserialize)]
#[derivative(Clone, Debug, PartialEq, Eq)]
#[serde(bound = "")]
pub struct AssignmentTable<F: SmallField> {
    pub private_table: PrivateAssignmentTable<F>,
    pub public_table: PublicAssignmentTable<F>,
}

fn check_columns<F: SmallField>(
    columns: &[Vec<F>],
    column_type: ColumnType,
    desc: &TableDescription,
) -> Result<()> {
    if columns.len() != desc.num_columns_of(column_type) {
        return Err(shape_err!(
            "expected {} {:?} columns, got {}",
            desc.num_columns_of(column_type),
            column_type,
            columns.len()
        ));
    }
    for (idx, column) in columns.iter().enumerate() {
        if column.len() != desc.rows_amount {
            return Err(shape_err!(
                "{:?} column {} has {} rows, expected {}",
                column_type,
                idx,
                column.len(),
                desc.rows_amount
            ));
        }
    }

    Ok(())
}

impl<F: SmallField> PublicAssignmentTable<F> {
    pub fn validate(&self, desc: &TableDescription) -> Result<()> {
        check_columns(&self.public_inputs, ColumnType::PublicInput, desc)?;
        check_columns(&self.constants, ColumnType::Constant, desc)?;
        check_columns(&self.selectors, ColumnType::Selector, desc)
    }
}

impl<F: SmallField> PrivateAssignmentTable<F> {
    pub fn validate(&self, desc: &TableDescription) -> Result<()> {
        check_columns(&self.witnesses, ColumnType::Witness, desc)
    }
}

impl<F: SmallField> AssignmentTable<F> {
    /// All zero table of the described shape.
    pub fn new(desc: &TableDescription) -> Self {
        let make = |num: usize| vec![vec![F::ZERO; desc.rows_amount]; num];
        Self {
            private_table: PrivateAssignmentTable {
                witnesses: make(desc.witness_columns),
            },
            public_table: PublicAssignmentTable {
                public_inputs: make(desc.public_input_columns),
                constants: make(desc.constant_columns),
                selectors: make(desc.selector_columns),
            },
        }
    }

    pub fn validate(&self, desc: &TableDescription) -> Result<()> {
        self.private_table.validate(desc)?;
        self.public_table.validate(desc)
    }

    pub fn columns(&self, column_type: ColumnType) -> &[Vec<F>] {
        match column_type {
            ColumnType::Witness => &self.private_table.witnesses,
            ColumnType::PublicInput => &self.public_table.public_inputs,
            ColumnType::Constant => &self.public_table.constants,
            ColumnType::Selector => &self.public_table.selectors,
        }
    }

    fn columns_mut(&mut self, column_type: ColumnType) -> &mut Vec<Vec<F>> {
        match column_type {
            ColumnType::Witness => &mut self.private_table.witnesses,
            ColumnType::PublicInput => &mut self.public_table.public_inputs,
            ColumnType::Constant => &mut self.public_table.constants,
            ColumnType::Selector => &mut self.public_table.selectors,
        }
    }

    /// Overwrites the leading rows of a column, the rest keeps its values.
    pub fn set_column(&mut self, column_type: ColumnType, index: usize, values: &[F]) -> Result<()> {
        let columns = self.columns_mut(column_type);
        let column = columns.get_mut(index).ok_or_else(|| {
            shape_err!("{:?} column {} does not exist", column_type, index)
        })?;
        if values.len() > column.len() {
            return Err(shape_err!(
                "{} values do not fit a column of {} rows",
                values.len(),
                column.len()
            ));
        }
        column[..values.len()].copy_from_slice(values);

        Ok(())
    }

    pub fn set(&mut self, variable: Variable, row: usize, value: F) -> Result<()> {
        let columns = self.columns_mut(variable.column_type);
        let cell = columns
            .get_mut(variable.index)
            .and_then(|el| el.get_mut(row))
            .ok_or_else(|| shape_err!("cell {:?} at row {} does not exist", variable, row))?;
        *cell = value;

        Ok(())
    }

    pub fn value(&self, variable: Variable, row: usize) -> Option<F> {
        self.columns(variable.column_type)
            .get(variable.index)
            .and_then(|el| el.get(row))
            .copied()
    }

    pub fn split(self) -> (PublicAssignmentTable<F>, PrivateAssignmentTable<F>) {
        (self.public_table, self.private_table)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::PlaceholderError;
    use crate::field::goldilocks::GoldilocksField;
    use crate::field::Field;

    type F = GoldilocksField;

    #[test]
    fn test_table_shape() {
        let desc = TableDescription {
            witness_columns: 2,
            public_input_columns: 1,
            constant_columns: 0,
            selector_columns: 1,
            usable_rows: 3,
            rows_amount: 4,
        };
        let mut table = AssignmentTable::<F>::new(&desc);
        table.validate(&desc).unwrap();
        table
            .set_column(ColumnType::Witness, 1, &[F::ONE, F::TWO])
            .unwrap();
        table.set(Variable::selector(0), 3, F::ONE).unwrap();
        assert_eq!(table.value(Variable::witness(1), 1), Some(F::TWO));
        assert_eq!(table.value(Variable::witness(1), 2), Some(F::ZERO));
        assert_eq!(table.value(Variable::selector(0), 3), Some(F::ONE));
        assert!(table.set(Variable::constant(0), 0, F::ONE).is_err());
        assert!(table
            .set_column(ColumnType::PublicInput, 0, &[F::ONE; 5])
            .is_err());

        let (public, mut private) = table.split();
        public.validate(&desc).unwrap();
        private.witnesses[0].pop();
        assert!(matches!(
            private.validate(&desc),
            Err(PlaceholderError::Shape(_))
        ));
    }
}
