use derivative::Derivative;

use crate::error::{config_err, shape_err, Result};

pub mod assignment;
pub mod constraint_system;
pub mod expression;
pub mod implementations;
pub mod oracle;

pub use self::assignment::*;
pub use self::constraint_system::*;
pub use self::expression::*;

// columns are enumerated globally in this order, see `TableDescription::global_index`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub enum ColumnType {
    Witness = 0,
    PublicInput = 1,
    Constant = 2,
    Selector = 3,
}

impl ColumnType {
    pub const ALL: [ColumnType; 4] = [
        ColumnType::Witness,
        ColumnType::PublicInput,
        ColumnType::Constant,
        ColumnType::Selector,
    ];
}

/// Reference to a table cell.
///
/// A relative variable is used by gates and lookups: it reads column `index` at
/// `current_row + rotation`, wrapping around the domain. An absolute variable is used by copy
/// constraints, and its `rotation` is the row itself.
#[derive(Derivative, serde::Serialize, serde::Deserialize)]
#[derivative(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Variable {
    pub column_type: ColumnType,
    pub index: usize,
    pub rotation: i32,
    pub relative: bool,
}

impl Variable {
    #[inline]
    pub const fn new(column_type: ColumnType, index: usize) -> Self {
        Self {
            column_type,
            index,
            rotation: 0,
            relative: true,
        }
    }

    #[inline]
    pub const fn witness(index: usize) -> Self {
        Self::new(ColumnType::Witness, index)
    }

    #[inline]
    pub const fn public_input(index: usize) -> Self {
        Self::new(ColumnType::PublicInput, index)
    }

    #[inline]
    pub const fn constant(index: usize) -> Self {
        Self::new(ColumnType::Constant, index)
    }

    #[inline]
    pub const fn selector(index: usize) -> Self {
        Self::new(ColumnType::Selector, index)
    }

    #[inline]
    pub const fn rotated(self, rotation: i32) -> Self {
        Self { rotation, ..self }
    }

    /// Cell at `row` of the column, as copy constraints reference it.
    #[inline]
    pub const fn at_row(self, row: usize) -> Self {
        Self {
            rotation: row as i32,
            relative: false,
            ..self
        }
    }

    #[inline]
    pub const fn column(&self) -> (ColumnType, usize) {
        (self.column_type, self.index)
    }
}

#[derive(Derivative, serde::Serialize, serde::Deserialize)]
#[derivative(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TableDescription {
    pub witness_columns: usize,
    pub public_input_columns: usize,
    pub constant_columns: usize,
    pub selector_columns: usize,
    pub usable_rows: usize,
    pub rows_amount: usize,
}

impl TableDescription {
    pub fn validate(&self) -> Result<()> {
        if self.rows_amount == 0 || self.rows_amount.is_power_of_two() == false {
            return Err(config_err!(
                "rows amount must be a nonzero power of two, got {}",
                self.rows_amount
            ));
        }
        if self.usable_rows == 0 {
            return Err(config_err!("table has no usable rows"));
        }
        // row `usable_rows` carries `q_last`
        if self.rows_amount <= self.usable_rows {
            return Err(config_err!(
                "rows amount {} must exceed the number of usable rows {}",
                self.rows_amount,
                self.usable_rows
            ));
        }

        Ok(())
    }

    pub const fn num_columns(&self) -> usize {
        self.witness_columns
            + self.public_input_columns
            + self.constant_columns
            + self.selector_columns
    }

    pub const fn num_columns_of(&self, column_type: ColumnType) -> usize {
        match column_type {
            ColumnType::Witness => self.witness_columns,
            ColumnType::PublicInput => self.public_input_columns,
            ColumnType::Constant => self.constant_columns,
            ColumnType::Selector => self.selector_columns,
        }
    }

    pub const fn global_index(&self, column_type: ColumnType, index: usize) -> usize {
        match column_type {
            ColumnType::Witness => index,
            ColumnType::PublicInput => self.witness_columns + index,
            ColumnType::Constant => self.witness_columns + self.public_input_columns + index,
            ColumnType::Selector => {
                self.witness_columns + self.public_input_columns + self.constant_columns + index
            }
        }
    }

    /// Inverse of `global_index`.
    pub fn column_at_global_index(&self, global_index: usize) -> Option<(ColumnType, usize)> {
        let mut offset = global_index;
        for column_type in ColumnType::ALL.iter().copied() {
            let num = self.num_columns_of(column_type);
            if offset < num {
                return Some((column_type, offset));
            }
            offset -= num;
        }

        None
    }

    pub fn check_variable(&self, variable: &Variable) -> Result<()> {
        if variable.index >= self.num_columns_of(variable.column_type) {
            return Err(shape_err!(
                "{:?} column {} does not exist, table has {}",
                variable.column_type,
                variable.index,
                self.num_columns_of(variable.column_type)
            ));
        }
        if variable.relative {
            if variable.rotation.unsigned_abs() as usize >= self.rows_amount {
                return Err(shape_err!(
                    "rotation {} does not fit a domain of size {}",
                    variable.rotation,
                    self.rows_amount
                ));
            }
        } else if variable.rotation < 0 || variable.rotation as usize >= self.usable_rows {
            return Err(shape_err!(
                "row {} of {:?} column {} is not a usable row",
                variable.rotation,
                variable.column_type,
                variable.index
            ));
        }

        Ok(())
    }
}
