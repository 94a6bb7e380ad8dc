use derivative::Derivative;

use super::Variable;
use crate::field::SmallField;

/// Polynomial expression over table cells, used by gates and lookup inputs.
#[derive(Derivative, serde::Serialize, serde::Deserialize)]
#[derivative(Clone, Debug, PartialEq, Eq, Hash)]
#[serde(bound = "")]
pub enum Expression<F: SmallField> {
    Constant(F),
    Variable(Variable),
    Sum(Vec<Expression<F>>),
    Product(Vec<Expression<F>>),
    Negated(Box<Expression<F>>),
    Pow(Box<Expression<F>>, u32),
}

impl<F: SmallField> Expression<F> {
    pub fn constant(value: F) -> Self {
        Expression::Constant(value)
    }

    pub fn pow(self, power: u32) -> Self {
        Expression::Pow(Box::new(self), power)
    }

    /// Degree in the columns, every cell counting as a polynomial of degree one.
    pub fn degree(&self) -> usize {
        match self {
            Expression::Constant(_) => 0,
            Expression::Variable(_) => 1,
            Expression::Sum(terms) => terms.iter().map(|el| el.degree()).max().unwrap_or(0),
            Expression::Product(terms) => terms.iter().map(|el| el.degree()).sum(),
            Expression::Negated(inner) => inner.degree(),
            Expression::Pow(inner, power) => inner.degree() * (*power as usize),
        }
    }

    pub fn visit_variables<V: FnMut(&Variable)>(&self, visitor: &mut V) {
        match self {
            Expression::Constant(_) => {}
            Expression::Variable(variable) => visitor(variable),
            Expression::Sum(terms) | Expression::Product(terms) => {
                for term in terms.iter() {
                    term.visit_variables(visitor);
                }
            }
            Expression::Negated(inner) | Expression::Pow(inner, _) => inner.visit_variables(visitor),
        }
    }

    pub fn try_evaluate<E, A: Fn(&Variable) -> std::result::Result<F, E>>(
        &self,
        assignment: &A,
    ) -> std::result::Result<F, E> {
        let value = match self {
            Expression::Constant(value) => *value,
            Expression::Variable(variable) => assignment(variable)?,
            Expression::Sum(terms) => {
                let mut result = F::ZERO;
                for term in terms.iter() {
                    result.add_assign(&term.try_evaluate(assignment)?);
                }
                result
            }
            Expression::Product(terms) => {
                let mut result = F::ONE;
                for term in terms.iter() {
                    result.mul_assign(&term.try_evaluate(assignment)?);
                }
                result
            }
            Expression::Negated(inner) => {
                let mut result = inner.try_evaluate(assignment)?;
                result.negate();
                result
            }
            Expression::Pow(inner, power) => inner.try_evaluate(assignment)?.pow_u64(*power as u64),
        };

        Ok(value)
    }

    pub fn evaluate<A: Fn(&Variable) -> F>(&self, assignment: &A) -> F {
        match self.try_evaluate::<std::convert::Infallible, _>(&|el| Ok(assignment(el))) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }
}

impl<F: SmallField> From<Variable> for Expression<F> {
    fn from(variable: Variable) -> Self {
        Expression::Variable(variable)
    }
}

impl<F: SmallField> std::ops::Add for Expression<F> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        match self {
            Expression::Sum(mut terms) => {
                terms.push(rhs);
                Expression::Sum(terms)
            }
            other => Expression::Sum(vec![other, rhs]),
        }
    }
}

impl<F: SmallField> std::ops::Sub for Expression<F> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        self + (-rhs)
    }
}

impl<F: SmallField> std::ops::Mul for Expression<F> {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        match self {
            Expression::Product(mut terms) => {
                terms.push(rhs);
                Expression::Product(terms)
            }
            other => Expression::Product(vec![other, rhs]),
        }
    }
}

impl<F: SmallField> std::ops::Neg for Expression<F> {
    type Output = Self;

    fn neg(self) -> Self {
        Expression::Negated(Box::new(self))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cs::ColumnType;
    use crate::field::goldilocks::GoldilocksField;
    use crate::field::Field;

    type F = GoldilocksField;

    fn w(i: usize) -> Expression<F> {
        Variable::witness(i).into()
    }

    #[test]
    fn test_degree_and_evaluation() {
        // w2 * w0(+1) - w1^2 + 5
        let expr = w(2) * Variable::witness(0).rotated(1).into()
            - w(1).pow(2)
            + Expression::constant(F::from_u64_with_reduction(5));
        assert_eq!(expr.degree(), 2);

        let value = expr.evaluate(&|var: &Variable| {
            assert_eq!(var.column_type, ColumnType::Witness);
            F::from_u64_with_reduction((var.index as u64 + 1) * 10 + var.rotation as u64)
        });
        // 30 * 11 - 20^2 + 5 = -65
        let mut expected = F::from_u64_with_reduction(65);
        expected.negate();
        assert_eq!(value, expected);

        let mut rotations = vec![];
        expr.visit_variables(&mut |var| rotations.push(var.rotation));
        assert_eq!(rotations, vec![0, 1, 0]);
    }

    #[test]
    fn test_fallible_evaluation() {
        let expr = w(0) * w(1);
        let result: Result<F, usize> = expr.try_evaluate(&|var| {
            if var.index == 0 {
                Ok(F::TWO)
            } else {
                Err(var.index)
            }
        });
        assert_eq!(result, Err(1));
        assert_eq!(Expression::<F>::constant(F::ONE).pow(3).degree(), 0);
        assert_eq!((w(0) * w(0)).pow(3).degree(), 6);
    }
}
