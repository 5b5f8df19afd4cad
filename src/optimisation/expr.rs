//! Linear expressions over decision variables.
use super::Var;
use indexmap::IndexMap;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

/// A linear expression: a weighted sum of variables plus a constant.
///
/// Terms are kept in insertion order, and repeated variables are combined into a single term.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearExpr {
    terms: IndexMap<Var, f64>,
    constant: f64,
}

impl LinearExpr {
    /// An empty expression (equal to zero)
    pub fn new() -> Self {
        Self::default()
    }

    /// An expression with no variables
    pub fn constant(value: f64) -> Self {
        Self {
            terms: IndexMap::new(),
            constant: value,
        }
    }

    /// The constant part of the expression
    pub fn constant_value(&self) -> f64 {
        self.constant
    }

    /// Whether the expression has no variable terms
    pub fn is_constant(&self) -> bool {
        self.terms.values().all(|coeff| *coeff == 0.0)
    }

    /// Add `coeff * var` to the expression
    pub fn add_term(&mut self, var: Var, coeff: f64) {
        if coeff != 0.0 {
            *self.terms.entry(var).or_insert(0.0) += coeff;
        }
    }

    /// Add a constant to the expression
    pub fn add_constant(&mut self, value: f64) {
        self.constant += value;
    }

    /// Add `factor * other` to the expression
    pub fn add_scaled(&mut self, other: &LinearExpr, factor: f64) {
        if factor == 0.0 {
            return;
        }

        for (var, coeff) in &other.terms {
            self.add_term(*var, coeff * factor);
        }
        self.constant += other.constant * factor;
    }

    /// A copy of the expression multiplied by `factor`
    pub fn scaled(&self, factor: f64) -> Self {
        let mut expr = Self::new();
        expr.add_scaled(self, factor);
        expr
    }

    /// Iterate over the non-zero variable terms
    pub fn iter_terms(&self) -> impl Iterator<Item = (Var, f64)> + '_ {
        self.terms
            .iter()
            .filter(|(_, coeff)| **coeff != 0.0)
            .map(|(var, coeff)| (*var, *coeff))
    }

    /// The coefficient of a variable (zero if it does not appear)
    pub fn coefficient(&self, var: Var) -> f64 {
        self.terms.get(&var).copied().unwrap_or(0.0)
    }

    /// The value of the expression given the values of all variables, indexed by column
    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.constant
            + self
                .terms
                .iter()
                .map(|(var, coeff)| coeff * values[var.index()])
                .sum::<f64>()
    }
}

impl From<Var> for LinearExpr {
    fn from(var: Var) -> Self {
        let mut expr = Self::new();
        expr.add_term(var, 1.0);
        expr
    }
}

impl From<f64> for LinearExpr {
    fn from(value: f64) -> Self {
        Self::constant(value)
    }
}

/// Implement `+`, `-`, `+=` and `-=` for expressions with right-hand sides convertible into them
macro_rules! impl_expr_ops {
    ($($rhs:ty),*) => {
        $(
            impl AddAssign<$rhs> for LinearExpr {
                fn add_assign(&mut self, rhs: $rhs) {
                    self.add_scaled(&LinearExpr::from(rhs), 1.0);
                }
            }

            impl SubAssign<$rhs> for LinearExpr {
                fn sub_assign(&mut self, rhs: $rhs) {
                    self.add_scaled(&LinearExpr::from(rhs), -1.0);
                }
            }

            impl Add<$rhs> for LinearExpr {
                type Output = LinearExpr;

                fn add(mut self, rhs: $rhs) -> LinearExpr {
                    self += rhs;
                    self
                }
            }

            impl Sub<$rhs> for LinearExpr {
                type Output = LinearExpr;

                fn sub(mut self, rhs: $rhs) -> LinearExpr {
                    self -= rhs;
                    self
                }
            }

            impl Add<$rhs> for Var {
                type Output = LinearExpr;

                fn add(self, rhs: $rhs) -> LinearExpr {
                    LinearExpr::from(self) + rhs
                }
            }

            impl Sub<$rhs> for Var {
                type Output = LinearExpr;

                fn sub(self, rhs: $rhs) -> LinearExpr {
                    LinearExpr::from(self) - rhs
                }
            }
        )*
    };
}

impl_expr_ops!(LinearExpr, Var, f64);

impl AddAssign<&LinearExpr> for LinearExpr {
    fn add_assign(&mut self, rhs: &LinearExpr) {
        self.add_scaled(rhs, 1.0);
    }
}

impl SubAssign<&LinearExpr> for LinearExpr {
    fn sub_assign(&mut self, rhs: &LinearExpr) {
        self.add_scaled(rhs, -1.0);
    }
}

impl Add<&LinearExpr> for LinearExpr {
    type Output = LinearExpr;

    fn add(mut self, rhs: &LinearExpr) -> LinearExpr {
        self += rhs;
        self
    }
}

impl Mul<f64> for LinearExpr {
    type Output = LinearExpr;

    fn mul(self, rhs: f64) -> LinearExpr {
        self.scaled(rhs)
    }
}

impl Neg for LinearExpr {
    type Output = LinearExpr;

    fn neg(self) -> LinearExpr {
        self.scaled(-1.0)
    }
}

impl Sum for LinearExpr {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::new(), |acc, expr| acc + expr)
    }
}

impl<'a> Sum<&'a LinearExpr> for LinearExpr {
    fn sum<I: Iterator<Item = &'a LinearExpr>>(iter: I) -> Self {
        let mut total = Self::new();
        for expr in iter {
            total += expr;
        }
        total
    }
}

impl Mul<f64> for Var {
    type Output = LinearExpr;

    fn mul(self, rhs: f64) -> LinearExpr {
        let mut expr = LinearExpr::new();
        expr.add_term(self, rhs);
        expr
    }
}
