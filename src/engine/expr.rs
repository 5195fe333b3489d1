use std::collections::BTreeMap;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub};

/// Index of a decision variable inside a [`CpModel`](super::CpModel).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarId(pub(crate) usize);

/// A 0/1 decision variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BoolVar(pub(crate) VarId);

/// A bounded integer decision variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IntVar(pub(crate) VarId);

/// A boolean variable or its negation, used as an enforcement guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Literal {
    var: BoolVar,
    negated: bool,
}

impl BoolVar {
    pub fn id(self) -> VarId {
        self.0
    }

    pub fn not(self) -> Literal {
        Literal {
            var: self,
            negated: true,
        }
    }
}

impl IntVar {
    pub fn id(self) -> VarId {
        self.0
    }
}

impl From<BoolVar> for Literal {
    fn from(var: BoolVar) -> Self {
        Literal {
            var,
            negated: false,
        }
    }
}

/// Integer linear expression `Σ coef·var + constant`.
///
/// Terms are kept in a `BTreeMap` so that lowering is deterministic and
/// repeated variables are merged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinExpr {
    terms: BTreeMap<VarId, i64>,
    constant: i64,
}

impl LinExpr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn constant(value: i64) -> Self {
        LinExpr {
            terms: BTreeMap::new(),
            constant: value,
        }
    }

    pub fn add_term(&mut self, var: VarId, coef: i64) {
        if coef == 0 {
            return;
        }
        let entry = self.terms.entry(var).or_insert(0);
        *entry += coef;
        if *entry == 0 {
            self.terms.remove(&var);
        }
    }

    pub fn terms(&self) -> impl Iterator<Item = (VarId, i64)> + '_ {
        self.terms.iter().map(|(&var, &coef)| (var, coef))
    }

    pub fn offset(&self) -> i64 {
        self.constant
    }

    pub fn is_constant(&self) -> bool {
        self.terms.is_empty()
    }

    /// Evaluates the expression under a full assignment indexed by `VarId`.
    pub fn eval(&self, values: &[i64]) -> i64 {
        self.terms
            .iter()
            .map(|(var, coef)| coef * values[var.0])
            .sum::<i64>()
            + self.constant
    }
}

impl From<i64> for LinExpr {
    fn from(value: i64) -> Self {
        LinExpr::constant(value)
    }
}

impl From<VarId> for LinExpr {
    fn from(var: VarId) -> Self {
        let mut expr = LinExpr::new();
        expr.add_term(var, 1);
        expr
    }
}

impl From<BoolVar> for LinExpr {
    fn from(var: BoolVar) -> Self {
        var.0.into()
    }
}

impl From<IntVar> for LinExpr {
    fn from(var: IntVar) -> Self {
        var.0.into()
    }
}

impl From<Literal> for LinExpr {
    fn from(lit: Literal) -> Self {
        if lit.negated {
            LinExpr::constant(1) - lit.var
        } else {
            lit.var.into()
        }
    }
}

impl From<&LinExpr> for LinExpr {
    fn from(expr: &LinExpr) -> Self {
        expr.clone()
    }
}

impl<T: Into<LinExpr>> AddAssign<T> for LinExpr {
    fn add_assign(&mut self, rhs: T) {
        let rhs = rhs.into();
        for (var, coef) in rhs.terms {
            self.add_term(var, coef);
        }
        self.constant += rhs.constant;
    }
}

impl<T: Into<LinExpr>> Add<T> for LinExpr {
    type Output = LinExpr;

    fn add(mut self, rhs: T) -> LinExpr {
        self += rhs;
        self
    }
}

impl<T: Into<LinExpr>> Sub<T> for LinExpr {
    type Output = LinExpr;

    fn sub(mut self, rhs: T) -> LinExpr {
        let rhs: LinExpr = rhs.into();
        self += -rhs;
        self
    }
}

impl Neg for LinExpr {
    type Output = LinExpr;

    fn neg(self) -> LinExpr {
        self * -1
    }
}

impl Mul<i64> for LinExpr {
    type Output = LinExpr;

    fn mul(self, rhs: i64) -> LinExpr {
        if rhs == 0 {
            return LinExpr::new();
        }
        LinExpr {
            terms: self.terms.into_iter().map(|(v, c)| (v, c * rhs)).collect(),
            constant: self.constant * rhs,
        }
    }
}

impl Mul<i64> for BoolVar {
    type Output = LinExpr;

    fn mul(self, rhs: i64) -> LinExpr {
        LinExpr::from(self) * rhs
    }
}

impl Mul<i64> for IntVar {
    type Output = LinExpr;

    fn mul(self, rhs: i64) -> LinExpr {
        LinExpr::from(self) * rhs
    }
}

impl<T: Into<LinExpr>> Sum<T> for LinExpr {
    fn sum<I: Iterator<Item = T>>(iter: I) -> Self {
        let mut total = LinExpr::new();
        for item in iter {
            total += item;
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merges_repeated_terms_and_drops_zeroes() {
        let a = BoolVar(VarId(0));
        let b = IntVar(VarId(1));
        let expr = LinExpr::from(a) * 3 + b - a * 3 + 7i64;
        assert_eq!(expr.terms().collect::<Vec<_>>(), vec![(VarId(1), 1)]);
        assert_eq!(expr.offset(), 7);
    }

    #[test]
    fn negated_literal_is_one_minus_var() {
        let a = BoolVar(VarId(0));
        let expr = LinExpr::from(a.not());
        assert_eq!(expr.eval(&[1]), 0);
        assert_eq!(expr.eval(&[0]), 1);
    }

    #[test]
    fn sums_variables_with_coefficients() {
        let vars: Vec<BoolVar> = (0..3).map(|i| BoolVar(VarId(i))).collect();
        let expr: LinExpr = vars.iter().enumerate().map(|(i, v)| *v * (i as i64 + 1)).sum();
        assert_eq!(expr.eval(&[1, 0, 1]), 4);
    }
}
