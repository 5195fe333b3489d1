//! Constraint model over a time-indexed integer encoding.
//!
//! Interval variables are encoded by one 0/1 "placement" literal per
//! admissible start value, so every scheduling constraint below becomes a set
//! of linear rows. Each row may carry guard literals; a guarded row is only
//! enforced when all its guards are true.

use super::expr::{BoolVar, IntVar, LinExpr, Literal, VarId};

#[derive(Debug, Clone)]
pub(crate) struct VarDef {
    pub name: String,
    pub lo: i64,
    pub hi: i64,
    pub is_bool: bool,
}

/// `lo <= expr <= hi`, enforced only if every guard holds.
#[derive(Debug, Clone)]
pub(crate) struct Row {
    pub expr: LinExpr,
    pub lo: Option<i64>,
    pub hi: Option<i64>,
    pub guards: Vec<Literal>,
}

impl Row {
    fn between(expr: LinExpr, lo: Option<i64>, hi: Option<i64>) -> Self {
        Row {
            expr,
            lo,
            hi,
            guards: Vec::new(),
        }
    }

    fn guarded(mut self, lit: Literal) -> Self {
        self.guards.push(lit);
        self
    }
}

/// A group of rows added by one modeling call.
///
/// The handle returned by the `add_*` methods lets the caller attach an
/// enforcement literal that applies to every row in the group.
#[derive(Debug, Clone)]
pub struct Constraint {
    pub(crate) rows: Vec<Row>,
    pub(crate) enforcement: Vec<Literal>,
}

impl Constraint {
    fn new(rows: Vec<Row>) -> Self {
        Constraint {
            rows,
            enforcement: Vec::new(),
        }
    }

    /// Enforce this constraint only when `lit` is true.
    pub fn only_enforce_if(&mut self, lit: impl Into<Literal>) -> &mut Self {
        self.enforcement.push(lit.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Handle to an interval stored in a [`CpModel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IntervalVar(usize);

#[derive(Debug, Clone)]
pub(crate) struct IntervalData {
    pub start: IntVar,
    pub end: IntVar,
    pub duration: i64,
    /// `(start value, literal)`; exactly one literal is true when the
    /// interval is performed.
    pub placements: Vec<(i64, BoolVar)>,
    pub presence: Option<BoolVar>,
}

impl IntervalData {
    /// Sum of the placements that cover time point `t`.
    fn occupancy(&self, t: i64) -> LinExpr {
        self.placements
            .iter()
            .filter(|(s, _)| *s <= t && t < *s + self.duration)
            .map(|(_, lit)| *lit)
            .sum()
    }

    fn covered_points(&self) -> impl Iterator<Item = i64> + '_ {
        self.placements
            .iter()
            .flat_map(move |(s, _)| *s..*s + self.duration)
    }
}

#[derive(Debug, Clone, Default)]
pub struct CpModel {
    pub(crate) vars: Vec<VarDef>,
    pub(crate) constraints: Vec<Constraint>,
    pub(crate) intervals: Vec<IntervalData>,
    pub(crate) assumptions: Vec<BoolVar>,
    pub(crate) objective: Option<LinExpr>,
}

impl CpModel {
    pub fn new() -> Self {
        Self::default()
    }

    fn push_var(&mut self, name: String, lo: i64, hi: i64, is_bool: bool) -> VarId {
        let id = VarId(self.vars.len());
        self.vars.push(VarDef {
            name,
            lo,
            hi,
            is_bool,
        });
        id
    }

    pub fn new_bool_var(&mut self, name: impl Into<String>) -> BoolVar {
        BoolVar(self.push_var(name.into(), 0, 1, true))
    }

    pub fn new_int_var(&mut self, lo: i64, hi: i64, name: impl Into<String>) -> IntVar {
        IntVar(self.push_var(name.into(), lo, hi, false))
    }

    pub fn num_vars(&self) -> usize {
        self.vars.len()
    }

    pub fn num_rows(&self) -> usize {
        self.constraints.iter().map(|c| c.rows.len()).sum()
    }

    pub fn var_name(&self, var: VarId) -> &str {
        &self.vars[var.0].name
    }

    pub fn bounds(&self, var: VarId) -> (i64, i64) {
        let def = &self.vars[var.0];
        (def.lo, def.hi)
    }

    /// Smallest and largest value `expr` can take under the variable bounds.
    pub fn expr_bounds(&self, expr: &LinExpr) -> (i64, i64) {
        let mut lo = expr.offset();
        let mut hi = expr.offset();
        for (var, coef) in expr.terms() {
            let (vlo, vhi) = self.bounds(var);
            if coef > 0 {
                lo += coef * vlo;
                hi += coef * vhi;
            } else {
                lo += coef * vhi;
                hi += coef * vlo;
            }
        }
        (lo, hi)
    }

    fn push(&mut self, constraint: Constraint) -> &mut Constraint {
        self.constraints.push(constraint);
        let last = self.constraints.len() - 1;
        &mut self.constraints[last]
    }

    pub fn add_linear(
        &mut self,
        expr: impl Into<LinExpr>,
        lo: Option<i64>,
        hi: Option<i64>,
    ) -> &mut Constraint {
        self.push(Constraint::new(vec![Row::between(expr.into(), lo, hi)]))
    }

    pub fn add_eq(&mut self, lhs: impl Into<LinExpr>, rhs: impl Into<LinExpr>) -> &mut Constraint {
        let expr = lhs.into() - rhs.into();
        self.add_linear(expr, Some(0), Some(0))
    }

    pub fn add_le(&mut self, lhs: impl Into<LinExpr>, rhs: impl Into<LinExpr>) -> &mut Constraint {
        let expr = lhs.into() - rhs.into();
        self.add_linear(expr, None, Some(0))
    }

    pub fn add_ge(&mut self, lhs: impl Into<LinExpr>, rhs: impl Into<LinExpr>) -> &mut Constraint {
        let expr = lhs.into() - rhs.into();
        self.add_linear(expr, Some(0), None)
    }

    /// Creates an interval of fixed `duration` whose start is restricted to
    /// `start_domain`. The start is one-hot encoded over the domain.
    pub fn new_interval(
        &mut self,
        start_domain: &[i64],
        duration: i64,
        horizon: i64,
        name: &str,
    ) -> IntervalVar {
        let start_lo = start_domain.iter().copied().min().unwrap_or(0);
        let start_hi = start_domain.iter().copied().max().unwrap_or(0);
        let start = self.new_int_var(start_lo, start_hi, format!("start_{name}"));
        let end = self.new_int_var(0, horizon, format!("end_{name}"));
        let placements: Vec<(i64, BoolVar)> = start_domain
            .iter()
            .map(|&s| (s, self.new_bool_var(format!("at_{name}_{s}"))))
            .collect();

        let one_hot: LinExpr = placements.iter().map(|(_, lit)| *lit).sum();
        let weighted: LinExpr = placements.iter().map(|&(s, lit)| lit * s).sum();
        self.add_eq(one_hot, 1i64);
        self.add_eq(start, weighted);
        self.add_eq(end, LinExpr::from(start) + duration);

        self.intervals.push(IntervalData {
            start,
            end,
            duration,
            placements,
            presence: None,
        });
        IntervalVar(self.intervals.len() - 1)
    }

    /// Creates an interval that shares `base`'s start, duration and end but is
    /// only performed when `presence` is true.
    pub fn new_optional_interval(
        &mut self,
        base: IntervalVar,
        presence: BoolVar,
        name: &str,
    ) -> IntervalVar {
        let base_data = self.intervals[base.0].clone();
        let mut placements = Vec::with_capacity(base_data.placements.len());
        for &(s, at) in &base_data.placements {
            let lit = self.new_bool_var(format!("opt_{name}_{s}"));
            self.add_le(lit, at);
            placements.push((s, lit));
        }
        let performed: LinExpr = placements.iter().map(|(_, lit)| *lit).sum();
        self.add_eq(performed, presence);

        self.intervals.push(IntervalData {
            start: base_data.start,
            end: base_data.end,
            duration: base_data.duration,
            placements,
            presence: Some(presence),
        });
        IntervalVar(self.intervals.len() - 1)
    }

    pub fn interval_start(&self, interval: IntervalVar) -> IntVar {
        self.intervals[interval.0].start
    }

    pub fn interval_end(&self, interval: IntervalVar) -> IntVar {
        self.intervals[interval.0].end
    }

    pub fn interval_presence(&self, interval: IntervalVar) -> Option<BoolVar> {
        self.intervals[interval.0].presence
    }

    /// No two performed intervals of the set may share a time point.
    /// Absent optional intervals contribute nothing.
    pub fn add_no_overlap(&mut self, intervals: &[IntervalVar]) -> &mut Constraint {
        let data = &self.intervals;
        let mut points: Vec<i64> = intervals
            .iter()
            .flat_map(|iv| data[iv.0].covered_points())
            .collect();
        points.sort_unstable();
        points.dedup();

        let mut rows = Vec::new();
        for t in points {
            let covering: Vec<LinExpr> = intervals
                .iter()
                .map(|iv| data[iv.0].occupancy(t))
                .filter(|occ| !occ.is_constant())
                .collect();
            if covering.len() < 2 {
                continue;
            }
            let load: LinExpr = covering.into_iter().sum();
            rows.push(Row::between(load, None, Some(1)));
        }
        self.push(Constraint::new(rows))
    }

    /// Allowed-assignment relation `(start + offset, target) ∈ {(i, table[i])}`.
    ///
    /// Start values whose shifted index falls outside the table are forbidden.
    pub fn add_start_table(
        &mut self,
        interval: IntervalVar,
        offset: i64,
        table: &[i64],
        target: IntVar,
    ) -> &mut Constraint {
        let data = &self.intervals[interval.0];
        let mut mapped = LinExpr::new();
        let mut rows = Vec::new();
        for &(s, lit) in &data.placements {
            match usize::try_from(s + offset).ok().and_then(|i| table.get(i)) {
                Some(&value) => mapped += lit * value,
                None => rows.push(Row::between(lit.into(), None, Some(0))),
            }
        }
        rows.push(Row::between(LinExpr::from(target) - mapped, Some(0), Some(0)));
        self.push(Constraint::new(rows))
    }

    /// The interval may not cover any of `points`.
    pub fn add_forbidden_points(&mut self, interval: IntervalVar, points: &[i64]) -> &mut Constraint {
        let data = &self.intervals[interval.0];
        let rows = data
            .placements
            .iter()
            .filter(|(s, _)| points.iter().any(|p| *s <= *p && *p < *s + data.duration))
            .map(|(_, lit)| Row::between((*lit).into(), None, Some(0)))
            .collect();
        self.push(Constraint::new(rows))
    }

    /// Returns a literal that is true exactly when `table[start + offset] == value`.
    pub fn table_indicator(
        &mut self,
        interval: IntervalVar,
        offset: i64,
        table: &[i64],
        value: i64,
        name: impl Into<String>,
    ) -> BoolVar {
        let matching: LinExpr = self.intervals[interval.0]
            .placements
            .iter()
            .filter(|(s, _)| {
                usize::try_from(s + offset)
                    .ok()
                    .and_then(|i| table.get(i))
                    .is_some_and(|v| *v == value)
            })
            .map(|(_, lit)| *lit)
            .sum();
        let indicator = self.new_bool_var(name);
        self.add_eq(indicator, matching);
        indicator
    }

    /// `target == min(exprs)`.
    pub fn add_min_equality(&mut self, target: IntVar, exprs: &[LinExpr]) -> &mut Constraint {
        self.add_extremum(target, exprs, true)
    }

    /// `target == max(exprs)`.
    pub fn add_max_equality(&mut self, target: IntVar, exprs: &[LinExpr]) -> &mut Constraint {
        self.add_extremum(target, exprs, false)
    }

    fn add_extremum(&mut self, target: IntVar, exprs: &[LinExpr], is_min: bool) -> &mut Constraint {
        let tag = if is_min { "min" } else { "max" };
        let target_name = self.var_name(target.id()).to_string();
        let mut rows = Vec::new();
        let mut selectors = LinExpr::new();
        for (i, expr) in exprs.iter().enumerate() {
            let diff = LinExpr::from(target) - expr;
            let pick = self.new_bool_var(format!("{tag}_pick_{target_name}_{i}"));
            selectors += pick;
            if is_min {
                rows.push(Row::between(diff.clone(), None, Some(0)));
                rows.push(Row::between(diff, Some(0), None).guarded(pick.into()));
            } else {
                rows.push(Row::between(diff.clone(), Some(0), None));
                rows.push(Row::between(diff, None, Some(0)).guarded(pick.into()));
            }
        }
        rows.push(Row::between(selectors, Some(1), Some(1)));
        self.push(Constraint::new(rows))
    }

    /// Bounded surrogate that equals `active_value` when `active` holds and
    /// `sentinel` otherwise.
    pub fn active_or_sentinel(
        &mut self,
        active: BoolVar,
        active_value: impl Into<LinExpr>,
        sentinel: i64,
        bounds: (i64, i64),
        name: impl Into<String>,
    ) -> IntVar {
        let surrogate = self.new_int_var(bounds.0, bounds.1, name);
        self.add_eq(surrogate, active_value).only_enforce_if(active);
        self.add_eq(surrogate, sentinel).only_enforce_if(active.not());
        surrogate
    }

    pub fn add_assumptions(&mut self, literals: impl IntoIterator<Item = BoolVar>) {
        self.assumptions.extend(literals);
    }

    pub fn assumptions(&self) -> &[BoolVar] {
        &self.assumptions
    }

    pub fn minimize(&mut self, objective: LinExpr) {
        self.objective = Some(objective);
    }

    pub fn objective(&self) -> Option<&LinExpr> {
        self.objective.as_ref()
    }

    /// Checks a full assignment against every row, honoring guards.
    pub fn is_satisfied_by(&self, values: &[i64]) -> bool {
        if values.len() != self.vars.len() {
            return false;
        }
        let in_bounds = self
            .vars
            .iter()
            .zip(values)
            .all(|(def, v)| def.lo <= *v && *v <= def.hi);
        in_bounds
            && self.constraints.iter().all(|c| {
                c.rows.iter().all(|row| {
                    let active = row
                        .guards
                        .iter()
                        .chain(&c.enforcement)
                        .all(|g| LinExpr::from(*g).eval(values) == 1);
                    if !active {
                        return true;
                    }
                    let value = row.expr.eval(values);
                    row.lo.is_none_or(|lo| value >= lo) && row.hi.is_none_or(|hi| value <= hi)
                })
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values_with(model: &CpModel, set: &[(VarId, i64)]) -> Vec<i64> {
        let mut values = vec![0; model.num_vars()];
        for &(var, v) in set {
            values[var.0] = v;
        }
        values
    }

    #[test]
    fn expr_bounds_respect_coefficient_signs() {
        let mut model = CpModel::new();
        let x = model.new_int_var(2, 5, "x");
        let b = model.new_bool_var("b");
        let expr = x * 2 - b * 3 + 1i64;
        assert_eq!(model.expr_bounds(&expr), (2, 11));
    }

    #[test]
    fn no_overlap_skips_points_with_single_interval() {
        let mut model = CpModel::new();
        let a = model.new_interval(&[0, 1], 2, 4, "a");
        let b = model.new_interval(&[2], 2, 4, "b");
        let rows = model.add_no_overlap(&[a, b]).rows.len();
        // only t = 2 can be covered by both
        assert_eq!(rows, 1);
    }

    #[test]
    fn guarded_rows_are_ignored_when_guard_is_false() {
        let mut model = CpModel::new();
        let x = model.new_int_var(0, 5, "x");
        let g = model.new_bool_var("g");
        model.add_eq(x, 3i64).only_enforce_if(g);
        assert!(model.is_satisfied_by(&values_with(&model, &[(x.id(), 1), (g.id(), 0)])));
        assert!(!model.is_satisfied_by(&values_with(&model, &[(x.id(), 1), (g.id(), 1)])));
        assert!(model.is_satisfied_by(&values_with(&model, &[(x.id(), 3), (g.id(), 1)])));
    }

    #[test]
    fn start_table_forbids_out_of_range_starts() {
        let mut model = CpModel::new();
        let iv = model.new_interval(&[0, 1, 2], 1, 3, "a");
        let day = model.new_int_var(0, 1, "day");
        let constraint = model.add_start_table(iv, 1, &[0, 0, 1], day);
        // start 2 shifted by one is past the table
        assert_eq!(constraint.rows.len(), 2);
    }

    #[test]
    fn forbidden_points_block_covering_starts() {
        let mut model = CpModel::new();
        let iv = model.new_interval(&[0, 1, 2, 3], 2, 5, "a");
        // starts 1 and 2 cover t = 2
        assert_eq!(model.add_forbidden_points(iv, &[2]).rows.len(), 2);
    }
}
