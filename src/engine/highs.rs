//! Lowering of a [`CpModel`] to a `good_lp` MILP solved by HiGHS.

use std::fmt;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use good_lp::{
    Expression, ProblemVariables, ResolutionError, Solution, SolutionStatus, SolverModel, Variable,
    constraint, default_solver, variable,
};
use log::{debug, trace, warn};

use super::expr::{BoolVar, LinExpr, Literal};
use super::model::{CpModel, Row};

/// Engine parameters for one solve call.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveParams {
    pub time_limit_secs: f64,
    pub relative_gap: f64,
    pub threads: u32,
    pub random_seed: i32,
    pub log_to_console: bool,
}

impl Default for SolveParams {
    fn default() -> Self {
        SolveParams {
            time_limit_secs: 600.0,
            relative_gap: 0.03,
            threads: 8,
            random_seed: 1234,
            log_to_console: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineStatus {
    Optimal,
    Feasible,
    Infeasible,
    ModelInvalid(String),
    Unknown(String),
}

impl EngineStatus {
    pub fn has_solution(&self) -> bool {
        matches!(self, EngineStatus::Optimal | EngineStatus::Feasible)
    }
}

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineStatus::Optimal => write!(f, "OPTIMAL"),
            EngineStatus::Feasible => write!(f, "FEASIBLE"),
            EngineStatus::Infeasible => write!(f, "INFEASIBLE"),
            EngineStatus::ModelInvalid(msg) => write!(f, "MODEL_INVALID ({msg})"),
            EngineStatus::Unknown(msg) => write!(f, "UNKNOWN ({msg})"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineResponse {
    pub status: EngineStatus,
    values: Option<Vec<i64>>,
    pub wall_time: Duration,
}

impl EngineResponse {
    fn without_values(status: EngineStatus, wall_time: Duration) -> Self {
        EngineResponse {
            status,
            values: None,
            wall_time,
        }
    }

    /// Value of `expr` in the returned assignment, if there is one.
    pub fn value(&self, expr: impl Into<LinExpr>) -> Option<i64> {
        let expr = expr.into();
        self.values.as_ref().map(|values| expr.eval(values))
    }

    pub fn bool_value(&self, var: BoolVar) -> Option<bool> {
        self.value(var).map(|v| v == 1)
    }
}

enum Side {
    AtMost(i64),
    AtLeast(i64),
}

/// Turns a guarded row into plain linear inequalities with big-M relaxation.
///
/// With `n` guards the slack `n - Σ guards` is zero iff all guards hold; the
/// coefficient on the slack is the smallest one that makes the inequality
/// redundant under the variable bounds once any guard is false.
fn relax_row(model: &CpModel, row: &Row, guards: &[Literal]) -> Vec<(LinExpr, Side)> {
    let (min, max) = model.expr_bounds(&row.expr);
    let slack = LinExpr::constant(guards.len() as i64)
        - guards.iter().map(|g| LinExpr::from(*g)).sum::<LinExpr>();

    let mut out = Vec::with_capacity(2);
    if let Some(hi) = row.hi {
        if max > hi {
            let big_m = max - hi;
            out.push((row.expr.clone() - slack.clone() * big_m, Side::AtMost(hi)));
        }
    }
    if let Some(lo) = row.lo {
        if min < lo {
            let big_m = lo - min;
            out.push((row.expr.clone() + slack * big_m, Side::AtLeast(lo)));
        }
    }
    out
}

fn to_expression(expr: &LinExpr, columns: &[Variable]) -> Expression {
    expr.terms().fold(Expression::from(0.0), |acc, (var, coef)| {
        acc + coef as f64 * Expression::from(columns[var.0])
    })
}

/// Worker pool size shared by every HiGHS solve in this process.
static THREAD_POOL: OnceLock<u32> = OnceLock::new();

/// Returns the thread count HiGHS runs with in this process.
///
/// HiGHS sizes its scheduler once, on the first solve, and rejects later
/// solves that ask for another size. The first request wins.
pub fn pinned_threads(requested: u32) -> u32 {
    *THREAD_POOL.get_or_init(|| requested)
}

/// Only a search that ended without an incumbent is `Unknown`; every other
/// engine error means the model could not be solved as given.
fn classify_failure(err: ResolutionError) -> EngineStatus {
    match err {
        ResolutionError::Infeasible => EngineStatus::Infeasible,
        ResolutionError::Unbounded => EngineStatus::ModelInvalid("objective is unbounded".into()),
        ResolutionError::Other("NoSolutionFound") => {
            EngineStatus::Unknown("search stopped without a feasible assignment".into())
        }
        other => EngineStatus::ModelInvalid(other.to_string()),
    }
}

fn classify_solution(status: SolutionStatus) -> EngineStatus {
    match status {
        SolutionStatus::Optimal | SolutionStatus::GapLimit => EngineStatus::Optimal,
        SolutionStatus::TimeLimit => EngineStatus::Feasible,
    }
}

/// Solves `model` with every literal in `assumed` fixed to true.
///
/// When `with_objective` is false the objective is dropped and the call only
/// decides feasibility.
pub fn solve_under(
    model: &CpModel,
    params: &SolveParams,
    assumed: &[BoolVar],
    with_objective: bool,
) -> EngineResponse {
    let started = Instant::now();

    if model.vars.is_empty() {
        let status = if model.is_satisfied_by(&[]) {
            EngineStatus::Optimal
        } else {
            EngineStatus::Infeasible
        };
        return EngineResponse {
            status,
            values: Some(Vec::new()),
            wall_time: started.elapsed(),
        };
    }

    let threads = pinned_threads(params.threads);
    if threads != params.threads {
        warn!("HiGHS already runs with {threads} threads; ignoring request for {}", params.threads);
    }

    let mut problem = ProblemVariables::new();
    let columns: Vec<Variable> = model
        .vars
        .iter()
        .map(|def| {
            if def.is_bool {
                problem.add(variable().binary())
            } else {
                problem.add(variable().integer().min(def.lo as f64).max(def.hi as f64))
            }
        })
        .collect();

    let objective = match (with_objective, model.objective()) {
        (true, Some(obj)) => to_expression(obj, &columns),
        _ => Expression::from(0.0),
    };

    let mut lp = problem
        .minimise(objective)
        .using(default_solver)
        .set_option("time_limit", params.time_limit_secs)
        .set_option("mip_rel_gap", params.relative_gap)
        .set_option("threads", threads as i32)
        .set_option("random_seed", params.random_seed)
        .set_option("log_to_console", if params.log_to_console { "true" } else { "false" });

    let mut lowered = 0usize;
    for group in &model.constraints {
        for row in &group.rows {
            let guards: Vec<Literal> = row
                .guards
                .iter()
                .chain(&group.enforcement)
                .copied()
                .collect();
            for (expr, side) in relax_row(model, row, &guards) {
                let lhs = to_expression(&expr, &columns);
                match side {
                    Side::AtMost(hi) => {
                        let rhs = (hi - expr.offset()) as f64;
                        lp.add_constraint(constraint!(lhs <= rhs));
                    }
                    Side::AtLeast(lo) => {
                        let rhs = (lo - expr.offset()) as f64;
                        lp.add_constraint(constraint!(lhs >= rhs));
                    }
                }
                lowered += 1;
            }
        }
    }
    for lit in assumed {
        let column = columns[lit.id().0];
        lp.add_constraint(constraint!(column >= 1));
    }
    debug!(
        "Lowered model: {} columns, {} rows, {} fixed assumptions",
        columns.len(),
        lowered,
        assumed.len()
    );

    let outcome = lp.solve();
    let wall_time = started.elapsed();

    let solution = match outcome {
        Ok(solution) => solution,
        Err(err) => {
            trace!("HiGHS returned no solution: {err}");
            return EngineResponse::without_values(classify_failure(err), wall_time);
        }
    };

    let status = classify_solution(solution.status());
    let raw: Vec<f64> = columns.iter().map(|c| solution.value(*c)).collect();
    let values: Vec<i64> = raw.iter().map(|v| v.round() as i64).collect();
    // rounding can break rows the relaxed point only met within tolerance
    if raw.iter().any(|v| !v.is_finite()) || !model.is_satisfied_by(&values) {
        return EngineResponse::without_values(
            EngineStatus::Unknown("returned assignment violates the model after rounding".into()),
            wall_time,
        );
    }

    EngineResponse {
        status,
        values: Some(values),
        wall_time,
    }
}

/// Solves with every registered assumption fixed to true.
pub fn solve(model: &CpModel, params: &SolveParams) -> EngineResponse {
    solve_under(model, params, model.assumptions(), true)
}
