//! Thin constraint-modeling layer over the HiGHS MILP solver.
//!
//! Offers the constructs the timetable encoding needs (boolean and integer
//! variables, fixed-size and optional intervals, no-overlap, start tables,
//! min/max equalities, conditional enforcement, assumptions) and lowers them
//! to a time-indexed integer program.

mod diagnosis;
mod expr;
mod highs;
mod model;

pub use diagnosis::{CoreSearch, sufficient_assumptions_for_infeasibility};
pub use expr::{BoolVar, IntVar, LinExpr, Literal, VarId};
pub use highs::{EngineResponse, EngineStatus, SolveParams, pinned_threads, solve, solve_under};
pub use model::{Constraint, CpModel, IntervalVar};
