//! Assumption-core extraction by chunked deletion.
//!
//! HiGHS has no native assumption interface, so the core is found by
//! re-solving the feasibility problem with subsets of the assumptions fixed:
//! chunks are dropped while the model stays infeasible, halving the chunk size
//! down to single literals. The surviving set is sufficient for
//! infeasibility, and minimal when the probe budget is not exhausted.

use log::{debug, info};

use super::expr::BoolVar;
use super::highs::{EngineStatus, SolveParams, solve_under};
use super::model::CpModel;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreSearch {
    /// `None` when no diagnosis could be made; an empty core means the model
    /// is infeasible regardless of the assumptions.
    pub core: Option<Vec<BoolVar>>,
    pub probes: u32,
    /// Probe budget ran out before the core was minimal.
    pub truncated: bool,
}

pub fn sufficient_assumptions_for_infeasibility(
    model: &CpModel,
    params: &SolveParams,
    max_probes: u32,
) -> CoreSearch {
    let probe = |assumed: &[BoolVar]| solve_under(model, params, assumed, false).status;

    let mut probes = 1u32;
    match probe(&[]) {
        EngineStatus::Infeasible => {
            info!("Model is infeasible even with every assumption released");
            return CoreSearch {
                core: Some(Vec::new()),
                probes: 1,
                truncated: false,
            };
        }
        status if !status.has_solution() => {
            info!("Relaxed model could not be decided ({status}); no core extracted");
            return CoreSearch {
                core: None,
                probes: 1,
                truncated: false,
            };
        }
        _ => {}
    }

    let mut core: Vec<BoolVar> = model.assumptions().to_vec();
    let mut chunk = (core.len() / 2).max(1);
    let mut truncated = false;
    'search: loop {
        let mut i = 0;
        while i < core.len() {
            if probes >= max_probes {
                truncated = true;
                break 'search;
            }
            let end = (i + chunk).min(core.len());
            let candidate: Vec<BoolVar> = core[..i].iter().chain(&core[end..]).copied().collect();
            probes += 1;
            if probe(&candidate) == EngineStatus::Infeasible {
                debug!("Dropped {} assumptions, {} remain", end - i, candidate.len());
                core = candidate;
            } else {
                i = end;
            }
        }
        if chunk == 1 {
            break;
        }
        chunk = (chunk / 2).max(1);
    }

    CoreSearch {
        core: Some(core),
        probes,
        truncated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::LinExpr;

    fn quiet() -> SolveParams {
        SolveParams {
            time_limit_secs: 30.0,
            threads: 1,
            log_to_console: false,
            ..SolveParams::default()
        }
    }

    #[test]
    fn isolates_the_conflicting_pair() {
        let mut model = CpModel::new();
        let x = model.new_int_var(0, 10, "x");
        let lits: Vec<BoolVar> = (0..6).map(|i| model.new_bool_var(format!("a{i}"))).collect();
        model.add_ge(x, 8i64).only_enforce_if(lits[1]);
        model.add_le(x, 2i64).only_enforce_if(lits[4]);
        model.add_le(x, 9i64).only_enforce_if(lits[0]);
        model.add_ge(LinExpr::from(x), 1i64).only_enforce_if(lits[5]);
        model.add_assumptions(lits.iter().copied());

        let search = sufficient_assumptions_for_infeasibility(&model, &quiet(), 100);
        assert!(!search.truncated);
        assert_eq!(search.core, Some(vec![lits[1], lits[4]]));
    }

    #[test]
    fn structural_infeasibility_gives_empty_core() {
        let mut model = CpModel::new();
        let x = model.new_int_var(0, 3, "x");
        let a = model.new_bool_var("a");
        model.add_ge(x, 5i64);
        model.add_assumptions([a]);
        let search = sufficient_assumptions_for_infeasibility(&model, &quiet(), 10);
        assert_eq!(search.core, Some(Vec::new()));
    }
}
