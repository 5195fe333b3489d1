use std::fmt;
use std::time::Instant;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::SolverConfig;
use crate::data::{ActivityResult, ProblemData, UNASSIGNED_ROOM};
use crate::engine::{self, EngineResponse, EngineStatus};
use crate::error::Result;
use crate::export::{RunLogger, ScheduleExporter};
use crate::model::{ConstraintKind, SoftPenalty, TimetableModel};
use crate::timeline::Timeline;
use crate::validation::validate_schedule;

pub const NO_DIAGNOSIS: &str = "no diagnosis available";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SolveStatus {
    Unsolved,
    Solving,
    Optimal,
    Feasible,
    Infeasible,
    ModelInvalid,
    Unknown,
}

impl SolveStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, SolveStatus::Unsolved | SolveStatus::Solving)
    }

    pub fn has_schedule(self) -> bool {
        matches!(self, SolveStatus::Optimal | SolveStatus::Feasible)
    }
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SolveStatus::Unsolved => "UNSOLVED",
            SolveStatus::Solving => "SOLVING",
            SolveStatus::Optimal => "OPTIMAL",
            SolveStatus::Feasible => "FEASIBLE",
            SolveStatus::Infeasible => "INFEASIBLE",
            SolveStatus::ModelInvalid => "MODEL_INVALID",
            SolveStatus::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

/// One assumption of the infeasibility core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreEntry {
    pub kind: ConstraintKind,
    pub context: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Infeasibility {
    /// Sufficient set of hard constraints that cannot hold together.
    pub core: Vec<CoreEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// The core may not be minimal because the probe budget ran out.
    pub truncated: bool,
}

/// Summary of a single solve, always produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub status: SolveStatus,
    /// Engine message for `MODEL_INVALID` and `UNKNOWN`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub objective: Option<i64>,
    /// Search counters; HiGHS does not report them through `good_lp`.
    pub conflicts: Option<u64>,
    pub branches: Option<u64>,
    /// Engine invocations, counting core-extraction probes.
    pub engine_calls: u32,
    pub wall_time_secs: f64,
    pub config: SolverConfig,
    pub soft_penalties: Vec<SoftPenalty>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub infeasibility: Option<Infeasibility>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveReport {
    pub record: RunRecord,
    pub schedule: Vec<ActivityResult>,
}

/// Drives one solve from a prepared dataset to a run record.
pub struct SolveOrchestrator {
    config: SolverConfig,
    status: SolveStatus,
}

impl SolveOrchestrator {
    pub fn new(config: SolverConfig) -> Result<Self> {
        config.validate()?;
        Ok(SolveOrchestrator {
            config,
            status: SolveStatus::Unsolved,
        })
    }

    pub fn status(&self) -> SolveStatus {
        self.status
    }

    /// Solves and hands the outcome to `sink`.
    ///
    /// The schedule is only exported when one was found; the run log is
    /// always written, after the schedule.
    pub fn solve_and_export<S>(&mut self, problem: &ProblemData, sink: &mut S) -> Result<SolveReport>
    where
        S: ScheduleExporter + RunLogger,
    {
        let report = self.solve(problem)?;
        if report.record.status.has_schedule() {
            sink.export(&report.schedule)?;
        }
        sink.write_run(&report.record)?;
        Ok(report)
    }

    /// Runs the solve. Only malformed data is an error; every engine outcome
    /// is reported through the record's status.
    pub fn solve(&mut self, problem: &ProblemData) -> Result<SolveReport> {
        if self.status.is_terminal() {
            warn!("Orchestrator already finished with {}; solving again", self.status);
        }
        let started = Instant::now();
        problem.check()?;
        let timeline = Timeline::from_problem(problem)?;
        let built = TimetableModel::build(problem, &timeline);

        let mut record = RunRecord {
            status: SolveStatus::Solving,
            detail: None,
            objective: None,
            conflicts: None,
            branches: None,
            engine_calls: 0,
            wall_time_secs: 0.0,
            config: self.config.clone(),
            soft_penalties: Vec::new(),
            infeasibility: None,
            warnings: Vec::new(),
        };
        self.status = SolveStatus::Solving;

        if !built.defects.is_empty() {
            for defect in &built.defects {
                warn!("{defect}");
            }
            record.status = SolveStatus::ModelInvalid;
            record.detail = Some(built.defects.join("; "));
            return Ok(self.finish(record, Vec::new(), started));
        }

        let threads = engine::pinned_threads(self.config.worker_count);
        record.config.worker_count = threads;
        info!("Starting solver with {threads} threads...");
        let response = engine::solve(&built.cp, &self.config.solve_params());
        record.engine_calls = 1;
        info!("Solver finished with {} in {:.2?}", response.status, response.wall_time);

        let mut schedule = Vec::new();
        match &response.status {
            EngineStatus::Optimal | EngineStatus::Feasible => {
                record.status = if response.status == EngineStatus::Optimal {
                    SolveStatus::Optimal
                } else {
                    SolveStatus::Feasible
                };
                schedule = read_schedule(problem, &timeline, &built, &response);
                record.objective = built.cp.objective().and_then(|obj| response.value(obj));
                record.soft_penalties = built.soft.breakdown(&response);
                for violation in validate_schedule(&schedule, &timeline) {
                    warn!("Schedule check failed: {violation}");
                    record.warnings.push(violation.to_string());
                }
            }
            EngineStatus::Infeasible => {
                record.status = SolveStatus::Infeasible;
                let (infeasibility, probes) = self.diagnose(&built);
                record.engine_calls += probes;
                record.infeasibility = Some(infeasibility);
            }
            EngineStatus::ModelInvalid(msg) => {
                record.status = SolveStatus::ModelInvalid;
                record.detail = Some(msg.clone());
            }
            EngineStatus::Unknown(msg) => {
                record.status = SolveStatus::Unknown;
                record.detail = Some(msg.clone());
            }
        }
        Ok(self.finish(record, schedule, started))
    }

    fn finish(&mut self, mut record: RunRecord, schedule: Vec<ActivityResult>, started: Instant) -> SolveReport {
        record.wall_time_secs = started.elapsed().as_secs_f64();
        self.status = record.status;
        info!(
            "Run finished: status {}, objective {}, {} activities scheduled",
            record.status,
            record
                .objective
                .map_or_else(|| "NA".to_string(), |v| v.to_string()),
            schedule.len()
        );
        SolveReport { record, schedule }
    }

    /// Maps a sufficient assumption subset back to the hard constraints it names.
    fn diagnose(&self, built: &TimetableModel) -> (Infeasibility, u32) {
        info!("Searching for a set of conflicting constraints...");
        let search = engine::sufficient_assumptions_for_infeasibility(
            &built.cp,
            &self.config.probe_params(),
            self.config.max_core_probes,
        );
        let core: Vec<CoreEntry> = search
            .core
            .iter()
            .flatten()
            .filter_map(|&literal| built.tracker.lookup(literal))
            .map(|key| CoreEntry {
                kind: key.kind(),
                context: key.context(),
            })
            .collect();
        for entry in &core {
            info!("- {}: {}", entry.kind, entry.context);
        }

        let note = if core.is_empty() {
            warn!("Model is infeasible; {NO_DIAGNOSIS}");
            Some(NO_DIAGNOSIS.to_string())
        } else {
            None
        };
        let infeasibility = Infeasibility {
            core,
            note,
            truncated: search.truncated,
        };
        (infeasibility, search.probes)
    }
}

fn read_schedule(
    problem: &ProblemData,
    timeline: &Timeline,
    built: &TimetableModel,
    response: &EngineResponse,
) -> Vec<ActivityResult> {
    let mut results: Vec<ActivityResult> = built
        .activities
        .iter()
        .map(|vars| {
            let course = &problem.courses[vars.course];
            let activity = &course.components[vars.activity];
            let start = response
                .value(vars.start)
                .and_then(|v| usize::try_from(v).ok())
                .unwrap_or_default();
            let room = vars
                .rooms
                .iter()
                .find(|p| response.bool_value(p.presence) == Some(true))
                .map_or(UNASSIGNED_ROOM, |p| problem.rooms[p.room].id.as_str());
            ActivityResult {
                course_id: course.id.clone(),
                activity_id: activity.id.clone(),
                activity_type: activity.activity_type.clone(),
                assigned_room_id: room.to_string(),
                start_slot: start,
                end_slot: start + vars.duration,
                time_label: timeline.time_label(start, vars.duration),
                teacher_list: course.distinct_teachers().into_iter().map(String::from).collect(),
            }
        })
        .collect();
    results.sort_by(|a, b| (a.start_slot, &a.course_id).cmp(&(b.start_slot, &b.course_id)));
    debug!("Read back {} activities", results.len());
    results
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::error::TimetableError;

    fn quiet() -> SolverConfig {
        SolverConfig::default()
            .with_max_solve_seconds(60.0)
            .with_worker_count(1)
            .with_log_progress(false)
    }

    #[test]
    fn data_error_leaves_orchestrator_unsolved() {
        let mut orchestrator = SolveOrchestrator::new(quiet()).unwrap();
        let err = orchestrator.solve(&ProblemData::default()).unwrap_err();
        assert!(matches!(err, TimetableError::Data(_)));
        assert_eq!(orchestrator.status(), SolveStatus::Unsolved);
    }

    #[test]
    fn oversized_activity_is_model_invalid() {
        let problem: ProblemData = serde_json::from_value(json!({
            "courses": [{"id": "c", "components": [{"id": "l", "type": "L", "duration_slots": 3}]}],
            "rooms": [{"id": "r", "capacity": 10}],
            "time_slots": [
                {"day": "Mon", "start_minute": 0, "end_minute": 30},
                {"day": "Mon", "start_minute": 30, "end_minute": 60}
            ]
        }))
        .unwrap();
        let mut orchestrator = SolveOrchestrator::new(quiet()).unwrap();
        let report = orchestrator.solve(&problem).unwrap();
        assert_eq!(report.record.status, SolveStatus::ModelInvalid);
        assert!(report.record.detail.unwrap().contains("does not fit"));
        assert_eq!(report.record.engine_calls, 0);
    }

    #[test]
    fn status_serializes_in_upper_case() {
        assert_eq!(serde_json::to_value(SolveStatus::ModelInvalid).unwrap(), "MODEL_INVALID");
        assert_eq!(SolveStatus::Feasible.to_string(), "FEASIBLE");
        assert!(!SolveStatus::Solving.is_terminal());
    }

    #[test]
    fn rejects_invalid_config() {
        assert!(SolveOrchestrator::new(quiet().with_worker_count(0)).is_err());
    }
}
