//! Weighted soft penalties minimized by the solver.

use std::fmt;

use itertools::Itertools;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::variables::ActivityVars;
use crate::data::ProblemData;
use crate::engine::{BoolVar, CpModel, EngineResponse, IntVar, LinExpr};
use crate::timeline::Timeline;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoftKind {
    OverCapacity,
    CapacityWaste,
    RoomBalance,
    DayBalance,
    Compactness,
    SameRoom,
}

impl SoftKind {
    pub fn weight(self) -> i64 {
        match self {
            SoftKind::OverCapacity => 5,
            SoftKind::CapacityWaste => 1,
            SoftKind::RoomBalance => 10,
            SoftKind::DayBalance => 5,
            SoftKind::Compactness => 1,
            SoftKind::SameRoom => 3,
        }
    }
}

impl fmt::Display for SoftKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SoftKind::OverCapacity => "over capacity",
            SoftKind::CapacityWaste => "capacity waste",
            SoftKind::RoomBalance => "room usage balance",
            SoftKind::DayBalance => "day usage balance",
            SoftKind::Compactness => "daily compactness",
            SoftKind::SameRoom => "same-room preference",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct SoftTerm {
    pub kind: SoftKind,
    pub expr: LinExpr,
}

/// Value of one soft term in a solution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoftPenalty {
    pub term: SoftKind,
    pub weight: i64,
    pub value: i64,
}

#[derive(Debug, Clone, Default)]
pub struct SoftObjective {
    terms: Vec<SoftTerm>,
}

impl SoftObjective {
    fn push(&mut self, kind: SoftKind, expr: LinExpr) {
        debug!("Soft term '{kind}' with {} variables", expr.terms().count());
        self.terms.push(SoftTerm { kind, expr });
    }

    pub fn terms(&self) -> &[SoftTerm] {
        &self.terms
    }

    /// Weighted sum of all terms; `None` when no term was built.
    pub fn objective(&self) -> Option<LinExpr> {
        if self.terms.is_empty() {
            return None;
        }
        Some(
            self.terms
                .iter()
                .map(|term| term.expr.clone() * term.kind.weight())
                .sum(),
        )
    }

    pub fn breakdown(&self, response: &EngineResponse) -> Vec<SoftPenalty> {
        self.terms
            .iter()
            .filter_map(|term| {
                response.value(&term.expr).map(|value| SoftPenalty {
                    term: term.kind,
                    weight: term.kind.weight(),
                    value,
                })
            })
            .collect()
    }
}

pub struct SoftConstraintBuilder<'a> {
    problem: &'a ProblemData,
    timeline: &'a Timeline,
    activities: &'a [ActivityVars],
}

impl<'a> SoftConstraintBuilder<'a> {
    pub fn new(problem: &'a ProblemData, timeline: &'a Timeline, activities: &'a [ActivityVars]) -> Self {
        SoftConstraintBuilder {
            problem,
            timeline,
            activities,
        }
    }

    pub fn build(&self, model: &mut CpModel) -> SoftObjective {
        info!("Building soft penalty terms...");
        let mut objective = SoftObjective::default();
        self.add_capacity_terms(&mut objective);
        self.add_room_balance(model, &mut objective);
        self.add_day_terms(model, &mut objective);
        self.add_same_room(model, &mut objective);
        objective
    }

    /// Seats missing and seats left empty, for rooms and courses with known sizes.
    fn add_capacity_terms(&self, objective: &mut SoftObjective) {
        let mut over = LinExpr::new();
        let mut waste = LinExpr::new();
        for vars in self.activities {
            let enrollment = self.problem.courses[vars.course].enrollment as i64;
            for placed in &vars.rooms {
                let capacity = self.problem.rooms[placed.room].capacity as i64;
                if capacity == 0 || enrollment == 0 {
                    continue;
                }
                if enrollment > capacity {
                    over += placed.presence * (enrollment - capacity);
                } else {
                    waste += placed.presence * (capacity - enrollment);
                }
            }
        }
        if !over.is_constant() {
            objective.push(SoftKind::OverCapacity, over);
        }
        if !waste.is_constant() {
            objective.push(SoftKind::CapacityWaste, waste);
        }
    }

    fn add_room_balance(&self, model: &mut CpModel, objective: &mut SoftObjective) {
        if self.problem.rooms.is_empty() || self.activities.is_empty() {
            return;
        }
        let usage: Vec<LinExpr> = (0..self.problem.rooms.len())
            .map(|r| {
                self.activities
                    .iter()
                    .flat_map(|vars| vars.rooms.iter().filter(|p| p.room == r))
                    .map(|p| p.presence)
                    .sum()
            })
            .collect();
        let n = self.activities.len() as i64;
        let busiest = model.new_int_var(0, n, "room_usage_max");
        let idlest = model.new_int_var(0, n, "room_usage_min");
        model.add_max_equality(busiest, &usage);
        model.add_min_equality(idlest, &usage);
        objective.push(SoftKind::RoomBalance, LinExpr::from(busiest) - idlest);
    }

    /// Day balance and per-day compactness, both driven by the same day indicators.
    fn add_day_terms(&self, model: &mut CpModel, objective: &mut SoftObjective) {
        let days = self.timeline.days();
        if !self.timeline.has_slots() || days.is_empty() || self.activities.is_empty() {
            return;
        }
        let horizon = self.timeline.horizon() as i64;
        let table = self.timeline.day_table();
        let n = self.activities.len() as i64;

        let mut counts = Vec::with_capacity(days.len());
        let mut compactness = LinExpr::new();
        for (d, day) in days.iter().enumerate() {
            let on_day: Vec<BoolVar> = self
                .activities
                .iter()
                .map(|vars| {
                    model.table_indicator(vars.interval, 0, table, d as i64, format!("on_{day}_{}", vars.name))
                })
                .collect();
            counts.push(on_day.iter().copied().sum::<LinExpr>());

            let has_day = model.new_int_var(0, 1, format!("has_{day}"));
            let indicators: Vec<LinExpr> = on_day.iter().map(|&b| b.into()).collect();
            model.add_max_equality(has_day, &indicators);

            let mut starts = Vec::with_capacity(on_day.len() + 1);
            let mut ends = Vec::with_capacity(on_day.len());
            for (vars, &active) in self.activities.iter().zip(&on_day) {
                let start = model.active_or_sentinel(
                    active,
                    vars.start,
                    horizon,
                    (0, horizon),
                    format!("first_{day}_{}", vars.name),
                );
                let end = model.active_or_sentinel(
                    active,
                    vars.end,
                    0,
                    (0, horizon),
                    format!("last_{day}_{}", vars.name),
                );
                starts.push(LinExpr::from(start));
                ends.push(LinExpr::from(end));
            }
            // an empty day collapses to [0, 0]
            starts.push(LinExpr::from(has_day) * horizon);

            let earliest = model.new_int_var(0, horizon, format!("earliest_{day}"));
            let latest = model.new_int_var(0, horizon, format!("latest_{day}"));
            model.add_min_equality(earliest, &starts);
            model.add_max_equality(latest, &ends);
            compactness += LinExpr::from(latest) - earliest;
        }

        let busiest = model.new_int_var(0, n, "day_usage_max");
        let idlest = model.new_int_var(0, n, "day_usage_min");
        model.add_max_equality(busiest, &counts);
        model.add_min_equality(idlest, &counts);
        objective.push(SoftKind::DayBalance, LinExpr::from(busiest) - idlest);
        objective.push(SoftKind::Compactness, compactness);
    }

    /// Activities of one subject and type should share a room. Courses
    /// without a subject code form no group.
    fn add_same_room(&self, model: &mut CpModel, objective: &mut SoftObjective) {
        let groups = self
            .activities
            .iter()
            .filter(|vars| !self.problem.courses[vars.course].subject_code.trim().is_empty())
            .map(|vars| {
                let course = &self.problem.courses[vars.course];
                let kind = &course.components[vars.activity].activity_type;
                ((course.subject_code.as_str(), kind.as_str()), vars)
            })
            .into_group_map();

        let mut penalty = LinExpr::new();
        for ((subject, kind), members) in groups.into_iter().sorted_by(|a, b| a.0.cmp(&b.0)) {
            if members.len() < 2 {
                continue;
            }
            for (r, room) in self.problem.rooms.iter().enumerate() {
                let presences: Vec<LinExpr> = members
                    .iter()
                    .flat_map(|vars| vars.rooms.iter().filter(|p| p.room == r))
                    .map(|p| LinExpr::from(p.presence))
                    .collect();
                if presences.is_empty() {
                    continue;
                }
                let used: IntVar = model.new_int_var(0, 1, format!("uses_{subject}_{kind}_{}", room.id));
                model.add_max_equality(used, &presences);
                penalty += used;
            }
            penalty += -1i64;
        }
        if !penalty.is_constant() {
            objective.push(SoftKind::SameRoom, penalty);
        }
    }
}
