//! Builds the timetable constraint model from a prepared dataset.

mod assumptions;
mod hard;
mod soft;
mod variables;

use log::info;

pub use assumptions::{AssumptionEntry, AssumptionKey, AssumptionTracker, ConstraintKind};
pub use hard::HardConstraintBuilder;
pub use soft::{SoftConstraintBuilder, SoftKind, SoftObjective, SoftPenalty, SoftTerm};
pub use variables::{ActivityVars, RoomPresence, VariableFactory, compute_valid_starts};

use crate::data::ProblemData;
use crate::engine::CpModel;
use crate::timeline::Timeline;

/// A fully built model together with the handles needed to read it back.
#[derive(Debug, Clone)]
pub struct TimetableModel {
    pub cp: CpModel,
    /// One entry per activity, in course then component order.
    pub activities: Vec<ActivityVars>,
    pub tracker: AssumptionTracker,
    pub soft: SoftObjective,
    /// Problems that make the model unsolvable as posed.
    pub defects: Vec<String>,
}

impl TimetableModel {
    pub fn build(problem: &ProblemData, timeline: &Timeline) -> TimetableModel {
        info!(
            "Setting up model with {} courses, {} activities, {} rooms and {} time slots...",
            problem.courses.len(),
            problem.activity_count(),
            problem.rooms.len(),
            timeline.horizon()
        );
        let mut cp = CpModel::new();

        let mut factory = VariableFactory::new(timeline);
        let mut activities = Vec::with_capacity(problem.activity_count());
        for (c, course) in problem.courses.iter().enumerate() {
            for (a, activity) in course.components.iter().enumerate() {
                let mut vars = factory.create_activity_variables(&mut cp, c, course, a, activity);
                for (r, room) in problem.rooms.iter().enumerate() {
                    factory.create_room_presence(&mut cp, &mut vars, r, room);
                }
                activities.push(vars);
            }
        }
        let defects = factory.empty_domains().to_vec();

        let mut tracker = AssumptionTracker::new();
        HardConstraintBuilder::new(problem, timeline, &activities).build(&mut cp, &mut tracker);
        tracker.register_with_engine(&mut cp);

        let soft = SoftConstraintBuilder::new(problem, timeline, &activities).build(&mut cp);
        if let Some(objective) = soft.objective() {
            cp.minimize(objective);
        }

        info!(
            "Model ready: {} variables, {} rows, {} assumptions",
            cp.num_vars(),
            cp.num_rows(),
            tracker.len()
        );
        TimetableModel {
            cp,
            activities,
            tracker,
            soft,
            defects,
        }
    }
}
