use std::collections::BTreeMap;

use itertools::Itertools;
use log::{debug, info};

use super::assumptions::{AssumptionKey, AssumptionTracker};
use super::variables::ActivityVars;
use crate::data::ProblemData;
use crate::engine::{CpModel, IntervalVar, LinExpr};
use crate::timeline::Timeline;

/// Adds every hard constraint family, each guarded by its assumption literal.
pub struct HardConstraintBuilder<'a> {
    problem: &'a ProblemData,
    timeline: &'a Timeline,
    activities: &'a [ActivityVars],
}

impl<'a> HardConstraintBuilder<'a> {
    pub fn new(problem: &'a ProblemData, timeline: &'a Timeline, activities: &'a [ActivityVars]) -> Self {
        HardConstraintBuilder {
            problem,
            timeline,
            activities,
        }
    }

    pub fn build(&self, model: &mut CpModel, tracker: &mut AssumptionTracker) {
        self.add_room_no_overlap(model, tracker);
        self.add_teacher_no_overlap(model, tracker);
        self.add_course_self_collision(model, tracker);
        self.add_day_bound(model, tracker);
        self.add_course_completion(model, tracker);
        self.add_teacher_availability(model, tracker);
        debug!("{} assumption literals after hard constraints", tracker.len());
    }

    /// Activity indices per teacher, one entry per (course, activity) pair.
    fn activities_by_teacher(&self) -> BTreeMap<&'a str, Vec<usize>> {
        let courses = &self.problem.courses;
        self.activities
            .iter()
            .enumerate()
            .flat_map(|(i, vars)| {
                courses[vars.course]
                    .distinct_teachers()
                    .into_iter()
                    .filter(|t| !t.trim().is_empty())
                    .map(move |t| (t, i))
            })
            .into_group_map()
            .into_iter()
            .collect()
    }

    fn add_room_no_overlap(&self, model: &mut CpModel, tracker: &mut AssumptionTracker) {
        info!("Adding 'no room overlap' constraints...");
        for (r, room) in self.problem.rooms.iter().enumerate() {
            let intervals: Vec<IntervalVar> = self
                .activities
                .iter()
                .flat_map(|vars| vars.rooms.iter().filter(|p| p.room == r).map(|p| p.interval))
                .collect();
            let literal = tracker.register(
                model,
                AssumptionKey::RoomNoOverlap {
                    room_id: room.id.clone(),
                },
            );
            model.add_no_overlap(&intervals).only_enforce_if(literal);
        }
    }

    fn add_teacher_no_overlap(&self, model: &mut CpModel, tracker: &mut AssumptionTracker) {
        info!("Adding 'no teacher overlap' constraints...");
        for (teacher, indices) in self.activities_by_teacher() {
            let intervals: Vec<IntervalVar> =
                indices.iter().map(|&i| self.activities[i].interval).collect();
            let literal = tracker.register(
                model,
                AssumptionKey::TeacherNoOverlap {
                    teacher: teacher.to_string(),
                },
            );
            model.add_no_overlap(&intervals).only_enforce_if(literal);
        }
    }

    fn add_course_self_collision(&self, model: &mut CpModel, tracker: &mut AssumptionTracker) {
        info!("Adding 'no course self-collision' constraints...");
        let by_course = self
            .activities
            .iter()
            .map(|vars| (vars.course, vars.interval))
            .into_group_map();
        for (course, intervals) in by_course.into_iter().sorted_by_key(|(c, _)| *c) {
            if intervals.len() < 2 {
                continue;
            }
            let literal = tracker.register(
                model,
                AssumptionKey::CourseSelfCollision {
                    course_id: self.problem.courses[course].id.clone(),
                },
            );
            model.add_no_overlap(&intervals).only_enforce_if(literal);
        }
    }

    /// First and last slot of every activity must fall on the same day.
    fn add_day_bound(&self, model: &mut CpModel, tracker: &mut AssumptionTracker) {
        let days = self.timeline.days().len() as i64;
        if !self.timeline.has_slots() || days == 0 || self.activities.is_empty() {
            return;
        }
        info!("Adding 'single day' constraints...");
        let table = self.timeline.day_table();
        let literal = tracker.register(model, AssumptionKey::DayBound);
        for vars in self.activities {
            let first_day = model.new_int_var(0, days - 1, format!("first_day_{}", vars.name));
            let last_day = model.new_int_var(0, days - 1, format!("last_day_{}", vars.name));
            model
                .add_start_table(vars.interval, 0, table, first_day)
                .only_enforce_if(literal);
            model
                .add_start_table(vars.interval, vars.duration as i64 - 1, table, last_day)
                .only_enforce_if(literal);
            model.add_eq(first_day, last_day).only_enforce_if(literal);
        }
    }

    fn add_course_completion(&self, model: &mut CpModel, tracker: &mut AssumptionTracker) {
        info!("Adding 'activity placed in exactly one room' constraints...");
        for vars in self.activities {
            let course = &self.problem.courses[vars.course];
            let literal = tracker.register(
                model,
                AssumptionKey::CourseCompletion {
                    course_id: course.id.clone(),
                    activity_id: course.components[vars.activity].id.clone(),
                },
            );
            let placed: LinExpr = vars.rooms.iter().map(|p| p.presence).sum();
            model.add_eq(placed, 1i64).only_enforce_if(literal);
        }
    }

    fn add_teacher_availability(&self, model: &mut CpModel, tracker: &mut AssumptionTracker) {
        let unavailable = &self.problem.teacher_unavailability;
        if unavailable.values().all(Vec::is_empty) {
            return;
        }
        info!("Adding 'teacher availability' constraints...");
        let by_teacher = self.activities_by_teacher();
        for (teacher, slots) in unavailable {
            let Some(indices) = by_teacher.get(teacher.as_str()) else {
                continue;
            };
            if slots.is_empty() {
                continue;
            }
            let points: Vec<i64> = slots.iter().map(|&s| s as i64).collect();
            let literal = tracker.register(
                model,
                AssumptionKey::TeacherAvailability {
                    teacher: teacher.clone(),
                },
            );
            for &i in indices {
                model
                    .add_forbidden_points(self.activities[i].interval, &points)
                    .only_enforce_if(literal);
            }
        }
    }
}
