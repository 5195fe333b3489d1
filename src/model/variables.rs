use std::collections::HashMap;

use log::{trace, warn};

use crate::data::{Activity, Course, Room, TimeSlot};
use crate::engine::{BoolVar, CpModel, IntVar, IntervalVar};
use crate::timeline::Timeline;

/// Presence of an activity in one room.
#[derive(Debug, Clone, Copy)]
pub struct RoomPresence {
    pub room: usize,
    pub presence: BoolVar,
    /// Shares the activity's start and end; performed iff `presence`.
    pub interval: IntervalVar,
}

/// Decision variables of one activity.
#[derive(Debug, Clone)]
pub struct ActivityVars {
    /// `<course id>_<activity id>`, used to name derived variables.
    pub name: String,
    pub course: usize,
    pub activity: usize,
    pub duration: usize,
    pub start: IntVar,
    pub end: IntVar,
    pub interval: IntervalVar,
    pub rooms: Vec<RoomPresence>,
}

/// Start indices `i` such that `slots[i..i + duration]` lie in one day and
/// each slot starts where the previous one ends.
pub fn compute_valid_starts(duration: usize, slots: &[TimeSlot]) -> Vec<usize> {
    if duration == 0 || duration > slots.len() {
        return Vec::new();
    }
    (0..=slots.len() - duration)
        .filter(|&i| {
            slots[i..i + duration]
                .windows(2)
                .all(|pair| pair[0].day == pair[1].day && pair[0].end_minute == pair[1].start_minute)
        })
        .collect()
}

/// Creates activity and room-presence variables.
///
/// Valid start domains are memoized per distinct duration.
pub struct VariableFactory<'a> {
    timeline: &'a Timeline,
    starts_by_duration: HashMap<usize, Vec<i64>>,
    empty_domains: Vec<String>,
}

impl<'a> VariableFactory<'a> {
    pub fn new(timeline: &'a Timeline) -> Self {
        VariableFactory {
            timeline,
            starts_by_duration: HashMap::new(),
            empty_domains: Vec::new(),
        }
    }

    /// Start domain for an activity of `duration` slots.
    ///
    /// Falls back to `[0, horizon - duration]` when no window fits the
    /// timeline's day structure.
    pub fn start_domain(&mut self, duration: usize) -> &[i64] {
        let timeline = self.timeline;
        self.starts_by_duration.entry(duration).or_insert_with(|| {
            let valid = compute_valid_starts(duration, timeline.slots());
            if valid.is_empty() {
                if timeline.has_slots() {
                    warn!(
                        "No contiguous same-day window of {duration} slots; \
                         allowing any start up to the horizon"
                    );
                }
                let last = timeline.horizon() as i64 - duration as i64;
                (0..=last).collect()
            } else {
                valid.into_iter().map(|s| s as i64).collect()
            }
        })
    }

    pub fn create_activity_variables(
        &mut self,
        model: &mut CpModel,
        course_index: usize,
        course: &Course,
        activity_index: usize,
        activity: &Activity,
    ) -> ActivityVars {
        let duration = activity.duration_slots as usize;
        let horizon = self.timeline.horizon() as i64;
        let domain = self.start_domain(duration).to_vec();
        if domain.is_empty() {
            self.empty_domains.push(format!(
                "activity '{}' of course '{}' ({} slots) does not fit the horizon of {}",
                activity.id, course.id, duration, horizon
            ));
        }
        trace!(
            "Activity {}/{}: {} candidate starts",
            course.id,
            activity.id,
            domain.len()
        );

        let name = format!("{}_{}", course.id, activity.id);
        let interval = model.new_interval(&domain, duration as i64, horizon, &name);
        ActivityVars {
            name,
            course: course_index,
            activity: activity_index,
            duration,
            start: model.interval_start(interval),
            end: model.interval_end(interval),
            interval,
            rooms: Vec::new(),
        }
    }

    /// Adds the presence literal and optional interval of `vars` in `room`.
    pub fn create_room_presence(
        &self,
        model: &mut CpModel,
        vars: &mut ActivityVars,
        room_index: usize,
        room: &Room,
    ) -> RoomPresence {
        let name = format!("{}_{}", vars.name, room.id);
        let presence = model.new_bool_var(format!("in_{name}"));
        let interval = model.new_optional_interval(vars.interval, presence, &name);
        let placed = RoomPresence {
            room: room_index,
            presence,
            interval,
        };
        vars.rooms.push(placed);
        placed
    }

    /// Activities that got no candidate start at all.
    pub fn empty_domains(&self) -> &[String] {
        &self.empty_domains
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(day: &str, start: u32, end: u32) -> TimeSlot {
        TimeSlot {
            index: 0,
            day: day.into(),
            start_minute: start,
            end_minute: end,
            label: String::new(),
        }
    }

    #[test]
    fn contiguous_windows_are_valid() {
        let slots = [slot("Mon", 510, 540), slot("Mon", 540, 570), slot("Mon", 570, 600)];
        assert_eq!(compute_valid_starts(2, &slots), vec![0, 1]);
        assert_eq!(compute_valid_starts(1, &slots), vec![0, 1, 2]);
        assert!(compute_valid_starts(4, &slots).is_empty());
    }

    #[test]
    fn gaps_and_day_changes_break_windows() {
        let gap = [slot("Mon", 510, 540), slot("Mon", 540, 570), slot("Mon", 600, 630)];
        assert_eq!(compute_valid_starts(2, &gap), vec![0]);

        let overnight = [slot("Mon", 990, 1020), slot("Tue", 1020, 1050)];
        assert!(compute_valid_starts(2, &overnight).is_empty());
    }

    #[test]
    fn domain_falls_back_to_horizon_range() {
        let timeline = Timeline::new(vec![slot("Mon", 0, 30), slot("Tue", 30, 60)], &[], 30);
        let mut factory = VariableFactory::new(&timeline);
        // no two-slot window stays within one day
        assert_eq!(factory.start_domain(2), [0]);
        assert_eq!(factory.start_domain(1), [0, 1]);
    }

    #[test]
    fn room_presence_shares_the_activity_start() {
        let timeline = Timeline::new(vec![slot("Mon", 0, 30), slot("Mon", 30, 60)], &[], 30);
        let course = Course {
            id: "c".into(),
            subject_code: String::new(),
            section: String::new(),
            year: String::new(),
            teacher_list: Vec::new(),
            enrollment: 0,
            components: vec![Activity {
                id: "a".into(),
                activity_type: "L".into(),
                duration_slots: 1,
            }],
        };
        let room = Room {
            id: "r".into(),
            capacity: 10,
        };
        let mut model = CpModel::new();
        let mut factory = VariableFactory::new(&timeline);
        let mut vars =
            factory.create_activity_variables(&mut model, 0, &course, 0, &course.components[0]);
        let placed = factory.create_room_presence(&mut model, &mut vars, 0, &room);
        assert_eq!(model.interval_start(placed.interval), vars.start);
        assert_eq!(model.interval_presence(placed.interval), Some(placed.presence));
        assert_eq!(vars.rooms.len(), 1);
        assert!(factory.empty_domains().is_empty());
    }
}
