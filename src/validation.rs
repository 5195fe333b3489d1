//! Re-checks an exported schedule against the hard rules.

use std::collections::BTreeMap;
use std::fmt;

use itertools::Itertools;
use serde::Serialize;

use crate::data::{ActivityResult, UNASSIGNED_ROOM};
use crate::timeline::Timeline;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    Unassigned { activity: String },
    RoomOverlap { room_id: String, first: String, second: String },
    TeacherOverlap { teacher: String, first: String, second: String },
    CourseOverlap { course_id: String, first: String, second: String },
    CrossesDay { activity: String },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::Unassigned { activity } => write!(f, "{activity} has no room"),
            Violation::RoomOverlap {
                room_id,
                first,
                second,
            } => write!(f, "{first} and {second} overlap in room {room_id}"),
            Violation::TeacherOverlap {
                teacher,
                first,
                second,
            } => write!(f, "{first} and {second} overlap for teacher {teacher}"),
            Violation::CourseOverlap {
                course_id,
                first,
                second,
            } => write!(f, "{first} and {second} overlap within course {course_id}"),
            Violation::CrossesDay { activity } => write!(f, "{activity} spans two days"),
        }
    }
}

fn label(row: &ActivityResult) -> String {
    format!("{}/{}", row.course_id, row.activity_id)
}

fn overlaps(a: &ActivityResult, b: &ActivityResult) -> bool {
    a.start_slot < b.end_slot && b.start_slot < a.end_slot
}

/// Every pair of rows whose `[start_slot, end_slot)` ranges intersect.
pub fn find_conflicts<'r>(rows: &[&'r ActivityResult]) -> Vec<(&'r ActivityResult, &'r ActivityResult)> {
    let sorted: Vec<&ActivityResult> = rows
        .iter()
        .copied()
        .sorted_by_key(|r| (r.start_slot, r.end_slot))
        .collect();
    sorted
        .iter()
        .tuple_combinations()
        .filter(|(a, b)| overlaps(a, b))
        .map(|(a, b)| (*a, *b))
        .collect()
}

fn pairwise<'r, K: Ord>(
    groups: BTreeMap<K, Vec<&'r ActivityResult>>,
    violation: impl Fn(&K, String, String) -> Violation,
) -> Vec<Violation> {
    groups
        .iter()
        .flat_map(|(key, rows)| {
            find_conflicts(rows)
                .into_iter()
                .map(|(a, b)| violation(key, label(a), label(b)))
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Lists every hard-rule violation found in `results`.
pub fn validate_schedule(results: &[ActivityResult], timeline: &Timeline) -> Vec<Violation> {
    let mut violations: Vec<Violation> = results
        .iter()
        .filter(|r| r.assigned_room_id == UNASSIGNED_ROOM)
        .map(|r| Violation::Unassigned { activity: label(r) })
        .collect();

    let by_room: BTreeMap<&str, Vec<&ActivityResult>> = results
        .iter()
        .filter(|r| r.assigned_room_id != UNASSIGNED_ROOM)
        .map(|r| (r.assigned_room_id.as_str(), r))
        .into_group_map()
        .into_iter()
        .collect();
    violations.extend(pairwise(by_room, |room, first, second| Violation::RoomOverlap {
        room_id: room.to_string(),
        first,
        second,
    }));

    let by_teacher: BTreeMap<&str, Vec<&ActivityResult>> = results
        .iter()
        .flat_map(|r| r.teacher_list.iter().unique().map(move |t| (t.as_str(), r)))
        .into_group_map()
        .into_iter()
        .collect();
    violations.extend(pairwise(by_teacher, |teacher, first, second| {
        Violation::TeacherOverlap {
            teacher: teacher.to_string(),
            first,
            second,
        }
    }));

    let by_course: BTreeMap<&str, Vec<&ActivityResult>> = results
        .iter()
        .map(|r| (r.course_id.as_str(), r))
        .into_group_map()
        .into_iter()
        .collect();
    violations.extend(pairwise(by_course, |course, first, second| {
        Violation::CourseOverlap {
            course_id: course.to_string(),
            first,
            second,
        }
    }));

    if timeline.has_slots() {
        violations.extend(
            results
                .iter()
                .filter(|r| {
                    let last = r.end_slot.saturating_sub(1).max(r.start_slot);
                    timeline.day_of(r.start_slot) != timeline.day_of(last)
                })
                .map(|r| Violation::CrossesDay { activity: label(r) }),
        );
    }
    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::TimeSlot;

    fn row(course: &str, activity: &str, room: &str, start: usize, end: usize, teachers: &[&str]) -> ActivityResult {
        ActivityResult {
            course_id: course.into(),
            activity_id: activity.into(),
            activity_type: "L".into(),
            assigned_room_id: room.into(),
            start_slot: start,
            end_slot: end,
            time_label: String::new(),
            teacher_list: teachers.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn timeline() -> Timeline {
        let slots = (0..4)
            .map(|i| TimeSlot {
                index: i,
                day: if i < 2 { "Mon".into() } else { "Tue".into() },
                start_minute: 30 * i as u32,
                end_minute: 30 * (i as u32 + 1),
                label: String::new(),
            })
            .collect();
        Timeline::new(slots, &[], 30)
    }

    #[test]
    fn clean_schedule_has_no_violations() {
        let results = vec![
            row("c1", "l", "r1", 0, 2, &["T"]),
            row("c2", "l", "r1", 2, 4, &["T"]),
        ];
        assert!(validate_schedule(&results, &timeline()).is_empty());
    }

    #[test]
    fn reports_each_broken_rule() {
        let results = vec![
            row("c1", "l", "r1", 0, 2, &["T", "T"]),
            row("c1", "b", "r1", 1, 3, &["T"]),
            row("c2", "l", UNASSIGNED_ROOM, 0, 1, &[]),
        ];
        let violations = validate_schedule(&results, &timeline());
        assert!(violations.contains(&Violation::Unassigned {
            activity: "c2/l".into()
        }));
        assert!(violations.iter().any(|v| matches!(v, Violation::RoomOverlap { .. })));
        assert_eq!(
            violations
                .iter()
                .filter(|v| matches!(v, Violation::TeacherOverlap { .. }))
                .count(),
            1
        );
        assert!(violations.iter().any(|v| matches!(v, Violation::CourseOverlap { .. })));
        assert!(violations.contains(&Violation::CrossesDay {
            activity: "c1/b".into()
        }));
    }

    #[test]
    fn touching_ranges_do_not_conflict() {
        let a = row("c1", "l", "r1", 0, 2, &[]);
        let b = row("c2", "l", "r1", 2, 3, &[]);
        let c = row("c3", "l", "r1", 1, 3, &[]);
        assert_eq!(find_conflicts(&[&a, &b]).len(), 0);
        assert_eq!(find_conflicts(&[&a, &b, &c]).len(), 2);
    }
}
