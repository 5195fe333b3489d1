use serde_json::{Value, json};

use timetable_solver::data::UNASSIGNED_ROOM;
use timetable_solver::export::MemorySink;
use timetable_solver::model::{ConstraintKind, SoftKind};
use timetable_solver::timeline::Timeline;
use timetable_solver::validation::validate_schedule;
use timetable_solver::{ProblemData, SolveOrchestrator, SolveReport, SolveStatus, SolverConfig, TimetableError};

fn quiet() -> SolverConfig {
    SolverConfig::default()
        .with_max_solve_seconds(60.0)
        .with_worker_count(1)
        .with_log_progress(false)
}

fn monday_slots(count: u32) -> Value {
    (0..count)
        .map(|i| json!({"day": "Mon", "start_minute": 510 + 30 * i, "end_minute": 540 + 30 * i}))
        .collect()
}

fn course(id: &str, teacher: &str, enrollment: u32, duration: u32) -> Value {
    json!({
        "id": id,
        "subject_code": id,
        "teacher_list": [teacher],
        "enrollment": enrollment,
        "components": [{"id": format!("{id}_L"), "type": "L", "duration_slots": duration}]
    })
}

fn solve(problem: Value) -> SolveReport {
    let problem: ProblemData = serde_json::from_value(problem).unwrap();
    SolveOrchestrator::new(quiet()).unwrap().solve(&problem).unwrap()
}

#[test]
fn two_courses_share_one_room_without_overlap() {
    let problem = json!({
        "courses": [course("A", "T1", 20, 2), course("B", "T2", 20, 2)],
        "rooms": [{"id": "R", "capacity": 30}],
        "time_slots": monday_slots(4)
    });
    let report = solve(problem.clone());

    assert_eq!(report.record.status, SolveStatus::Optimal);
    assert!(report.record.objective.is_some());
    assert_eq!(report.schedule.len(), 2);
    assert!(report.schedule.iter().all(|row| row.assigned_room_id == "R"));

    let (a, b) = (&report.schedule[0], &report.schedule[1]);
    assert!(a.end_slot <= b.start_slot || b.end_slot <= a.start_slot);
    assert!(report.schedule.iter().all(|row| row.end_slot == row.start_slot + 2));

    let problem: ProblemData = serde_json::from_value(problem).unwrap();
    let timeline = Timeline::from_problem(&problem).unwrap();
    assert!(validate_schedule(&report.schedule, &timeline).is_empty());
    assert!(report.record.warnings.is_empty());
}

#[test]
fn every_activity_gets_exactly_one_room_and_stays_within_a_day() {
    let slots: Vec<Value> = ["Mon", "Tue"]
        .iter()
        .flat_map(|day| {
            (0..3).map(move |i| json!({"day": day, "start_minute": 510 + 30 * i, "end_minute": 540 + 30 * i}))
        })
        .collect();
    let problem = json!({
        "courses": [
            course("A", "T1", 10, 2),
            course("B", "T1", 10, 2),
            {"id": "C", "subject_code": "C", "teacher_list": ["T2"], "enrollment": 25,
             "components": [
                {"id": "C_L", "type": "L", "duration_slots": 1},
                {"id": "C_B", "type": "B", "duration_slots": 2}
             ]}
        ],
        "rooms": [{"id": "R1", "capacity": 30}, {"id": "R2", "capacity": 15}],
        "time_slots": slots
    });
    let report = solve(problem.clone());
    assert!(report.record.status == SolveStatus::Optimal || report.record.status == SolveStatus::Feasible);
    assert_eq!(report.schedule.len(), 4);
    assert!(report.schedule.iter().all(|row| row.assigned_room_id != UNASSIGNED_ROOM));

    let problem: ProblemData = serde_json::from_value(problem).unwrap();
    let timeline = Timeline::from_problem(&problem).unwrap();
    for row in &report.schedule {
        assert_eq!(timeline.day_of(row.start_slot), timeline.day_of(row.end_slot - 1));
    }
    assert!(validate_schedule(&report.schedule, &timeline).is_empty());
}

#[test]
fn teacher_double_booking_is_diagnosed() {
    // two slots and two-slot activities: both must start at 0
    let report = solve(json!({
        "courses": [course("A", "T", 10, 2), course("B", "T", 10, 2)],
        "rooms": [{"id": "R1", "capacity": 30}, {"id": "R2", "capacity": 30}],
        "time_slots": monday_slots(2)
    }));

    assert_eq!(report.record.status, SolveStatus::Infeasible);
    assert!(report.schedule.is_empty());
    assert!(report.record.objective.is_none());
    let infeasibility = report.record.infeasibility.unwrap();
    assert!(
        infeasibility
            .core
            .iter()
            .any(|entry| entry.kind == ConstraintKind::TeacherNoOverlap && entry.context == "teacher T")
    );
    assert!(infeasibility.note.is_none());
    assert!(report.record.engine_calls > 1);
}

#[test]
fn missing_room_blames_course_completion() {
    let report = solve(json!({
        "courses": [course("A", "T", 10, 1)],
        "rooms": [],
        "time_slots": monday_slots(2)
    }));
    assert_eq!(report.record.status, SolveStatus::Infeasible);
    let core = report.record.infeasibility.unwrap().core;
    assert_eq!(core.len(), 1);
    assert_eq!(core[0].kind, ConstraintKind::CourseCompletion);
}

#[test]
fn unavailable_teacher_is_kept_out_of_blocked_slots() {
    let report = solve(json!({
        "courses": [course("A", "T", 10, 1)],
        "rooms": [{"id": "R", "capacity": 30}],
        "time_slots": monday_slots(3),
        "teacher_unavailability": {"T": [0, 1]}
    }));
    assert_eq!(report.record.status, SolveStatus::Optimal);
    assert_eq!(report.schedule[0].start_slot, 2);
}

fn penalty(report: &SolveReport, kind: SoftKind) -> i64 {
    report
        .record
        .soft_penalties
        .iter()
        .find(|p| p.term == kind)
        .map_or(0, |p| p.value)
}

#[test]
fn enough_seats_lowers_the_penalty() {
    let scenario = |capacity: u32| {
        solve(json!({
            "courses": [course("A", "T", 30, 1)],
            "rooms": [{"id": "R", "capacity": capacity}],
            "time_slots": monday_slots(1)
        }))
    };
    let cramped = scenario(20);
    let roomy = scenario(30);
    assert_eq!(cramped.schedule[0].start_slot, roomy.schedule[0].start_slot);

    assert_eq!(penalty(&cramped, SoftKind::OverCapacity), 10);
    assert_eq!(penalty(&roomy, SoftKind::OverCapacity), 0);
    assert!(roomy.record.objective.unwrap() <= cramped.record.objective.unwrap());
}

#[test]
fn empty_dataset_is_rejected() {
    let problem = ProblemData::default();
    let err = SolveOrchestrator::new(quiet()).unwrap().solve(&problem).unwrap_err();
    assert!(matches!(err, TimetableError::Data(_)));
}

#[test]
fn sink_receives_schedule_only_when_one_exists() {
    let feasible: ProblemData = serde_json::from_value(json!({
        "courses": [course("A", "T", 10, 1)],
        "rooms": [{"id": "R", "capacity": 30}],
        "time_slots": monday_slots(1)
    }))
    .unwrap();
    let infeasible: ProblemData = serde_json::from_value(json!({
        "courses": [course("A", "T", 10, 2), course("B", "T", 10, 2)],
        "rooms": [{"id": "R", "capacity": 30}],
        "time_slots": monday_slots(2)
    }))
    .unwrap();

    let mut sink = MemorySink::default();
    SolveOrchestrator::new(quiet())
        .unwrap()
        .solve_and_export(&feasible, &mut sink)
        .unwrap();
    SolveOrchestrator::new(quiet())
        .unwrap()
        .solve_and_export(&infeasible, &mut sink)
        .unwrap();

    assert_eq!(sink.schedules.len(), 1);
    assert_eq!(sink.records.len(), 2);
    assert_eq!(sink.records[1].status, SolveStatus::Infeasible);
    assert_eq!(sink.schedules[0][0].time_label, "Mon 08:30-09:00");
}

fn week_slots(days: &[&str], per_day: u32) -> Value {
    days.iter()
        .flat_map(|day| {
            (0..per_day).map(move |i| json!({"day": day, "start_minute": 510 + 30 * i, "end_minute": 540 + 30 * i}))
        })
        .collect()
}

#[test]
fn activities_spread_over_rooms() {
    let report = solve(json!({
        "courses": [course("A", "T1", 30, 1), course("B", "T2", 30, 1)],
        "rooms": [{"id": "R1", "capacity": 30}, {"id": "R2", "capacity": 30}],
        "time_slots": monday_slots(2)
    }));
    assert_eq!(report.record.status, SolveStatus::Optimal);
    assert_ne!(report.schedule[0].assigned_room_id, report.schedule[1].assigned_room_id);
    assert_eq!(penalty(&report, SoftKind::RoomBalance), 0);
    // both fit in the first slot
    assert_eq!(penalty(&report, SoftKind::Compactness), 1);
}

#[test]
fn activities_spread_over_days() {
    let report = solve(json!({
        "courses": [course("A", "T1", 30, 1), course("B", "T2", 30, 1)],
        "rooms": [{"id": "R", "capacity": 30}],
        "time_slots": week_slots(&["Mon", "Tue"], 2)
    }));
    assert_eq!(report.record.status, SolveStatus::Optimal);

    let problem: ProblemData = serde_json::from_value(json!({
        "time_slots": week_slots(&["Mon", "Tue"], 2)
    }))
    .unwrap();
    let timeline = Timeline::from_problem(&problem).unwrap();
    assert_ne!(
        timeline.day_of(report.schedule[0].start_slot),
        timeline.day_of(report.schedule[1].start_slot)
    );
    assert_eq!(penalty(&report, SoftKind::DayBalance), 0);
    assert_eq!(penalty(&report, SoftKind::Compactness), 2);
}

#[test]
fn empty_day_adds_no_span() {
    let report = solve(json!({
        "courses": [course("A", "T", 30, 1)],
        "rooms": [{"id": "R", "capacity": 30}],
        "time_slots": week_slots(&["Mon", "Tue"], 2)
    }));
    assert_eq!(report.record.status, SolveStatus::Optimal);
    assert_eq!(penalty(&report, SoftKind::DayBalance), 1);
    // one slot on the busy day, nothing on the other
    assert_eq!(penalty(&report, SoftKind::Compactness), 1);
}

#[test]
fn same_subject_and_type_share_a_room() {
    let lecture = |id: &str, teacher: &str| {
        json!({
            "id": id,
            "subject_code": "S",
            "teacher_list": [teacher],
            "enrollment": 30,
            "components": [{"id": format!("{id}_L"), "type": "L", "duration_slots": 1}]
        })
    };
    let report = solve(json!({
        "courses": [
            lecture("S1", "T1"),
            lecture("S2", "T2"),
            course("X1", "T3", 30, 1),
            course("X2", "T4", 30, 1)
        ],
        "rooms": [{"id": "R1", "capacity": 30}, {"id": "R2", "capacity": 30}],
        "time_slots": monday_slots(2)
    }));
    assert_eq!(report.record.status, SolveStatus::Optimal);

    let room_of = |id: &str| {
        report
            .schedule
            .iter()
            .find(|row| row.course_id == id)
            .map(|row| row.assigned_room_id.clone())
            .unwrap()
    };
    assert_eq!(room_of("S1"), room_of("S2"));
    assert_eq!(penalty(&report, SoftKind::SameRoom), 0);
    assert_eq!(penalty(&report, SoftKind::RoomBalance), 0);
}
