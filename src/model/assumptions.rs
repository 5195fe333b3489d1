use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::data::{ActivityId, CourseId, RoomId, TeacherName};
use crate::engine::{BoolVar, CpModel};

/// Hard constraint families that can be switched off by an assumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConstraintKind {
    RoomNoOverlap,
    TeacherNoOverlap,
    CourseSelfCollision,
    DayBound,
    CourseCompletion,
    TeacherAvailability,
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Identifies one assumption: the constraint family plus the entity it covers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssumptionKey {
    RoomNoOverlap { room_id: RoomId },
    TeacherNoOverlap { teacher: TeacherName },
    CourseSelfCollision { course_id: CourseId },
    DayBound,
    CourseCompletion { course_id: CourseId, activity_id: ActivityId },
    TeacherAvailability { teacher: TeacherName },
}

impl AssumptionKey {
    pub fn kind(&self) -> ConstraintKind {
        match self {
            AssumptionKey::RoomNoOverlap { .. } => ConstraintKind::RoomNoOverlap,
            AssumptionKey::TeacherNoOverlap { .. } => ConstraintKind::TeacherNoOverlap,
            AssumptionKey::CourseSelfCollision { .. } => ConstraintKind::CourseSelfCollision,
            AssumptionKey::DayBound => ConstraintKind::DayBound,
            AssumptionKey::CourseCompletion { .. } => ConstraintKind::CourseCompletion,
            AssumptionKey::TeacherAvailability { .. } => ConstraintKind::TeacherAvailability,
        }
    }

    /// Human-readable description of the covered entity.
    pub fn context(&self) -> String {
        match self {
            AssumptionKey::RoomNoOverlap { room_id } => format!("room {room_id}"),
            AssumptionKey::TeacherNoOverlap { teacher }
            | AssumptionKey::TeacherAvailability { teacher } => format!("teacher {teacher}"),
            AssumptionKey::CourseSelfCollision { course_id } => format!("course {course_id}"),
            AssumptionKey::DayBound => "all activities".to_string(),
            AssumptionKey::CourseCompletion {
                course_id,
                activity_id,
            } => format!("activity {activity_id} of course {course_id}"),
        }
    }
}

impl fmt::Display for AssumptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind(), self.context())
    }
}

#[derive(Debug, Clone)]
pub struct AssumptionEntry {
    pub literal: BoolVar,
    pub key: AssumptionKey,
}

/// Maps each assumption key to the single literal guarding it.
#[derive(Debug, Clone, Default)]
pub struct AssumptionTracker {
    by_key: HashMap<AssumptionKey, BoolVar>,
    entries: Vec<AssumptionEntry>,
}

impl AssumptionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the literal for `key`, creating it on first request.
    pub fn register(&mut self, model: &mut CpModel, key: AssumptionKey) -> BoolVar {
        if let Some(&literal) = self.by_key.get(&key) {
            return literal;
        }
        let literal = model.new_bool_var(format!("assume[{key}]"));
        self.by_key.insert(key.clone(), literal);
        self.entries.push(AssumptionEntry { literal, key });
        literal
    }

    pub fn lookup(&self, literal: BoolVar) -> Option<&AssumptionKey> {
        self.entries
            .iter()
            .find(|entry| entry.literal == literal)
            .map(|entry| &entry.key)
    }

    /// Hands every literal to the engine as an assumption, in registration order.
    pub fn register_with_engine(&self, model: &mut CpModel) {
        model.add_assumptions(self.entries.iter().map(|entry| entry.literal));
    }

    pub fn entries(&self) -> &[AssumptionEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
