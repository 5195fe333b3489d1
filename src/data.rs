use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{Result, TimetableError};

// Type aliases for clarity
pub type RoomId = String;
pub type CourseId = String;
pub type ActivityId = String;
pub type TeacherName = String;
pub type SlotIndex = usize;

/// A physical room with a given seating capacity.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Room {
    pub id: RoomId,
    #[serde(default, deserialize_with = "lenient_count")]
    pub capacity: u32,
}

/// A schedulable component of a course (lecture, lab, ...).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Activity {
    pub id: ActivityId,
    #[serde(rename = "type", default)]
    pub activity_type: String,
    #[serde(default = "one_slot", alias = "duration")]
    pub duration_slots: u32,
}

fn one_slot() -> u32 {
    1
}

/// A course section together with the activities it needs placed.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Course {
    pub id: CourseId,
    #[serde(default, deserialize_with = "lenient_text")]
    pub subject_code: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub section: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub year: String,
    /// Ordered as supplied; may repeat a name.
    #[serde(default)]
    pub teacher_list: Vec<TeacherName>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub enrollment: u32,
    #[serde(default, alias = "activities")]
    pub components: Vec<Activity>,
}

impl Course {
    /// Teacher names with repeats removed, first occurrence kept.
    pub fn distinct_teachers(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.teacher_list
            .iter()
            .filter(|t| seen.insert(t.as_str()))
            .map(String::as_str)
            .collect()
    }
}

/// One atomic slot of the weekly timeline.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TimeSlot {
    #[serde(default)]
    pub index: SlotIndex,
    pub day: String,
    #[serde(alias = "start_min")]
    pub start_minute: u32,
    #[serde(alias = "end_min")]
    pub end_minute: u32,
    #[serde(default)]
    pub label: String,
}

/// Describes how the weekly timeline is cut into slots.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeConfig {
    #[serde(alias = "slot_minutes")]
    pub slot_duration_minutes: u32,
    pub day_start: String,
    pub day_end: String,
    pub lunch_start: String,
    pub lunch_end: String,
    pub days: Vec<String>,
}

impl Default for TimeConfig {
    fn default() -> Self {
        TimeConfig {
            slot_duration_minutes: 30,
            day_start: "08:30".into(),
            day_end: "17:00".into(),
            lunch_start: "12:00".into(),
            lunch_end: "13:00".into(),
            days: ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// The normalized dataset produced by the data-preparation step.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ProblemData {
    pub courses: Vec<Course>,
    pub rooms: Vec<Room>,
    pub teachers: Vec<TeacherName>,
    pub time_slots: Vec<TimeSlot>,
    pub time_config: TimeConfig,
    /// Slot indices at which a teacher cannot teach.
    pub teacher_unavailability: BTreeMap<TeacherName, Vec<SlotIndex>>,
}

impl ProblemData {
    /// Rejects datasets the model cannot be built from.
    pub fn check(&self) -> Result<()> {
        if self.courses.is_empty() && self.rooms.is_empty() {
            return Err(TimetableError::Data("no courses and no rooms loaded".into()));
        }

        let mut room_ids = HashSet::new();
        for room in &self.rooms {
            if !room_ids.insert(room.id.as_str()) {
                return Err(TimetableError::Data(format!("duplicate room id '{}'", room.id)));
            }
        }

        let mut activity_ids = HashSet::new();
        for course in &self.courses {
            for activity in &course.components {
                if activity.duration_slots == 0 {
                    return Err(TimetableError::Data(format!(
                        "activity '{}' of course '{}' has zero duration",
                        activity.id, course.id
                    )));
                }
                if !activity_ids.insert((course.id.as_str(), activity.id.as_str())) {
                    return Err(TimetableError::Data(format!(
                        "duplicate activity '{}' in course '{}'",
                        activity.id, course.id
                    )));
                }
            }
        }
        Ok(())
    }

    /// Every teacher known to the run: the declared list plus anyone named on
    /// a course, sorted and without repeats.
    pub fn teacher_registry(&self) -> Vec<TeacherName> {
        self.teachers
            .iter()
            .chain(self.courses.iter().flat_map(|c| c.teacher_list.iter()))
            .filter(|t| !t.trim().is_empty())
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn activity_count(&self) -> usize {
        self.courses.iter().map(|c| c.components.len()).sum()
    }
}

/// One scheduled activity, as handed to the export step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityResult {
    pub course_id: CourseId,
    pub activity_id: ActivityId,
    pub activity_type: String,
    /// Room id, or `"Unassigned"`.
    pub assigned_room_id: String,
    pub start_slot: SlotIndex,
    pub end_slot: SlotIndex,
    pub time_label: String,
    pub teacher_list: Vec<TeacherName>,
}

pub const UNASSIGNED_ROOM: &str = "Unassigned";

/// Extracts the first run of ASCII digits; 0 when there is none.
///
/// Spreadsheet exports put things like `"360I"` or `" 45 "` into numeric
/// columns, which must still load.
pub fn leading_count(raw: &str) -> u32 {
    let digits: String = raw
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().unwrap_or(0)
}

fn lenient_count<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u32, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n
            .as_u64()
            .map(|v| v.min(u32::MAX as u64) as u32)
            .or_else(|| n.as_f64().filter(|f| *f > 0.0).map(|f| f as u32))
            .unwrap_or(0),
        Value::String(s) => leading_count(&s),
        _ => 0,
    })
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => s.trim().to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Parses `"HH:MM"` into minutes since midnight.
pub fn parse_clock(raw: &str) -> Result<u32> {
    let bad = || TimetableError::Data(format!("invalid clock time '{raw}', expected HH:MM"));
    let (h, m) = raw.trim().split_once(':').ok_or_else(bad)?;
    let h: u32 = h.parse().map_err(|_| bad())?;
    let m: u32 = m.parse().map_err(|_| bad())?;
    if h > 24 || m > 59 {
        return Err(bad());
    }
    Ok(h * 60 + m)
}

pub fn format_clock(minutes: u32) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}
