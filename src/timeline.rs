//! The ordered slot sequence every activity is placed on.

use log::{debug, warn};

use crate::data::{ProblemData, SlotIndex, TimeConfig, TimeSlot, format_clock, parse_clock};
use crate::error::{Result, TimetableError};

/// Horizon used when the dataset yields no slots at all.
pub const FALLBACK_HORIZON: usize = 50;

#[derive(Debug, Clone)]
pub struct Timeline {
    slots: Vec<TimeSlot>,
    days: Vec<String>,
    slot_day: Vec<i64>,
    slot_minutes: u32,
}

impl Timeline {
    /// Uses the explicit slots when present, otherwise generates them from
    /// the time configuration.
    pub fn from_problem(problem: &ProblemData) -> Result<Timeline> {
        let config = &problem.time_config;
        let slots = if problem.time_slots.is_empty() {
            generate_slots(config)?
        } else {
            problem
                .time_slots
                .iter()
                .cloned()
                .enumerate()
                .map(|(index, slot)| TimeSlot { index, ..slot })
                .collect()
        };
        if slots.is_empty() {
            warn!("No time slots available, falling back to a horizon of {FALLBACK_HORIZON}");
        }
        Ok(Timeline::new(slots, &config.days, config.slot_duration_minutes))
    }

    pub fn new(slots: Vec<TimeSlot>, configured_days: &[String], slot_minutes: u32) -> Timeline {
        // configured order first, restricted to days that have slots
        let mut days: Vec<String> = configured_days
            .iter()
            .filter(|day| slots.iter().any(|slot| slot.day == **day))
            .cloned()
            .collect();
        for slot in &slots {
            if !days.contains(&slot.day) {
                days.push(slot.day.clone());
            }
        }
        let slot_day = slots
            .iter()
            .map(|slot| days.iter().position(|d| *d == slot.day).unwrap_or(0) as i64)
            .collect();
        debug!("Timeline: {} slots over {} days", slots.len(), days.len());
        Timeline {
            slots,
            days,
            slot_day,
            slot_minutes,
        }
    }

    pub fn slots(&self) -> &[TimeSlot] {
        &self.slots
    }

    pub fn days(&self) -> &[String] {
        &self.days
    }

    /// Day index of every slot, addressed by slot index.
    pub fn day_table(&self) -> &[i64] {
        &self.slot_day
    }

    pub fn day_of(&self, slot: SlotIndex) -> Option<i64> {
        self.slot_day.get(slot).copied()
    }

    pub fn has_slots(&self) -> bool {
        !self.slots.is_empty()
    }

    pub fn horizon(&self) -> usize {
        if self.slots.is_empty() {
            FALLBACK_HORIZON
        } else {
            self.slots.len()
        }
    }

    /// `"<Day> HH:MM-HH:MM"` for an activity of `duration` slots starting at `start`.
    pub fn time_label(&self, start: SlotIndex, duration: usize) -> String {
        let Some(first) = self.slots.get(start) else {
            return start.to_string();
        };
        let end_minute = match self.slots.get(start + duration.max(1) - 1) {
            Some(last) if last.day == first.day => last.end_minute,
            _ => first.start_minute + duration as u32 * self.slot_minutes,
        };
        format!(
            "{} {}-{}",
            first.day,
            format_clock(first.start_minute),
            format_clock(end_minute)
        )
    }
}

/// Cuts each configured day into slots, leaving out those entirely inside lunch.
pub fn generate_slots(config: &TimeConfig) -> Result<Vec<TimeSlot>> {
    if config.slot_duration_minutes == 0 {
        return Err(TimetableError::Data("slot_duration_minutes must be positive".into()));
    }
    let day_start = parse_clock(&config.day_start)?;
    let day_end = parse_clock(&config.day_end)?;
    let lunch_start = parse_clock(&config.lunch_start)?;
    let lunch_end = parse_clock(&config.lunch_end)?;

    let mut slots = Vec::new();
    for day in &config.days {
        let mut t = day_start;
        while t + config.slot_duration_minutes <= day_end {
            let end = t + config.slot_duration_minutes;
            if !(t >= lunch_start && end <= lunch_end) {
                slots.push(TimeSlot {
                    index: slots.len(),
                    day: day.clone(),
                    start_minute: t,
                    end_minute: end,
                    label: format!("{day} {}-{}", format_clock(t), format_clock(end)),
                });
            }
            t = end;
        }
    }
    Ok(slots)
}
