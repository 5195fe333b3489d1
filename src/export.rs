//! Destinations for schedules and run records.

use std::fs;
use std::path::{Path, PathBuf};

use log::info;

use crate::data::ActivityResult;
use crate::error::Result;
use crate::solver::RunRecord;

pub trait ScheduleExporter {
    fn export(&mut self, schedule: &[ActivityResult]) -> Result<()>;
}

pub trait RunLogger {
    fn write_run(&mut self, record: &RunRecord) -> Result<()>;
}

const RESULT_PREFIX: &str = "schedule_result_v";

/// Highest `N` among `schedule_result_v<N>.<extension>` files in `dir`.
fn latest_version(dir: &Path, extension: &str) -> Result<u32> {
    if !dir.exists() {
        return Ok(0);
    }
    let suffix = format!(".{extension}");
    let mut latest = 0;
    for entry in fs::read_dir(dir)? {
        let name = entry?.file_name();
        let Some(name) = name.to_str() else { continue };
        let version = name
            .strip_prefix(RESULT_PREFIX)
            .and_then(|rest| rest.strip_suffix(&suffix))
            .and_then(|n| n.parse::<u32>().ok());
        if let Some(version) = version {
            latest = latest.max(version);
        }
    }
    Ok(latest)
}

/// Writes versioned files under an output directory.
///
/// Schedules go to `<dir>/schedule_result_v<N>.json`, run logs to
/// `<dir>/logs/schedule_result_v<N>.md`. `N` is one past the highest version
/// of either kind, so no file is ever overwritten. A run log written after an
/// export reuses the export's version.
pub struct FileExporter {
    output_dir: PathBuf,
    last_version: Option<u32>,
}

impl FileExporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        FileExporter {
            output_dir: output_dir.into(),
            last_version: None,
        }
    }

    fn log_dir(&self) -> PathBuf {
        self.output_dir.join("logs")
    }

    pub fn schedule_path(&self, version: u32) -> PathBuf {
        self.output_dir.join(format!("{RESULT_PREFIX}{version}.json"))
    }

    pub fn log_path(&self, version: u32) -> PathBuf {
        self.log_dir().join(format!("{RESULT_PREFIX}{version}.md"))
    }

    fn next_version(&self) -> Result<u32> {
        let schedules = latest_version(&self.output_dir, "json")?;
        let logs = latest_version(&self.log_dir(), "md")?;
        Ok(schedules.max(logs) + 1)
    }
}

impl ScheduleExporter for FileExporter {
    fn export(&mut self, schedule: &[ActivityResult]) -> Result<()> {
        if schedule.is_empty() {
            info!("No results generated.");
            return Ok(());
        }
        fs::create_dir_all(&self.output_dir)?;
        let version = self.next_version()?;
        let path = self.schedule_path(version);
        fs::write(&path, serde_json::to_string_pretty(schedule)?)?;
        info!("Saved result to: {}", path.display());
        self.last_version = Some(version);
        Ok(())
    }
}

impl RunLogger for FileExporter {
    fn write_run(&mut self, record: &RunRecord) -> Result<()> {
        let dir = self.log_dir();
        fs::create_dir_all(&dir)?;
        let version = match self.last_version.take() {
            Some(version) => version,
            None => self.next_version()?,
        };
        let path = self.log_path(version);
        fs::write(&path, render_run_log(record)?)?;
        info!("Saved run log to: {}", path.display());
        Ok(())
    }
}

/// Markdown rendering of a run record.
pub fn render_run_log(record: &RunRecord) -> Result<String> {
    let counter = |c: Option<u64>| c.map_or_else(|| "NA".to_string(), |v| v.to_string());
    let config = &record.config;
    let mut lines = vec![
        "# Solver Run Log".to_string(),
        String::new(),
        format!("- Elapsed (s): {:.6}", record.wall_time_secs),
        String::new(),
        "## Solver Parameters".to_string(),
        format!("- max_solve_seconds: {}", config.max_solve_seconds),
        format!("- relative_gap_limit: {}", config.relative_gap_limit),
        format!("- worker_count: {}", config.worker_count),
        format!("- log_progress: {}", config.log_progress),
        format!("- random_seed: {}", config.random_seed),
        String::new(),
        "## Status".to_string(),
        format!("- status: {}", record.status),
        format!(
            "- objective: {}",
            record.objective.map_or_else(|| "NA".to_string(), |v| v.to_string())
        ),
        format!("- conflicts: {}", counter(record.conflicts)),
        format!("- branches: {}", counter(record.branches)),
        format!("- engine calls: {}", record.engine_calls),
    ];
    if let Some(detail) = &record.detail {
        lines.push(format!("- detail: {detail}"));
    }

    if !record.soft_penalties.is_empty() {
        lines.push(String::new());
        lines.push("## Soft Penalties".to_string());
        for penalty in &record.soft_penalties {
            lines.push(format!(
                "- {}: {} x {} = {}",
                penalty.term,
                penalty.weight,
                penalty.value,
                penalty.weight * penalty.value
            ));
        }
    }

    if let Some(infeasibility) = &record.infeasibility {
        lines.push(String::new());
        lines.push("## Unsat Core".to_string());
        if let Some(note) = &infeasibility.note {
            lines.push(note.clone());
        }
        for entry in &infeasibility.core {
            lines.push(format!("- {}: {}", entry.kind, entry.context));
        }
        if infeasibility.truncated {
            lines.push("(probe budget exhausted; core may not be minimal)".to_string());
        }
    }

    if !record.warnings.is_empty() {
        lines.push(String::new());
        lines.push("## Schedule Check".to_string());
        lines.extend(record.warnings.iter().map(|w| format!("- {w}")));
    }

    lines.push(String::new());
    lines.push("## Record".to_string());
    lines.push("```json".to_string());
    lines.push(serde_json::to_string_pretty(record)?);
    lines.push("```".to_string());
    Ok(lines.join("\n"))
}

/// Keeps everything in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub schedules: Vec<Vec<ActivityResult>>,
    pub records: Vec<RunRecord>,
}

impl ScheduleExporter for MemorySink {
    fn export(&mut self, schedule: &[ActivityResult]) -> Result<()> {
        self.schedules.push(schedule.to_vec());
        Ok(())
    }
}

impl RunLogger for MemorySink {
    fn write_run(&mut self, record: &RunRecord) -> Result<()> {
        self.records.push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SolverConfig;
    use crate::solver::{CoreEntry, Infeasibility, SolveStatus};
    use crate::model::ConstraintKind;

    fn record(status: SolveStatus) -> RunRecord {
        RunRecord {
            status,
            detail: None,
            objective: None,
            conflicts: None,
            branches: None,
            engine_calls: 1,
            wall_time_secs: 0.25,
            config: SolverConfig::default(),
            soft_penalties: Vec::new(),
            infeasibility: None,
            warnings: Vec::new(),
        }
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("timetable_export_{name}_{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    fn row() -> ActivityResult {
        ActivityResult {
            course_id: "c".into(),
            activity_id: "l".into(),
            activity_type: "L".into(),
            assigned_room_id: "r".into(),
            start_slot: 0,
            end_slot: 1,
            time_label: "Monday 08:30-09:00".into(),
            teacher_list: vec!["T".into()],
        }
    }

    #[test]
    fn versions_increase_and_log_follows_export() {
        let dir = scratch_dir("versions");
        let mut exporter = FileExporter::new(&dir);
        exporter.export(&[row()]).unwrap();
        exporter.export(&[row()]).unwrap();
        exporter.write_run(&record(SolveStatus::Optimal)).unwrap();

        assert!(exporter.schedule_path(1).exists());
        assert!(exporter.schedule_path(2).exists());
        assert!(exporter.log_path(2).exists());
        assert!(!exporter.log_path(1).exists());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn log_without_export_takes_next_log_version() {
        let dir = scratch_dir("log_only");
        let mut exporter = FileExporter::new(&dir);
        exporter.write_run(&record(SolveStatus::Unknown)).unwrap();
        exporter.write_run(&record(SolveStatus::Unknown)).unwrap();
        assert!(exporter.log_path(2).exists());
        assert!(!exporter.schedule_path(1).exists());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn log_only_run_is_never_overwritten() {
        let dir = scratch_dir("interleaved");
        let mut exporter = FileExporter::new(&dir);
        exporter.export(&[row()]).unwrap();
        exporter.write_run(&record(SolveStatus::Optimal)).unwrap();
        exporter.write_run(&record(SolveStatus::Infeasible)).unwrap();
        exporter.export(&[row()]).unwrap();
        exporter.write_run(&record(SolveStatus::Feasible)).unwrap();

        assert!(exporter.schedule_path(1).exists());
        assert!(!exporter.schedule_path(2).exists());
        assert!(exporter.schedule_path(3).exists());
        let infeasible_log = fs::read_to_string(exporter.log_path(2)).unwrap();
        assert!(infeasible_log.contains("- status: INFEASIBLE"));
        let feasible_log = fs::read_to_string(exporter.log_path(3)).unwrap();
        assert!(feasible_log.contains("- status: FEASIBLE"));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn run_log_lists_core() {
        let mut infeasible = record(SolveStatus::Infeasible);
        infeasible.infeasibility = Some(Infeasibility {
            core: vec![CoreEntry {
                kind: ConstraintKind::TeacherNoOverlap,
                context: "teacher T".into(),
            }],
            note: None,
            truncated: false,
        });
        let text = render_run_log(&infeasible).unwrap();
        assert!(text.contains("- status: INFEASIBLE"));
        assert!(text.contains("- objective: NA"));
        assert!(text.contains("- TeacherNoOverlap: teacher T"));
    }
}
