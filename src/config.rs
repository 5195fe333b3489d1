//! Solver configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::engine::SolveParams;
use crate::error::{Result, TimetableError};

/// Options recognized by the solve orchestrator.
///
/// # Defaults
///
/// ```
/// use timetable_solver::config::SolverConfig;
///
/// let config = SolverConfig::default();
/// assert_eq!(config.max_solve_seconds, 600.0);
/// assert_eq!(config.worker_count, 8);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Wall-clock budget for the main solve, in seconds. Must be positive.
    pub max_solve_seconds: f64,
    /// Relative optimality gap at which the search may stop (0–1).
    pub relative_gap_limit: f64,
    /// Parallel workers handed to the engine (≥ 1).
    pub worker_count: u32,
    /// Forward the engine's search progress to the console.
    pub log_progress: bool,
    pub random_seed: i32,
    /// Upper bound on re-solves spent minimizing an infeasibility core.
    pub max_core_probes: u32,
    /// Wall-clock budget of each of those re-solves, in seconds.
    pub core_probe_seconds: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            max_solve_seconds: 600.0,
            relative_gap_limit: 0.03,
            worker_count: 8,
            log_progress: true,
            random_seed: 1234,
            max_core_probes: 200,
            core_probe_seconds: 30.0,
        }
    }
}

impl SolverConfig {
    pub fn with_max_solve_seconds(mut self, seconds: f64) -> Self {
        self.max_solve_seconds = seconds;
        self
    }

    pub fn with_relative_gap_limit(mut self, gap: f64) -> Self {
        self.relative_gap_limit = gap;
        self
    }

    pub fn with_worker_count(mut self, workers: u32) -> Self {
        self.worker_count = workers;
        self
    }

    pub fn with_log_progress(mut self, enabled: bool) -> Self {
        self.log_progress = enabled;
        self
    }

    pub fn with_max_core_probes(mut self, probes: u32) -> Self {
        self.max_core_probes = probes;
        self
    }

    /// Loads a JSON config file; missing fields keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: SolverConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.max_solve_seconds.is_finite() && self.max_solve_seconds > 0.0) {
            return Err(TimetableError::Config(format!(
                "max_solve_seconds must be > 0, got {}",
                self.max_solve_seconds
            )));
        }
        if !(0.0..=1.0).contains(&self.relative_gap_limit) {
            return Err(TimetableError::Config(format!(
                "relative_gap_limit must lie in [0, 1], got {}",
                self.relative_gap_limit
            )));
        }
        if self.worker_count < 1 {
            return Err(TimetableError::Config("worker_count must be at least 1".into()));
        }
        if !(self.core_probe_seconds.is_finite() && self.core_probe_seconds > 0.0) {
            return Err(TimetableError::Config(format!(
                "core_probe_seconds must be > 0, got {}",
                self.core_probe_seconds
            )));
        }
        Ok(())
    }

    pub fn solve_params(&self) -> SolveParams {
        SolveParams {
            time_limit_secs: self.max_solve_seconds,
            relative_gap: self.relative_gap_limit,
            threads: self.worker_count,
            random_seed: self.random_seed,
            log_to_console: self.log_progress,
        }
    }

    /// Parameters for the feasibility re-solves of core extraction.
    pub fn probe_params(&self) -> SolveParams {
        SolveParams {
            time_limit_secs: self.core_probe_seconds.min(self.max_solve_seconds),
            log_to_console: false,
            ..self.solve_params()
        }
    }
}
