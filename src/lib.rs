//! University course timetabling on a time-indexed integer model solved by HiGHS.

pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod export;
pub mod model;
pub mod server;
pub mod solver;
pub mod timeline;
pub mod validation;

pub use config::SolverConfig;
pub use data::ProblemData;
pub use error::{Result, TimetableError};
pub use solver::{SolveOrchestrator, SolveReport, SolveStatus};
