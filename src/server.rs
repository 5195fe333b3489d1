use axum::http::StatusCode;
use axum::{Json, Router, routing::post};
use log::{error, info};
use serde::Deserialize;

use crate::config::SolverConfig;
use crate::data::ProblemData;
use crate::engine;
use crate::error::{Result, TimetableError};
use crate::solver::{SolveOrchestrator, SolveReport};

#[derive(Debug, Deserialize)]
pub struct SolveRequest {
    pub problem: ProblemData,
    #[serde(default)]
    pub config: Option<SolverConfig>,
}

async fn solve_handler(
    Json(request): Json<SolveRequest>,
) -> std::result::Result<Json<SolveReport>, (StatusCode, String)> {
    let config = request.config.unwrap_or_default();
    // the engine call blocks for up to the configured budget
    let outcome = tokio::task::spawn_blocking(move || {
        let mut orchestrator = SolveOrchestrator::new(config)?;
        orchestrator.solve(&request.problem)
    })
    .await;

    match outcome {
        Ok(Ok(report)) => Ok(Json(report)),
        Ok(Err(e @ (TimetableError::Data(_) | TimetableError::Config(_)))) => {
            Err((StatusCode::BAD_REQUEST, e.to_string()))
        }
        Ok(Err(e)) => Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
        Err(e) => {
            error!("Solve task failed: {e}");
            Err((StatusCode::INTERNAL_SERVER_ERROR, "solve task failed".to_string()))
        }
    }
}

pub fn router() -> Router {
    Router::new().route("/v1/timetable/solve", post(solve_handler))
}

/// Serves on `addr`. Every solve runs HiGHS with `worker_count` threads;
/// the `worker_count` a request sends is ignored.
pub async fn run_server(addr: &str, worker_count: u32) -> Result<()> {
    if worker_count == 0 {
        return Err(TimetableError::Config("worker_count must be positive".into()));
    }
    let threads = engine::pinned_threads(worker_count);
    info!("Solving with {threads} HiGHS threads");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server running at http://{}", listener.local_addr()?);
    axum::serve(listener, router()).await?;
    Ok(())
}
