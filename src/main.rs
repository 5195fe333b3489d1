use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::{error, info};

use timetable_solver::export::FileExporter;
use timetable_solver::server;
use timetable_solver::{ProblemData, Result, SolveOrchestrator, SolverConfig};

#[derive(Debug, Parser)]
#[command(version, about = "University course timetabling solver")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Solve a prepared dataset and write the schedule and run log.
    Solve {
        /// Prepared dataset (JSON).
        input: PathBuf,
        /// Solver configuration file (JSON); flags below override it.
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, default_value = "output")]
        output: PathBuf,
        #[arg(long)]
        max_solve_seconds: Option<f64>,
        #[arg(long)]
        relative_gap_limit: Option<f64>,
        #[arg(long)]
        workers: Option<u32>,
        /// Silence the engine's search log.
        #[arg(long)]
        quiet: bool,
    },
    /// Serve the solver over HTTP.
    Serve {
        #[arg(long, default_value = "127.0.0.1:8080")]
        bind: String,
        /// HiGHS threads used by every request.
        #[arg(long, default_value_t = 8)]
        workers: u32,
    },
}

fn load_config(
    path: Option<PathBuf>,
    max_solve_seconds: Option<f64>,
    relative_gap_limit: Option<f64>,
    workers: Option<u32>,
    quiet: bool,
) -> Result<SolverConfig> {
    let mut config = match path {
        Some(path) => SolverConfig::from_file(path)?,
        None => SolverConfig::default(),
    };
    if let Some(seconds) = max_solve_seconds {
        config = config.with_max_solve_seconds(seconds);
    }
    if let Some(gap) = relative_gap_limit {
        config = config.with_relative_gap_limit(gap);
    }
    if let Some(workers) = workers {
        config = config.with_worker_count(workers);
    }
    if quiet {
        config = config.with_log_progress(false);
    }
    config.validate()?;
    Ok(config)
}

async fn run(args: Args) -> Result<()> {
    match args.command {
        Command::Solve {
            input,
            config,
            output,
            max_solve_seconds,
            relative_gap_limit,
            workers,
            quiet,
        } => {
            let config = load_config(config, max_solve_seconds, relative_gap_limit, workers, quiet)?;
            let raw = std::fs::read_to_string(&input)?;
            let problem: ProblemData = serde_json::from_str(&raw)?;
            info!("Loaded {} courses and {} rooms from {}", problem.courses.len(), problem.rooms.len(), input.display());

            let mut files = FileExporter::new(output);
            let report = tokio::task::spawn_blocking(move || {
                let mut orchestrator = SolveOrchestrator::new(config)?;
                orchestrator.solve_and_export(&problem, &mut files)
            })
            .await
            .map_err(std::io::Error::other)??;
            println!("{}", report.record.status);
            Ok(())
        }
        Command::Serve { bind, workers } => server::run_server(&bind, workers).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Args::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
