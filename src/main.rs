use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use replay_resampler::config::Config;
use replay_resampler::error::Result;
use replay_resampler::{export, pipeline};

/// Resample replay telemetry onto a fixed time grid.
#[derive(Debug, Parser)]
#[command(name = "resampler", version)]
struct Args {
    /// Match ids to process. Without any, every .dem file in the replay directory is used.
    match_ids: Vec<String>,

    /// Write the batch report as JSON to this file.
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Download missing replays without asking (same as AUTO_CONFIRM=1).
    #[arg(long, short)]
    yes: bool,

    /// Overrides REPLAY_DIR.
    #[arg(long)]
    replay_dir: Option<PathBuf>,

    /// Overrides GRID_INTERVAL_MS.
    #[arg(long)]
    grid_interval_ms: Option<u32>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let mut cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };
    if args.yes {
        cfg.auto_confirm = true;
    }
    if let Some(dir) = &args.replay_dir {
        cfg.replay_dir = dir.clone();
    }
    if let Some(ms) = args.grid_interval_ms {
        if ms == 0 {
            eprintln!("Config error: --grid-interval-ms must be greater than zero");
            std::process::exit(1);
        }
        cfg.grid_interval_ms = ms;
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg, args).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config, args: Args) -> Result<()> {
    pipeline::validate_match_ids(&args.match_ids)?;
    info!(
        "Starting batch: {} requested matches, grid={}ms, entities={}, workers={}, parser timeout={:?}",
        args.match_ids.len(),
        cfg.grid_interval_ms,
        cfg.entity_ids.len(),
        cfg.workers,
        cfg.parser_timeout,
    );

    let report = pipeline::run_batch(&cfg, &args.match_ids).await?;

    for failure in &report.failures {
        warn!(
            match_id = %failure.match_id,
            kind = %failure.kind,
            "[BATCH] omitted {}: {}",
            failure.match_id,
            failure.reason,
        );
    }

    if let Some(path) = &args.output {
        export::write_json(path, &report)?;
    }
    Ok(())
}
