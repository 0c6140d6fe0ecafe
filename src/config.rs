use std::path::PathBuf;
use std::time::Duration;

use crate::error::{AppError, Result};
use crate::types::MissingEntityPolicy;

pub const METADATA_API_URL: &str = "https://api.opendota.com/api";

/// Default resampling cadence in milliseconds.
pub const DEFAULT_GRID_INTERVAL_MS: u32 = 200;

/// Default number of tracked entities, named `Player_00`..`Player_09`.
pub const DEFAULT_ENTITY_COUNT: usize = 10;

/// A data row is recognised by this character in its entity-id field.
/// Header rows emitted before the first data row never contain it.
pub const ENTITY_ID_MARKER: char = '_';

/// Trailing lines emitted by the parser after the last data row
/// (parse timing + the empty line after the final newline).
pub const FOOTER_LINES: usize = 2;

/// Grids larger than this are rejected as a sampling failure.
/// Four hours at 1ms resolution.
pub const MAX_GRID_POINTS: u64 = 14_400_000;

/// Metadata requests are paced only for batches larger than this.
pub const METADATA_PACING_THRESHOLD: usize = 60;

/// HTTP timeout for metadata lookups and replay downloads (seconds).
pub const HTTP_TIMEOUT_SECS: u64 = 120;

/// Extension of decompressed replay files.
pub const REPLAY_EXTENSION: &str = "dem";

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    /// Directory holding `<match_id>.dem` replays (REPLAY_DIR)
    pub replay_dir: PathBuf,
    /// External parser executable (PARSER_PROGRAM)
    pub parser_program: String,
    /// Arguments placed before the replay path (PARSER_ARGS, whitespace-separated)
    pub parser_args: Vec<String>,
    /// Working directory for the parser process (PARSER_WORKDIR)
    pub parser_workdir: Option<PathBuf>,
    /// Arguments for the one-shot availability check (PARSER_CHECK_ARGS)
    pub parser_check_args: Vec<String>,
    /// Hard limit on a single parser invocation (PARSER_TIMEOUT_SECS)
    pub parser_timeout: Duration,
    /// Resampling cadence in milliseconds (GRID_INTERVAL_MS)
    pub grid_interval_ms: u32,
    /// Tracked entity ids in processing order (TRACKED_ENTITIES, comma-separated).
    /// Example: "Player_00,Player_01,Player_02"
    pub entity_ids: Vec<String>,
    /// What to do with a tracked entity that never appears in a match (MISSING_ENTITY_POLICY)
    pub missing_entity: MissingEntityPolicy,
    /// Allow downloads of missing replays without asking (AUTO_CONFIRM)
    pub auto_confirm: bool,
    /// Concurrent parser invocations / sampling tasks (WORKERS)
    pub workers: usize,
    pub metadata_api_url: String,
    /// Delay between metadata requests for large batches (METADATA_PACING_SECS)
    pub metadata_pacing: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let grid_interval_ms = std::env::var("GRID_INTERVAL_MS")
            .unwrap_or_else(|_| DEFAULT_GRID_INTERVAL_MS.to_string())
            .parse::<u32>()
            .map_err(|_| AppError::Config("GRID_INTERVAL_MS must be a positive integer".to_string()))?;
        if grid_interval_ms == 0 {
            return Err(AppError::Config("GRID_INTERVAL_MS must be greater than zero".to_string()));
        }

        let entity_ids: Vec<String> = match std::env::var("TRACKED_ENTITIES") {
            Ok(raw) => split_list(&raw, ','),
            Err(_) => default_entity_ids(DEFAULT_ENTITY_COUNT),
        };
        if entity_ids.is_empty() {
            return Err(AppError::Config("TRACKED_ENTITIES must name at least one entity".to_string()));
        }

        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            replay_dir: std::env::var("REPLAY_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".")),
            parser_program: std::env::var("PARSER_PROGRAM").unwrap_or_else(|_| "java".to_string()),
            parser_args: split_whitespace(
                &std::env::var("PARSER_ARGS")
                    .unwrap_or_else(|_| "-jar target/position.one-jar.jar".to_string()),
            ),
            parser_workdir: match std::env::var("PARSER_WORKDIR") {
                Ok(dir) if dir.trim().is_empty() => None,
                Ok(dir) => Some(PathBuf::from(dir)),
                Err(_) => Some(PathBuf::from("./clarity-examples")),
            },
            parser_check_args: split_whitespace(
                &std::env::var("PARSER_CHECK_ARGS").unwrap_or_else(|_| "--version".to_string()),
            ),
            parser_timeout: Duration::from_secs(
                std::env::var("PARSER_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "300".to_string())
                    .parse::<u64>()
                    .map_err(|_| AppError::Config("PARSER_TIMEOUT_SECS must be a whole number of seconds".to_string()))?,
            ),
            grid_interval_ms,
            entity_ids,
            missing_entity: std::env::var("MISSING_ENTITY_POLICY")
                .unwrap_or_else(|_| "empty".to_string())
                .parse::<MissingEntityPolicy>()?,
            auto_confirm: std::env::var("AUTO_CONFIRM")
                .map(|v| parse_flag(&v))
                .unwrap_or(false),
            workers: std::env::var("WORKERS")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .filter(|&n| n > 0)
                .unwrap_or_else(default_workers),
            metadata_api_url: std::env::var("METADATA_API_URL")
                .unwrap_or_else(|_| METADATA_API_URL.to_string()),
            metadata_pacing: Duration::from_secs(
                std::env::var("METADATA_PACING_SECS")
                    .unwrap_or_else(|_| "11".to_string())
                    .parse::<u64>()
                    .unwrap_or(11),
            ),
        })
    }

    /// Subset of the configuration the aggregator needs.
    pub fn sampling_options(&self) -> SamplingOptions {
        SamplingOptions {
            grid_interval_ms: self.grid_interval_ms,
            entity_ids: self.entity_ids.clone(),
            missing_entity: self.missing_entity,
            workers: self.workers,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SamplingOptions {
    pub grid_interval_ms: u32,
    pub entity_ids: Vec<String>,
    pub missing_entity: MissingEntityPolicy,
    pub workers: usize,
}

impl Default for SamplingOptions {
    fn default() -> Self {
        Self {
            grid_interval_ms: DEFAULT_GRID_INTERVAL_MS,
            entity_ids: default_entity_ids(DEFAULT_ENTITY_COUNT),
            missing_entity: MissingEntityPolicy::Empty,
            workers: default_workers(),
        }
    }
}

/// `Player_00`, `Player_01`, ... zero-padded to two digits.
pub fn default_entity_ids(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("Player_{i:02}")).collect()
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

fn split_list(raw: &str, sep: char) -> Vec<String> {
    raw.split(sep)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn split_whitespace(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(str::to_string).collect()
}

fn parse_flag(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "y")
}
