//! Batch entry point: replay files in, resampled series out.

use std::path::PathBuf;

use tracing::{info, warn};

use crate::aggregator::Aggregator;
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::latency::StageLatency;
use crate::replay::{discover_replays, replay_path, MetadataClient, ParserCommand, ReplayDownloader};
use crate::types::{BatchReport, MatchFailure};

/// Match ids as the statistics API knows them: non-empty, digits only.
pub fn validate_match_ids(match_ids: &[String]) -> Result<()> {
    for id in match_ids {
        if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AppError::Config(format!("match id `{id}` is not a number")));
        }
    }
    Ok(())
}

/// Run one batch.
///
/// With no `match_ids`, every replay in `cfg.replay_dir` is processed.
/// Requested replays that are not on disk are downloaded only when
/// `cfg.auto_confirm` is set; otherwise they are reported as not found.
///
/// The only error returned is an unusable parser; every per-match problem
/// ends up in [`BatchReport::failures`]. An unreadable replay directory is
/// logged and yields an empty batch.
pub async fn run_batch(cfg: &Config, match_ids: &[String]) -> Result<BatchReport> {
    let parser = ParserCommand::from_config(cfg);
    parser.check_available().await?;

    let mut failures: Vec<MatchFailure> = Vec::new();
    let replays = if match_ids.is_empty() {
        match discover_replays(&cfg.replay_dir).await {
            Ok(found) => found,
            Err(e) => {
                warn!("[BATCH] cannot list {}: {e}", cfg.replay_dir.display());
                Vec::new()
            }
        }
    } else {
        resolve_replays(cfg, match_ids, &mut failures).await?
    };

    if replays.is_empty() {
        warn!("[BATCH] no replays to process");
    }

    let parse_latency = StageLatency::new("parse");
    let outputs = parser
        .invoke_many(replays, cfg.workers, &parse_latency)
        .await;

    let mut parsed = Vec::with_capacity(outputs.len());
    for (match_id, result) in outputs {
        match result {
            Ok(text) => parsed.push((match_id, text)),
            Err(e) => failures.push(MatchFailure::from_error(&match_id, &e)),
        }
    }

    let aggregator = Aggregator::new(cfg.sampling_options());
    let mut report = aggregator.aggregate_outputs(parsed).await;
    failures.append(&mut report.failures);
    report.failures = failures;

    info!(
        sampled = report.results.len(),
        skipped = report.failures.len(),
        "[BATCH] done: {} matches sampled, {} skipped",
        report.results.len(),
        report.failures.len(),
    );
    for lat in [&parse_latency, aggregator.latency()] {
        if let Some(s) = lat.summary() {
            info!("[BATCH] {} latency: {s}", lat.stage());
        }
    }
    Ok(report)
}

/// Map requested ids to replay files, downloading missing ones when allowed.
/// Ids that cannot be resolved are pushed onto `failures`. Order follows
/// `match_ids`.
async fn resolve_replays(
    cfg: &Config,
    match_ids: &[String],
    failures: &mut Vec<MatchFailure>,
) -> Result<Vec<(String, PathBuf)>> {
    let mut slots: Vec<(String, Option<PathBuf>)> = Vec::with_capacity(match_ids.len());
    let mut missing: Vec<String> = Vec::new();

    for id in match_ids {
        let path = replay_path(&cfg.replay_dir, id);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            slots.push((id.clone(), Some(path)));
        } else {
            missing.push(id.clone());
            slots.push((id.clone(), None));
        }
    }

    if !missing.is_empty() {
        if cfg.auto_confirm {
            info!("[BATCH] {} replays missing, downloading to {}", missing.len(), cfg.replay_dir.display());
            let downloaded = download_missing(cfg, &missing, failures).await?;
            for (id, path) in downloaded {
                if let Some(slot) = slots.iter_mut().find(|(sid, _)| *sid == id) {
                    slot.1 = Some(path);
                }
            }
        } else {
            warn!(
                "[BATCH] {} replays missing and downloads not confirmed (set AUTO_CONFIRM=1 or pass --yes): {}",
                missing.len(),
                missing.join(", ")
            );
            for id in &missing {
                failures.push(MatchFailure::from_error(id, &AppError::NotFound(id.clone())));
            }
        }
    }

    Ok(slots
        .into_iter()
        .filter_map(|(id, path)| path.map(|p| (id, p)))
        .collect())
}

async fn download_missing(
    cfg: &Config,
    missing: &[String],
    failures: &mut Vec<MatchFailure>,
) -> Result<Vec<(String, PathBuf)>> {
    let client = MetadataClient::new(&cfg.metadata_api_url, cfg.metadata_pacing)?;
    let (found, mut meta_failures) = client.fetch_all(missing).await;
    failures.append(&mut meta_failures);

    let downloader = ReplayDownloader::new(&cfg.replay_dir)?;
    let mut downloaded = Vec::with_capacity(found.len());
    for (n, meta) in found.iter().enumerate() {
        info!(match_id = %meta.match_id, "[REPLAY] {}/{}", n + 1, found.len());
        match downloader.download(meta).await {
            Ok(path) => downloaded.push((meta.match_id.clone(), path)),
            Err(e) => {
                warn!(match_id = %meta.match_id, "[REPLAY] {e}");
                failures.push(MatchFailure::from_error(&meta.match_id, &e));
            }
        }
    }
    Ok(downloaded)
}
