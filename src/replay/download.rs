use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{info, warn};

use crate::config::{HTTP_TIMEOUT_SECS, REPLAY_EXTENSION};
use crate::error::{AppError, Result};
use crate::replay::metadata::MatchMetadata;

/// `<dir>/<match_id>.dem`
pub fn replay_path(dir: &Path, match_id: &str) -> PathBuf {
    dir.join(format!("{match_id}.{REPLAY_EXTENSION}"))
}

/// Every `*.dem` file directly inside `dir`, keyed by file stem, sorted by id.
pub async fn discover_replays(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut found = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(REPLAY_EXTENSION) {
            continue;
        }
        if !entry.file_type().await?.is_file() {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            found.push((stem.to_string(), path.clone()));
        }
    }
    found.sort_by(|a, b| a.0.cmp(&b.0));
    info!("[REPLAY] {} replays found in {}", found.len(), dir.display());
    Ok(found)
}

/// File name a download is stored under before decompression.
fn archive_name(match_id: &str, url: &str) -> String {
    if url.ends_with(".bz2") {
        format!("{match_id}.{REPLAY_EXTENSION}.bz2")
    } else {
        format!("{match_id}.{REPLAY_EXTENSION}")
    }
}

/// Fetches replays into a directory and unpacks `.bz2` archives.
pub struct ReplayDownloader {
    client: reqwest::Client,
    dir: PathBuf,
}

impl ReplayDownloader {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            dir: dir.into(),
        })
    }

    /// Download the replay for `meta` and return the path of the `.dem` file.
    pub async fn download(&self, meta: &MatchMetadata) -> Result<PathBuf> {
        let id = meta.match_id.as_str();
        let target = self.dir.join(archive_name(id, &meta.replay_url));
        info!(match_id = %id, "[REPLAY] downloading {}", meta.replay_url);

        let resp = self
            .client
            .get(&meta.replay_url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AppError::acquisition(id, e))?;
        let written = write_body(resp, &target)
            .await
            .map_err(|e| AppError::acquisition(id, e))?;
        if written == 0 {
            let _ = tokio::fs::remove_file(&target).await;
            return Err(AppError::acquisition(id, "replay download was empty"));
        }
        info!(match_id = %id, bytes = written, "[REPLAY] saved {}", target.display());

        if target.extension().and_then(|e| e.to_str()) == Some("bz2") {
            decompress_bz2(id, &target).await
        } else {
            Ok(target)
        }
    }
}

/// Stream a response body to `target` chunk by chunk. Returns the byte count.
async fn write_body(resp: reqwest::Response, target: &Path) -> Result<u64> {
    let mut file = tokio::fs::File::create(target).await?;
    let mut body = resp.bytes_stream();
    let mut written = 0u64;
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}

/// Unpack `<id>.dem.bz2` in place with the system `bzip2`, leaving `<id>.dem`.
pub async fn decompress_bz2(match_id: &str, archive: &Path) -> Result<PathBuf> {
    let output = Command::new("bzip2")
        .arg("-d")
        .arg("-f")
        .arg(archive)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| AppError::acquisition(match_id, format!("cannot run bzip2: {e}")))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        warn!(match_id = %match_id, "[REPLAY] bzip2 failed: {}", stderr.trim());
        return Err(AppError::acquisition(
            match_id,
            format!("bzip2 exited with {}", output.status),
        ));
    }

    let unpacked = archive.with_extension("");
    if tokio::fs::metadata(&unpacked).await.is_err() {
        return Err(AppError::acquisition(match_id, "decompressed replay is missing"));
    }
    Ok(unpacked)
}
