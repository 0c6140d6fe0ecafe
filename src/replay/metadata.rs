use std::time::Duration;

use reqwest::StatusCode;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::{HTTP_TIMEOUT_SECS, METADATA_PACING_THRESHOLD};
use crate::error::{AppError, Result};
use crate::types::MatchFailure;

/// Match details returned by the statistics API. Only `replay_url` is
/// required; the full document is kept for callers that want more.
#[derive(Debug, Clone, Serialize)]
pub struct MatchMetadata {
    pub match_id: String,
    pub replay_url: String,
    pub raw: serde_json::Value,
}

pub struct MetadataClient {
    client: reqwest::Client,
    base_url: String,
    pacing: Duration,
}

impl MetadataClient {
    pub fn new(base_url: impl Into<String>, pacing: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            pacing,
        })
    }

    /// `GET {base}/matches/{id}`. A 404 or a document without a usable
    /// `replay_url` is `NotFound`.
    pub async fn fetch(&self, match_id: &str) -> Result<MatchMetadata> {
        let url = format!("{}/matches/{}", self.base_url, match_id);
        let resp = self.client.get(&url).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(match_id.to_string()));
        }
        let body: serde_json::Value = resp.error_for_status()?.json().await?;
        metadata_from_json(match_id, body)
    }

    /// Fetch metadata for every id in order. Ids that fail are returned as
    /// failures; the rest proceed. The API is rate limited, so large batches
    /// wait `pacing` between requests.
    pub async fn fetch_all(&self, match_ids: &[String]) -> (Vec<MatchMetadata>, Vec<MatchFailure>) {
        let paced = match_ids.len() > METADATA_PACING_THRESHOLD;
        let mut found = Vec::new();
        let mut failures = Vec::new();

        for (n, match_id) in match_ids.iter().enumerate() {
            if paced && n > 0 {
                tokio::time::sleep(self.pacing).await;
            }
            info!(match_id = %match_id, "[METADATA] fetching match {}/{}", n + 1, match_ids.len());
            match self.fetch(match_id).await {
                Ok(meta) => found.push(meta),
                Err(e) => {
                    warn!(match_id = %match_id, "[METADATA] {e}");
                    failures.push(MatchFailure::from_error(match_id, &e));
                }
            }
        }
        (found, failures)
    }
}

pub fn metadata_from_json(match_id: &str, body: serde_json::Value) -> Result<MatchMetadata> {
    let replay_url = body
        .get("replay_url")
        .and_then(|u| u.as_str())
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| AppError::NotFound(match_id.to_string()))?
        .to_string();

    Ok(MatchMetadata {
        match_id: match_id.to_string(),
        replay_url,
        raw: body,
    })
}
