use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Malformed parser output for match {match_id}: {reason}")]
    MalformedOutput { match_id: String, reason: String },

    #[error("Sampling failed for match {match_id}: {reason}")]
    SamplingFailure { match_id: String, reason: String },

    #[error("Match {0} not found")]
    NotFound(String),

    #[error("Replay acquisition failed for match {match_id}: {reason}")]
    Acquisition { match_id: String, reason: String },

    #[error("Parser environment unavailable: {0}")]
    Environment(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Worker task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    pub fn malformed(match_id: &str, reason: impl ToString) -> Self {
        AppError::MalformedOutput {
            match_id: match_id.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn sampling(match_id: &str, reason: impl ToString) -> Self {
        AppError::SamplingFailure {
            match_id: match_id.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn acquisition(match_id: &str, reason: impl ToString) -> Self {
        AppError::Acquisition {
            match_id: match_id.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Category recorded in the batch omission list.
    pub fn kind(&self) -> FailureKind {
        match self {
            AppError::MalformedOutput { .. } => FailureKind::MalformedOutput,
            AppError::SamplingFailure { .. } => FailureKind::SamplingFailure,
            AppError::NotFound(_) => FailureKind::NotFound,
            AppError::Acquisition { .. } | AppError::Http(_) => FailureKind::Acquisition,
            _ => FailureKind::Internal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    MalformedOutput,
    SamplingFailure,
    NotFound,
    Acquisition,
    Internal,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureKind::MalformedOutput => "malformed_output",
            FailureKind::SamplingFailure => "sampling_failure",
            FailureKind::NotFound => "not_found",
            FailureKind::Acquisition => "acquisition",
            FailureKind::Internal => "internal",
        };
        write!(f, "{s}")
    }
}
