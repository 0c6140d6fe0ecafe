use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::stream::{self, StreamExt};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::latency::StageLatency;

/// The availability check never waits longer than this.
const CHECK_TIMEOUT: Duration = Duration::from_secs(30);

/// Characters of stderr kept in a failure reason.
const STDERR_TAIL: usize = 400;

/// How to run the external replay parser: `program args... <absolute replay path>`.
#[derive(Debug, Clone)]
pub struct ParserCommand {
    program: String,
    args: Vec<String>,
    workdir: Option<PathBuf>,
    check_args: Vec<String>,
    timeout: Duration,
}

impl ParserCommand {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            workdir: None,
            check_args: vec!["--version".to_string()],
            timeout: Duration::from_secs(300),
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self {
            program: cfg.parser_program.clone(),
            args: cfg.parser_args.clone(),
            workdir: cfg.parser_workdir.clone(),
            check_args: cfg.parser_check_args.clone(),
            timeout: cfg.parser_timeout,
        }
    }

    pub fn with_check_args(mut self, args: Vec<String>) -> Self {
        self.check_args = args;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        if let Some(dir) = &self.workdir {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    /// Run the configured check once. Any failure here means no replay can be
    /// parsed, so the batch must not start.
    pub async fn check_available(&self) -> Result<()> {
        info!("[PARSER] checking `{} {}`", self.program, self.check_args.join(" "));
        let mut cmd = self.command();
        cmd.args(&self.check_args);

        let child = cmd
            .spawn()
            .map_err(|e| AppError::Environment(format!("cannot start `{}`: {e}", self.program)))?;
        let output = tokio::time::timeout(CHECK_TIMEOUT, child.wait_with_output())
            .await
            .map_err(|_| AppError::Environment(format!("`{}` did not answer the availability check", self.program)))?
            .map_err(|e| AppError::Environment(format!("`{}` failed: {e}", self.program)))?;

        if !output.status.success() {
            return Err(AppError::Environment(format!(
                "`{}` exited with {}: {}",
                self.program,
                output.status,
                stderr_tail(&output.stderr)
            )));
        }
        info!("[PARSER] check passed");
        Ok(())
    }

    /// Parse one replay and return everything the tool printed on stdout.
    ///
    /// Spawn failure, a non-zero exit, empty or non-UTF-8 output and running
    /// past the timeout are all reported as malformed output for the match.
    pub async fn invoke(&self, match_id: &str, replay: &Path) -> Result<String> {
        let replay = tokio::fs::canonicalize(replay)
            .await
            .map_err(|_| AppError::NotFound(match_id.to_string()))?;
        debug!(match_id = %match_id, path = %replay.display(), "[PARSER] invoking");

        let mut cmd = self.command();
        cmd.args(&self.args).arg(&replay);

        let child = cmd
            .spawn()
            .map_err(|e| AppError::malformed(match_id, format!("cannot start `{}`: {e}", self.program)))?;
        // Dropping the child on timeout kills it.
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                AppError::malformed(match_id, format!("parser timed out after {:?}", self.timeout))
            })?
            .map_err(|e| AppError::malformed(match_id, e))?;

        if !output.status.success() {
            return Err(AppError::malformed(
                match_id,
                format!("parser exited with {}: {}", output.status, stderr_tail(&output.stderr)),
            ));
        }

        let text = String::from_utf8(output.stdout)
            .map_err(|_| AppError::malformed(match_id, "parser output is not UTF-8"))?;
        if text.trim().is_empty() {
            return Err(AppError::malformed(match_id, "parser produced no output"));
        }
        Ok(text)
    }

    /// Parse many replays with at most `workers` running at once. Results come
    /// back in input order.
    pub async fn invoke_many(
        &self,
        replays: Vec<(String, PathBuf)>,
        workers: usize,
        latency: &StageLatency,
    ) -> Vec<(String, Result<String>)> {
        let total = replays.len();
        let this = Arc::new(self.clone());

        stream::iter(replays.into_iter().enumerate())
            .map(|(n, (match_id, path))| {
                let this = Arc::clone(&this);
                async move {
                    info!(match_id = %match_id, "[PARSER] {}/{} parsing {}", n + 1, total, path.display());
                    let started = Instant::now();
                    let result = this.invoke(&match_id, &path).await;
                    latency.record(started.elapsed());
                    if let Err(e) = &result {
                        warn!(match_id = %match_id, "[PARSER] {e}");
                    }
                    (match_id, result)
                }
            })
            .buffered(workers.max(1))
            .collect()
            .await
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    let start = text
        .char_indices()
        .rev()
        .nth(STDERR_TAIL)
        .map(|(i, _)| i)
        .unwrap_or(0);
    text[start..].to_string()
}
