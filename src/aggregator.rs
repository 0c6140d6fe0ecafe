use std::sync::Arc;
use std::time::Instant;

use futures_util::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::config::SamplingOptions;
use crate::error::{AppError, Result};
use crate::latency::StageLatency;
use crate::records::{self, RecordError};
use crate::sampler::resample;
use crate::types::{BatchReport, EntityTable, MatchFailure, MatchSeries};

/// Runs the resampler over every tracked entity of every match in a batch.
///
/// Matches are sampled on blocking worker tasks, at most `options.workers` at
/// a time. Results are merged on the calling task in the order the matches
/// were supplied, so logs and failure lists are reproducible.
pub struct Aggregator {
    options: Arc<SamplingOptions>,
    latency: Arc<StageLatency>,
}

impl Aggregator {
    pub fn new(options: SamplingOptions) -> Self {
        Self {
            options: Arc::new(options),
            latency: Arc::new(StageLatency::new("sample")),
        }
    }

    pub fn latency(&self) -> &StageLatency {
        &self.latency
    }

    /// Resample already-parsed tables.
    pub async fn aggregate(&self, tables: Vec<(String, EntityTable)>) -> BatchReport {
        self.run(tables, |match_id, table, opts| resample_match(match_id, &table, opts))
            .await
    }

    /// Parse raw parser output and resample it. A match whose output does not
    /// parse is reported as malformed and skipped.
    pub async fn aggregate_outputs(&self, outputs: Vec<(String, String)>) -> BatchReport {
        self.run(outputs, |match_id, output, opts| {
            let table = parse_match(match_id, &output)?;
            resample_match(match_id, &table, opts)
        })
        .await
    }

    async fn run<T, F>(&self, inputs: Vec<(String, T)>, sample: F) -> BatchReport
    where
        T: Send + 'static,
        F: Fn(&str, T, &SamplingOptions) -> Result<MatchSeries> + Copy + Send + 'static,
    {
        let total = inputs.len();
        let workers = self.options.workers.max(1);

        let outcomes: Vec<(String, Result<MatchSeries>)> = stream::iter(inputs)
            .map(|(match_id, input)| {
                let opts = Arc::clone(&self.options);
                let latency = Arc::clone(&self.latency);
                let id = match_id.clone();
                async move {
                    let started = Instant::now();
                    let result = tokio::task::spawn_blocking(move || sample(&id, input, &opts))
                        .await
                        .map_err(AppError::from)
                        .and_then(|r| r);
                    latency.record(started.elapsed());
                    (match_id, result)
                }
            })
            .buffered(workers)
            .collect()
            .await;

        let mut report = BatchReport::default();
        for (n, (match_id, result)) in outcomes.into_iter().enumerate() {
            match result {
                Ok(series) => {
                    let points = series.values().map(|s| s.len()).max().unwrap_or(0);
                    info!(
                        match_id = %match_id,
                        entities = series.len(),
                        points,
                        "[SAMPLE] {}/{} match {match_id}: {} entities, up to {points} grid points",
                        n + 1,
                        total,
                        series.len(),
                    );
                    report.results.insert(match_id, series);
                }
                Err(e) => {
                    warn!(match_id = %match_id, kind = %e.kind(), "[SAMPLE] {}/{} skipping match: {e}", n + 1, total);
                    report.failures.push(MatchFailure::from_error(&match_id, &e));
                }
            }
        }
        report
    }
}

/// Parse one match's raw output, tagging failures with the match id.
///
/// A timestamp that is not a number cannot be placed on the timeline, so it
/// fails the match as a sampling failure; every other parse error is
/// malformed output.
pub fn parse_match(match_id: &str, output: &str) -> Result<EntityTable> {
    let table = records::parse_output(output).map_err(|e| match e {
        RecordError::InvalidNumber { column: "time", .. } => AppError::sampling(match_id, e),
        e => AppError::malformed(match_id, e),
    })?;
    debug!(
        match_id = %match_id,
        rows = table.len(),
        entities = table.entity_ids().len(),
        "[PARSE] built table"
    );
    Ok(table)
}

/// Resample every tracked entity of one match. Any entity failing fails the match.
pub fn resample_match(
    match_id: &str,
    table: &EntityTable,
    options: &SamplingOptions,
) -> Result<MatchSeries> {
    let mut out = MatchSeries::new();
    for entity_id in &options.entity_ids {
        let series = resample(table, entity_id, options.grid_interval_ms, options.missing_entity)
            .map_err(|e| AppError::sampling(match_id, e))?;
        if series.is_empty() {
            debug!(match_id = %match_id, entity = %entity_id, "[SAMPLE] entity has no grid points");
        }
        out.insert(entity_id.clone(), series);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_entity_ids;
    use crate::error::FailureKind;
    use crate::types::MissingEntityPolicy;

    fn row(player: &str, time: f64) -> String {
        format!("{player},10.0,20.0,128.0,{time},300,0.9,300,620,2.5,620,0,1,21,19,22")
    }

    /// Parser output for a match where every listed player has samples at
    /// -1.0, -0.85, -0.65 and -0.1 seconds.
    fn raw_output(players: &[String]) -> String {
        let mut lines = vec!["Player 0,hero".to_string(), "Player 1,hero".to_string()];
        for t in [-1.0, -0.85, -0.65, -0.1] {
            for p in players {
                lines.push(row(p, t));
            }
        }
        lines.push("total time taken: 0.4s".to_string());
        lines.join("\n") + "\n"
    }

    fn options(entities: Vec<String>) -> SamplingOptions {
        SamplingOptions {
            grid_interval_ms: 200,
            entity_ids: entities,
            missing_entity: MissingEntityPolicy::Empty,
            workers: 2,
        }
    }

    #[tokio::test]
    async fn empty_output_skips_only_that_match() {
        let players = default_entity_ids(10);
        let agg = Aggregator::new(options(players.clone()));
        let report = agg
            .aggregate_outputs(vec![
                ("6212505052".to_string(), raw_output(&players)),
                ("6522221361".to_string(), String::new()),
                ("6600000000".to_string(), raw_output(&players)),
            ])
            .await;

        let ids: Vec<&str> = report.results.match_ids().collect();
        assert_eq!(ids, vec!["6212505052", "6600000000"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].match_id, "6522221361");
        assert_eq!(report.failures[0].kind, FailureKind::MalformedOutput);
        assert!(!report.results.contains("6522221361"));
        assert_eq!(agg.latency().len(), 3);
    }

    #[tokio::test]
    async fn every_tracked_entity_gets_a_full_series() {
        let players = default_entity_ids(10);
        let agg = Aggregator::new(options(players.clone()));
        let report = agg
            .aggregate_outputs(vec![("1".to_string(), raw_output(&players))])
            .await;

        let m = report.results.get("1").unwrap();
        assert_eq!(m.len(), 10);
        for p in &players {
            let s = report.results.series("1", p).unwrap();
            assert_eq!(s.len(), 5, "{p}");
            assert!(s.rows.iter().all(|r| &r.player == p));
        }
    }

    #[tokio::test]
    async fn tracked_set_is_configurable() {
        let roster: Vec<String> = ["Player_00", "Player_01", "Player_02", "Player_03"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let agg = Aggregator::new(options(vec!["Player_01".to_string(), "Player_07".to_string()]));
        let report = agg
            .aggregate_outputs(vec![("42".to_string(), raw_output(&roster))])
            .await;

        let m = report.results.get("42").unwrap();
        assert_eq!(m.keys().collect::<Vec<_>>(), vec!["Player_01", "Player_07"]);
        assert_eq!(m["Player_01"].len(), 5);
        // Player_07 never appears: empty under the default policy
        assert!(m["Player_07"].is_empty());
    }

    #[tokio::test]
    async fn missing_entity_can_fail_the_match() {
        let roster = default_entity_ids(2);
        let mut opts = options(default_entity_ids(3));
        opts.missing_entity = MissingEntityPolicy::Fail;
        let agg = Aggregator::new(opts);
        let report = agg
            .aggregate_outputs(vec![("7".to_string(), raw_output(&roster))])
            .await;

        assert!(report.results.is_empty());
        assert_eq!(report.failures[0].kind, FailureKind::SamplingFailure);
        assert!(report.failures[0].reason.contains("Player_02"));
    }

    #[tokio::test]
    async fn aggregate_is_deterministic() {
        let players = default_entity_ids(10);
        let tables: Vec<(String, EntityTable)> = (0..6)
            .map(|i| {
                let table = parse_match("x", &raw_output(&players)).unwrap();
                (format!("match-{i}"), table)
            })
            .collect();

        let agg = Aggregator::new(options(players));
        let a = agg.aggregate(tables.clone()).await;
        let b = agg.aggregate(tables).await;
        assert_eq!(a.results, b.results);
        assert_eq!(a.results.len(), 6);
        assert!(a.failures.is_empty());
    }

    #[tokio::test]
    async fn non_numeric_timestamp_is_a_sampling_failure() {
        let players = default_entity_ids(2);
        let good = raw_output(&players);
        let bad = good.replacen(",-0.65,", ",soon,", 1);
        let agg = Aggregator::new(options(players));
        let report = agg
            .aggregate_outputs(vec![("1".to_string(), bad), ("2".to_string(), good)])
            .await;

        assert_eq!(report.results.match_ids().collect::<Vec<_>>(), vec!["2"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].match_id, "1");
        assert_eq!(report.failures[0].kind, FailureKind::SamplingFailure);
        assert!(report.failures[0].reason.contains("soon"));
    }

    #[test]
    fn other_non_numeric_fields_stay_malformed() {
        let players = default_entity_ids(1);
        let bad = raw_output(&players).replacen(",300,0.9,", ",lots,0.9,", 1);
        let err = parse_match("3", &bad).unwrap_err();
        assert_eq!(err.kind(), FailureKind::MalformedOutput);
    }

    #[test]
    fn resample_match_reports_sampling_failure_with_match_id() {
        let players = default_entity_ids(1);
        let table = parse_match("9", &raw_output(&players)).unwrap();
        let mut opts = options(players);
        opts.grid_interval_ms = 0;
        let err = resample_match("9", &table, &opts).unwrap_err();
        assert_eq!(err.kind(), FailureKind::SamplingFailure);
        assert!(err.to_string().contains("match 9"));
    }
}
