//! Per-stage duration histograms for a batch run.
//! Parser invocations and sampling tasks record one sample per match.

use std::sync::Mutex;
use std::time::Duration;

/// Durations stored in microseconds, 1us to 1h, 3 significant figures.
pub struct StageLatency {
    stage: &'static str,
    inner: Mutex<hdrhistogram::Histogram<u64>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencySummary {
    pub count: u64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub max_ms: f64,
}

impl StageLatency {
    pub fn new(stage: &'static str) -> Self {
        let histogram = hdrhistogram::Histogram::new_with_bounds(1, 3_600_000_000, 3)
            .expect("valid histogram bounds");
        Self {
            stage,
            inner: Mutex::new(histogram),
        }
    }

    pub fn stage(&self) -> &'static str {
        self.stage
    }

    pub fn record(&self, d: Duration) {
        let us = d.as_micros().clamp(1, u128::from(u64::MAX)) as u64;
        if let Ok(mut h) = self.inner.lock() {
            h.saturating_record(us);
        }
    }

    /// None until something has been recorded.
    pub fn summary(&self) -> Option<LatencySummary> {
        let h = self.inner.lock().ok()?;
        if h.len() == 0 {
            return None;
        }
        let ms = |us: u64| us as f64 / 1000.0;
        Some(LatencySummary {
            count: h.len(),
            p50_ms: ms(h.value_at_quantile(0.5)),
            p95_ms: ms(h.value_at_quantile(0.95)),
            max_ms: ms(h.max()),
        })
    }

    pub fn len(&self) -> u64 {
        self.inner.lock().map(|h| h.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Display for LatencySummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "n={} p50={:.1}ms p95={:.1}ms max={:.1}ms",
            self.count, self.p50_ms, self.p95_ms, self.max_ms
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_histogram_has_no_summary() {
        let lat = StageLatency::new("parse");
        assert!(lat.is_empty());
        assert!(lat.summary().is_none());
    }

    #[test]
    fn summary_reports_in_milliseconds() {
        let lat = StageLatency::new("sample");
        for ms in [10, 20, 30, 40, 1000] {
            lat.record(Duration::from_millis(ms));
        }
        let s = lat.summary().unwrap();
        assert_eq!(s.count, 5);
        assert!((s.p50_ms - 30.0).abs() < 0.1, "p50 was {}", s.p50_ms);
        assert!((s.max_ms - 1000.0).abs() < 1.0, "max was {}", s.max_ms);
        assert_eq!(lat.stage(), "sample");
    }
}
