use crate::config::MAX_GRID_POINTS;
use crate::sampler::SampleError;

/// Equally spaced grid points `interval, 2*interval, ..., n*interval` (ms),
/// where `n = ceil(t_end / interval)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeGrid {
    interval_ms: u32,
    points: Vec<u64>,
}

impl TimeGrid {
    /// Smallest grid whose last point is at or after `t_end_ms`.
    pub fn covering(t_end_ms: f64, interval_ms: u32) -> Result<Self, SampleError> {
        if interval_ms == 0 {
            return Err(SampleError::InvalidInterval);
        }
        if t_end_ms < 0.0 {
            return Err(SampleError::NegativeTimeline { t_end_ms });
        }

        let count = (t_end_ms / f64::from(interval_ms)).ceil();
        if count > MAX_GRID_POINTS as f64 {
            return Err(SampleError::GridTooLarge {
                points: count as u64,
                max: MAX_GRID_POINTS,
            });
        }

        let step = u64::from(interval_ms);
        let points = (1..=count as u64).map(|i| i * step).collect();
        Ok(Self { interval_ms, points })
    }

    pub fn interval_ms(&self) -> u32 {
        self.interval_ms
    }

    pub fn points(&self) -> &[u64] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Shift raw second timestamps onto a millisecond timeline anchored by the
/// first one: `(t + |t_first|) * 1000`.
///
/// Only the first value's magnitude is used, so a first row that is positive
/// or an outlier moves the whole timeline with it.
///
/// Each entity is anchored on its own first row, so series within one match
/// share a grid only when their first samples coincide.
pub fn normalize(times_s: &[f64]) -> Vec<f64> {
    let Some(first) = times_s.first() else {
        return Vec::new();
    };
    let offset = first.abs();
    times_s.iter().map(|t| (t + offset) * 1000.0).collect()
}

/// Round a millisecond value to 3 decimal places.
#[inline]
pub fn round_ms(t: f64) -> f64 {
    (t * 1000.0).round() / 1000.0
}
