use crate::sampler::grid::{normalize, round_ms, TimeGrid};
use crate::sampler::SampleError;
use crate::types::{EntityTable, MissingEntityPolicy, RawRecord, ResampledSeries};

/// Resample one entity of `table` onto a `grid_interval_ms` grid.
///
/// Each grid point takes the row observed last before the boundary was
/// crossed; the row's `time` is replaced by the grid point. Short series are
/// padded with their last selected row so the output always has one row per
/// grid point.
pub fn resample(
    table: &EntityTable,
    entity_id: &str,
    grid_interval_ms: u32,
    missing: MissingEntityPolicy,
) -> Result<ResampledSeries, SampleError> {
    if grid_interval_ms == 0 {
        return Err(SampleError::InvalidInterval);
    }

    let rows: Vec<&RawRecord> = table.rows_for(entity_id).collect();
    let Some(last_row) = rows.len().checked_sub(1) else {
        return match missing {
            MissingEntityPolicy::Empty => Ok(ResampledSeries::default()),
            MissingEntityPolicy::Fail => Err(SampleError::NoRows(entity_id.to_string())),
        };
    };

    if let Some(row) = rows.iter().position(|r| !r.time.is_finite()) {
        return Err(SampleError::NonFiniteTimestamp {
            entity: entity_id.to_string(),
            row,
        });
    }

    let raw_times: Vec<f64> = rows.iter().map(|r| r.time).collect();
    let times = normalize(&raw_times);
    let grid = TimeGrid::covering(times[last_row], grid_interval_ms)?;

    let mut picks = select_indices(&times, grid_interval_ms);
    // A timeline ending exactly on a boundary crosses one more boundary than
    // the grid has points.
    picks.truncate(grid.len());
    let pad = picks.last().copied().unwrap_or(last_row);
    picks.resize(grid.len(), pad);

    let rows = picks
        .iter()
        .zip(grid.points())
        .map(|(&idx, &t)| RawRecord {
            time: t as f64,
            ..rows[idx].clone()
        })
        .collect();

    Ok(ResampledSeries { rows })
}

/// Walk normalized timestamps and return, for each boundary crossed, the
/// index of the row just before the crossing.
///
/// Boundaries start at 0 and advance by `interval_ms`, at most once per row.
/// The returned indices are strictly increasing.
pub fn select_indices(times_ms: &[f64], interval_ms: u32) -> Vec<usize> {
    let step = f64::from(interval_ms);
    let mut boundary = 0.0;
    let mut picks = Vec::new();

    for (i, &t) in times_ms.iter().enumerate().skip(1) {
        if round_ms(t) >= boundary {
            picks.push(i - 1);
            boundary += step;
        }
    }
    picks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::test_record;

    /// Rows for one entity with `x` set to the row's position so the
    /// selected source row can be read back from the output.
    fn table(entity: &str, times_s: &[f64]) -> EntityTable {
        let records = times_s
            .iter()
            .enumerate()
            .map(|(i, &t)| RawRecord {
                x: i as f64,
                ..test_record(entity, t)
            })
            .collect();
        EntityTable::new(records)
    }

    fn sources(series: &ResampledSeries) -> Vec<usize> {
        series.rows.iter().map(|r| r.x as usize).collect()
    }

    fn times(series: &ResampledSeries) -> Vec<f64> {
        series.times().collect()
    }

    #[test]
    fn carry_forward_picks_row_before_crossing() {
        assert_eq!(select_indices(&[0.0, 150.0, 350.0, 900.0], 200), vec![0, 1, 2]);

        let t = table("Player_00", &[0.0, 0.15, 0.35, 0.9]);
        let series = resample(&t, "Player_00", 200, MissingEntityPolicy::Empty).unwrap();
        assert_eq!(times(&series), vec![200.0, 400.0, 600.0, 800.0, 1000.0]);
        assert_eq!(sources(&series), vec![0, 1, 2, 2, 2]);
    }

    #[test]
    fn negative_start_is_shifted_to_zero() {
        let t = table("Player_00", &[-1.0, -0.85, -0.65, -0.1]);
        let series = resample(&t, "Player_00", 200, MissingEntityPolicy::Empty).unwrap();
        assert_eq!(series.len(), 5);
        assert_eq!(sources(&series), vec![0, 1, 2, 2, 2]);
    }

    #[test]
    fn short_series_repeats_last_selected_row() {
        // two selections (rows 0 and 1) against a 10 point grid
        let t = table("Player_04", &[0.0, 0.1, 1.9]);
        let series = resample(&t, "Player_04", 200, MissingEntityPolicy::Empty).unwrap();
        assert_eq!(series.len(), 10);
        assert_eq!(sources(&series), vec![0, 1, 1, 1, 1, 1, 1, 1, 1, 1]);
        for row in &series.rows[2..] {
            assert_eq!(
                RawRecord { time: 0.0, ..row.clone() },
                RawRecord { time: 0.0, ..series.rows[1].clone() }
            );
        }
    }

    #[test]
    fn one_row_per_grid_point_with_fixed_step() {
        let t = table("Player_01", &[-90.0, -89.7, -89.1, -88.0, -85.2, -80.05]);
        let series = resample(&t, "Player_01", 200, MissingEntityPolicy::Empty).unwrap();

        let t_end = (-80.05f64 + 90.0) * 1000.0;
        let expected = (t_end / 200.0).ceil() as usize;
        assert_eq!(series.len(), expected);

        let ts = times(&series);
        assert_eq!(ts[0], 200.0);
        for pair in ts.windows(2) {
            assert_eq!(pair[1] - pair[0], 200.0);
        }
    }

    #[test]
    fn surplus_crossings_are_dropped_to_fit_grid() {
        // ends exactly on a boundary: grid [200, 400] but three crossings
        assert_eq!(select_indices(&[0.0, 10.0, 200.0, 400.0], 200), vec![0, 1, 2]);
        let t = table("Player_00", &[0.0, 0.01, 0.2, 0.4]);
        let series = resample(&t, "Player_00", 200, MissingEntityPolicy::Empty).unwrap();
        assert_eq!(times(&series), vec![200.0, 400.0]);
        assert_eq!(sources(&series), vec![0, 1]);
    }

    #[test]
    fn resampling_is_idempotent() {
        let mut records = table("Player_02", &[0.0, 0.3, 0.45, 1.2, 2.0]).records;
        records.extend(table("Player_03", &[0.0, 0.5, 3.0]).records);
        let t = EntityTable::new(records);

        let a = resample(&t, "Player_02", 200, MissingEntityPolicy::Empty).unwrap();
        let b = resample(&t, "Player_02", 200, MissingEntityPolicy::Empty).unwrap();
        assert_eq!(a, b);
        assert!(a.rows.iter().all(|r| r.player == "Player_02"));
    }

    #[test]
    fn other_entities_do_not_affect_selection() {
        let mut records = table("Player_00", &[0.0, 0.15, 0.35, 0.9]).records;
        records.insert(1, test_record("Player_05", 0.1));
        records.insert(3, test_record("Player_05", 7.0));
        let t = EntityTable::new(records);

        let series = resample(&t, "Player_00", 200, MissingEntityPolicy::Empty).unwrap();
        assert_eq!(series.len(), 5);
        assert!(series.rows.iter().all(|r| r.player == "Player_00"));
    }

    #[test]
    fn each_entity_is_anchored_on_its_own_first_row() {
        let mut records = table("Player_00", &[-1.0, -0.5, 0.0]).records;
        records.extend(table("Player_01", &[-0.4, 0.0]).records);
        let t = EntityTable::new(records);

        let early = resample(&t, "Player_00", 200, MissingEntityPolicy::Empty).unwrap();
        let late = resample(&t, "Player_01", 200, MissingEntityPolicy::Empty).unwrap();
        // same wall-clock end, different anchors
        assert_eq!(early.len(), 5);
        assert_eq!(late.len(), 2);
        assert_eq!(late.times().last(), Some(400.0));
    }

    #[test]
    fn missing_entity_follows_policy() {
        let t = table("Player_00", &[0.0, 1.0]);
        let empty = resample(&t, "Player_09", 200, MissingEntityPolicy::Empty).unwrap();
        assert!(empty.is_empty());
        assert_eq!(
            resample(&t, "Player_09", 200, MissingEntityPolicy::Fail),
            Err(SampleError::NoRows("Player_09".to_string()))
        );
    }

    #[test]
    fn single_observation_at_zero_yields_empty_grid() {
        let t = table("Player_00", &[-3.0]);
        let series = resample(&t, "Player_00", 200, MissingEntityPolicy::Empty).unwrap();
        assert!(series.is_empty());
    }

    #[test]
    fn nothing_selected_falls_back_to_final_row() {
        // positive first timestamp doubles instead of zeroing: t_end = 1000ms
        let t = table("Player_00", &[0.5]);
        let series = resample(&t, "Player_00", 200, MissingEntityPolicy::Empty).unwrap();
        assert_eq!(series.len(), 5);
        assert_eq!(sources(&series), vec![0; 5]);
    }

    #[test]
    fn non_finite_timestamp_is_a_sampling_error() {
        let t = table("Player_00", &[0.0, f64::NAN, 1.0]);
        assert_eq!(
            resample(&t, "Player_00", 200, MissingEntityPolicy::Empty),
            Err(SampleError::NonFiniteTimestamp {
                entity: "Player_00".to_string(),
                row: 1
            })
        );
    }

    #[test]
    fn regressing_timeline_is_a_sampling_error() {
        let t = table("Player_00", &[-1.0, -2.0]);
        assert!(matches!(
            resample(&t, "Player_00", 200, MissingEntityPolicy::Empty),
            Err(SampleError::NegativeTimeline { .. })
        ));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let t = table("Player_00", &[0.0, 1.0]);
        assert_eq!(
            resample(&t, "Player_00", 0, MissingEntityPolicy::Empty),
            Err(SampleError::InvalidInterval)
        );
    }
}
