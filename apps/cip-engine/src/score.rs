//! Per-interval scoring: metric computation over the selected samples and
//! pass/fail classification under the configured rule.

use crate::config::{AggregationStrategy, AnalysisConfig, PassRule};
use crate::detect::{detect_intervals, Interval};
use crate::error::EngineError;
use crate::series::{minutes_between, Sample, TimeSeries};
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    Pass,
    Fail,
}

impl CycleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
        }
    }
}

/// One scored wash. Immutable once built; a run's records for a tag are
/// chronological and non-overlapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleRecord {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub total_duration_minutes: f64,
    pub time_above_target_minutes: f64,
    pub max_temperature: f64,
    pub avg_temperature: f64,
    pub avg_temperature_above_target: f64,
    pub avg_concentration: f64,
    pub status: CycleStatus,
}

/// Score one merged interval. None means the interval was discarded for
/// data quality: fewer than two usable temperature samples, or shorter
/// than the minimum-duration floor.
pub fn score_interval(
    interval: Interval,
    temperature: &TimeSeries,
    concentration: &TimeSeries,
    config: &AnalysisConfig,
) -> Option<CycleRecord> {
    let usable: Vec<Sample> = temperature
        .between(interval.start, interval.end)
        .iter()
        .copied()
        .filter(|s| s.value.is_finite())
        .collect();
    if usable.len() < 2 {
        return None;
    }

    let total_duration_minutes = minutes_between(interval.start, interval.end);
    if total_duration_minutes < config.min_duration_filter_minutes {
        return None;
    }

    let time_above_target_minutes = match config.aggregation {
        AggregationStrategy::Resample { step_seconds } => {
            time_above_target_resampled(temperature, interval, config.target_temp_c, step_seconds)
        }
        AggregationStrategy::GapWeighted => {
            time_above_target_gap_weighted(&usable, config.target_temp_c)
        }
    };

    let max_temperature = usable
        .iter()
        .map(|s| s.value)
        .fold(f64::NEG_INFINITY, f64::max);
    let avg_temperature = mean(usable.iter().map(|s| s.value)).unwrap_or(0.0);
    let avg_temperature_above_target = mean(
        usable
            .iter()
            .map(|s| s.value)
            .filter(|v| *v >= config.target_temp_c),
    )
    .unwrap_or(0.0);

    // Backward-fill join: each temperature timestamp takes the most recent
    // concentration at or before it, 0.0 when nothing precedes.
    let avg_concentration = mean(
        usable
            .iter()
            .map(|s| concentration.backfill_at(s.timestamp).unwrap_or(0.0)),
    )
    .unwrap_or(0.0);

    let status = evaluate_pass(
        total_duration_minutes,
        time_above_target_minutes,
        avg_concentration,
        config,
    );

    Some(CycleRecord {
        start: interval.start,
        end: interval.end,
        total_duration_minutes,
        time_above_target_minutes,
        max_temperature,
        avg_temperature,
        avg_temperature_above_target,
        avg_concentration,
        status,
    })
}

/// Detect and score every completed wash in one temperature series.
pub fn analyze_series(
    temperature: &TimeSeries,
    concentration: &TimeSeries,
    config: &AnalysisConfig,
) -> Result<Vec<CycleRecord>, EngineError> {
    let intervals =
        detect_intervals(temperature, config.trigger_temp_c, config.max_gap_minutes)?;
    Ok(intervals
        .into_iter()
        .filter_map(|interval| score_interval(interval, temperature, concentration, config))
        .collect())
}

/// Uniform-grid evaluation over `[start, end)`: each segment whose
/// interpolated start value clears the target contributes its clamped
/// width, so the sum can never exceed the interval duration.
fn time_above_target_resampled(
    temperature: &TimeSeries,
    interval: Interval,
    target_temp_c: f64,
    step_seconds: i64,
) -> f64 {
    let step = Duration::seconds(step_seconds.max(1));
    let mut minutes = 0.0;
    let mut t = interval.start;
    while t < interval.end {
        let segment_end = (t + step).min(interval.end);
        if let Some(value) = temperature.value_at(t) {
            if value >= target_temp_c {
                minutes += minutes_between(t, segment_end);
            }
        }
        t = segment_end;
    }
    minutes
}

/// Each above-target sample is credited with the gap back to its
/// predecessor; the first sample gets nothing. Overweights sparse
/// stretches when sampling is irregular.
fn time_above_target_gap_weighted(samples: &[Sample], target_temp_c: f64) -> f64 {
    let mut minutes = 0.0;
    for pair in samples.windows(2) {
        if pair[1].value >= target_temp_c {
            minutes += minutes_between(pair[0].timestamp, pair[1].timestamp);
        }
    }
    minutes
}

fn evaluate_pass(
    total_duration_minutes: f64,
    time_above_target_minutes: f64,
    avg_concentration: f64,
    config: &AnalysisConfig,
) -> CycleStatus {
    let passed = match config.pass_rule {
        PassRule::Duration => total_duration_minutes >= config.min_pass_minutes,
        PassRule::DurationAndConcentration => {
            let in_band = config
                .concentration_range
                .map(|range| avg_concentration >= range.lo && avg_concentration <= range.hi)
                .unwrap_or(false);
            total_duration_minutes >= config.min_pass_minutes && in_band
        }
        PassRule::TimeAboveTarget => time_above_target_minutes >= config.min_pass_minutes,
    };
    if passed {
        CycleStatus::Pass
    } else {
        CycleStatus::Fail
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let mut sum = 0.0;
    let mut count = 0usize;
    for value in values.filter(|v| v.is_finite()) {
        sum += value;
        count += 1;
    }
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}
