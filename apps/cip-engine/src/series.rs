//! Time-series model shared by the detector and scorer, plus the cleaning
//! step that turns raw historian export points into usable samples.
//!
//! Historian exports mix plain numbers, numeric strings, and digital-state
//! objects whose `Value` field carries the state code. Cleaning coerces what
//! it can and silently drops the rest, so downstream code only ever sees
//! finite values in timestamp order.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// One reading of one tag.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: NaiveDateTime,
    pub value: f64,
}

impl Sample {
    pub fn new(timestamp: NaiveDateTime, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Ordered samples for a single tag. Construction sorts and collapses
/// duplicate timestamps (first occurrence wins); the series is never
/// mutated afterwards. Empty is a valid state, not an error.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    tag: String,
    samples: Vec<Sample>,
}

impl TimeSeries {
    pub fn new(tag: impl Into<String>, mut samples: Vec<Sample>) -> Self {
        samples.sort_by_key(|s| s.timestamp);
        samples.dedup_by(|b, a| b.timestamp == a.timestamp);
        Self {
            tag: tag.into(),
            samples,
        }
    }

    /// Build from samples the caller guarantees are already in ascending
    /// timestamp order. The detector re-checks ordering and reports a typed
    /// error instead of silently misbehaving.
    pub fn from_sorted(tag: impl Into<String>, samples: Vec<Sample>) -> Self {
        Self {
            tag: tag.into(),
            samples,
        }
    }

    pub fn empty(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            samples: Vec::new(),
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn is_sorted(&self) -> bool {
        self.samples
            .windows(2)
            .all(|pair| pair[0].timestamp <= pair[1].timestamp)
    }

    /// Samples with `start <= timestamp <= end`.
    pub fn between(&self, start: NaiveDateTime, end: NaiveDateTime) -> &[Sample] {
        let lo = self.samples.partition_point(|s| s.timestamp < start);
        let hi = self.samples.partition_point(|s| s.timestamp <= end);
        &self.samples[lo..hi]
    }

    /// Most recent value at or before `at`, searching the whole series.
    /// None when nothing precedes `at`.
    pub fn backfill_at(&self, at: NaiveDateTime) -> Option<f64> {
        let idx = self.samples.partition_point(|s| s.timestamp <= at);
        if idx == 0 {
            None
        } else {
            Some(self.samples[idx - 1].value)
        }
    }

    /// Value at `at` by linear interpolation between the surrounding
    /// samples. Past the last sample the last value holds; before the first
    /// sample there is nothing to interpolate from.
    pub fn value_at(&self, at: NaiveDateTime) -> Option<f64> {
        let idx = self.samples.partition_point(|s| s.timestamp <= at);
        if idx == 0 {
            return None;
        }
        let before = self.samples[idx - 1];
        if idx == self.samples.len() || before.timestamp == at {
            return Some(before.value);
        }
        let after = self.samples[idx];
        let span = (after.timestamp - before.timestamp).num_milliseconds() as f64;
        if span <= 0.0 {
            return Some(before.value);
        }
        let offset = (at - before.timestamp).num_milliseconds() as f64;
        Some(before.value + (after.value - before.value) * (offset / span))
    }
}

/// One recorded point as exported from the historian. `value` stays raw
/// JSON because exports mix numbers, numeric strings, and digital-state
/// objects; `timestamp` accepts RFC 3339, plain ISO, or epoch forms.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPoint {
    #[serde(rename = "Timestamp", alias = "timestamp", default)]
    pub timestamp: Option<RawTimestamp>,
    #[serde(rename = "Value", alias = "value", default)]
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    Str(String),
    Int(i64),
    Float(f64),
}

impl RawTimestamp {
    fn to_naive(&self) -> Option<NaiveDateTime> {
        match self {
            RawTimestamp::Str(s) => {
                let s = s.trim();
                DateTime::parse_from_rfc3339(s)
                    .map(|dt| dt.naive_utc())
                    .ok()
                    .or_else(|| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").ok())
                    .or_else(|| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").ok())
            }
            RawTimestamp::Int(ms) => millis_to_naive(*ms),
            RawTimestamp::Float(secs) => {
                if !secs.is_finite() {
                    return None;
                }
                millis_to_naive((secs * 1000.0) as i64)
            }
        }
    }
}

/// Wall-clock minutes from `start` to `end` (negative if reversed).
pub(crate) fn minutes_between(start: NaiveDateTime, end: NaiveDateTime) -> f64 {
    (end - start).num_milliseconds() as f64 / 60_000.0
}

fn millis_to_naive(ms: i64) -> Option<NaiveDateTime> {
    let secs = ms.div_euclid(1000);
    let nanos = (ms.rem_euclid(1000) * 1_000_000) as u32;
    Utc.timestamp_opt(secs, nanos)
        .single()
        .map(|dt| dt.naive_utc())
}

fn coerce_value(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        serde_json::Value::Object(map) => map.get("Value").and_then(coerce_value),
        _ => None,
    }
}

/// Turn raw export points into a clean series. Points whose timestamp or
/// value cannot be coerced are dropped and counted, never errors.
pub fn clean_series(tag: &str, raw: &[RawPoint]) -> TimeSeries {
    let mut samples = Vec::with_capacity(raw.len());
    let mut dropped = 0usize;
    for point in raw {
        let timestamp = point.timestamp.as_ref().and_then(|t| t.to_naive());
        let value = coerce_value(&point.value);
        match (timestamp, value) {
            (Some(timestamp), Some(value)) => samples.push(Sample::new(timestamp, value)),
            _ => dropped += 1,
        }
    }
    if dropped > 0 {
        tracing::debug!(tag = %tag, dropped, kept = samples.len(), "dropped malformed samples");
    }
    TimeSeries::new(tag, samples)
}
