//! Wash-cycle detection: threshold crossings on the temperature trace,
//! then a merge pass that absorbs short below-trigger dips.

use crate::error::EngineError;
use crate::series::{minutes_between, TimeSeries};
use chrono::NaiveDateTime;

/// Stretch during which temperature stayed above the trigger threshold,
/// modulo the merge tolerance. Detector output, scorer input; transient,
/// never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

/// Scan the temperature series for completed washes.
///
/// A sample strictly above `trigger_temp_c` opens an interval while none is
/// open; a sample at or below it closes the open one. A stream that ends
/// above the trigger is a wash still in progress and emits nothing; it
/// completes in a later run. Closed intervals separated by at most
/// `max_gap_minutes` merge into one (valve cycling and sensor sag read as a
/// single wash). No crossings is an empty vector, not an error.
pub fn detect_intervals(
    series: &TimeSeries,
    trigger_temp_c: f64,
    max_gap_minutes: f64,
) -> Result<Vec<Interval>, EngineError> {
    if !series.is_sorted() {
        return Err(EngineError::UnorderedSeries {
            tag: series.tag().to_string(),
        });
    }

    let mut raw: Vec<Interval> = Vec::new();
    let mut open: Option<NaiveDateTime> = None;
    for sample in series.samples() {
        match open {
            None if sample.value > trigger_temp_c => open = Some(sample.timestamp),
            Some(start) if sample.value <= trigger_temp_c => {
                raw.push(Interval {
                    start,
                    end: sample.timestamp,
                });
                open = None;
            }
            _ => {}
        }
    }

    Ok(merge_adjacent(raw, max_gap_minutes))
}

fn merge_adjacent(intervals: Vec<Interval>, max_gap_minutes: f64) -> Vec<Interval> {
    let mut merged: Vec<Interval> = Vec::new();
    for interval in intervals {
        match merged.last_mut() {
            Some(last) if minutes_between(last.end, interval.start) <= max_gap_minutes => {
                last.end = interval.end;
            }
            _ => merged.push(interval),
        }
    }
    merged
}
