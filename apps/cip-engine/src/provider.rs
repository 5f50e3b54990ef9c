//! Read-side seam to whatever holds the recorded series.

use crate::error::EngineError;
use crate::series::{Sample, TimeSeries};
use chrono::{NaiveDate, NaiveTime};
use std::collections::HashMap;

/// Source of recorded series, one call per tag per run.
///
/// Implementations normalize timestamps to civil time before returning and
/// cover `[query_start 00:00, now)`. A tag with no data in the window, or
/// one the source does not know, yields an empty series rather than an
/// error; errors are reserved for an unreachable or unreadable source.
pub trait TimeSeriesProvider: Send + Sync {
    fn fetch(&self, tag: &str, query_start: NaiveDate) -> Result<TimeSeries, EngineError>;
}

/// In-memory provider for tests and pre-loaded fixtures.
#[derive(Debug, Default)]
pub struct MemoryProvider {
    series: HashMap<String, Vec<Sample>>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, tag: impl Into<String>, samples: Vec<Sample>) {
        self.series.insert(tag.into(), samples);
    }
}

impl TimeSeriesProvider for MemoryProvider {
    fn fetch(&self, tag: &str, query_start: NaiveDate) -> Result<TimeSeries, EngineError> {
        let window_start = query_start.and_time(NaiveTime::MIN);
        match self.series.get(tag) {
            Some(samples) => Ok(TimeSeries::new(
                tag,
                samples
                    .iter()
                    .copied()
                    .filter(|s| s.timestamp >= window_start)
                    .collect(),
            )),
            None => Ok(TimeSeries::empty(tag)),
        }
    }
}
