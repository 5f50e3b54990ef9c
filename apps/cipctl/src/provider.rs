//! File-backed provider over historian exports: one `<tag>.json` per tag,
//! each holding the recorded points array as exported.

use chrono::{NaiveDate, NaiveTime};
use cip_engine::error::EngineError;
use cip_engine::provider::TimeSeriesProvider;
use cip_engine::series::{clean_series, RawPoint, TimeSeries};
use std::fs;
use std::path::PathBuf;

pub struct DirectoryProvider {
    root: PathBuf,
}

impl DirectoryProvider {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

impl TimeSeriesProvider for DirectoryProvider {
    /// A missing file is a tag with no data; an unreadable or unparsable
    /// one is a provider failure for that tag alone.
    fn fetch(&self, tag: &str, query_start: NaiveDate) -> Result<TimeSeries, EngineError> {
        let path = self.root.join(format!("{tag}.json"));
        if !path.exists() {
            return Ok(TimeSeries::empty(tag));
        }

        let contents = fs::read_to_string(&path).map_err(|err| EngineError::Provider {
            tag: tag.to_string(),
            message: format!("failed to read {}: {err}", path.display()),
        })?;
        let raw: Vec<RawPoint> =
            serde_json::from_str(&contents).map_err(|err| EngineError::Provider {
                tag: tag.to_string(),
                message: format!("failed to parse {}: {err}", path.display()),
            })?;

        let cleaned = clean_series(tag, &raw);
        let window_start = query_start.and_time(NaiveTime::MIN);
        Ok(TimeSeries::new(
            tag,
            cleaned
                .samples()
                .iter()
                .copied()
                .filter(|s| s.timestamp >= window_start)
                .collect(),
        ))
    }
}
