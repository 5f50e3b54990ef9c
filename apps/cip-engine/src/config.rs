use serde::{Deserialize, Serialize};

/// Inclusive band the per-cycle average concentration must fall inside.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ConcentrationRange {
    pub lo: f64,
    pub hi: f64,
}

/// How a scored cycle is judged PASS or FAIL.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PassRule {
    /// Total duration alone must clear `min_pass_minutes`.
    Duration,
    /// Duration rule plus average concentration inside `concentration_range`.
    #[default]
    DurationAndConcentration,
    /// Minutes at or above target temperature must clear `min_pass_minutes`.
    TimeAboveTarget,
}

/// Strategy for computing minutes spent at or above the target temperature.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AggregationStrategy {
    /// Resample the interval onto a uniform grid, linearly interpolating
    /// temperature between samples. Robust against irregular sampling.
    Resample { step_seconds: i64 },
    /// Weight each above-target sample by the gap to its predecessor.
    /// Cheap, but overweights sparse stretches when sampling is irregular.
    GapWeighted,
}

impl Default for AggregationStrategy {
    fn default() -> Self {
        Self::Resample {
            step_seconds: default_resample_step_seconds(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Temperature the wash must hold for time-above-target credit.
    #[serde(default = "default_target_temp_c")]
    pub target_temp_c: f64,
    /// Rising strictly above this opens a candidate interval; falling back
    /// to or below it closes one.
    #[serde(default = "default_trigger_temp_c")]
    pub trigger_temp_c: f64,
    /// Below-trigger dips up to this long merge into a single wash.
    #[serde(default = "default_max_gap_minutes")]
    pub max_gap_minutes: f64,
    /// Merged intervals shorter than this are discarded as sensor noise.
    #[serde(default = "default_min_duration_filter_minutes")]
    pub min_duration_filter_minutes: f64,
    /// Threshold a cycle's duration (or time above target, depending on the
    /// pass rule) must clear to pass.
    #[serde(default = "default_min_pass_minutes")]
    pub min_pass_minutes: f64,
    /// Required band for the average cleaning-agent concentration.
    #[serde(default = "default_concentration_range")]
    pub concentration_range: Option<ConcentrationRange>,
    #[serde(default)]
    pub pass_rule: PassRule,
    #[serde(default)]
    pub aggregation: AggregationStrategy,
}

fn default_target_temp_c() -> f64 {
    65.0
}

fn default_trigger_temp_c() -> f64 {
    65.0
}

fn default_max_gap_minutes() -> f64 {
    60.0
}

fn default_min_duration_filter_minutes() -> f64 {
    5.0
}

fn default_min_pass_minutes() -> f64 {
    40.0
}

fn default_concentration_range() -> Option<ConcentrationRange> {
    Some(ConcentrationRange { lo: 5.0, hi: 10.0 })
}

fn default_resample_step_seconds() -> i64 {
    10
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            target_temp_c: default_target_temp_c(),
            trigger_temp_c: default_trigger_temp_c(),
            max_gap_minutes: default_max_gap_minutes(),
            min_duration_filter_minutes: default_min_duration_filter_minutes(),
            min_pass_minutes: default_min_pass_minutes(),
            concentration_range: default_concentration_range(),
            pass_rule: PassRule::default(),
            aggregation: AggregationStrategy::default(),
        }
    }
}

impl AnalysisConfig {
    /// Check the configuration before any data is fetched.
    pub fn validate(&self) -> Result<(), String> {
        if !self.target_temp_c.is_finite() || self.target_temp_c <= 0.0 {
            return Err(format!(
                "target_temp_c must be a positive temperature, got {}",
                self.target_temp_c
            ));
        }
        if !self.trigger_temp_c.is_finite() || self.trigger_temp_c <= 0.0 {
            return Err(format!(
                "trigger_temp_c must be a positive temperature, got {}",
                self.trigger_temp_c
            ));
        }
        if !self.max_gap_minutes.is_finite() || self.max_gap_minutes < 0.0 {
            return Err(format!(
                "max_gap_minutes must be >= 0, got {}",
                self.max_gap_minutes
            ));
        }
        if !self.min_duration_filter_minutes.is_finite() || self.min_duration_filter_minutes < 0.0
        {
            return Err(format!(
                "min_duration_filter_minutes must be >= 0, got {}",
                self.min_duration_filter_minutes
            ));
        }
        if !self.min_pass_minutes.is_finite() || self.min_pass_minutes < 0.0 {
            return Err(format!(
                "min_pass_minutes must be >= 0, got {}",
                self.min_pass_minutes
            ));
        }
        if let Some(range) = &self.concentration_range {
            if !range.lo.is_finite() || !range.hi.is_finite() {
                return Err("concentration_range bounds must be finite".to_string());
            }
            if range.lo > range.hi {
                return Err(format!(
                    "concentration_range lo {} exceeds hi {}",
                    range.lo, range.hi
                ));
            }
        }
        if self.pass_rule == PassRule::DurationAndConcentration
            && self.concentration_range.is_none()
        {
            return Err(
                "pass_rule duration_and_concentration requires concentration_range".to_string(),
            );
        }
        if let AggregationStrategy::Resample { step_seconds } = self.aggregation {
            if step_seconds < 1 {
                return Err(format!(
                    "resample step_seconds must be >= 1, got {}",
                    step_seconds
                ));
            }
        }
        Ok(())
    }
}
