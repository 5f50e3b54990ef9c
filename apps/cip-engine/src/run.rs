//! Multi-tank analysis runs: one shared concentration fetch, bounded
//! parallel per-tank detection and scoring, per-tank failure isolation.

use crate::config::AnalysisConfig;
use crate::error::{EngineError, TankFailure};
use crate::provider::TimeSeriesProvider;
use crate::score::{analyze_series, CycleRecord, CycleStatus};
use crate::series::TimeSeries;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::Instrument;
use uuid::Uuid;

/// One tank to analyze: display name plus its temperature tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TankSpec {
    pub name: String,
    pub temperature_tag: String,
}

/// What to analyze in one run. The concentration tag, when present, is
/// fetched once and shared by every tank.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunPlan {
    pub tanks: Vec<TankSpec>,
    #[serde(default)]
    pub concentration_tag: Option<String>,
    pub query_start: NaiveDate,
}

impl RunPlan {
    pub fn validate(&self) -> Result<(), String> {
        let mut seen: HashSet<&str> = HashSet::new();
        for tank in &self.tanks {
            if tank.name.trim().is_empty() {
                return Err("tank name must not be blank".to_string());
            }
            if tank.temperature_tag.trim().is_empty() {
                return Err(format!("tank {} has a blank temperature tag", tank.name));
            }
            if !seen.insert(tank.name.as_str()) {
                return Err(format!("duplicate tank name {}", tank.name));
            }
        }
        if let Some(tag) = &self.concentration_tag {
            if tag.trim().is_empty() {
                return Err("concentration_tag must not be blank".to_string());
            }
        }
        Ok(())
    }
}

/// Rollup over one tank's scored cycles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TankSummary {
    pub total_cycles: usize,
    pub passed_cycles: usize,
    /// None when there were no cycles to rate.
    pub pass_rate_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_cycle: Option<CycleRecord>,
}

impl TankSummary {
    pub fn from_records(records: &[CycleRecord]) -> Self {
        let total_cycles = records.len();
        let passed_cycles = records
            .iter()
            .filter(|r| r.status == CycleStatus::Pass)
            .count();
        let pass_rate_percent = if total_cycles == 0 {
            None
        } else {
            Some(passed_cycles as f64 * 100.0 / total_cycles as f64)
        };
        Self {
            total_cycles,
            passed_cycles,
            pass_rate_percent,
            last_cycle: records.last().cloned(),
        }
    }
}

/// A tank either analyzed (possibly to zero cycles) or failed in a way
/// that never disturbs the other tanks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TankOutcome {
    Analyzed {
        summary: TankSummary,
        cycles: Vec<CycleRecord>,
    },
    Failed {
        error: TankFailure,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TankReport {
    pub tank: String,
    pub temperature_tag: String,
    pub outcome: TankOutcome,
}

/// Self-contained result of one run; owned entirely by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub generated_at: NaiveDateTime,
    pub query_start: NaiveDate,
    pub tanks: Vec<TankReport>,
}

/// Execute a run: validate, fetch the shared concentration series once,
/// then analyze each tank concurrently, at most `max_concurrency` at a
/// time. Tank reports come back in plan order.
pub async fn execute_run(
    provider: Arc<dyn TimeSeriesProvider>,
    plan: &RunPlan,
    config: &AnalysisConfig,
    max_concurrency: usize,
) -> Result<RunReport, EngineError> {
    config.validate().map_err(EngineError::InvalidConfiguration)?;
    plan.validate().map_err(EngineError::InvalidConfiguration)?;

    let concentration = Arc::new(match &plan.concentration_tag {
        Some(tag) => fetch_blocking(provider.clone(), tag.clone(), plan.query_start).await?,
        None => TimeSeries::empty("concentration"),
    });

    let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let mut futures = FuturesUnordered::new();
    for (index, tank) in plan.tanks.iter().cloned().enumerate() {
        let provider = provider.clone();
        let concentration = concentration.clone();
        let config = config.clone();
        let semaphore = semaphore.clone();
        let query_start = plan.query_start;
        let span = tracing::info_span!(
            "tank_analysis",
            tank = %tank.name,
            tag = %tank.temperature_tag,
        );
        futures.push(
            async move {
                // The semaphore stays open for the whole run, so this only
                // misses when the runtime is already tearing down.
                let _permit = semaphore.acquire_owned().await.ok();
                let outcome = match analyze_tank(
                    provider,
                    tank.temperature_tag.clone(),
                    query_start,
                    &concentration,
                    &config,
                )
                .await
                {
                    Ok((summary, cycles)) => TankOutcome::Analyzed { summary, cycles },
                    Err(err) => {
                        tracing::warn!(error = %err, tank = %tank.name, "tank analysis failed");
                        TankOutcome::Failed {
                            error: err.to_failure(),
                        }
                    }
                };
                (
                    index,
                    TankReport {
                        tank: tank.name,
                        temperature_tag: tank.temperature_tag,
                        outcome,
                    },
                )
            }
            .instrument(span),
        );
    }

    let mut ordered: Vec<Option<TankReport>> = plan.tanks.iter().map(|_| None).collect();
    while let Some((index, report)) = futures.next().await {
        ordered[index] = Some(report);
    }

    Ok(RunReport {
        run_id: Uuid::new_v4(),
        generated_at: Utc::now().naive_utc(),
        query_start: plan.query_start,
        tanks: ordered.into_iter().flatten().collect(),
    })
}

async fn analyze_tank(
    provider: Arc<dyn TimeSeriesProvider>,
    temperature_tag: String,
    query_start: NaiveDate,
    concentration: &TimeSeries,
    config: &AnalysisConfig,
) -> Result<(TankSummary, Vec<CycleRecord>), EngineError> {
    let temperature = fetch_blocking(provider, temperature_tag, query_start).await?;
    if temperature.is_empty() {
        tracing::debug!(tag = %temperature.tag(), "no samples in query window");
    }
    let cycles = analyze_series(&temperature, concentration, config)?;
    let summary = TankSummary::from_records(&cycles);
    Ok((summary, cycles))
}

/// Providers are synchronous; run each fetch on the blocking pool.
async fn fetch_blocking(
    provider: Arc<dyn TimeSeriesProvider>,
    tag: String,
    query_start: NaiveDate,
) -> Result<TimeSeries, EngineError> {
    let join_tag = tag.clone();
    tokio::task::spawn_blocking(move || provider.fetch(&tag, query_start))
        .await
        .map_err(|err| EngineError::Provider {
            tag: join_tag,
            message: format!("fetch task failed: {err}"),
        })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PassRule;
    use crate::provider::MemoryProvider;
    use crate::series::Sample;
    use chrono::Duration;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn at(minutes: i64) -> NaiveDateTime {
        let base = NaiveDate::from_ymd_opt(2026, 3, 8)
            .expect("date")
            .and_hms_opt(6, 0, 0)
            .expect("time");
        base + Duration::minutes(minutes)
    }

    fn query_start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 8).expect("date")
    }

    fn wash_samples() -> Vec<Sample> {
        vec![
            Sample::new(at(0), 30.0),
            Sample::new(at(5), 72.0),
            Sample::new(at(30), 74.0),
            Sample::new(at(50), 40.0),
        ]
    }

    fn duration_config() -> AnalysisConfig {
        AnalysisConfig {
            pass_rule: PassRule::Duration,
            concentration_range: None,
            min_pass_minutes: 40.0,
            ..AnalysisConfig::default()
        }
    }

    /// Fails every tag in `bad`, delegates the rest.
    struct FlakyProvider {
        inner: MemoryProvider,
        bad: HashSet<String>,
    }

    impl TimeSeriesProvider for FlakyProvider {
        fn fetch(&self, tag: &str, query_start: NaiveDate) -> Result<TimeSeries, EngineError> {
            if self.bad.contains(tag) {
                return Err(EngineError::Provider {
                    tag: tag.to_string(),
                    message: "connection refused".to_string(),
                });
            }
            self.inner.fetch(tag, query_start)
        }
    }

    /// Counts fetches per tag on top of a memory provider.
    struct CountingProvider {
        inner: MemoryProvider,
        calls: AtomicUsize,
        concentration_calls: AtomicUsize,
        concentration_tag: String,
    }

    impl TimeSeriesProvider for CountingProvider {
        fn fetch(&self, tag: &str, query_start: NaiveDate) -> Result<TimeSeries, EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if tag == self.concentration_tag {
                self.concentration_calls.fetch_add(1, Ordering::SeqCst);
            }
            self.inner.fetch(tag, query_start)
        }
    }

    fn two_tank_plan() -> RunPlan {
        RunPlan {
            tanks: vec![
                TankSpec {
                    name: "Tank 421".to_string(),
                    temperature_tag: "tt421".to_string(),
                },
                TankSpec {
                    name: "Tank 422".to_string(),
                    temperature_tag: "tt422".to_string(),
                },
            ],
            concentration_tag: None,
            query_start: query_start(),
        }
    }

    #[tokio::test]
    async fn failed_tank_does_not_disturb_the_others() {
        let mut inner = MemoryProvider::new();
        inner.insert("tt421", wash_samples());
        let provider = Arc::new(FlakyProvider {
            inner,
            bad: HashSet::from(["tt422".to_string()]),
        });

        let report = execute_run(provider, &two_tank_plan(), &duration_config(), 4)
            .await
            .expect("run");

        assert_eq!(report.tanks.len(), 2);
        assert_eq!(report.tanks[0].tank, "Tank 421");
        match &report.tanks[0].outcome {
            TankOutcome::Analyzed { summary, cycles } => {
                assert_eq!(cycles.len(), 1);
                assert_eq!(summary.total_cycles, 1);
                assert_eq!(summary.passed_cycles, 1);
            }
            other => panic!("expected analyzed outcome, got {other:?}"),
        }
        match &report.tanks[1].outcome {
            TankOutcome::Failed { error } => {
                assert_eq!(error.code, "provider_unavailable");
                assert!(error.message.contains("tt422"));
            }
            other => panic!("expected failed outcome, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn tank_with_no_data_is_analyzed_to_zero_cycles() {
        let provider = Arc::new(MemoryProvider::new());
        let plan = RunPlan {
            tanks: vec![TankSpec {
                name: "Tank 423".to_string(),
                temperature_tag: "tt423".to_string(),
            }],
            concentration_tag: None,
            query_start: query_start(),
        };

        let report = execute_run(provider, &plan, &duration_config(), 2)
            .await
            .expect("run");

        match &report.tanks[0].outcome {
            TankOutcome::Analyzed { summary, cycles } => {
                assert!(cycles.is_empty());
                assert_eq!(summary.total_cycles, 0);
                assert!(summary.pass_rate_percent.is_none());
                assert!(summary.last_cycle.is_none());
            }
            other => panic!("expected analyzed outcome, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn invalid_configuration_fails_before_any_fetch() {
        let mut inner = MemoryProvider::new();
        inner.insert("tt421", wash_samples());
        let provider = Arc::new(CountingProvider {
            inner,
            calls: AtomicUsize::new(0),
            concentration_calls: AtomicUsize::new(0),
            concentration_tag: "cip-conc".to_string(),
        });

        let config = AnalysisConfig {
            max_gap_minutes: -1.0,
            ..duration_config()
        };
        let err = execute_run(provider.clone(), &two_tank_plan(), &config, 4)
            .await
            .expect_err("must fail");

        assert!(matches!(err, EngineError::InvalidConfiguration(_)));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn shared_concentration_series_is_fetched_once() {
        let mut inner = MemoryProvider::new();
        inner.insert("tt421", wash_samples());
        inner.insert("tt422", wash_samples());
        inner.insert("cip-conc", vec![Sample::new(at(0), 7.0)]);
        let provider = Arc::new(CountingProvider {
            inner,
            calls: AtomicUsize::new(0),
            concentration_calls: AtomicUsize::new(0),
            concentration_tag: "cip-conc".to_string(),
        });

        let plan = RunPlan {
            concentration_tag: Some("cip-conc".to_string()),
            ..two_tank_plan()
        };
        let config = AnalysisConfig {
            pass_rule: PassRule::DurationAndConcentration,
            concentration_range: AnalysisConfig::default().concentration_range,
            ..duration_config()
        };

        let report = execute_run(provider.clone(), &plan, &config, 4)
            .await
            .expect("run");

        assert_eq!(provider.concentration_calls.load(Ordering::SeqCst), 1);
        for tank in &report.tanks {
            match &tank.outcome {
                TankOutcome::Analyzed { cycles, .. } => {
                    assert_eq!(cycles.len(), 1);
                    assert!((cycles[0].avg_concentration - 7.0).abs() < 1e-9);
                    assert_eq!(cycles[0].status, CycleStatus::Pass);
                }
                other => panic!("expected analyzed outcome, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn concentration_fetch_failure_fails_the_run() {
        let provider = Arc::new(FlakyProvider {
            inner: MemoryProvider::new(),
            bad: HashSet::from(["cip-conc".to_string()]),
        });
        let plan = RunPlan {
            concentration_tag: Some("cip-conc".to_string()),
            ..two_tank_plan()
        };
        let err = execute_run(provider, &plan, &duration_config(), 4)
            .await
            .expect_err("must fail");
        assert!(matches!(err, EngineError::Provider { .. }));
    }

    #[test]
    fn summary_math_matches_records() {
        let config = duration_config();
        let provider_series = TimeSeries::new("t", wash_samples());
        let cycles = analyze_series(&provider_series, &TimeSeries::empty("c"), &config)
            .expect("analyze");
        assert_eq!(cycles.len(), 1);

        let mut both = cycles.clone();
        let mut failed = cycles[0].clone();
        failed.status = CycleStatus::Fail;
        both.push(failed);

        let summary = TankSummary::from_records(&both);
        assert_eq!(summary.total_cycles, 2);
        assert_eq!(summary.passed_cycles, 1);
        assert!((summary.pass_rate_percent.expect("rate") - 50.0).abs() < 1e-9);
        assert_eq!(
            summary.last_cycle.expect("last").status,
            CycleStatus::Fail
        );
    }

    #[test]
    fn plan_validation_rejects_duplicates_and_blanks() {
        let mut plan = two_tank_plan();
        plan.tanks[1].name = "Tank 421".to_string();
        assert!(plan.validate().unwrap_err().contains("duplicate"));

        let mut plan = two_tank_plan();
        plan.tanks[0].temperature_tag = "  ".to_string();
        assert!(plan.validate().is_err());

        let mut plan = two_tank_plan();
        plan.concentration_tag = Some(String::new());
        assert!(plan.validate().is_err());
    }
}
