use anyhow::{bail, Result};
use cip_engine::run::{self, RunReport, TankOutcome};
use std::sync::Arc;

use crate::cli::{AnalyzeArgs, TagsArgs, ValidateArgs};
use crate::config;
use crate::provider::DirectoryProvider;

pub async fn analyze(args: AnalyzeArgs) -> Result<()> {
    let report = build_report(&args).await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

pub(crate) async fn build_report(args: &AnalyzeArgs) -> Result<RunReport> {
    let plan = config::load_plan(&args.run)?;
    let analysis = config::load_config(args.config.as_deref())?;
    let provider = Arc::new(DirectoryProvider::new(args.data_dir.clone()));
    let report = run::execute_run(provider, &plan, &analysis, args.max_concurrency).await?;
    tracing::info!(run_id = %report.run_id, tanks = report.tanks.len(), "analysis run complete");
    Ok(report)
}

pub fn validate(args: ValidateArgs) -> Result<()> {
    let plan = config::load_plan(&args.run)?;
    if let Err(message) = plan.validate() {
        bail!("run file invalid: {message}");
    }
    let analysis = config::load_config(args.config.as_deref())?;
    if let Err(message) = analysis.validate() {
        bail!("analysis config invalid: {message}");
    }
    println!("run file ok: {} tanks", plan.tanks.len());
    println!("analysis config ok");
    Ok(())
}

/// Print every tag the run will fetch, one per line, so operators know
/// which exports to pull from the historian.
pub fn tags(args: TagsArgs) -> Result<()> {
    let plan = config::load_plan(&args.run)?;
    let mut tags: Vec<&str> = plan
        .tanks
        .iter()
        .map(|tank| tank.temperature_tag.as_str())
        .collect();
    if let Some(concentration) = &plan.concentration_tag {
        tags.push(concentration.as_str());
    }
    tags.sort_unstable();
    tags.dedup();
    for tag in tags {
        println!("{tag}");
    }
    Ok(())
}

fn print_report(report: &RunReport) {
    println!(
        "run {} over {} tanks (from {})",
        report.run_id,
        report.tanks.len(),
        report.query_start
    );
    for tank in &report.tanks {
        println!();
        println!("{} [{}]", tank.tank, tank.temperature_tag);
        match &tank.outcome {
            TankOutcome::Failed { error } => {
                println!("  failed: {} ({})", error.message, error.code);
            }
            TankOutcome::Analyzed { summary, cycles } => {
                match summary.pass_rate_percent {
                    Some(rate) => println!(
                        "  cycles: {}  passed: {}  pass rate: {:.1}%",
                        summary.total_cycles, summary.passed_cycles, rate
                    ),
                    None => println!("  no completed cycles in window"),
                }
                for cycle in cycles {
                    println!(
                        "  {}  {:>6.1} min  above target {:>6.1} min  max {:>5.1}  avg {:>5.1}  conc {:>5.2}  {}",
                        cycle.start.format("%Y-%m-%d %H:%M"),
                        cycle.total_duration_minutes,
                        cycle.time_above_target_minutes,
                        cycle.max_temperature,
                        cycle.avg_temperature,
                        cycle.avg_concentration,
                        cycle.status.as_str(),
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    fn write_run_file(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("run.json");
        fs::write(
            &path,
            r#"{
                "tanks": [
                    { "name": "Tank 421", "temperature_tag": "tt421" },
                    { "name": "Tank 422", "temperature_tag": "tt422" }
                ],
                "concentration_tag": "cip-conc",
                "query_start": "2026-03-08"
            }"#,
        )
        .expect("write run file");
        path
    }

    fn write_series(dir: &Path, tag: &str, points: &[(&str, f64)]) {
        let rows: Vec<serde_json::Value> = points
            .iter()
            .map(|(ts, v)| serde_json::json!({ "Timestamp": ts, "Value": v }))
            .collect();
        fs::write(
            dir.join(format!("{tag}.json")),
            serde_json::to_string(&rows).expect("encode"),
        )
        .expect("write series");
    }

    #[tokio::test]
    async fn analyze_builds_report_from_exported_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let run_path = write_run_file(dir.path());
        let data_dir = dir.path().join("data");
        fs::create_dir(&data_dir).expect("mkdir");

        write_series(
            &data_dir,
            "tt421",
            &[
                ("2026-03-08T06:00:00Z", 30.0),
                ("2026-03-08T06:05:00Z", 72.0),
                ("2026-03-08T06:50:00Z", 74.0),
                ("2026-03-08T06:55:00Z", 40.0),
            ],
        );
        write_series(&data_dir, "cip-conc", &[("2026-03-08T06:00:00Z", 7.0)]);
        // No file for tt422: analyzed, zero cycles.

        let args = crate::cli::AnalyzeArgs {
            run: run_path,
            data_dir,
            config: None,
            max_concurrency: 2,
            json: true,
        };
        let report = build_report(&args).await.expect("report");

        assert_eq!(report.tanks.len(), 2);
        match &report.tanks[0].outcome {
            TankOutcome::Analyzed { summary, cycles } => {
                assert_eq!(summary.total_cycles, 1);
                assert_eq!(summary.passed_cycles, 1);
                assert!((cycles[0].avg_concentration - 7.0).abs() < 1e-9);
            }
            other => panic!("expected analyzed outcome, got {other:?}"),
        }
        match &report.tanks[1].outcome {
            TankOutcome::Analyzed { summary, .. } => {
                assert_eq!(summary.total_cycles, 0);
                assert!(summary.pass_rate_percent.is_none());
            }
            other => panic!("expected analyzed outcome, got {other:?}"),
        }
    }
}
