use anyhow::{Context, Result};
use cip_engine::config::AnalysisConfig;
use cip_engine::run::RunPlan;
use std::fs;
use std::path::Path;

pub fn load_plan(path: &Path) -> Result<RunPlan> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read run file at {}", path.display()))?;
    let plan: RunPlan = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse run file at {}", path.display()))?;
    Ok(plan)
}

/// Missing path means engine defaults.
pub fn load_config(path: Option<&Path>) -> Result<AnalysisConfig> {
    let Some(path) = path else {
        return Ok(AnalysisConfig::default());
    };
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read analysis config at {}", path.display()))?;
    let config: AnalysisConfig = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse analysis config at {}", path.display()))?;
    Ok(config)
}
