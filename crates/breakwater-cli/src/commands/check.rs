//! `breakwater check`

use std::path::Path;

use anyhow::Context;
use breakwater_core::BreakerSettings;

pub fn check_settings(path: &Path, json: bool) -> anyhow::Result<()> {
    let settings = BreakerSettings::from_file(path)
        .with_context(|| format!("loading {}", path.display()))?;
    let summaries = settings
        .summaries()
        .with_context(|| format!("validating {}", path.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    if summaries.is_empty() {
        println!("{}: no breakers configured", path.display());
        return Ok(());
    }

    for (name, summary) in &summaries {
        let preset = summary
            .preset
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string());
        let trials = summary
            .half_open_max_calls
            .map(|n| n.to_string())
            .unwrap_or_else(|| "unlimited".to_string());
        println!(
            "{name}: preset={preset} failures={} successes={} recovery={:?} timeout={:?} trials={trials} skips={}",
            summary.failure_threshold,
            summary.success_threshold,
            summary.recovery_timeout,
            summary.timeout,
            summary.skips_errors,
        );
    }
    println!("{}: {} breaker(s) OK", path.display(), summaries.len());
    Ok(())
}
