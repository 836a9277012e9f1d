//! `breakwater presets`

use std::collections::BTreeMap;

use breakwater_core::circuit_breaker::{BreakerPreset, PresetTuning};

pub fn show_presets(json: bool) -> anyhow::Result<()> {
    if json {
        let table: BTreeMap<&str, PresetTuning> = BreakerPreset::ALL
            .iter()
            .map(|preset| (preset.as_str(), preset.tuning()))
            .collect();
        println!("{}", serde_json::to_string_pretty(&table)?);
        return Ok(());
    }

    println!(
        "{:<22} {:>8} {:>9} {:>9} {:>8}  skips",
        "preset", "failures", "successes", "recovery", "timeout"
    );
    for preset in BreakerPreset::ALL {
        let tuning = preset.tuning();
        println!(
            "{:<22} {:>8} {:>9} {:>8}s {:>7}s  {}",
            preset.as_str(),
            tuning.failure_threshold,
            tuning.success_threshold,
            tuning.recovery_timeout.as_secs(),
            tuning.timeout.as_secs(),
            tuning.skip_patterns.join(", ")
        );
    }
    Ok(())
}
