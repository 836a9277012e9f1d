//! Subcommand handlers

mod check;
mod presets;
mod simulate;

use crate::args::{Cli, Commands};

/// Route CLI commands to their respective handlers
pub async fn route(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Presets { json } => presets::show_presets(json),
        Commands::Check {
            settings_file,
            json,
        } => check::check_settings(&settings_file, json),
        Commands::Simulate {
            preset,
            script,
            recovery_ms,
            timeout_ms,
        } => {
            let report = simulate::run(&simulate::SimulationOptions {
                preset,
                script,
                recovery_ms,
                timeout_ms,
            })
            .await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}
