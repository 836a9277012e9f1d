//! CLI argument definitions using clap

use breakwater_core::BreakerPreset;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "breakwater")]
#[command(about = "Inspect and exercise Breakwater circuit breakers")]
#[command(
    long_about = r#"Inspect and exercise Breakwater circuit breakers

USAGE:
  breakwater presets                       # Show recommended presets
  breakwater check breakers.toml           # Validate a settings file
  breakwater simulate --script "FFF.SS"    # Replay outcomes against a breaker

Set RUST_LOG=debug (or pass --verbose) to see breaker transitions."#
)]
#[command(version)]
pub struct Cli {
    /// Enable verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the built-in presets and their tuning
    Presets {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Load a settings file and print the resolved breaker configs
    Check {
        /// Path to the TOML settings file
        settings_file: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Replay an outcome script against a preset breaker
    ///
    /// Script characters: S success, F failure, T timeout, K failure the
    /// preset skips, `.` wait out the recovery timeout.
    Simulate {
        /// Preset the simulated breaker is built from
        #[arg(long, default_value = "api")]
        preset: BreakerPreset,

        /// Outcome script, e.g. "FFFFF.SSS"
        #[arg(long)]
        script: String,

        /// Recovery timeout used in place of the preset's, in milliseconds
        #[arg(long, default_value_t = 50)]
        recovery_ms: u64,

        /// Per-call timeout used in place of the preset's, in milliseconds
        #[arg(long, default_value_t = 20)]
        timeout_ms: u64,
    },
}
