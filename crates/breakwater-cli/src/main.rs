//! Breakwater CLI
//!
//! Operator tooling for circuit breakers:
//!
//! - `breakwater presets` lists the recommended preset tuning
//! - `breakwater check <file>` validates a breaker settings file
//! - `breakwater simulate` replays a script of outcomes against a breaker and
//!   prints each step, the state transitions, and the final statistics

mod args;
mod commands;

use clap::Parser;
use tracing_subscriber::EnvFilter;

pub use args::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose when set
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    commands::route(cli).await
}
