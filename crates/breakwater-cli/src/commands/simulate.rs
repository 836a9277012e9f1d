//! `breakwater simulate`: replay scripted outcomes against a breaker

use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use breakwater_core::{
    BreakerPreset, CircuitBreakerError, CircuitBreakerRegistry, CircuitBreakerStats, CircuitState,
};
use parking_lot::Mutex;
use serde::Serialize;

const BREAKER_NAME: &str = "simulated";

#[derive(Debug, thiserror::Error)]
enum SimulatedError {
    #[error("simulated dependency failure")]
    Failure,
    #[error("simulated {0}")]
    Ignorable(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Success,
    Failure,
    Timeout,
    Skipped,
    Wait,
}

impl Step {
    fn parse(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'S' => Some(Self::Success),
            'F' => Some(Self::Failure),
            'T' => Some(Self::Timeout),
            'K' => Some(Self::Skipped),
            '.' => Some(Self::Wait),
            _ => None,
        }
    }
}

pub struct SimulationOptions {
    pub preset: BreakerPreset,
    pub script: String,
    pub recovery_ms: u64,
    pub timeout_ms: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepReport {
    pub step: usize,
    pub input: char,
    pub outcome: &'static str,
    pub state: CircuitState,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationReport {
    pub breaker: String,
    pub preset: BreakerPreset,
    pub steps: Vec<StepReport>,
    pub transitions: Vec<CircuitState>,
    pub stats: CircuitBreakerStats,
}

fn parse_script(script: &str) -> anyhow::Result<Vec<(char, Step)>> {
    let mut steps = Vec::new();
    for c in script.chars().filter(|c| !c.is_whitespace()) {
        match Step::parse(c) {
            Some(step) => steps.push((c, step)),
            None => bail!("unknown script step '{}' (expected S, F, T, K or .)", c),
        }
    }
    if steps.is_empty() {
        bail!("script is empty");
    }
    Ok(steps)
}

pub async fn run(options: &SimulationOptions) -> anyhow::Result<SimulationReport> {
    let steps = parse_script(&options.script)?;
    if options.timeout_ms == 0 {
        bail!("--timeout-ms must be greater than zero");
    }

    let recovery = Duration::from_millis(options.recovery_ms);
    let timeout = Duration::from_millis(options.timeout_ms);
    let skip_message = options.preset.tuning().skip_patterns.first().copied();

    let transitions = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&transitions);
    let config = options
        .preset
        .config()
        .with_recovery_timeout(recovery)
        .with_timeout(timeout)
        .on_state_change(move |state| sink.lock().push(state));

    let registry = CircuitBreakerRegistry::new();
    let breaker = registry.get_or_create(BREAKER_NAME, config);

    let mut reports = Vec::with_capacity(steps.len());
    for (index, (input, step)) in steps.into_iter().enumerate() {
        let outcome = match step {
            Step::Wait => {
                tokio::time::sleep(recovery).await;
                "wait"
            }
            Step::Success => describe(breaker.execute(|| async { Ok(()) }).await),
            Step::Failure => describe(
                breaker
                    .execute(|| async { Err::<(), _>(SimulatedError::Failure) })
                    .await,
            ),
            Step::Timeout => describe(
                breaker
                    .execute(|| async {
                        tokio::time::sleep(timeout * 2).await;
                        Ok::<(), SimulatedError>(())
                    })
                    .await,
            ),
            Step::Skipped => {
                let Some(message) = skip_message else {
                    bail!("preset {} does not skip any errors", options.preset);
                };
                match breaker
                    .execute(|| async { Err::<(), _>(SimulatedError::Ignorable(message)) })
                    .await
                {
                    Err(CircuitBreakerError::Operation(_)) => "skipped",
                    other => describe(other),
                }
            }
        };
        tracing::debug!(step = index + 1, %input, outcome, "Simulation step");

        reports.push(StepReport {
            step: index + 1,
            input,
            outcome,
            state: breaker.state(),
        });
    }

    let stats = registry
        .get_all_stats()
        .remove(BREAKER_NAME)
        .unwrap_or_else(|| breaker.stats());
    let transitions = transitions.lock().clone();

    Ok(SimulationReport {
        breaker: BREAKER_NAME.to_string(),
        preset: options.preset,
        steps: reports,
        transitions,
        stats,
    })
}

fn describe(result: Result<(), CircuitBreakerError<SimulatedError>>) -> &'static str {
    match result {
        Ok(()) => "success",
        Err(CircuitBreakerError::Open { .. }) => "blocked",
        Err(CircuitBreakerError::Timeout { .. }) => "timeout",
        Err(CircuitBreakerError::Operation(_)) => "failure",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(script: &str) -> SimulationOptions {
        SimulationOptions {
            preset: BreakerPreset::Email,
            script: script.to_string(),
            recovery_ms: 50,
            timeout_ms: 20,
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_simulation_trips_and_recovers() {
        let report = run(&options("FFFS.SS")).await.unwrap();

        let outcomes: Vec<&str> = report.steps.iter().map(|s| s.outcome).collect();
        assert_eq!(
            outcomes,
            vec!["failure", "failure", "failure", "blocked", "wait", "success", "success"]
        );
        assert_eq!(
            report.transitions,
            vec![CircuitState::Open, CircuitState::HalfOpen, CircuitState::Closed]
        );
        assert_eq!(report.stats.state, CircuitState::Closed);
        assert_eq!(report.stats.total_requests, 6);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_simulation_skips_and_timeouts() {
        let report = run(&options("K K T")).await.unwrap();

        let outcomes: Vec<&str> = report.steps.iter().map(|s| s.outcome).collect();
        assert_eq!(outcomes, vec!["skipped", "skipped", "timeout"]);
        assert_eq!(report.stats.total_failures, 1);
        assert_eq!(report.stats.state, CircuitState::Closed);
    }

    #[test]
    fn test_script_parsing() {
        assert!(parse_script("SFX").is_err());
        assert!(parse_script("   ").is_err());
        assert_eq!(parse_script("s f").unwrap().len(), 2);
    }
}
