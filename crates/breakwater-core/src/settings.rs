//! Breaker settings loaded from TOML
//!
//! Each breaker is resolved in layers: preset (or built-in defaults), then the
//! `[defaults]` table, then the breaker's own table.
//!
//! ```toml
//! [defaults]
//! timeout = "5s"
//!
//! [breakers.payments]
//! preset = "external-marketplace"
//! failure_threshold = 4
//!
//! [breakers.search]
//! recovery_timeout = "10s"
//! skip_errors_containing = ["cancelled"]
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::circuit_breaker::{
    BreakerPreset, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerRegistry,
};
use crate::error::{BreakwaterError, BreakwaterResult};

/// Optional overrides for one breaker (or for all, under `[defaults]`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BreakerOverrides {
    #[serde(default)]
    pub preset: Option<BreakerPreset>,
    #[serde(default)]
    pub failure_threshold: Option<u32>,
    #[serde(default)]
    pub success_threshold: Option<u32>,
    #[serde(default, with = "humantime_serde")]
    pub recovery_timeout: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
    #[serde(default)]
    pub half_open_max_calls: Option<u32>,
    /// Extra error message fragments excluded from failure counting
    #[serde(default)]
    pub skip_errors_containing: Vec<String>,
}

impl BreakerOverrides {
    fn apply(&self, mut config: CircuitBreakerConfig) -> CircuitBreakerConfig {
        if let Some(v) = self.failure_threshold {
            config.failure_threshold = v;
        }
        if let Some(v) = self.success_threshold {
            config.success_threshold = v;
        }
        if let Some(v) = self.recovery_timeout {
            config.recovery_timeout = v;
        }
        if let Some(v) = self.timeout {
            config.timeout = v;
        }
        if self.half_open_max_calls.is_some() {
            config.half_open_max_calls = self.half_open_max_calls;
        }
        if !self.skip_errors_containing.is_empty() {
            let patterns: Vec<String> = self
                .skip_errors_containing
                .iter()
                .map(|p| p.to_lowercase())
                .collect();
            let base = config.should_skip.take();
            config.should_skip = Some(Arc::new(move |error: &(dyn std::error::Error + 'static)| {
                if base.as_ref().is_some_and(|skip| skip(error)) {
                    return true;
                }
                let message = error.to_string().to_lowercase();
                patterns.iter().any(|p| message.contains(p.as_str()))
            }));
        }
        config
    }
}

/// Breaker settings file contents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BreakerSettings {
    #[serde(default)]
    pub defaults: BreakerOverrides,
    #[serde(default)]
    pub breakers: BTreeMap<String, BreakerOverrides>,
}

/// Printable view of a resolved breaker config
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigSummary {
    pub preset: Option<BreakerPreset>,
    pub failure_threshold: u32,
    pub success_threshold: u32,
    #[serde(with = "humantime_serde")]
    pub recovery_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    pub half_open_max_calls: Option<u32>,
    pub skips_errors: bool,
}

impl BreakerSettings {
    pub fn from_toml_str(content: &str) -> BreakwaterResult<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> BreakwaterResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            BreakwaterError::io_with_path(
                format!("Failed to read settings file: {}", e),
                path.display().to_string(),
            )
        })?;
        let settings = Self::from_toml_str(&content)?;
        tracing::debug!(
            path = %path.display(),
            breakers = settings.breakers.len(),
            "Loaded breaker settings"
        );
        Ok(settings)
    }

    fn preset_for(&self, overrides: &BreakerOverrides) -> Option<BreakerPreset> {
        overrides.preset.or(self.defaults.preset)
    }

    /// Resolve the config for `name`; unknown names get the defaults only
    pub fn resolve(&self, name: &str) -> BreakwaterResult<CircuitBreakerConfig> {
        let empty = BreakerOverrides::default();
        let overrides = self.breakers.get(name).unwrap_or(&empty);

        let base = match self.preset_for(overrides) {
            Some(preset) => preset.config(),
            None => CircuitBreakerConfig::default(),
        };
        let config = overrides.apply(self.defaults.apply(base));
        config.validate().map_err(|e| e.for_breaker(name))?;
        Ok(config)
    }

    /// Resolve every configured breaker
    pub fn build_configs(&self) -> BreakwaterResult<BTreeMap<String, CircuitBreakerConfig>> {
        self.breakers
            .keys()
            .map(|name| -> BreakwaterResult<(String, CircuitBreakerConfig)> {
                Ok((name.clone(), self.resolve(name)?))
            })
            .collect()
    }

    pub fn summaries(&self) -> BreakwaterResult<BTreeMap<String, ConfigSummary>> {
        self.breakers
            .iter()
            .map(|(name, overrides)| -> BreakwaterResult<(String, ConfigSummary)> {
                let config = self.resolve(name)?;
                Ok((
                    name.clone(),
                    ConfigSummary {
                        preset: self.preset_for(overrides),
                        failure_threshold: config.failure_threshold,
                        success_threshold: config.success_threshold,
                        recovery_timeout: config.recovery_timeout,
                        timeout: config.timeout,
                        half_open_max_calls: config.half_open_max_calls,
                        skips_errors: config.should_skip.is_some(),
                    },
                ))
            })
            .collect()
    }

    /// Register every configured breaker; nothing is registered if any config is invalid
    pub fn register_all(
        &self,
        registry: &CircuitBreakerRegistry,
    ) -> BreakwaterResult<Vec<Arc<CircuitBreaker>>> {
        let configs = self.build_configs()?;
        Ok(configs
            .into_iter()
            .map(|(name, config)| registry.get_or_create(&name, config))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[derive(Debug, thiserror::Error)]
    #[error("{0}")]
    struct TestError(String);

    const SAMPLE: &str = r#"
[defaults]
timeout = "5s"

[breakers.payments]
preset = "external-marketplace"
failure_threshold = 4

[breakers.search]
recovery_timeout = "10s"
half_open_max_calls = 1
skip_errors_containing = ["Cancelled"]
"#;

    #[test]
    fn test_layering() {
        let settings = BreakerSettings::from_toml_str(SAMPLE).unwrap();

        let payments = settings.resolve("payments").unwrap();
        assert_eq!(payments.failure_threshold, 4);
        assert_eq!(payments.success_threshold, 2);
        assert_eq!(payments.recovery_timeout, Duration::from_secs(120));
        assert_eq!(payments.timeout, Duration::from_secs(5));

        let search = settings.resolve("search").unwrap();
        assert_eq!(search.failure_threshold, 5);
        assert_eq!(search.recovery_timeout, Duration::from_secs(10));
        assert_eq!(search.timeout, Duration::from_secs(5));
        assert_eq!(search.half_open_max_calls, Some(1));
    }

    #[test]
    fn test_skip_patterns_extend_preset() {
        let settings = BreakerSettings::from_toml_str(
            r#"
[breakers.github]
preset = "api"
skip_errors_containing = ["maintenance"]
"#,
        )
        .unwrap();
        let config = settings.resolve("github").unwrap();

        assert!(config.skips(&TestError("404 not found".into())));
        assert!(config.skips(&TestError("Scheduled MAINTENANCE".into())));
        assert!(!config.skips(&TestError("500 internal".into())));
    }

    #[test]
    fn test_invalid_config_names_breaker() {
        let settings = BreakerSettings::from_toml_str(
            r#"
[breakers.broken]
failure_threshold = 0
"#,
        )
        .unwrap();

        let err = settings.build_configs().unwrap_err();
        assert!(err.to_string().contains("'broken'"));

        let registry = CircuitBreakerRegistry::new();
        assert!(settings.register_all(&registry).is_err());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_huge_recovery_timeout_trips_without_panicking() {
        let settings = BreakerSettings::from_toml_str(
            r#"
[breakers.slow]
failure_threshold = 1
recovery_timeout = "500000000000years"
"#,
        )
        .unwrap();
        let breaker = CircuitBreaker::with_config("slow", settings.resolve("slow").unwrap());

        let result: Result<(), _> = breaker
            .execute(|| async { Err(TestError("down".into())) })
            .await;
        assert!(matches!(result, Err(crate::CircuitBreakerError::Operation(_))));
        assert!(!breaker.is_healthy());
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let err = BreakerSettings::from_toml_str(
            r#"
[breakers.x]
failure_treshold = 3
"#,
        )
        .unwrap_err();
        assert!(matches!(err, BreakwaterError::Parse { .. }));
    }

    #[test]
    fn test_unknown_preset_rejected() {
        assert!(BreakerSettings::from_toml_str("[breakers.x]\npreset = \"mainframe\"\n").is_err());
    }

    #[test]
    fn test_register_all_and_summaries() {
        let settings = BreakerSettings::from_toml_str(SAMPLE).unwrap();
        let registry = CircuitBreakerRegistry::new();

        let breakers = settings.register_all(&registry).unwrap();
        assert_eq!(breakers.len(), 2);
        assert_eq!(registry.names(), vec!["payments", "search"]);

        let summaries = settings.summaries().unwrap();
        assert_eq!(
            summaries["payments"].preset,
            Some(BreakerPreset::ExternalMarketplace)
        );
        assert!(summaries["search"].skips_errors);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let settings = BreakerSettings::from_file(file.path()).unwrap();
        assert_eq!(settings.breakers.len(), 2);

        let missing = BreakerSettings::from_file("/nonexistent/breakwater.toml").unwrap_err();
        assert!(matches!(missing, BreakwaterError::Io { path: Some(_), .. }));
    }
}
