//! Recommended breaker tuning per dependency class

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::types::CircuitBreakerConfig;
use crate::error::BreakwaterError;

/// Named configuration bundle for a class of dependency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BreakerPreset {
    Database,
    Api,
    Email,
    ExternalMarketplace,
    Upload,
}

/// Tuning values behind a preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PresetTuning {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    #[serde(with = "humantime_serde")]
    pub recovery_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Error message fragments that do not count as failures
    pub skip_patterns: &'static [&'static str],
}

impl BreakerPreset {
    pub const ALL: [BreakerPreset; 5] = [
        Self::Database,
        Self::Api,
        Self::Email,
        Self::ExternalMarketplace,
        Self::Upload,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Database => "database",
            Self::Api => "api",
            Self::Email => "email",
            Self::ExternalMarketplace => "external-marketplace",
            Self::Upload => "upload",
        }
    }

    pub fn tuning(&self) -> PresetTuning {
        match self {
            // Caller mistakes (missing rows, bad input) say nothing about database health
            Self::Database => PresetTuning {
                failure_threshold: 5,
                success_threshold: 2,
                recovery_timeout: Duration::from_secs(30),
                timeout: Duration::from_secs(10),
                skip_patterns: &["not found", "validation", "constraint"],
            },
            // 4xx responses are the client's fault
            Self::Api => PresetTuning {
                failure_threshold: 5,
                success_threshold: 3,
                recovery_timeout: Duration::from_secs(60),
                timeout: Duration::from_secs(30),
                skip_patterns: &["400", "401", "403", "404", "422"],
            },
            Self::Email => PresetTuning {
                failure_threshold: 3,
                success_threshold: 2,
                recovery_timeout: Duration::from_secs(300),
                timeout: Duration::from_secs(15),
                skip_patterns: &["invalid recipient", "invalid address"],
            },
            Self::ExternalMarketplace => PresetTuning {
                failure_threshold: 3,
                success_threshold: 2,
                recovery_timeout: Duration::from_secs(120),
                timeout: Duration::from_secs(20),
                skip_patterns: &["rate limit", "not found"],
            },
            Self::Upload => PresetTuning {
                failure_threshold: 3,
                success_threshold: 2,
                recovery_timeout: Duration::from_secs(60),
                timeout: Duration::from_secs(60),
                skip_patterns: &["too large", "unsupported file type"],
            },
        }
    }

    /// Build a breaker config from this preset
    pub fn config(&self) -> CircuitBreakerConfig {
        let tuning = self.tuning();
        CircuitBreakerConfig::default()
            .with_failure_threshold(tuning.failure_threshold)
            .with_success_threshold(tuning.success_threshold)
            .with_recovery_timeout(tuning.recovery_timeout)
            .with_timeout(tuning.timeout)
            .skip_messages_containing(tuning.skip_patterns)
    }
}

impl fmt::Display for BreakerPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BreakerPreset {
    type Err = BreakwaterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|preset| preset.as_str() == normalized)
            .ok_or_else(|| BreakwaterError::UnknownPreset(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preset_names_parse() {
        for preset in BreakerPreset::ALL {
            assert_eq!(preset.as_str().parse::<BreakerPreset>().unwrap(), preset);
        }
        assert_eq!(
            "External_Marketplace".parse::<BreakerPreset>().unwrap(),
            BreakerPreset::ExternalMarketplace
        );
        assert!(matches!(
            "mainframe".parse::<BreakerPreset>(),
            Err(BreakwaterError::UnknownPreset(_))
        ));
    }

    #[test]
    fn test_preset_configs_are_valid() {
        for preset in BreakerPreset::ALL {
            let config = preset.config();
            assert!(config.validate().is_ok(), "{} preset invalid", preset);
            assert!(config.should_skip.is_some());
            assert!(config.half_open_max_calls.is_none());
        }
    }

    #[test]
    fn test_email_preset_tuning() {
        let config = BreakerPreset::Email.config();
        assert_eq!(config.failure_threshold, 3);
        assert_eq!(config.recovery_timeout, Duration::from_secs(300));
        assert_eq!(config.timeout, Duration::from_secs(15));
    }
}
