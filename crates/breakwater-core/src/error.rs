//! Error types for Breakwater

use thiserror::Error;

/// Result type alias for Breakwater configuration operations
pub type BreakwaterResult<T> = Result<T, BreakwaterError>;

/// Main error type for Breakwater configuration and setup
///
/// Runtime failures of protected calls are reported through
/// [`CircuitBreakerError`](crate::circuit_breaker::CircuitBreakerError) instead.
#[derive(Error, Debug, Clone)]
pub enum BreakwaterError {
    /// Invalid breaker configuration
    #[error("Configuration error{}: {message}", breaker_suffix(.breaker))]
    Config {
        message: String,
        breaker: Option<String>,
    },

    /// IO errors while reading settings
    #[error("IO error: {message}")]
    Io {
        message: String,
        path: Option<String>,
    },

    /// Settings file could not be parsed
    #[error("Parse error: {message}")]
    Parse { message: String },

    /// Preset name not recognised
    #[error("Unknown preset: {0}")]
    UnknownPreset(String),
}

fn breaker_suffix(breaker: &Option<String>) -> String {
    match breaker {
        Some(name) => format!(" for breaker '{}'", name),
        None => String::new(),
    }
}

impl BreakwaterError {
    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            breaker: None,
        }
    }

    /// Attach the breaker name to a configuration error
    pub fn for_breaker(self, name: impl Into<String>) -> Self {
        match self {
            Self::Config { message, .. } => Self::Config {
                message,
                breaker: Some(name.into()),
            },
            other => other,
        }
    }

    /// Create a new IO error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
            path: None,
        }
    }

    /// Create a new IO error with the offending path
    pub fn io_with_path(message: impl Into<String>, path: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
            path: Some(path.into()),
        }
    }

    /// Create a new parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for BreakwaterError {
    fn from(error: std::io::Error) -> Self {
        Self::io(error.to_string())
    }
}

impl From<toml::de::Error> for BreakwaterError {
    fn from(error: toml::de::Error) -> Self {
        Self::parse(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = BreakwaterError::config("failure_threshold must be at least 1");
        assert_eq!(
            err.to_string(),
            "Configuration error: failure_threshold must be at least 1"
        );

        let err = err.for_breaker("payments");
        assert_eq!(
            err.to_string(),
            "Configuration error for breaker 'payments': failure_threshold must be at least 1"
        );
    }

    #[test]
    fn test_for_breaker_leaves_other_variants() {
        let err = BreakwaterError::parse("bad toml").for_breaker("payments");
        assert!(matches!(err, BreakwaterError::Parse { .. }));
    }
}
