//! Engine configuration.
//!
//! Values come from the environment (`DUNNING_MAX_RETRIES`, `DUNNING_WORKERS`)
//! and can be overridden by the CLI.

/// Default number of delivery attempts per concrete notification channel.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Tuning knobs shared by the rule engine and the notification dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Delivery attempts per concrete channel before giving up.
    pub max_retries: u32,
    /// Customers processed concurrently during a batch run. `1` is sequential.
    pub worker_count: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            worker_count: 1,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let max_retries = parse_var("DUNNING_MAX_RETRIES", DEFAULT_MAX_RETRIES)?;
        let worker_count = parse_var("DUNNING_WORKERS", 1usize)?;

        Self::default()
            .with_max_retries(max_retries)
            .with_worker_count(worker_count)
            .validated()
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Rejects settings the engine cannot run with.
    pub fn validated(self) -> Result<Self, ConfigError> {
        if self.max_retries == 0 {
            return Err(ConfigError::Invalid("DUNNING_MAX_RETRIES"));
        }
        if self.worker_count == 0 {
            return Err(ConfigError::Invalid("DUNNING_WORKERS"));
        }
        Ok(self)
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(name)),
        Err(std::env::VarError::NotPresent) => Ok(default),
        Err(std::env::VarError::NotUnicode(_)) => Err(ConfigError::Invalid(name)),
    }
}

/// Configuration error
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum ConfigError {
    #[error("Invalid value for setting: {0}")]
    #[diagnostic(help("expected a positive integer"))]
    Invalid(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.worker_count, 1);
    }

    #[test]
    fn test_builder_overrides() {
        let config = EngineConfig::default()
            .with_max_retries(5)
            .with_worker_count(8)
            .validated()
            .unwrap();
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.worker_count, 8);
    }

    #[test]
    fn test_zero_values_rejected() {
        assert!(matches!(
            EngineConfig::default().with_max_retries(0).validated(),
            Err(ConfigError::Invalid("DUNNING_MAX_RETRIES"))
        ));
        assert!(matches!(
            EngineConfig::default().with_worker_count(0).validated(),
            Err(ConfigError::Invalid("DUNNING_WORKERS"))
        ));
    }
}
