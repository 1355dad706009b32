//! Pipeline tuning loaded from TOML.
//!
//! Scoring weights are fixed constants in `scoring`; only the operational
//! knobs below are configurable.
//!
//! ```toml
//! backend_timeout_ms = 5000
//! selection_threshold = 0.5
//! tie_epsilon = 0.05
//! tie_break_candidates = 3
//! default_step_timeout_secs = 300
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use opsgate_contracts::error::{OpsgateError, OpsgateResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Upper bound on one reasoning backend call. Elapsed means unavailable.
    pub backend_timeout_ms: u64,
    /// A top match at or above this score is selected without the backend.
    pub selection_threshold: f64,
    /// Candidates within this distance of the top score count as tied.
    pub tie_epsilon: f64,
    /// How many ranked candidates the backend sees for a low-score pick.
    pub tie_break_candidates: usize,
    /// Step timeout for tools that declare none.
    pub default_step_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            backend_timeout_ms: 5_000,
            selection_threshold: 0.5,
            tie_epsilon: 0.05,
            tie_break_candidates: 3,
            default_step_timeout_secs: 300,
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(s: &str) -> OpsgateResult<Self> {
        let config: PipelineConfig = toml::from_str(s).map_err(|e| OpsgateError::ConfigError {
            reason: format!("failed to parse pipeline TOML: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> OpsgateResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| OpsgateError::ConfigError {
            reason: format!("failed to read pipeline config '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> OpsgateResult<()> {
        let invalid = |reason: String| Err(OpsgateError::ConfigError { reason });
        if self.backend_timeout_ms == 0 {
            return invalid("backend_timeout_ms must be greater than zero".to_string());
        }
        if !(0.0..=1.0).contains(&self.selection_threshold) {
            return invalid(format!(
                "selection_threshold {} is outside [0, 1]",
                self.selection_threshold
            ));
        }
        if !(0.0..1.0).contains(&self.tie_epsilon) {
            return invalid(format!("tie_epsilon {} is outside [0, 1)", self.tie_epsilon));
        }
        if self.tie_break_candidates < 2 {
            return invalid("tie_break_candidates must be at least 2".to_string());
        }
        if self.default_step_timeout_secs == 0 {
            return invalid("default_step_timeout_secs must be greater than zero".to_string());
        }
        Ok(())
    }

    pub fn backend_timeout(&self) -> Duration {
        Duration::from_millis(self.backend_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_take_defaults() {
        let config = PipelineConfig::from_toml_str("backend_timeout_ms = 250").unwrap();
        assert_eq!(config.backend_timeout(), Duration::from_millis(250));
        assert_eq!(config.selection_threshold, 0.5);
        assert_eq!(config.tie_break_candidates, 3);
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        match PipelineConfig::from_toml_str("selection_threshold = 1.5") {
            Err(OpsgateError::ConfigError { reason }) => assert!(reason.contains("selection_threshold")),
            other => panic!("expected ConfigError, got {:?}", other),
        }
    }

    #[test]
    fn zero_timeout_is_rejected() {
        assert!(PipelineConfig::from_toml_str("backend_timeout_ms = 0").is_err());
    }

    #[test]
    fn malformed_toml_is_config_error() {
        let err = PipelineConfig::from_toml_str("selection_threshold = [").unwrap_err();
        assert_eq!(err.kind(), "config_error");
    }
}
