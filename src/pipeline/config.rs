//! Pipeline configuration, loadable from and writable to JSON files.

use super::error::ConfigError;
use crate::sandbox::{ExecutionLimits, SandboxExecutor};
use crate::transform::TransformOptions;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Smallest worker stack that still fits the interpreter's nesting limit.
pub const MIN_STACK_SIZE: usize = 16 * 1024 * 1024;

/// Everything a [`Pipeline`](super::Pipeline) needs to know.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Bounds for each execution.
    pub limits: ExecutionLimits,
    /// Rewrite rules applied before execution.
    pub transform: TransformOptions,
    /// Include the pretty-printed syntax tree in responses.
    pub include_ast: bool,
    /// Seed for `Math.random`.
    pub random_seed: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            limits: ExecutionLimits::default(),
            transform: TransformOptions::default(),
            include_ast: true,
            random_seed: SandboxExecutor::DEFAULT_SEED,
        }
    }
}

impl PipelineConfig {
    /// Read a configuration file; missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: PipelineConfig =
            serde_json::from_slice(&data).context("Failed to deserialize config")?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self).context("Failed to serialize config")?;
        fs::write(path, json).with_context(|| format!("Failed to write config {}", path.display()))?;
        Ok(())
    }

    /// Reject values the sandbox cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let limits = &self.limits;
        if limits.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        for (name, value) in [
            ("max_heap_objects", limits.max_heap_objects),
            ("max_call_depth", limits.max_call_depth),
            ("max_output_lines", limits.max_output_lines),
            ("max_output_bytes", limits.max_output_bytes),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroLimit(name));
            }
        }
        if limits.stack_size < MIN_STACK_SIZE {
            return Err(ConfigError::StackTooSmall {
                minimum: MIN_STACK_SIZE,
                actual: limits.stack_size,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn defaults_match_the_five_second_limit() {
        let config = PipelineConfig::default();
        assert_eq!(config.limits.timeout, Duration::from_secs(5));
        assert!(config.include_ast);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_files_fill_in_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("jsbox.json");
        fs::write(&path, r#"{ "limits": { "timeout_ms": 250 }, "include_ast": false }"#).unwrap();

        let config = PipelineConfig::load(&path).unwrap();
        assert_eq!(config.limits.timeout, Duration::from_millis(250));
        assert_eq!(config.limits.max_call_depth, ExecutionLimits::default().max_call_depth);
        assert!(!config.include_ast);
        assert_eq!(config.transform, TransformOptions::default());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut config = PipelineConfig::default();
        config.limits.max_output_lines = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroLimit("max_output_lines")));

        let temp = TempDir::new().unwrap();
        let path = temp.path().join("zero.json");
        fs::write(&path, r#"{ "limits": { "timeout_ms": 0 } }"#).unwrap();
        let err = PipelineConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("timeout"));
    }
}
