//! Run configuration.
//!
//! Stored as JSON; every field is optional and falls back to its default.
//!
//! ```json
//! { "stack_size": 64, "instruction_limit": 100000 }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::machine::stack::STACK_SIZE;

/// Default ceiling on executed instructions.
pub const INSTRUCTION_LIMIT: u64 = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    /// Maximum depth of the data stack.
    pub stack_size: usize,
    /// The run stops cleanly once this many instructions have executed.
    pub instruction_limit: u64,
}

impl MachineConfig {
    /// Load a configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.stack_size == 0 {
            return Err(ConfigError::Invalid("stack_size must be at least 1".into()));
        }
        Ok(())
    }
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            stack_size: STACK_SIZE,
            instruction_limit: INSTRUCTION_LIMIT,
        }
    }
}

/// Errors that can occur while loading a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("parse error: {0}")]
    ParseError(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MachineConfig::default();
        assert_eq!(config.stack_size, 64);
        assert_eq!(config.instruction_limit, 100_000);
    }

    #[test]
    fn test_partial_file() {
        let config = MachineConfig::from_json(r#"{ "instruction_limit": 50 }"#).unwrap();
        assert_eq!(config.instruction_limit, 50);
        assert_eq!(config.stack_size, STACK_SIZE);
    }

    #[test]
    fn test_rejects_empty_stack() {
        assert!(matches!(
            MachineConfig::from_json(r#"{ "stack_size": 0 }"#),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_malformed() {
        assert!(matches!(
            MachineConfig::from_json("{ stack_size: 1 }"),
            Err(ConfigError::ParseError(_))
        ));
    }
}
