//! Engine configuration.
//!
//! Loaded from TOML; every field has a default, so an empty file is valid.
//!
//! ```toml
//! recursion_threshold = 100
//! unbounded_initial_capacity = 512
//! ```

use crate::cache::DEFAULT_UNBOUNDED_CAPACITY;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Gap between a requested index and the highest cached index above which a
/// recursive indicator fills the gap iteratively instead of recursing.
pub const DEFAULT_RECURSION_THRESHOLD: usize = 100;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Tuning knobs shared by the indicators of one engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Any value is correct; it only bounds call depth on the direct path.
    /// Zero prefills on every miss.
    pub recursion_threshold: usize,

    /// Initial slot reservation for caches over unbounded series.
    pub unbounded_initial_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            recursion_threshold: DEFAULT_RECURSION_THRESHOLD,
            unbounded_initial_capacity: DEFAULT_UNBOUNDED_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// Load a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}
