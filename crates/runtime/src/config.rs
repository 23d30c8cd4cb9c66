//! Runtime configuration, deserialized from TOML.
//!
//! Mirrors the shape of the teacher's `compiler/src/config.rs`: a small
//! struct external callers can load to override defaults without touching
//! code, plus a `Default` impl so every field is optional in the file.

use serde::Deserialize;
use std::fmt;
use std::path::Path;

/// When a connection enters `calibrate` mode, whether the very first
/// sample alone is enough to seed `src_min == src_max`, or whether the
/// connection should wait for a second, distinct sample before trusting
/// the range (guards against a single noisy reading pinning both bounds).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationStart {
    FirstSample,
    SecondSample,
}

impl Default for CalibrationStart {
    fn default() -> Self {
        CalibrationStart::FirstSample
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// History depth a connection starts with before any expression asks
    /// for more via its `input_history_size`/`output_history_size`.
    pub default_history_depth: usize,
    /// Boundary action applied to a destination lane's lower bound when
    /// no `@boundMin` property has arrived yet.
    pub default_bound_min: crate::boundary::BoundaryAction,
    /// Boundary action applied to a destination lane's upper bound when
    /// no `@boundMax` property has arrived yet.
    pub default_bound_max: crate::boundary::BoundaryAction,
    pub calibration_start: CalibrationStart,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            default_history_depth: 1,
            default_bound_min: crate::boundary::BoundaryAction::None,
            default_bound_max: crate::boundary::BoundaryAction::None,
            calibration_start: CalibrationStart::FirstSample,
        }
    }
}

impl RuntimeConfig {
    pub fn from_toml(text: &str) -> Result<RuntimeConfig, toml::de::Error> {
        toml::from_str(text)
    }

    /// Load from a file on disk, for the `mapperd --config` flag.
    pub fn from_toml_file(path: &Path) -> Result<RuntimeConfig, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read { path: path.to_path_buf(), source: e })?;
        RuntimeConfig::from_toml(&text).map_err(|e| ConfigError::Parse { path: path.to_path_buf(), source: e })
    }
}

/// Errors reading a `RuntimeConfig` from disk.
#[derive(Debug)]
pub enum ConfigError {
    Read { path: std::path::PathBuf, source: std::io::Error },
    Parse { path: std::path::PathBuf, source: toml::de::Error },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read { path, source } => write!(f, "error reading config {}: {source}", path.display()),
            ConfigError::Parse { path, source } => write!(f, "error parsing config {}: {source}", path.display()),
        }
    }
}

impl std::error::Error for ConfigError {}
