//! Compiler and runtime options
//!
//! Both option sets deserialize from TOML (missing keys take their defaults)
//! and can be overridden from the environment.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::defaults::{
    CLASS_VALUE_ENV, COMPILER_ENV_PREFIX, DEFAULT_CLASS_VALUE_SEGMENTS, DEFAULT_TOLERANCE,
};

/// Options loading errors
#[derive(Debug, Error)]
pub enum OptionsError {
    #[error("Failed to read options file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid options: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },
}

/// Options of the semantic pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerOptions {
    /// Stop collecting after this many errors (0 = unlimited)
    pub tolerance: usize,
    /// Fold `static final` references in annotation attributes
    pub inline_constants: bool,
    /// Allow cached dynamic call sites; when off every dynamic call is reflective
    pub call_site_caching: bool,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            inline_constants: true,
            call_site_caching: true,
        }
    }
}

impl CompilerOptions {
    pub fn from_toml_str(source: &str) -> Result<Self, OptionsError> {
        Ok(toml::from_str(source)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, OptionsError> {
        Self::from_toml_str(&read_file(path.as_ref())?)
    }

    /// Apply `TERN_COMPILER_*` overrides from the process environment
    pub fn with_env_overrides(self) -> Result<Self, OptionsError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup (used by tests)
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, OptionsError> {
        let key = format!("{}TOLERANCE", COMPILER_ENV_PREFIX);
        if let Some(value) = lookup(&key) {
            self.tolerance = value
                .parse()
                .map_err(|_| OptionsError::InvalidValue { key, value })?;
        }
        let key = format!("{}INLINE_CONSTANTS", COMPILER_ENV_PREFIX);
        if let Some(value) = lookup(&key) {
            self.inline_constants = parse_bool(&key, value)?;
        }
        let key = format!("{}CALL_SITE_CACHING", COMPILER_ENV_PREFIX);
        if let Some(value) = lookup(&key) {
            self.call_site_caching = parse_bool(&key, value)?;
        }
        Ok(self)
    }
}

/// Backing strategy of class-keyed value caches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassValueStrategy {
    /// Identity-keyed slot stored on the runtime class
    Slot,
    /// Segmented map with weak class keys
    Map,
}

impl ClassValueStrategy {
    /// Pick the strategy from `TERN_CLASS_VALUE`; defaults to `Slot`
    pub fn detect() -> Self {
        Self::detect_from(std::env::var(CLASS_VALUE_ENV).ok().as_deref())
    }

    pub fn detect_from(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("map") => ClassValueStrategy::Map,
            Some(v) if !v.is_empty() && !v.eq_ignore_ascii_case("slot") => {
                tracing::debug!(value = v, "unknown class-value strategy, using slot");
                ClassValueStrategy::Slot
            }
            _ => ClassValueStrategy::Slot,
        }
    }
}

/// Options of the reflective runtime
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeOptions {
    /// Pinned strategy; `None` means detect once at startup
    pub class_value_strategy: Option<ClassValueStrategy>,
    /// Segment count of the map strategy (rounded up to a power of two)
    pub class_value_segments: usize,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            class_value_strategy: None,
            class_value_segments: DEFAULT_CLASS_VALUE_SEGMENTS,
        }
    }
}

impl RuntimeOptions {
    pub fn from_toml_str(source: &str) -> Result<Self, OptionsError> {
        Ok(toml::from_str(source)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, OptionsError> {
        Self::from_toml_str(&read_file(path.as_ref())?)
    }

    /// The pinned strategy, or the detected one
    pub fn strategy(&self) -> ClassValueStrategy {
        self.class_value_strategy
            .unwrap_or_else(ClassValueStrategy::detect)
    }

    pub fn segments(&self) -> usize {
        self.class_value_segments.max(1).next_power_of_two()
    }
}

fn read_file(path: &Path) -> Result<String, OptionsError> {
    std::fs::read_to_string(path).map_err(|source| OptionsError::Io {
        path: path.display().to_string(),
        source,
    })
}

fn parse_bool(key: &str, value: String) -> Result<bool, OptionsError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(OptionsError::InvalidValue {
            key: key.to_string(),
            value,
        }),
    }
}
