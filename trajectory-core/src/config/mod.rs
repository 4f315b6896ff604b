//! Configuration loading. Mirrors the teacher's `Option<T>` +
//! `effective_*()` accessor pattern: every field is optional on disk, so
//! a config file only needs to name what it overrides, and callers
//! never match on `None` themselves.

mod engine_config;

pub use engine_config::{
    BatchConfig, EngineConfig, ExternalWorkerConfig, OutlierConfig, SpeedEventConfig, StayConfig,
    TransportModeConfig, TripConfig,
};

use crate::errors::storage_error::StorageError;
use std::path::Path;

/// Load an `EngineConfig` from a TOML file. Missing fields fall back to
/// their defaults via `#[serde(default)]`.
pub fn load_from_file(path: &Path) -> Result<EngineConfig, StorageError> {
    let contents = std::fs::read_to_string(path).map_err(|source| StorageError::Io {
        path: path.display().to_string(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| StorageError::ConfigParse {
        path: path.display().to_string(),
        message: source.to_string(),
    })
}
