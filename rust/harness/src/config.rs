//! Settings resolution: built-in defaults, then the optional TOML file, then
//! explicit command-line flags.

use std::path::Path;

use runexp_config::HarnessSettings;
use serde::Deserialize;

/// Raw config file contents (before merging).
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfigFile {
    #[serde(default = "empty_table")]
    harness: toml::Value,
}

fn empty_table() -> toml::Value {
    toml::Value::Table(toml::map::Map::new())
}

/// Merge two TOML tables, with `overlay` values taking precedence.
fn merge_toml(base: &toml::Value, overlay: &toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(base_map), toml::Value::Table(overlay_map)) => {
            let mut merged = base_map.clone();
            for (k, v) in overlay_map {
                merged.insert(
                    k.clone(),
                    if let Some(base_v) = base_map.get(k) {
                        merge_toml(base_v, v)
                    } else {
                        v.clone()
                    },
                );
            }
            toml::Value::Table(merged)
        }
        (_, overlay) => overlay.clone(),
    }
}

/// Read the `[harness]` table of a config file.
fn load_table(path: &Path) -> Result<toml::Value, ConfigError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Io(path.display().to_string(), e))?;
    let raw: RawConfigFile =
        toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
    Ok(raw.harness)
}

/// Resolve the settings of one sweep.
pub fn resolve(
    config_file: Option<&Path>,
    overrides: toml::Table,
) -> Result<HarnessSettings, ConfigError> {
    let file = match config_file {
        Some(path) => load_table(path)?,
        None => empty_table(),
    };
    let merged = merge_toml(&file, &toml::Value::Table(overrides));
    let settings: HarnessSettings = merged
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::Parse(e.to_string()))?;
    validate(&settings)?;
    Ok(settings)
}

fn validate(settings: &HarnessSettings) -> Result<(), ConfigError> {
    if settings.concurrency == 0 {
        return Err(ConfigError::Invalid("concurrency must be at least 1".into()));
    }
    if settings.timeout_secs == Some(0) {
        return Err(ConfigError::Invalid("timeout must be at least 1 second".into()));
    }
    if settings.output.trim().is_empty() {
        return Err(ConfigError::Invalid("output file name is empty".into()));
    }
    if settings.metrics.is_empty() && !settings.preserve_output {
        return Err(ConfigError::NothingToRecord);
    }
    Ok(())
}

/// Errors that can occur when resolving settings.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    Io(String, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("invalid settings: {0}")]
    Invalid(String),
    #[error(
        "at least one of --metrics or --preserve-output must be specified (otherwise no meaningful output would be generated)"
    )]
    NothingToRecord,
}
