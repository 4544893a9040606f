//! # Strata Runtime Configuration
//!
//! [`RuntimeConfig`] holds the knobs of the runtime. It can be read from JSON,
//! YAML (`yaml-config` feature) or TOML (`toml-config` feature); the format is
//! picked from the file extension and missing keys take their defaults.
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::kernel::constants;
use crate::plugin_system::descriptor::{DescriptorDefaults, InitialState};
use crate::storage::error::StorageSystemError;

type Result<T> = std::result::Result<T, StorageSystemError>;

/// Supported configuration formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// JSON format (.json)
    Json,
    /// YAML format (.yaml, .yml) - requires "yaml-config" feature
    #[cfg(feature = "yaml-config")]
    Yaml,
    /// TOML format (.toml) - requires "toml-config" feature
    #[cfg(feature = "toml-config")]
    Toml,
}

impl ConfigFormat {
    /// Get the file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Json => "json",
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => "yaml",
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => "toml",
        }
    }

    /// Determine format from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Determine format from an extension or format name such as `yml`
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "json" => Some(ConfigFormat::Json),
            #[cfg(feature = "yaml-config")]
            "yaml" | "yml" => Some(ConfigFormat::Yaml),
            #[cfg(feature = "toml-config")]
            "toml" => Some(ConfigFormat::Toml),
            _ => None,
        }
    }
}

/// Runtime settings. Every field has a default, so an empty file is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Start level for manifests without `startLevel`
    pub default_start_level: i32,
    /// Initial state for manifests without `initializedState`
    pub default_initial_state: InitialState,
    /// Upper bound for a single `on_start` / `on_stop` call
    pub hook_timeout_ms: u64,
    /// Directory holding one subdirectory per plugin
    pub plugins_dir: PathBuf,
    pub manifest_file_name: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            default_start_level: constants::DEFAULT_START_LEVEL,
            default_initial_state: InitialState::Active,
            hook_timeout_ms: constants::DEFAULT_HOOK_TIMEOUT_MS,
            plugins_dir: PathBuf::from(constants::DEFAULT_PLUGINS_DIR),
            manifest_file_name: constants::PLUGIN_MANIFEST_FILE.to_string(),
        }
    }
}

impl RuntimeConfig {
    pub fn hook_timeout(&self) -> Duration {
        Duration::from_millis(self.hook_timeout_ms)
    }

    pub fn descriptor_defaults(&self) -> DescriptorDefaults {
        DescriptorDefaults {
            start_level: self.default_start_level,
            initial_state: self.default_initial_state,
        }
    }

    /// Reject values the runtime cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.hook_timeout_ms == 0 {
            return Err(StorageSystemError::InvalidValue {
                key: "hook_timeout_ms".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.manifest_file_name.trim().is_empty() {
            return Err(StorageSystemError::InvalidValue {
                key: "manifest_file_name".to_string(),
                reason: "can not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Serialize to string based on format
    pub fn serialize(&self, format: ConfigFormat) -> Result<String> {
        match format {
            ConfigFormat::Json => serde_json::to_string_pretty(self).map_err(|e| serialization_error("JSON", e)),
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => serde_yaml::to_string(self).map_err(|e| serialization_error("YAML", e)),
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => toml::to_string_pretty(self).map_err(|e| serialization_error("TOML", e)),
        }
    }

    /// Deserialize and validate from string based on format
    pub fn deserialize(data: &str, format: ConfigFormat) -> Result<Self> {
        let config: RuntimeConfig = match format {
            ConfigFormat::Json => serde_json::from_str(data).map_err(|e| deserialization_error("JSON", e))?,
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => {
                // serde_yaml reads an empty document as null rather than an empty map
                if data.trim().is_empty() {
                    RuntimeConfig::default()
                } else {
                    serde_yaml::from_str(data).map_err(|e| deserialization_error("YAML", e))?
                }
            }
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => toml::from_str(data).map_err(|e| deserialization_error("TOML", e))?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file, picking the format from its extension
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path)
            .ok_or_else(|| StorageSystemError::UnsupportedConfigFormat(path.display().to_string()))?;

        let data = tokio::fs::read_to_string(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StorageSystemError::FileNotFound(path.to_path_buf()),
            _ => StorageSystemError::io(e, "read_config", path.to_path_buf()),
        })?;

        let config = Self::deserialize(&data, format)?;
        log::debug!("Loaded runtime configuration from {}", path.display());
        Ok(config)
    }
}

fn serialization_error(format: &str, e: impl std::error::Error + Send + Sync + 'static) -> StorageSystemError {
    StorageSystemError::SerializationError {
        format: format.to_string(),
        source: Box::new(e),
    }
}

fn deserialization_error(format: &str, e: impl std::error::Error + Send + Sync + 'static) -> StorageSystemError {
    StorageSystemError::DeserializationError {
        format: format.to_string(),
        source: Box::new(e),
    }
}
