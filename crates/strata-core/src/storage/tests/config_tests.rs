// crates/strata-core/src/storage/tests/config_tests.rs
#![cfg(test)]

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::tempdir;

use crate::plugin_system::descriptor::InitialState;
use crate::storage::config::{ConfigFormat, RuntimeConfig};
use crate::storage::error::StorageSystemError;

#[test]
fn test_defaults() {
    let config = RuntimeConfig::default();
    assert_eq!(config.default_start_level, 50);
    assert_eq!(config.default_initial_state, InitialState::Active);
    assert_eq!(config.hook_timeout(), Duration::from_millis(5000));
    assert_eq!(config.plugins_dir, PathBuf::from("plugins"));
    assert_eq!(config.manifest_file_name, "plugin.json");
    assert!(config.validate().is_ok());

    let defaults = config.descriptor_defaults();
    assert_eq!(defaults.start_level, 50);
    assert_eq!(defaults.initial_state, InitialState::Active);
}

#[test]
fn test_format_from_path() {
    assert_eq!(ConfigFormat::from_path(Path::new("strata.json")), Some(ConfigFormat::Json));
    assert_eq!(ConfigFormat::from_path(Path::new("STRATA.JSON")), Some(ConfigFormat::Json));
    assert_eq!(ConfigFormat::from_path(Path::new("strata.ini")), None);
    assert_eq!(ConfigFormat::from_path(Path::new("strata")), None);
    #[cfg(feature = "yaml-config")]
    assert_eq!(ConfigFormat::from_path(Path::new("strata.yml")), Some(ConfigFormat::Yaml));
    #[cfg(feature = "toml-config")]
    assert_eq!(ConfigFormat::from_path(Path::new("strata.toml")), Some(ConfigFormat::Toml));
}

#[test]
fn test_json_with_missing_keys_takes_defaults() {
    let config = RuntimeConfig::deserialize(r#"{"hook_timeout_ms": 250}"#, ConfigFormat::Json).unwrap();
    assert_eq!(config.hook_timeout_ms, 250);
    assert_eq!(config.default_start_level, 50);

    let empty = RuntimeConfig::deserialize("{}", ConfigFormat::Json).unwrap();
    assert_eq!(empty, RuntimeConfig::default());
}

#[test]
fn test_zero_timeout_is_rejected() {
    let err = RuntimeConfig::deserialize(r#"{"hook_timeout_ms": 0}"#, ConfigFormat::Json).unwrap_err();
    assert!(matches!(err, StorageSystemError::InvalidValue { ref key, .. } if key == "hook_timeout_ms"));

    let err = RuntimeConfig::deserialize(r#"{"manifest_file_name": " "}"#, ConfigFormat::Json).unwrap_err();
    assert!(matches!(err, StorageSystemError::InvalidValue { .. }));
}

#[test]
fn test_bad_json_is_a_deserialization_error() {
    let err = RuntimeConfig::deserialize(r#"{"hook_timeout_ms": "soon"}"#, ConfigFormat::Json).unwrap_err();
    assert!(matches!(err, StorageSystemError::DeserializationError { ref format, .. } if format == "JSON"));
}

#[cfg(feature = "yaml-config")]
#[test]
fn test_yaml_round_trip() {
    let config = RuntimeConfig::deserialize(
        "default_start_level: 10\ndefault_initial_state: installed\nplugins_dir: /opt/plugins\n",
        ConfigFormat::Yaml,
    )
    .unwrap();
    assert_eq!(config.default_start_level, 10);
    assert_eq!(config.default_initial_state, InitialState::Installed);
    assert_eq!(config.plugins_dir, PathBuf::from("/opt/plugins"));

    let text = config.serialize(ConfigFormat::Yaml).unwrap();
    assert_eq!(RuntimeConfig::deserialize(&text, ConfigFormat::Yaml).unwrap(), config);
    assert_eq!(RuntimeConfig::deserialize("", ConfigFormat::Yaml).unwrap(), RuntimeConfig::default());
}

#[cfg(feature = "toml-config")]
#[test]
fn test_toml_round_trip() {
    let config = RuntimeConfig::deserialize("hook_timeout_ms = 1500\n", ConfigFormat::Toml).unwrap();
    assert_eq!(config.hook_timeout(), Duration::from_millis(1500));

    let text = config.serialize(ConfigFormat::Toml).unwrap();
    assert!(text.contains("hook_timeout_ms = 1500"));
    assert_eq!(RuntimeConfig::deserialize(&text, ConfigFormat::Toml).unwrap(), config);
}

#[tokio::test]
async fn test_load_from_file() {
    let tmp_dir = tempdir().expect("Failed to create temp directory");
    let path = tmp_dir.path().join("strata.json");
    fs::write(&path, r#"{"plugins_dir": "extensions"}"#).unwrap();

    let config = RuntimeConfig::load(&path).await.unwrap();
    assert_eq!(config.plugins_dir, PathBuf::from("extensions"));
}

#[tokio::test]
async fn test_load_errors() {
    let tmp_dir = tempdir().expect("Failed to create temp directory");

    let err = RuntimeConfig::load(tmp_dir.path().join("absent.json")).await.unwrap_err();
    assert!(matches!(err, StorageSystemError::FileNotFound(_)));

    let ini = tmp_dir.path().join("strata.ini");
    fs::write(&ini, "x=1").unwrap();
    let err = RuntimeConfig::load(&ini).await.unwrap_err();
    assert!(matches!(err, StorageSystemError::UnsupportedConfigFormat(_)));
}
