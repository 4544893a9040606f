// crates/strata-core/src/plugin_system/tests/loader_tests.rs
#![cfg(test)]

use std::fs;
use std::path::Path;
use std::sync::Arc;

use tempfile::tempdir;

use crate::plugin_system::descriptor::{DescriptorDefaults, InitialState};
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::loader::ManifestLoader;
use crate::plugin_system::traits::{ActivatorRegistry, NoopActivator};
use crate::plugin_system::version::SemanticVersion;

fn write_manifest(root: &Path, dir: &str, json: &str) {
    let plugin_dir = root.join(dir);
    fs::create_dir_all(&plugin_dir).expect("Failed to create plugin directory");
    fs::write(plugin_dir.join("plugin.json"), json).expect("Failed to write manifest");
}

#[test]
fn test_parse_full_manifest() {
    let mut registry = ActivatorRegistry::new();
    registry.register("ui.Activator", Arc::new(NoopActivator));
    let loader = ManifestLoader::new(registry);

    let descriptor = loader
        .parse_manifest(
            r#"{
                "id": "ui",
                "name": "User Interface",
                "description": "Main window",
                "version": "1.2",
                "startLevel": 20,
                "initializedState": "installed",
                "stoppable": false,
                "activator": "ui.Activator",
                "dependencies": [{"id": "core", "version": "1.0.0"}, {"id": "log"}],
                "services": [{"name": "window", "service": "ui.Window", "properties": {"modal": true}}],
                "extensions": [{"id": "core.menu", "data": {"label": "Open"}}]
            }"#,
            Path::new("ui/plugin.json"),
        )
        .unwrap();

    assert_eq!(descriptor.id(), "ui");
    assert_eq!(descriptor.name(), "User Interface");
    assert_eq!(descriptor.description(), "Main window");
    assert_eq!(descriptor.version(), &SemanticVersion::new(1, 2, 0));
    assert_eq!(descriptor.start_level(), 20);
    assert_eq!(descriptor.initial_state(), InitialState::Installed);
    assert!(!descriptor.is_stoppable());
    assert_eq!(descriptor.dependencies().len(), 2);
    assert_eq!(descriptor.dependencies()[1].min_version(), &SemanticVersion::zero());
    assert_eq!(descriptor.services()[0].properties["modal"], true);
    assert_eq!(descriptor.extensions()[0].id, "core.menu");
}

#[test]
fn test_parse_minimal_manifest_uses_defaults() {
    let defaults = DescriptorDefaults {
        start_level: 42,
        initial_state: InitialState::Active,
    };
    let loader = ManifestLoader::default().with_defaults(defaults);

    let descriptor = loader.parse_manifest(r#"{"id": "core"}"#, Path::new("plugin.json")).unwrap();

    assert_eq!(descriptor.name(), "core");
    assert_eq!(descriptor.description(), "core");
    assert_eq!(descriptor.version(), &SemanticVersion::zero());
    assert_eq!(descriptor.start_level(), 42);
    assert_eq!(descriptor.initial_state(), InitialState::Active);
    assert!(descriptor.is_stoppable());
}

#[test]
fn test_start_level_accepts_numeric_strings() {
    let loader = ManifestLoader::default();
    let descriptor = loader
        .parse_manifest(r#"{"id": "core", "startLevel": " 7 "}"#, Path::new("plugin.json"))
        .unwrap();
    assert_eq!(descriptor.start_level(), 7);

    let err = loader
        .parse_manifest(r#"{"id": "core", "startLevel": "soon"}"#, Path::new("core/plugin.json"))
        .unwrap_err();
    assert!(matches!(
        err,
        PluginSystemError::ManifestError { ref path, ref message, .. }
            if path == Path::new("core/plugin.json") && message.contains("startLevel")
    ));
}

#[test]
fn test_invalid_manifests_are_rejected() {
    let loader = ManifestLoader::default();
    let origin = Path::new("bad/plugin.json");

    let err = loader.parse_manifest("{ not json", origin).unwrap_err();
    assert!(matches!(err, PluginSystemError::ManifestError { .. }));

    let err = loader
        .parse_manifest(r#"{"id": "x", "initializedState": "running"}"#, origin)
        .unwrap_err();
    assert!(matches!(err, PluginSystemError::ManifestError { ref message, .. } if message.contains("installed")));

    let err = loader.parse_manifest(r#"{"name": "no id"}"#, origin).unwrap_err();
    assert!(matches!(err, PluginSystemError::InvalidDescriptor { .. }));

    let err = loader.parse_manifest(r#"{"id": "x", "version": "1.2.3.4"}"#, origin).unwrap_err();
    assert!(matches!(err, PluginSystemError::MalformedVersion { .. }));

    let err = loader
        .parse_manifest(r#"{"id": "x", "extensions": [{"id": "core.menu"}]}"#, origin)
        .unwrap_err();
    assert!(matches!(err, PluginSystemError::InvalidDescriptor { .. }));

    let err = loader.parse_manifest(r#"{"id": "x", "activator": "nope"}"#, origin).unwrap_err();
    assert!(matches!(err, PluginSystemError::UnknownActivator { .. }));
}

#[tokio::test]
async fn test_load_manifest_from_file() {
    let tmp_dir = tempdir().expect("Failed to create temp directory");
    write_manifest(tmp_dir.path(), "core", r#"{"id": "core", "version": "2.0"}"#);

    let loader = ManifestLoader::default();
    let descriptor = loader
        .load_manifest(tmp_dir.path().join("core").join("plugin.json"))
        .await
        .unwrap();
    assert_eq!(descriptor.version(), &SemanticVersion::new(2, 0, 0));

    let err = loader.load_manifest(tmp_dir.path().join("absent.json")).await.unwrap_err();
    assert!(matches!(err, PluginSystemError::ManifestError { source: Some(_), .. }));
}

#[tokio::test]
async fn test_scan_directory_collects_manifests_and_failures() {
    let tmp_dir = tempdir().expect("Failed to create temp directory");
    let root = tmp_dir.path();
    write_manifest(root, "b-ui", r#"{"id": "ui", "dependencies": [{"id": "core", "version": "1"}]}"#);
    write_manifest(root, "a-core", r#"{"id": "core", "version": "1.0"}"#);
    write_manifest(root, "c-broken", "{");
    fs::create_dir_all(root.join("d-empty")).unwrap();
    fs::write(root.join("stray.txt"), "not a plugin").unwrap();

    let result = ManifestLoader::default().scan_directory(root).await.unwrap();

    let ids: Vec<&str> = result.descriptors.iter().map(|d| d.id()).collect();
    assert_eq!(ids, vec!["core", "ui"], "sorted by directory name");
    assert_eq!(result.failures.len(), 1);
    assert!(result.failures[0].0.ends_with("c-broken/plugin.json"));
}

#[tokio::test]
async fn test_scan_missing_directory_is_empty() {
    let tmp_dir = tempdir().expect("Failed to create temp directory");
    let result = ManifestLoader::default()
        .scan_directory(tmp_dir.path().join("nowhere"))
        .await
        .unwrap();
    assert!(result.descriptors.is_empty());
    assert!(result.failures.is_empty());
}

#[tokio::test]
async fn test_scan_uses_configured_manifest_name() {
    let tmp_dir = tempdir().expect("Failed to create temp directory");
    let plugin_dir = tmp_dir.path().join("core");
    fs::create_dir_all(&plugin_dir).unwrap();
    fs::write(plugin_dir.join("manifest.json"), r#"{"id": "core"}"#).unwrap();

    let loader = ManifestLoader::default().with_manifest_file_name("manifest.json");
    let result = loader.scan_directory(tmp_dir.path()).await.unwrap();
    assert_eq!(result.descriptors.len(), 1);
}
