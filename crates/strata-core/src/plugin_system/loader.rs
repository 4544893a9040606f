//! # Strata Core Manifest Loader
//!
//! Reads `plugin.json` manifests from disk and turns them into
//! [`PluginDescriptor`]s. The resolver and coordinator never depend on this
//! module; it is the plumbing in front of them.
//!
//! A plugin directory is laid out as one subdirectory per plugin:
//!
//! ```text
//! plugins/
//!   core/plugin.json
//!   ui/plugin.json
//! ```
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tokio::fs;

use crate::kernel::constants;
use crate::plugin_system::descriptor::{
    DescriptorDefaults, ExtensionDeclaration, InitialState, PluginDescriptor, ServiceDeclaration,
};
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::traits::ActivatorRegistry;

// --- Intermediate structs for deserialization ---

#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum RawStartLevel {
    Number(i64),
    Text(String),
}

#[derive(Deserialize, Debug)]
struct RawDependency {
    #[serde(default)]
    id: String,
    #[serde(default)]
    version: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct RawPluginManifest {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    start_level: Option<RawStartLevel>,
    #[serde(default)]
    initialized_state: Option<String>,
    #[serde(default)]
    stoppable: Option<bool>,
    #[serde(default)]
    activator: Option<String>,
    #[serde(default)]
    dependencies: Vec<RawDependency>,
    #[serde(default)]
    services: Vec<ServiceDeclaration>,
    #[serde(default)]
    extensions: Vec<ExtensionDeclaration>,
}

// --- End Intermediate structs ---

/// Manifests found by [`ManifestLoader::scan_directory`]
#[derive(Debug, Default)]
pub struct ScanResult {
    /// Descriptors in directory-name order
    pub descriptors: Vec<PluginDescriptor>,
    /// Manifests that could not be loaded, with the reason
    pub failures: Vec<(PathBuf, PluginSystemError)>,
}

/// Loads plugin manifests and builds descriptors from them
#[derive(Debug, Clone)]
pub struct ManifestLoader {
    activators: ActivatorRegistry,
    defaults: DescriptorDefaults,
    manifest_file_name: String,
}

impl ManifestLoader {
    pub fn new(activators: ActivatorRegistry) -> Self {
        Self {
            activators,
            defaults: DescriptorDefaults::default(),
            manifest_file_name: constants::PLUGIN_MANIFEST_FILE.to_string(),
        }
    }

    /// Defaults for `startLevel` and `initializedState` when a manifest omits them
    pub fn with_defaults(mut self, defaults: DescriptorDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_manifest_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.manifest_file_name = file_name.into();
        self
    }

    pub fn manifest_file_name(&self) -> &str {
        &self.manifest_file_name
    }

    pub fn defaults(&self) -> DescriptorDefaults {
        self.defaults
    }

    /// Parse manifest JSON. `origin` is only used in error messages.
    pub fn parse_manifest(&self, json: &str, origin: &Path) -> Result<PluginDescriptor, PluginSystemError> {
        let raw: RawPluginManifest = serde_json::from_str(json).map_err(|e| PluginSystemError::ManifestError {
            path: origin.to_path_buf(),
            message: format!("Failed to parse manifest JSON: {}", e),
            source: Some(Box::new(e)),
        })?;

        let mut builder = PluginDescriptor::builder(&raw.id).defaults(self.defaults);
        if let Some(name) = &raw.name {
            builder = builder.name(name);
        }
        if let Some(description) = &raw.description {
            builder = builder.description(description);
        }
        if let Some(version) = &raw.version {
            builder = builder.version(version);
        }
        if let Some(start_level) = raw.start_level {
            builder = builder.start_level(parse_start_level(start_level, origin)?);
        }
        if let Some(state) = &raw.initialized_state {
            let state: InitialState = state
                .parse()
                .map_err(|message: String| PluginSystemError::manifest(origin, message))?;
            builder = builder.initial_state(state);
        }
        if let Some(stoppable) = raw.stoppable {
            builder = builder.stoppable(stoppable);
        }
        for dependency in &raw.dependencies {
            builder = match &dependency.version {
                Some(version) => builder.dependency(&dependency.id, version),
                None => builder.dependency_any(&dependency.id),
            };
        }
        for service in raw.services {
            builder = builder.service(service);
        }
        for extension in raw.extensions {
            builder = builder.extension(extension);
        }

        let activator = self.activators.lookup(raw.id.trim(), raw.activator.as_deref())?;
        builder.activator(activator).build()
    }

    /// Read and parse a single manifest file
    pub async fn load_manifest(&self, path: impl AsRef<Path>) -> Result<PluginDescriptor, PluginSystemError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).await.map_err(|e| PluginSystemError::ManifestError {
            path: path.to_path_buf(),
            message: format!("Failed to read manifest: {}", e),
            source: Some(Box::new(e)),
        })?;
        let descriptor = self.parse_manifest(&content, path)?;
        log::debug!("Loaded manifest for plugin '{}' from {}", descriptor.id(), path.display());
        Ok(descriptor)
    }

    /// Load every `<dir>/<plugin>/<manifest file>` below `dir`.
    ///
    /// A missing directory yields an empty result. Subdirectories without a
    /// manifest are skipped; manifests that fail to load are collected in
    /// [`ScanResult::failures`] and do not stop the scan.
    pub async fn scan_directory(&self, dir: impl AsRef<Path>) -> Result<ScanResult, PluginSystemError> {
        let dir = dir.as_ref();
        let mut result = ScanResult::default();

        let exists = fs::try_exists(dir).await.unwrap_or(false);
        if !exists {
            log::warn!("Plugin directory {} does not exist", dir.display());
            return Ok(result);
        }

        let mut entries = fs::read_dir(dir).await.map_err(|e| read_dir_error(dir, e))?;
        let mut plugin_dirs = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| read_dir_error(dir, e))? {
            let entry_path = entry.path();
            match fs::metadata(&entry_path).await {
                Ok(meta) if meta.is_dir() => plugin_dirs.push(entry_path),
                Ok(_) => {}
                Err(e) => log::warn!("Failed to get metadata for {}: {}", entry_path.display(), e),
            }
        }
        plugin_dirs.sort();

        for plugin_dir in plugin_dirs {
            let manifest_path = plugin_dir.join(&self.manifest_file_name);
            let is_file = fs::metadata(&manifest_path).await.map(|m| m.is_file()).unwrap_or(false);
            if !is_file {
                log::debug!("No {} in {}, skipping", self.manifest_file_name, plugin_dir.display());
                continue;
            }
            match self.load_manifest(&manifest_path).await {
                Ok(descriptor) => result.descriptors.push(descriptor),
                Err(e) => {
                    log::error!("Error loading manifest from {}: {}", manifest_path.display(), e);
                    result.failures.push((manifest_path, e));
                }
            }
        }

        log::info!(
            "Found {} plugin manifest(s) in {}",
            result.descriptors.len(),
            dir.display()
        );
        Ok(result)
    }
}

impl Default for ManifestLoader {
    fn default() -> Self {
        Self::new(ActivatorRegistry::default())
    }
}

fn parse_start_level(raw: RawStartLevel, origin: &Path) -> Result<i32, PluginSystemError> {
    let parsed = match raw {
        RawStartLevel::Number(n) => i32::try_from(n).ok(),
        RawStartLevel::Text(text) => text.trim().parse::<i32>().ok(),
    };
    parsed.ok_or_else(|| PluginSystemError::manifest(origin, "startLevel is not a legal number"))
}

fn read_dir_error(dir: &Path, e: std::io::Error) -> PluginSystemError {
    PluginSystemError::ManifestError {
        path: dir.to_path_buf(),
        message: format!("Failed to read plugin directory: {}", e),
        source: Some(Box::new(e)),
    }
}
