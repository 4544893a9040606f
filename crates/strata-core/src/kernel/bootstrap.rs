use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::kernel::constants;
use crate::kernel::error::Result;
use crate::plugin_system::coordinator::{ActivationSummary, DeactivationSummary, LifecycleCoordinator};
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::loader::ManifestLoader;
use crate::plugin_system::resolver::Resolution;
use crate::plugin_system::traits::ActivatorRegistry;
use crate::storage::config::RuntimeConfig;

/// Outcome of [`Application::load_plugins`]
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Ids installed into the coordinator, in directory order
    pub installed: Vec<String>,
    /// Manifests that could not be loaded
    pub failures: Vec<(PathBuf, PluginSystemError)>,
}

/// Wires configuration, manifest loading and the lifecycle coordinator together
pub struct Application {
    config: RuntimeConfig,
    loader: ManifestLoader,
    coordinator: Arc<LifecycleCoordinator>,
}

impl Application {
    /// Build an application from a validated configuration
    pub fn new(config: RuntimeConfig, activators: ActivatorRegistry) -> Result<Self> {
        config.validate()?;
        log::info!("Initializing {} v{}", constants::APP_NAME, constants::APP_VERSION);

        let loader = ManifestLoader::new(activators)
            .with_defaults(config.descriptor_defaults())
            .with_manifest_file_name(config.manifest_file_name.clone());
        let coordinator = Arc::new(LifecycleCoordinator::new(config.hook_timeout()));

        Ok(Self {
            config,
            loader,
            coordinator,
        })
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn loader(&self) -> &ManifestLoader {
        &self.loader
    }

    pub fn coordinator(&self) -> Arc<LifecycleCoordinator> {
        self.coordinator.clone()
    }

    /// Scan the configured plugins directory and install every manifest found
    pub async fn load_plugins(&self) -> Result<LoadReport> {
        let scan = self.loader.scan_directory(&self.config.plugins_dir).await?;
        let installed = scan.descriptors.iter().map(|d| d.id().to_string()).collect();
        self.coordinator.install(scan.descriptors).await?;
        Ok(LoadReport {
            installed,
            failures: scan.failures,
        })
    }

    /// Resolve the installed plugins and log anything that was excluded
    pub async fn resolve(&self) -> Result<Resolution> {
        let resolution = self.coordinator.resolve().await?;
        if !resolution.report.is_clean() {
            for line in resolution.report.to_string().lines() {
                log::warn!("{}", line);
            }
        }
        Ok(resolution)
    }

    /// Resolve and activate. `cancel` is checked between plugins.
    pub async fn start(&self, cancel: CancellationToken) -> Result<(Resolution, ActivationSummary)> {
        let resolution = self.resolve().await?;
        let summary = self
            .coordinator
            .activate_all_with_cancel(&resolution.plan, cancel)
            .await?;
        Ok((resolution, summary))
    }

    /// Stop every active plugin
    pub async fn shutdown(&self) -> Result<DeactivationSummary> {
        log::info!("Shutting down {}", constants::APP_NAME);
        Ok(self.coordinator.deactivate_all().await?)
    }
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("config", &self.config)
            .field("coordinator", &self.coordinator)
            .finish_non_exhaustive()
    }
}
