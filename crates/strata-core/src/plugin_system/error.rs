//! # Strata Core Plugin System Errors
//!
//! Defines [`PluginSystemError`], the error type for descriptor validation,
//! dependency resolution, lifecycle transitions and manifest loading.
//!
//! Structural errors (`MalformedVersion`, `DuplicateIdentity`,
//! `InvalidDescriptor`) are raised before any lifecycle work starts.
//! Dependency level problems are normally accumulated in a
//! [`ResolutionReport`](crate::plugin_system::resolver::ResolutionReport) and
//! only become `UnsatisfiedDependency` / `CircularDependency` values when a
//! caller asks for them.
use std::path::PathBuf;

use crate::plugin_system::lifecycle::TransitionError;
use crate::plugin_system::traits::HookKind;
use crate::plugin_system::version::VersionError;

#[derive(Debug, thiserror::Error)]
pub enum PluginSystemError {
    #[error("Malformed version in descriptor of plugin '{plugin_id}': {source}")]
    MalformedVersion {
        plugin_id: String,
        #[source]
        source: VersionError,
    },

    #[error("Duplicate plugin identity '{plugin_id}'")]
    DuplicateIdentity { plugin_id: String },

    #[error("Invalid descriptor for plugin '{plugin_id}': {message}")]
    InvalidDescriptor { plugin_id: String, message: String },

    #[error("Plugin '{plugin_id}' has an unsatisfied dependency: {cause}")]
    UnsatisfiedDependency { plugin_id: String, cause: String },

    #[error("Circular dependency among plugins: {}", .members.join(", "))]
    CircularDependency { members: Vec<String> },

    #[error("Activation failed at plugin '{plugin_id}' in {hook}: {cause} ({unwound} previously started plugin(s) unwound)")]
    ActivationFailure {
        plugin_id: String,
        hook: HookKind,
        cause: String,
        unwound: usize,
    },

    #[error("Activation cancelled ({unwound} previously started plugin(s) unwound)")]
    ActivationCancelled { unwound: usize },

    #[error("Plugin '{plugin_id}' is not stoppable")]
    NotStoppable { plugin_id: String },

    #[error("Plugin '{plugin_id}' cannot start: dependency '{dependency}' is not active")]
    DependencyNotActive { plugin_id: String, dependency: String },

    #[error("Plugin '{plugin_id}' cannot stop while dependents are active: {}", .dependents.join(", "))]
    DependentsActive {
        plugin_id: String,
        dependents: Vec<String>,
    },

    #[error("Plugin not found: {plugin_id}")]
    PluginNotFound { plugin_id: String },

    #[error("Plugin '{plugin_id}': {source}")]
    IllegalTransition {
        plugin_id: String,
        #[source]
        source: TransitionError,
    },

    #[error("Unknown activator '{reference}' for plugin '{plugin_id}'")]
    UnknownActivator { plugin_id: String, reference: String },

    #[error("Plugin manifest error for '{path}': {message}")]
    ManifestError {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl PluginSystemError {
    pub(crate) fn manifest(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        PluginSystemError::ManifestError {
            path: path.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Plugin id this error is about, if it concerns a single plugin
    pub fn plugin_id(&self) -> Option<&str> {
        match self {
            PluginSystemError::MalformedVersion { plugin_id, .. }
            | PluginSystemError::DuplicateIdentity { plugin_id }
            | PluginSystemError::InvalidDescriptor { plugin_id, .. }
            | PluginSystemError::UnsatisfiedDependency { plugin_id, .. }
            | PluginSystemError::ActivationFailure { plugin_id, .. }
            | PluginSystemError::NotStoppable { plugin_id }
            | PluginSystemError::DependencyNotActive { plugin_id, .. }
            | PluginSystemError::DependentsActive { plugin_id, .. }
            | PluginSystemError::PluginNotFound { plugin_id }
            | PluginSystemError::IllegalTransition { plugin_id, .. }
            | PluginSystemError::UnknownActivator { plugin_id, .. } => Some(plugin_id),
            PluginSystemError::CircularDependency { .. }
            | PluginSystemError::ActivationCancelled { .. }
            | PluginSystemError::ManifestError { .. } => None,
        }
    }
}
