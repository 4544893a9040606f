use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::kernel::constants;
use crate::plugin_system::dependency::DependencyConstraint;
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::traits::{Activator, NoopActivator};
use crate::plugin_system::version::SemanticVersion;

/// State a plugin should reach when the runtime activates its plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InitialState {
    /// Resolved but left dormant until started explicitly
    Installed,
    #[default]
    Active,
}

impl FromStr for InitialState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "installed" => Ok(InitialState::Installed),
            "active" => Ok(InitialState::Active),
            other => Err(format!("initial state must be 'installed' or 'active', got '{}'", other)),
        }
    }
}

impl fmt::Display for InitialState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitialState::Installed => write!(f, "installed"),
            InitialState::Active => write!(f, "active"),
        }
    }
}

/// Values used for descriptor fields a manifest leaves out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorDefaults {
    pub start_level: i32,
    pub initial_state: InitialState,
}

impl Default for DescriptorDefaults {
    fn default() -> Self {
        Self {
            start_level: constants::DEFAULT_START_LEVEL,
            initial_state: InitialState::Active,
        }
    }
}

/// A service a plugin declares it publishes. Carried, never wired by the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDeclaration {
    pub name: String,
    pub service: String,
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
}

/// Contribution to another plugin's extension point. Carried, never wired by the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtensionDeclaration {
    pub id: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Validated in-memory description of one plugin
#[derive(Clone)]
pub struct PluginDescriptor {
    id: String,
    name: String,
    description: String,
    version: SemanticVersion,
    start_level: i32,
    initial_state: InitialState,
    stoppable: bool,
    dependencies: Vec<DependencyConstraint>,
    services: Vec<ServiceDeclaration>,
    extensions: Vec<ExtensionDeclaration>,
    activator: Arc<dyn Activator>,
}

impl PluginDescriptor {
    /// Start building a descriptor for `id`
    pub fn builder(id: &str) -> DescriptorBuilder {
        DescriptorBuilder::new(id)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn version(&self) -> &SemanticVersion {
        &self.version
    }

    /// Lower start levels activate earlier
    pub fn start_level(&self) -> i32 {
        self.start_level
    }

    pub fn initial_state(&self) -> InitialState {
        self.initial_state
    }

    pub fn is_stoppable(&self) -> bool {
        self.stoppable
    }

    pub fn dependencies(&self) -> &[DependencyConstraint] {
        &self.dependencies
    }

    pub fn services(&self) -> &[ServiceDeclaration] {
        &self.services
    }

    pub fn extensions(&self) -> &[ExtensionDeclaration] {
        &self.extensions
    }

    pub fn activator(&self) -> Arc<dyn Activator> {
        self.activator.clone()
    }
}

impl fmt::Debug for PluginDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginDescriptor")
            .field("id", &self.id)
            .field("version", &self.version)
            .field("start_level", &self.start_level)
            .field("initial_state", &self.initial_state)
            .field("stoppable", &self.stoppable)
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}

/// Builder for [`PluginDescriptor`].
///
/// Raw strings are accepted for versions so that validation happens once, in
/// [`build`](Self::build), with the plugin id attached to every error.
pub struct DescriptorBuilder {
    id: String,
    name: Option<String>,
    description: Option<String>,
    version: Option<String>,
    start_level: Option<i32>,
    initial_state: Option<InitialState>,
    stoppable: Option<bool>,
    dependencies: Vec<(String, Option<String>)>,
    services: Vec<ServiceDeclaration>,
    extensions: Vec<ExtensionDeclaration>,
    activator: Option<Arc<dyn Activator>>,
    defaults: DescriptorDefaults,
}

impl DescriptorBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: None,
            description: None,
            version: None,
            start_level: None,
            initial_state: None,
            stoppable: None,
            dependencies: Vec::new(),
            services: Vec::new(),
            extensions: Vec::new(),
            activator: None,
            defaults: DescriptorDefaults::default(),
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn version(mut self, version: &str) -> Self {
        self.version = Some(version.to_string());
        self
    }

    pub fn start_level(mut self, start_level: i32) -> Self {
        self.start_level = Some(start_level);
        self
    }

    pub fn initial_state(mut self, state: InitialState) -> Self {
        self.initial_state = Some(state);
        self
    }

    pub fn stoppable(mut self, stoppable: bool) -> Self {
        self.stoppable = Some(stoppable);
        self
    }

    /// Add a dependency on `id` at `min_version` or later
    pub fn dependency(mut self, id: &str, min_version: &str) -> Self {
        self.dependencies.push((id.to_string(), Some(min_version.to_string())));
        self
    }

    /// Add a dependency on any version of `id`
    pub fn dependency_any(mut self, id: &str) -> Self {
        self.dependencies.push((id.to_string(), None));
        self
    }

    pub fn service(mut self, service: ServiceDeclaration) -> Self {
        self.services.push(service);
        self
    }

    pub fn extension(mut self, extension: ExtensionDeclaration) -> Self {
        self.extensions.push(extension);
        self
    }

    pub fn activator(mut self, activator: Arc<dyn Activator>) -> Self {
        self.activator = Some(activator);
        self
    }

    /// Use these defaults for start level and initial state
    pub fn defaults(mut self, defaults: DescriptorDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Validate and build the descriptor
    pub fn build(self) -> Result<PluginDescriptor, PluginSystemError> {
        let id = self.id.trim().to_string();
        if id.is_empty() {
            return Err(PluginSystemError::InvalidDescriptor {
                plugin_id: self.id.clone(),
                message: "plugin id can not be empty".to_string(),
            });
        }

        let name = non_blank(self.name).unwrap_or_else(|| id.clone());
        let description = non_blank(self.description).unwrap_or_else(|| name.clone());

        let version = parse_version(&id, self.version.as_deref())?;

        let mut dependencies = Vec::with_capacity(self.dependencies.len());
        for (target, min_version) in self.dependencies {
            let target = target.trim();
            if target.is_empty() {
                return Err(PluginSystemError::InvalidDescriptor {
                    plugin_id: id,
                    message: "dependent plugin id can not be empty".to_string(),
                });
            }
            let min_version = parse_version(&id, min_version.as_deref())?;
            dependencies.push(DependencyConstraint::new(target, min_version));
        }

        for service in &self.services {
            if service.name.trim().is_empty() || service.service.trim().is_empty() {
                return Err(PluginSystemError::InvalidDescriptor {
                    plugin_id: id,
                    message: "service name and service can not be empty".to_string(),
                });
            }
        }

        for extension in &self.extensions {
            if extension.id.trim().is_empty() {
                return Err(PluginSystemError::InvalidDescriptor {
                    plugin_id: id,
                    message: "extension id can not be empty".to_string(),
                });
            }
            if extension.data.is_null() {
                return Err(PluginSystemError::InvalidDescriptor {
                    plugin_id: id,
                    message: format!("extension '{}' data can not be null", extension.id),
                });
            }
        }

        Ok(PluginDescriptor {
            id,
            name,
            description,
            version,
            start_level: self.start_level.unwrap_or(self.defaults.start_level),
            initial_state: self.initial_state.unwrap_or(self.defaults.initial_state),
            stoppable: self.stoppable.unwrap_or(true),
            dependencies,
            services: self.services,
            extensions: self.extensions,
            activator: self.activator.unwrap_or_else(|| Arc::new(NoopActivator)),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_version(plugin_id: &str, raw: Option<&str>) -> Result<SemanticVersion, PluginSystemError> {
    match raw {
        None => Ok(SemanticVersion::zero()),
        Some(raw) => SemanticVersion::parse(raw).map_err(|source| PluginSystemError::MalformedVersion {
            plugin_id: plugin_id.to_string(),
            source,
        }),
    }
}
