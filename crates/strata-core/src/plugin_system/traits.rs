use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::version::SemanticVersion;

/// Information handed to an activator hook about the plugin being driven
#[derive(Debug, Clone)]
pub struct PluginContext {
    pub plugin_id: String,
    pub version: SemanticVersion,
    pub start_level: i32,
}

/// Failure reported by plugin code from an activator hook
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HookError {
    message: String,
}

impl HookError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for HookError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for HookError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Which activator hook was running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    Start,
    Stop,
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookKind::Start => write!(f, "on_start"),
            HookKind::Stop => write!(f, "on_stop"),
        }
    }
}

/// Entry points of plugin code, called by the lifecycle coordinator on the
/// Starting and Stopping transitions.
///
/// Hooks may block or fail. The coordinator bounds each call with its hook
/// timeout and is the only caller; a hook must not call back into the
/// coordinator.
#[async_trait]
pub trait Activator: Send + Sync {
    /// Called when the plugin enters `Starting`. An error rolls the plugin back
    /// to `Resolved` and aborts the current activation run.
    async fn on_start(&self, _context: &PluginContext) -> Result<(), HookError> {
        Ok(())
    }

    /// Called when the plugin enters `Stopping`. Errors are logged; the stop
    /// always completes.
    async fn on_stop(&self, _context: &PluginContext) -> Result<(), HookError> {
        Ok(())
    }
}

/// Activator for plugins without code of their own
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopActivator;

#[async_trait]
impl Activator for NoopActivator {}

/// Maps the `activator` reference of a manifest onto an activator instance.
///
/// Manifests without a reference get the default activator.
#[derive(Clone)]
pub struct ActivatorRegistry {
    default: Arc<dyn Activator>,
    named: HashMap<String, Arc<dyn Activator>>,
}

impl ActivatorRegistry {
    /// Create a registry whose default is [`NoopActivator`]
    pub fn new() -> Self {
        Self::with_default(Arc::new(NoopActivator))
    }

    pub fn with_default(default: Arc<dyn Activator>) -> Self {
        Self {
            default,
            named: HashMap::new(),
        }
    }

    /// Register an activator under a reference name, replacing any previous one
    pub fn register(&mut self, reference: impl Into<String>, activator: Arc<dyn Activator>) -> &mut Self {
        self.named.insert(reference.into(), activator);
        self
    }

    pub fn contains(&self, reference: &str) -> bool {
        self.named.contains_key(reference)
    }

    /// Look up the activator for `plugin_id`. Blank references use the default.
    pub fn lookup(&self, plugin_id: &str, reference: Option<&str>) -> Result<Arc<dyn Activator>, PluginSystemError> {
        match reference.map(str::trim).filter(|r| !r.is_empty()) {
            None => Ok(self.default.clone()),
            Some(name) => self
                .named
                .get(name)
                .cloned()
                .ok_or_else(|| PluginSystemError::UnknownActivator {
                    plugin_id: plugin_id.to_string(),
                    reference: name.to_string(),
                }),
        }
    }
}

impl Default for ActivatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ActivatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.named.keys().collect();
        names.sort();
        f.debug_struct("ActivatorRegistry")
            .field("named", &names)
            .finish_non_exhaustive()
    }
}
