use std::sync::Arc;

use async_trait::async_trait;
use strata_core::plugin_system::{Activator, ActivatorRegistry, HookError, PluginContext};

/// Default activator for manifest plugins: logs each transition
#[derive(Debug, Default)]
pub struct LoggingActivator;

#[async_trait]
impl Activator for LoggingActivator {
    async fn on_start(&self, context: &PluginContext) -> Result<(), HookError> {
        log::info!(
            "Plugin '{}' v{} started (start level {})",
            context.plugin_id,
            context.version,
            context.start_level
        );
        Ok(())
    }

    async fn on_stop(&self, context: &PluginContext) -> Result<(), HookError> {
        log::info!("Plugin '{}' stopped", context.plugin_id);
        Ok(())
    }
}

/// Always refuses to start. Manifests opt in with `"activator": "failing"`.
#[derive(Debug, Default)]
pub struct FailingActivator;

#[async_trait]
impl Activator for FailingActivator {
    async fn on_start(&self, context: &PluginContext) -> Result<(), HookError> {
        Err(HookError::new(format!("plugin '{}' is configured to fail", context.plugin_id)))
    }
}

/// Activators available to manifests loaded by the CLI
pub fn registry() -> ActivatorRegistry {
    let mut registry = ActivatorRegistry::with_default(Arc::new(LoggingActivator));
    registry
        .register("logging", Arc::new(LoggingActivator))
        .register("failing", Arc::new(FailingActivator));
    registry
}
