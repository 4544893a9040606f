pub mod kernel;
pub mod plugin_system;
pub mod storage;

pub use kernel::Application;
pub use kernel::error::Error as KernelError;
pub use plugin_system::{
    Activator, ActivatorRegistry, LifecycleCoordinator, PluginDescriptor, PluginState, SemanticVersion,
};
pub use storage::RuntimeConfig;
