/// Application name
pub const APP_NAME: &str = "Strata";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Start level given to plugins that do not declare one
pub const DEFAULT_START_LEVEL: i32 = 50;

/// Upper bound for a single activator hook, in milliseconds
pub const DEFAULT_HOOK_TIMEOUT_MS: u64 = 5000;

/// Default plugins directory
pub const DEFAULT_PLUGINS_DIR: &str = "plugins";

/// File name of a plugin manifest inside its plugin directory
pub const PLUGIN_MANIFEST_FILE: &str = "plugin.json";
