//! Logging setup. log4rs reads its YAML file; env_logger takes over when the
//! file cannot be used.

use log::{info, warn};
use log4rs::config::{Config, Deserializers};
use log4rs::Handle;

/// Parse a log4rs YAML file into a config
pub fn load_log_config(config_file: &str) -> Result<Config, String> {
    log4rs::config::load_config_file(config_file, Deserializers::default()).map_err(|e| e.to_string())
}

/// Install the global logger. Returns the log4rs handle, or `None` when the
/// env_logger fallback was installed instead.
pub fn init_logging(config_file: &str) -> Option<Handle> {
    let loaded = load_log_config(config_file)
        .and_then(|config| log4rs::init_config(config).map_err(|e| e.to_string()));
    match loaded {
        Ok(handle) => Some(handle),
        Err(e) => {
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).try_init().ok();
            warn!("Could not load {} ({}); logging with env_logger", config_file, e);
            None
        }
    }
}

/// Switch a running log4rs logger to another file
pub fn reconfigure_logging(handle: Option<&Handle>, config_file: &str) {
    let Some(handle) = handle else {
        warn!("Logging already fell back to env_logger; ignoring {}", config_file);
        return;
    };
    match load_log_config(config_file) {
        Ok(config) => {
            handle.set_config(config);
            info!("Logging reconfigured from {}", config_file);
        }
        Err(e) => warn!("Could not load {} ({}); keeping current logging", config_file, e),
    }
}
