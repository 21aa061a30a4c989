//! Config resolution with `GlobalOpts` awareness.

use std::path::PathBuf;

pub use esmart_config::{Config, config_path};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// The config file in effect: `--config` / `ESMART_CONFIG`, else the
/// platform default.
pub fn active_path(global: &GlobalOpts) -> PathBuf {
    global.config.clone().unwrap_or_else(config_path)
}

/// Load the config. An explicitly named file must exist; the default
/// location may be absent (environment variables can supply everything).
pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    let path = active_path(global);
    if global.config.is_some() && !path.exists() {
        return Err(CliError::NoConfig {
            path: path.display().to_string(),
        });
    }
    Ok(esmart_config::load_config_from(&path)?)
}
