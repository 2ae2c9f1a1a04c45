pub mod types;

use crate::error::ConfigError;
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};

pub use types::Config;

const CONFIG_FILE_NAME: &str = ".kubectl-ai.toml";

/// Get the global config file path (~/.kubectl-ai.toml)
pub fn global_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(CONFIG_FILE_NAME))
}

/// Load configuration from file or use defaults.
///
/// An explicitly requested file must exist and parse. The global file is
/// optional, and a broken one is reported and ignored.
pub fn load_config(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    if let Some(path) = explicit {
        return read_config(path);
    }

    if let Some(global) = global_config_path() {
        if global.exists() {
            match read_config(&global) {
                Ok(config) => return Ok(config),
                Err(e) => warn!("Ignoring global config: {}", e),
            }
        }
    }

    debug!("No configuration file found, using defaults");
    Ok(Config::default())
}

fn read_config(path: &Path) -> Result<Config, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content, path)
}

pub fn parse_config(content: &str, path: &Path) -> Result<Config, ConfigError> {
    toml::from_str(content).map_err(|e| ConfigError::ParsingFailed {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
