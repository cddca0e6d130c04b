//! Remote access configuration
//!
//! Settings live in a single TOML file, `remote.toml` under the user's
//! config directory. Every key is optional; missing keys take the values of
//! [`RemoteConfig::default`].

mod remote;
mod seconds;

pub use remote::{JitterConfig, RemoteConfig};

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// `{config_dir}/homelink`, or `./homelink` where the platform has no
/// config directory
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("homelink")
}

/// `remote.toml` inside [`default_config_dir`]
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("remote.toml")
}

/// Read and validate the remote configuration at `path`
pub fn load_config(path: &Path) -> Result<RemoteConfig, ConfigError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(ConfigError::NotFound(path.to_path_buf()))
        }
        Err(e) => {
            return Err(ConfigError::Invalid(format!(
                "{}: {}",
                path.display(),
                e
            )))
        }
    };

    let config: RemoteConfig = toml::from_str(&text)?;
    config.validate()?;
    Ok(config)
}

/// Write `config` to `path`, creating missing parent directories.
///
/// Refuses to write a configuration that would not load back.
pub fn save_config(path: &Path, config: &RemoteConfig) -> Result<(), ConfigError> {
    config.validate()?;
    let text = toml::to_string_pretty(config)?;

    let write = || -> std::io::Result<()> {
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, text)
    };
    write().map_err(|e| ConfigError::Invalid(format!("{}: {}", path.display(), e)))
}
