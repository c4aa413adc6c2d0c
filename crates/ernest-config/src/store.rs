//! File-backed persistence for [`Config`].

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::model::Config;

/// File name used under the home directory when no explicit path is given.
pub const CONFIG_FILE_NAME: &str = ".ernest";

/// Reads and writes the CLI configuration at a fixed path.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    /// Store backed by an explicit file path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store backed by `~/.ernest`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::HomeDirUnavailable`] when the platform reports no
    /// home directory.
    pub fn default_location() -> ConfigResult<Self> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeDirUnavailable)?;
        Ok(Self::new(home.join(CONFIG_FILE_NAME)))
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored configuration; a missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error when the file exists but cannot be read or parsed.
    pub fn load(&self) -> ConfigResult<Config> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "config file absent; using defaults");
                return Ok(Config::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    operation: "read",
                    path: self.path.clone(),
                    source,
                });
            }
        };

        if raw.trim().is_empty() {
            return Ok(Config::default());
        }

        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    /// Persist `config`, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if serialisation or any file system step fails.
    pub fn save(&self, config: &Config) -> ConfigResult<()> {
        let body =
            serde_yaml::to_string(config).map_err(|source| ConfigError::Serialize { source })?;

        if let Some(parent) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                operation: "create directory",
                path: parent.to_path_buf(),
                source,
            })?;
        }

        fs::write(&self.path, body).map_err(|source| ConfigError::Io {
            operation: "write",
            path: self.path.clone(),
            source,
        })?;
        debug!(path = %self.path.display(), "config file saved");
        Ok(())
    }
}
