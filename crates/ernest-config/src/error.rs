//! Error types for local configuration operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The user's home directory could not be determined.
    #[error("unable to determine the home directory for the config file")]
    HomeDirUnavailable,
    /// File system operation failed.
    #[error("failed to {operation} '{}': {source}", .path.display())]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Path involved in the failure.
        path: PathBuf,
        /// Source IO error.
        source: io::Error,
    },
    /// Stored configuration is not valid YAML.
    #[error("config file '{}' is not valid yaml: {source}", .path.display())]
    Parse {
        /// Path of the offending file.
        path: PathBuf,
        /// Source YAML error.
        source: serde_yaml::Error,
    },
    /// Serialising the configuration failed.
    #[error("failed to serialise config: {source}")]
    Serialize {
        /// Source YAML error.
        source: serde_yaml::Error,
    },
    /// Target URL could not be used.
    #[error("You should specify a valid url for the target ({reason})")]
    InvalidTarget {
        /// Raw value supplied by the user.
        value: String,
        /// Why the target was rejected.
        reason: &'static str,
    },
    /// A provider template file does not exist or cannot be read.
    #[error("Template file '{}' not found", .path.display())]
    TemplateNotFound {
        /// Template path supplied by the user.
        path: PathBuf,
    },
    /// A provider template file is not valid YAML.
    #[error("Template file '{}' is not valid yaml file", .path.display())]
    TemplateInvalid {
        /// Template path supplied by the user.
        path: PathBuf,
    },
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;
