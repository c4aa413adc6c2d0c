//! Error types for definition processing.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Failures raised while loading, merging or saving a definition.
#[derive(Debug, Error)]
pub enum DefinitionError {
    /// A definition or imported file could not be read.
    #[error("could not read definition file '{}': {source}", .path.display())]
    Read {
        /// File that failed to load.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// YAML could not be parsed.
    #[error("Could not process definition yaml{}: {source}", origin(.path.as_deref()))]
    Malformed {
        /// File containing the bad YAML; `None` for in-memory input.
        path: Option<PathBuf>,
        /// Underlying YAML error.
        source: serde_yaml::Error,
    },
    /// A document root was not a mapping.
    #[error("definition{} must be a YAML mapping", origin(.path.as_deref()))]
    NotAMapping {
        /// File whose root was not a mapping; `None` for in-memory input.
        path: Option<PathBuf>,
    },
    /// An import directive had an unusable value.
    #[error("invalid import directive{}: {reason}", origin(.path.as_deref()))]
    InvalidImport {
        /// File holding the directive; `None` for in-memory input.
        path: Option<PathBuf>,
        /// What was wrong with the directive.
        reason: &'static str,
    },
    /// An import chain revisited a file already being processed.
    #[error("circular import: {}", render_chain(.chain))]
    ImportCycle {
        /// Files in the order they were entered, ending with the repeated one.
        chain: Vec<PathBuf>,
    },
    /// Serialising the merged document failed.
    #[error("Could not finalize definition yaml: {source}")]
    Serialize {
        /// Underlying YAML error.
        source: serde_yaml::Error,
    },
}

/// Convenience alias for definition results.
pub type DefinitionResult<T> = Result<T, DefinitionError>;

fn origin(path: Option<&Path>) -> String {
    path.map(|path| format!(" in '{}'", path.display()))
        .unwrap_or_default()
}

fn render_chain(chain: &[PathBuf]) -> String {
    chain
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}
