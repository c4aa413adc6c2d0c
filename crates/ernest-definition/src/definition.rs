//! The `Definition` document and its load/save pipeline.

use std::fs;
use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};

use crate::error::{DefinitionError, DefinitionResult};
use crate::imports::{ImportResolver, parse_mapping};

/// A YAML environment definition.
///
/// Keys keep their original order through load, import resolution and save.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Definition {
    document: Mapping,
    base_dir: Option<PathBuf>,
    source: Option<PathBuf>,
}

impl Definition {
    /// Parse a definition from raw YAML bytes.
    ///
    /// Relative imports resolve against the current directory unless
    /// [`Definition::with_base_dir`] is applied.
    ///
    /// # Errors
    ///
    /// [`DefinitionError::Malformed`] for invalid YAML,
    /// [`DefinitionError::NotAMapping`] when the root is not a mapping.
    pub fn load(bytes: &[u8]) -> DefinitionResult<Self> {
        Ok(Self {
            document: parse_mapping(bytes, None)?,
            base_dir: None,
            source: None,
        })
    }

    /// Read and parse a definition file.
    ///
    /// # Errors
    ///
    /// [`DefinitionError::Read`] when the file cannot be read, plus the
    /// parse errors of [`Definition::load`] naming the file.
    pub fn load_path(path: &Path) -> DefinitionResult<Self> {
        let raw = fs::read(path).map_err(|source| DefinitionError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let document = parse_mapping(raw, Some(path))?;
        let base_dir = path.parent().map(|parent| {
            if parent.as_os_str().is_empty() {
                PathBuf::from(".")
            } else {
                parent.to_path_buf()
            }
        });
        Ok(Self {
            document,
            base_dir,
            source: Some(path.to_path_buf()),
        })
    }

    /// Override the directory that relative imports resolve against.
    #[must_use]
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// Resolve every `import` and `import_file` directive in place.
    ///
    /// # Errors
    ///
    /// Any [`DefinitionError`] raised by a directive; the document is left
    /// untouched on failure.
    pub fn load_file_imports(&mut self) -> DefinitionResult<()> {
        let base = self
            .base_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));
        let mut resolver = ImportResolver::new(self.source.as_deref());
        let resolved =
            resolver.resolve_mapping(self.document.clone(), &base, self.source.as_deref())?;
        self.document = resolved;
        Ok(())
    }

    /// Serialise the document back to YAML.
    ///
    /// # Errors
    ///
    /// [`DefinitionError::Serialize`] if the YAML emitter fails.
    pub fn save(&self) -> DefinitionResult<String> {
        serde_yaml::to_string(&self.document)
            .map_err(|source| DefinitionError::Serialize { source })
    }

    /// Top-level `name` field.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.field("name")
    }

    /// Top-level `project` field.
    #[must_use]
    pub fn project(&self) -> Option<&str> {
        self.field("project")
    }

    /// Top-level `datacenter` field.
    #[must_use]
    pub fn datacenter(&self) -> Option<&str> {
        self.field("datacenter")
    }

    /// The underlying YAML mapping.
    #[must_use]
    pub const fn document(&self) -> &Mapping {
        &self.document
    }

    /// File the definition was read from, if any.
    #[must_use]
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    fn field(&self, key: &str) -> Option<&str> {
        self.document.get(key).and_then(Value::as_str)
    }
}
