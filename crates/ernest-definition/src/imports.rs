//! Recursive resolution of `import` and `import_file` directives.
//!
//! Merge rules when an imported mapping meets its host:
//! - keys missing from the host are appended in import order;
//! - mappings on both sides merge recursively;
//! - sequences on both sides concatenate, host items first;
//! - any other collision keeps the host value.

use std::fs;
use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};
use tracing::debug;

use crate::error::{DefinitionError, DefinitionResult};

/// Key whose value names YAML files to merge into the enclosing mapping.
pub const IMPORT_KEY: &str = "import";
/// Sole key of a mapping that is replaced by a file's text content.
pub const IMPORT_FILE_KEY: &str = "import_file";

/// Walks a document, tracking the chain of files being imported.
pub(crate) struct ImportResolver {
    stack: Vec<PathBuf>,
}

impl ImportResolver {
    /// Resolver rooted at `root`, the file the document was read from.
    pub(crate) fn new(root: Option<&Path>) -> Self {
        let stack = root
            .and_then(|path| fs::canonicalize(path).ok())
            .into_iter()
            .collect();
        Self { stack }
    }

    pub(crate) fn resolve_mapping(
        &mut self,
        mapping: Mapping,
        base: &Path,
        origin: Option<&Path>,
    ) -> DefinitionResult<Mapping> {
        let mut imports = Vec::new();
        let mut resolved = Mapping::with_capacity(mapping.len());

        for (key, value) in mapping {
            if key.as_str() == Some(IMPORT_KEY) {
                imports.extend(import_paths(value, origin)?);
                continue;
            }
            let value = self.resolve_value(value, base, origin)?;
            resolved.insert(key, value);
        }

        for relative in imports {
            let imported = self.import_document(&base.join(relative))?;
            merge_into(&mut resolved, imported);
        }

        Ok(resolved)
    }

    fn resolve_value(
        &mut self,
        value: Value,
        base: &Path,
        origin: Option<&Path>,
    ) -> DefinitionResult<Value> {
        match value {
            Value::Mapping(mapping) => {
                if let Some(path) = file_directive(&mapping, origin)? {
                    return read_text(&base.join(path)).map(Value::String);
                }
                self.resolve_mapping(mapping, base, origin)
                    .map(Value::Mapping)
            }
            Value::Sequence(items) => items
                .into_iter()
                .map(|item| self.resolve_value(item, base, origin))
                .collect::<DefinitionResult<Vec<_>>>()
                .map(Value::Sequence),
            Value::Tagged(mut tagged) => {
                let inner = std::mem::take(&mut tagged.value);
                tagged.value = self.resolve_value(inner, base, origin)?;
                Ok(Value::Tagged(tagged))
            }
            other => Ok(other),
        }
    }

    fn import_document(&mut self, path: &Path) -> DefinitionResult<Mapping> {
        let canonical = fs::canonicalize(path).map_err(|source| DefinitionError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        if self.stack.contains(&canonical) {
            let mut chain = self.stack.clone();
            chain.push(canonical);
            return Err(DefinitionError::ImportCycle { chain });
        }

        debug!(path = %path.display(), depth = self.stack.len(), "importing definition file");
        let raw = read_text(path)?;
        let mapping = parse_mapping(raw, Some(path))?;
        let base = canonical
            .parent()
            .map_or_else(PathBuf::new, Path::to_path_buf);

        self.stack.push(canonical);
        let resolved = self.resolve_mapping(mapping, &base, Some(path));
        self.stack.pop();
        resolved
    }
}

/// Parse YAML text whose root must be a mapping (an empty document counts).
pub(crate) fn parse_mapping(
    raw: impl AsRef<[u8]>,
    origin: Option<&Path>,
) -> DefinitionResult<Mapping> {
    let value: Value =
        serde_yaml::from_slice(raw.as_ref()).map_err(|source| DefinitionError::Malformed {
            path: origin.map(Path::to_path_buf),
            source,
        })?;
    match value {
        Value::Mapping(mapping) => Ok(mapping),
        Value::Null => Ok(Mapping::new()),
        _ => Err(DefinitionError::NotAMapping {
            path: origin.map(Path::to_path_buf),
        }),
    }
}

fn read_text(path: &Path) -> DefinitionResult<String> {
    fs::read_to_string(path).map_err(|source| DefinitionError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn import_paths(value: Value, origin: Option<&Path>) -> DefinitionResult<Vec<String>> {
    let invalid = |reason| DefinitionError::InvalidImport {
        path: origin.map(Path::to_path_buf),
        reason,
    };
    match value {
        Value::Null => Ok(Vec::new()),
        Value::String(path) => Ok(vec![path]),
        Value::Sequence(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(path) => Ok(path),
                _ => Err(invalid("import entries must be file paths")),
            })
            .collect(),
        _ => Err(invalid("import must be a path or a list of paths")),
    }
}

fn file_directive<'a>(
    mapping: &'a Mapping,
    origin: Option<&Path>,
) -> DefinitionResult<Option<&'a str>> {
    if mapping.len() != 1 {
        return Ok(None);
    }
    match mapping.get(IMPORT_FILE_KEY) {
        None => Ok(None),
        Some(Value::String(path)) => Ok(Some(path.as_str())),
        Some(_) => Err(DefinitionError::InvalidImport {
            path: origin.map(Path::to_path_buf),
            reason: "import_file must be a file path",
        }),
    }
}

fn merge_into(host: &mut Mapping, imported: Mapping) {
    for (key, incoming) in imported {
        match (host.get_mut(&key), incoming) {
            (None, incoming) => {
                host.insert(key, incoming);
            }
            (Some(Value::Mapping(existing)), Value::Mapping(incoming)) => {
                merge_into(existing, incoming);
            }
            (Some(Value::Sequence(existing)), Value::Sequence(incoming)) => {
                existing.extend(incoming);
            }
            (Some(_), _) => {}
        }
    }
}
