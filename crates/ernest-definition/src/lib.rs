#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! YAML environment definitions submitted to Ernest.
//!
//! A definition is loaded from bytes or a file, its `import` / `import_file`
//! directives are resolved into a single document, and the result is
//! serialised back to YAML for submission.
//!
//! Layout: `definition.rs` (the `Definition` document), `imports.rs`
//! (recursive directive resolution and merge rules), `error.rs`.

pub mod definition;
pub mod error;
mod imports;

pub use definition::Definition;
pub use error::{DefinitionError, DefinitionResult};
pub use imports::{IMPORT_FILE_KEY, IMPORT_KEY};
