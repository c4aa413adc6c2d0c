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

//! Local configuration for the Ernest CLI.
//!
//! Layout: `model.rs` (persisted session/target document), `store.rs`
//! (file-backed load/save), `template.rs` (provider credential templates),
//! `validate.rs` (target URL checks).

pub mod error;
pub mod model;
pub mod store;
pub mod template;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use model::Config;
pub use store::{CONFIG_FILE_NAME, ConfigStore};
pub use template::{ProviderTemplate, load_provider_template};
pub use validate::{TargetCheck, validate_target};
