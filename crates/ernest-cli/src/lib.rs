#![forbid(unsafe_code)]
#![cfg_attr(test, allow(deprecated))]
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
#![allow(clippy::redundant_pub_crate)]

//! Command-line client for an Ernest orchestration instance.
//!
//! Layout:
//! - `cli.rs`: argument parsing, command dispatch and process outcome
//! - `commands/`: command handlers grouped by resource
//! - `client.rs`: shared HTTP client, errors and status classification
//! - `output.rs`: table and JSON renderers
//! - `main.rs`: thin entrypoint delegating to `run()`

pub(crate) mod cli;
pub(crate) mod client;
pub(crate) mod commands;
pub(crate) mod output;

pub use cli::run;
