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

//! Logging and outcome telemetry shared by the Ernest command-line client.
//!
//! Layout: `init.rs` (tracing subscriber installation), `outcome.rs`
//! (optional forwarding of command outcomes to a collector endpoint).

pub mod init;
pub mod outcome;

pub use init::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, build_sha, init_logging};
pub use outcome::{TELEMETRY_ENDPOINT_ENV, TelemetryEmitter, timestamp_now_ms};
