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

//! Build-progress events streamed by Ernest over server-sent events.
//!
//! The server publishes one stream per build (keyed by the build or stream id).
//! Each SSE frame carries a JSON [`BuildEvent`] whose `_subject` tells whether
//! the build is still running or has reached a terminal state. [`SseDecoder`]
//! turns raw response chunks into frames; it is transport agnostic so the CLI
//! can feed it from any byte stream.

pub mod error;
pub mod payloads;
pub mod sse;

pub use error::{SseError, SseResult};
pub use payloads::{BuildEvent, BuildOutcome, ComponentEvent};
pub use sse::{SseDecoder, SseFrame};
