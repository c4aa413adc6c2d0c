//! Event decoding error primitives.

use thiserror::Error;

/// Error emitted when an SSE frame cannot be turned into a build event.
#[derive(Debug, Error)]
pub enum SseError {
    /// Frame data was not a JSON build event.
    #[error("malformed build event payload: {source}")]
    MalformedPayload {
        /// Raw frame data for diagnostics.
        payload: String,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
}

impl SseError {
    /// Raw payload that failed to decode.
    #[must_use]
    pub fn payload(&self) -> &str {
        match self {
            Self::MalformedPayload { payload, .. } => payload,
        }
    }
}

/// Result wrapper for event decoding.
pub type SseResult<T> = Result<T, SseError>;
