//! Incremental `text/event-stream` decoder.
//!
//! Chunks arrive with arbitrary boundaries, so bytes are buffered until a full
//! line is available. A blank line dispatches the accumulated frame. Frames
//! without data are dropped, but their `id` still advances the resume marker.
//! An empty `id:` resets it.

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// Value of the frame's `id:` field, if present.
    pub id: Option<String>,
    /// Value of the frame's `event:` field, if present.
    pub event: Option<String>,
    /// Concatenated `data:` lines joined with `\n`.
    pub data: String,
}

/// Stateful decoder fed with raw response chunks.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    id: Option<String>,
    event: Option<String>,
    data: Vec<String>,
    last_event_id: Option<String>,
    retry_ms: Option<u64>,
}

impl SseDecoder {
    /// Fresh decoder with no pending state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and collect every frame it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw[..raw.len() - 1]);
            let line = line.trim_end_matches('\r');
            if let Some(frame) = self.process_line(line) {
                frames.push(frame);
            }
        }

        frames
    }

    /// Identifier of the most recent frame that carried an `id:` field.
    #[must_use]
    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    /// Reconnection delay announced by the server, in milliseconds.
    #[must_use]
    pub const fn retry_ms(&self) -> Option<u64> {
        self.retry_ms
    }

    /// Drop any partially received frame, keeping the resume marker.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.id = None;
        self.event = None;
        self.data.clear();
    }

    fn process_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = line.split_once(':').map_or((line, ""), |(field, value)| {
            (field, value.strip_prefix(' ').unwrap_or(value))
        });

        match field {
            "data" => self.data.push(value.to_string()),
            "id" if !value.contains('\0') => self.id = Some(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            "retry" => {
                if let Ok(ms) = value.trim().parse::<u64>() {
                    self.retry_ms = Some(ms);
                }
            }
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let id = self.id.take();
        if let Some(id) = &id {
            // An empty id clears the resume marker.
            self.last_event_id = (!id.is_empty()).then(|| id.clone());
        }
        let id = id.filter(|id| !id.is_empty());
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = self.data.join("\n");
        self.data.clear();
        Some(SseFrame { id, event, data })
    }
}
