//! Build and component event payloads carried in SSE frames.

use serde::{Deserialize, Serialize};

use crate::error::{SseError, SseResult};
use crate::sse::SseFrame;

/// Lifecycle position of a build as reported by an event subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    /// The build is still running.
    InProgress,
    /// The build finished successfully.
    Done,
    /// The build failed.
    Errored,
}

impl BuildOutcome {
    /// Classify a subject such as `build.create.done`.
    #[must_use]
    pub fn from_subject(subject: &str) -> Self {
        if subject.ends_with(".done") {
            Self::Done
        } else if subject.ends_with(".error") {
            Self::Errored
        } else {
            Self::InProgress
        }
    }

    /// Whether no further events are expected.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Errored)
    }
}

/// Event published for a build stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildEvent {
    /// Build identifier.
    #[serde(default)]
    pub id: String,
    /// Environment or service name.
    #[serde(default)]
    pub name: String,
    /// Routing subject, e.g. `build.create` or `build.create.done`.
    #[serde(rename = "_subject", default)]
    pub subject: String,
    /// Component changes carried by this event.
    #[serde(default)]
    pub changes: Vec<ComponentEvent>,
}

impl BuildEvent {
    /// Decode the JSON data of an SSE frame.
    ///
    /// # Errors
    ///
    /// Returns [`SseError::MalformedPayload`] when the data is not a build event.
    pub fn from_frame(frame: &SseFrame) -> SseResult<Self> {
        serde_json::from_str(&frame.data).map_err(|source| SseError::MalformedPayload {
            payload: frame.data.clone(),
            source,
        })
    }

    /// Outcome implied by the event subject.
    #[must_use]
    pub fn outcome(&self) -> BuildOutcome {
        BuildOutcome::from_subject(&self.subject)
    }

    /// Descriptions of every errored component change.
    #[must_use]
    pub fn errors(&self) -> Vec<String> {
        self.changes
            .iter()
            .filter(|change| change.is_errored())
            .map(ComponentEvent::describe)
            .collect()
    }
}

/// Progress update for a single component within a build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentEvent {
    /// Component identifier, e.g. `instance::web-1`.
    #[serde(rename = "_component_id", default)]
    pub component_id: String,
    /// Component kind, e.g. `instance`, `network`.
    #[serde(rename = "_component", default)]
    pub component: String,
    /// Routing subject, e.g. `instance.create.aws.done`.
    #[serde(rename = "_subject", default)]
    pub subject: String,
    /// Component state: `running`, `completed`, `errored`, ...
    #[serde(rename = "_state", default)]
    pub state: String,
    /// Human name of the component.
    #[serde(default)]
    pub name: String,
    /// Provider error message when the change failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ComponentEvent {
    /// Action segment of the subject (`create`, `update`, `delete`, ...).
    #[must_use]
    pub fn action(&self) -> &str {
        self.subject.split('.').nth(1).unwrap_or("")
    }

    /// Whether this change reports a failure.
    #[must_use]
    pub fn is_errored(&self) -> bool {
        self.state == "errored" || self.subject.ends_with(".error") || self.error.is_some()
    }

    /// One-line progress description.
    #[must_use]
    pub fn describe(&self) -> String {
        let name = if self.name.is_empty() {
            self.component_id.as_str()
        } else {
            self.name.as_str()
        };
        let state = if self.state.is_empty() {
            "pending"
        } else {
            self.state.as_str()
        };
        let mut line = format!("{} {name} {} ... {state}", self.component, self.action());
        if let Some(error) = &self.error {
            line.push_str(": ");
            line.push_str(error);
        }
        line
    }
}
