//! Persisted CLI configuration document.

use serde::{Deserialize, Serialize};

/// Target and session state persisted between invocations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the targeted Ernest instance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Session token issued by the last successful login.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Username associated with the session token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

impl Config {
    /// Session token, treating empty strings as absent.
    #[must_use]
    pub fn session_token(&self) -> Option<&str> {
        self.token.as_deref().filter(|token| !token.trim().is_empty())
    }

    /// Record a fresh session.
    pub fn set_session(&mut self, user: impl Into<String>, token: impl Into<String>) {
        self.user = Some(user.into());
        self.token = Some(token.into());
    }

    /// Forget the current session while keeping the target.
    pub fn clear_session(&mut self) {
        self.user = None;
        self.token = None;
    }
}
