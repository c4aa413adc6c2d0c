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
//! Shared HTTP DTOs for the Ernest REST API.
//!
//! The server is lenient about which fields it returns, so every response type
//! defaults missing fields instead of failing the whole decode. Request bodies
//! that the CLI builds itself live here too so their wire shape is pinned by
//! tests.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Free-form JSON object used for provider credentials and options.
pub type JsonMap = Map<String, Value>;

/// Error envelope returned by the API on failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiMessage {
    /// Human readable error description.
    #[serde(default)]
    pub message: String,
}

/// Cloud provider account registered under a name (current API).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Project {
    /// Numeric identifier.
    pub id: i64,
    /// Unique project name.
    pub name: String,
    /// Provider kind, e.g. `aws`, `vcloud-fake`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Provider credentials and settings.
    pub credentials: JsonMap,
}

impl Project {
    /// String credential field, empty when absent.
    #[must_use]
    pub fn credential(&self, key: &str) -> &str {
        self.credentials
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// Provider family with any `-fake` suffix removed.
    #[must_use]
    pub fn provider(&self) -> &str {
        self.kind.strip_suffix("-fake").unwrap_or(&self.kind)
    }
}

/// Legacy name for a [`Project`]; the datacenter endpoints share its shape.
pub type Datacenter = Project;

/// Lifecycle state of an environment.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EnvStatus {
    /// Created but never built.
    Initializing,
    /// A build is running.
    InProgress,
    /// Last build succeeded.
    Done,
    /// Last build failed.
    Errored,
    /// Any state this client does not know about.
    #[default]
    #[serde(other)]
    Unknown,
}

impl EnvStatus {
    /// Wire representation of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::InProgress => "in_progress",
            Self::Done => "done",
            Self::Errored => "errored",
            Self::Unknown => "unknown",
        }
    }
}

/// Environment within a project.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Env {
    /// Numeric identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Environment name.
    pub name: String,
    /// Owning project name.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub project: String,
    /// Provider kind inherited from the project.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub provider: String,
    /// Current lifecycle state.
    #[serde(skip_serializing)]
    pub status: EnvStatus,
    /// Environment-level credential overrides.
    #[serde(skip_serializing_if = "JsonMap::is_empty")]
    pub credentials: JsonMap,
    /// Environment options.
    #[serde(skip_serializing_if = "JsonMap::is_empty")]
    pub options: JsonMap,
}

/// Service on the legacy API.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Service {
    /// Build identifier of the latest version.
    pub id: String,
    /// Service name.
    pub name: String,
    /// Datacenter the service runs in.
    pub datacenter: String,
    /// Owning project name.
    pub project: String,
    /// Last update timestamp.
    pub version: String,
    /// Lifecycle state string.
    pub status: String,
    /// User who triggered the latest build.
    pub user_name: String,
    /// Public endpoint, when known.
    pub endpoint: String,
    /// Definition YAML of the latest build.
    pub definition: String,
}

/// One build of an environment or service.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Build {
    /// Build identifier.
    pub id: String,
    /// Lifecycle state string.
    pub status: String,
    /// User who triggered the build.
    pub user_name: String,
    /// Creation timestamp as sent by the server.
    pub created_at: String,
    /// Last update timestamp as sent by the server.
    pub updated_at: String,
    /// Definition YAML submitted for the build.
    pub definition: String,
    /// Components provisioned by the build.
    pub components: Vec<Component>,
}

impl Build {
    /// Whether the build finished successfully.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.status == "done"
    }
}

/// Provisioned provider resource.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Component {
    /// Identifier, e.g. `instance::web-1`.
    #[serde(rename = "_component_id", default)]
    pub component_id: String,
    /// Kind, e.g. `instance`, `network`.
    #[serde(rename = "_component", default)]
    pub kind: String,
    /// Human name.
    #[serde(default)]
    pub name: String,
    /// Provisioning state.
    #[serde(rename = "_state", default)]
    pub state: String,
    /// Provider specific attributes.
    #[serde(flatten)]
    pub extra: JsonMap,
}

impl Component {
    /// String attribute from the provider specific fields, empty when absent.
    #[must_use]
    pub fn attribute(&self, key: &str) -> &str {
        self.extra
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }
}

/// Registered user.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct User {
    /// Numeric identifier.
    pub id: i64,
    /// Group identifier.
    pub group_id: i64,
    /// Group name.
    pub group_name: String,
    /// Login name.
    pub username: String,
    /// Contact email.
    pub email: String,
    /// Whether the user is an administrator.
    #[serde(alias = "is_admin")]
    pub admin: bool,
}

/// Session describing the authenticated caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Session {
    /// User identifier.
    pub id: i64,
    /// Login name.
    pub username: String,
    /// Group identifier.
    pub group_id: i64,
    /// Whether the user is an administrator.
    #[serde(alias = "is_admin")]
    pub admin: bool,
}

/// Log forwarding target configured on the server.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Logger {
    /// Logger kind: `basic`, `logstash` or `rollbar`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Log file path (`basic`).
    #[serde(skip_serializing_if = "String::is_empty")]
    pub logfile: String,
    /// Collector host (`logstash`).
    #[serde(skip_serializing_if = "String::is_empty")]
    pub hostname: String,
    /// Collector port (`logstash`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Connection timeout in milliseconds (`logstash`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    /// Access token (`rollbar`).
    #[serde(skip_serializing_if = "String::is_empty")]
    pub token: String,
    /// Reporting environment (`rollbar`).
    #[serde(skip_serializing_if = "String::is_empty")]
    pub environment: String,
}

/// Response to a definition submission.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BuildSubmission {
    /// Identifier of the build that was queued.
    pub id: String,
    /// Environment or service name.
    pub name: String,
    /// Error description when the submission was rejected.
    pub message: String,
}

/// Credentials posted to `/auth`.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    /// Login name.
    pub username: &'a str,
    /// Plain-text password.
    pub password: &'a str,
}

/// Token returned by `/auth`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct LoginResponse {
    /// Bearer token for subsequent requests.
    #[serde(default)]
    pub token: String,
}

/// Request for a stream id on the legacy service API.
#[derive(Debug, Clone, Serialize)]
pub struct StreamIdRequest {
    /// `<service>-<datacenter>` seed for the id.
    pub id: String,
}

/// Stream id allocated by the legacy service API.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct StreamIdResponse {
    /// Identifier to subscribe to on `/events`.
    #[serde(default)]
    pub uuid: String,
}

/// Body posted to import an existing service.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceImportRequest {
    /// Service name.
    pub name: String,
    /// Datacenter to import from.
    pub datacenter: String,
    /// Optional provider-side filters.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub import_filters: Vec<String>,
}

/// Environment action such as a reset.
#[derive(Debug, Clone, Serialize)]
pub struct EnvAction {
    /// Action name.
    #[serde(rename = "type")]
    pub kind: &'static str,
}

/// Payload for user creation and password changes.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UserUpdate {
    /// Target user id, absent on creation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Login name.
    pub username: String,
    /// Group identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<i64>,
    /// Contact email.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// New password.
    pub password: String,
    /// Current password, required for self-service changes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldpassword: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn project_decodes_credentials_and_provider() {
        let project: Project = serde_json::from_value(json!({
            "id": 4,
            "name": "acme",
            "type": "vcloud-fake",
            "credentials": {"vcloud_url": "https://vcloud", "username": "bob@org"}
        }))
        .expect("project");

        assert_eq!(project.provider(), "vcloud");
        assert_eq!(project.credential("vcloud_url"), "https://vcloud");
        assert_eq!(project.credential("region"), "");
    }

    #[test]
    fn unknown_env_status_falls_back() {
        let env: Env = serde_json::from_value(json!({
            "name": "stg",
            "status": "rebooting"
        }))
        .expect("env");
        assert_eq!(env.status, EnvStatus::Unknown);

        let env: Env = serde_json::from_value(json!({"name": "stg", "status": "in_progress"}))
            .expect("env");
        assert_eq!(env.status, EnvStatus::InProgress);
        assert_eq!(env.status.as_str(), "in_progress");
    }

    #[test]
    fn env_request_body_omits_server_fields() {
        let mut credentials = JsonMap::new();
        credentials.insert("region".into(), json!("eu-west-1"));
        let env = Env {
            name: "stg".into(),
            credentials,
            ..Env::default()
        };

        assert_eq!(
            serde_json::to_value(&env).expect("json"),
            json!({"name": "stg", "credentials": {"region": "eu-west-1"}})
        );
    }

    #[test]
    fn component_keeps_provider_attributes() {
        let component: Component = serde_json::from_value(json!({
            "_component_id": "instance::web-1",
            "_component": "instance",
            "_state": "running",
            "name": "web-1",
            "public_ip": "10.0.0.4"
        }))
        .expect("component");

        assert_eq!(component.kind, "instance");
        assert_eq!(component.attribute("public_ip"), "10.0.0.4");
        assert!(!component.extra.contains_key("name"));
    }

    #[test]
    fn logger_serialises_only_populated_fields() {
        let logger = Logger {
            kind: "logstash".into(),
            hostname: "logs.local".into(),
            port: Some(5000),
            timeout: Some(50_000),
            ..Logger::default()
        };
        assert_eq!(
            serde_json::to_value(&logger).expect("json"),
            json!({"type": "logstash", "hostname": "logs.local", "port": 5000, "timeout": 50000})
        );
    }

    #[test]
    fn user_accepts_legacy_admin_field() {
        let user: User = serde_json::from_value(json!({
            "id": 1,
            "username": "root",
            "is_admin": true
        }))
        .expect("user");
        assert!(user.admin);
    }
}
