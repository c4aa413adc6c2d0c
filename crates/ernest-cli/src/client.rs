//! Shared client utilities, error types and response classification.

use std::fmt::{self, Display, Formatter};
use std::io::{self, IsTerminal};
use std::time::Duration;

use anyhow::anyhow;
use ernest_api_models::ApiMessage;
use ernest_config::{Config, ConfigError, ConfigStore};
use ernest_telemetry::TelemetryEmitter;
use rand::{Rng, distr::Alphanumeric};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::cli::OutputFormat;

pub(crate) const HEADER_REQUEST_ID: &str = "x-request-id";
pub(crate) const HEADER_LAST_EVENT_ID: &str = "Last-Event-ID";
pub(crate) const CONTENT_TYPE_YAML: &str = "application/yaml";

pub(crate) const NOT_LOGGED_IN: &str = "You're not allowed to perform this action, please log in";
pub(crate) const NO_PERMISSION: &str = "You don't have permissions to perform this action";
const NO_TARGET: &str = "You should specify the target url first, run `ernest target <url>`";
const CONNECTION_REFUSED: &str = "Connection refused: is the Ernest target reachable?";

/// CLI-level error type to distinguish validation from operational failures.
#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    Failure(anyhow::Error),
    ConnectionRefused,
}

/// Convenience alias for functions returning a `CliError`.
pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
            Self::ConnectionRefused => 4,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
            Self::ConnectionRefused => CONNECTION_REFUSED.to_string(),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("cli error")
    }
}

impl std::error::Error for CliError {}

/// Dependencies constructed from environment flags and CLI options.
#[derive(Clone)]
pub(crate) struct CliDependencies {
    pub(crate) client: Client,
    pub(crate) telemetry: Option<TelemetryEmitter>,
}

impl CliDependencies {
    /// Construct a configured HTTP client and optional telemetry emitter.
    pub(crate) fn from_env(timeout_secs: u64, trace_id: &str) -> CliResult<Self> {
        let mut default_headers = HeaderMap::new();
        let request_id = HeaderValue::from_str(trace_id).map_err(|_| {
            CliError::failure(anyhow!("trace identifier contains invalid characters"))
        })?;
        default_headers.insert(HEADER_REQUEST_ID, request_id);

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .default_headers(default_headers)
            .build()
            .map_err(|err| CliError::failure(anyhow!("failed to build HTTP client: {err}")))?;

        Ok(Self {
            client,
            telemetry: TelemetryEmitter::from_env(),
        })
    }
}

/// Application context passed to command handlers.
#[derive(Clone)]
pub(crate) struct AppContext {
    pub(crate) client: Client,
    pub(crate) base_url: Option<Url>,
    pub(crate) token: Option<String>,
    pub(crate) user: Option<String>,
    pub(crate) store: ConfigStore,
    pub(crate) output: OutputFormat,
}

impl AppContext {
    /// Build a context from persisted configuration.
    pub(crate) fn from_config(
        client: Client,
        store: ConfigStore,
        config: Config,
        output: OutputFormat,
    ) -> Self {
        let base_url = config.url.as_deref().and_then(|raw| match raw.parse::<Url>() {
            Ok(url) => Some(url),
            Err(err) => {
                debug!(url = raw, error = %err, "ignoring unparsable stored target");
                None
            }
        });
        let token = config.session_token().map(str::to_string);
        Self {
            client,
            base_url,
            token,
            user: config.user,
            store,
            output,
        }
    }

    /// Session token, or the standard "please log in" validation error.
    pub(crate) fn require_token(&self) -> CliResult<&str> {
        self.token
            .as_deref()
            .ok_or_else(|| CliError::validation(NOT_LOGGED_IN))
    }

    /// Absolute URL for an API path on the configured target.
    pub(crate) fn endpoint(&self, path: &str) -> CliResult<Url> {
        let base = self
            .base_url
            .as_ref()
            .ok_or_else(|| CliError::validation(NO_TARGET))?;
        base.join(path)
            .map_err(|err| CliError::failure(anyhow!("invalid base URL: {err}")))
    }

    /// Request carrying the session token; fails before any I/O when logged out.
    pub(crate) fn authorized(&self, method: Method, path: &str) -> CliResult<RequestBuilder> {
        let token = self.require_token()?;
        let url = self.endpoint(path)?;
        Ok(self.client.request(method, url).bearer_auth(token))
    }
}

/// Send a request, mapping every transport failure to `ConnectionRefused`.
pub(crate) async fn send(builder: RequestBuilder, path: &str) -> CliResult<Response> {
    builder.send().await.map_err(|err| {
        debug!(path, error = %err, "request failed without a response");
        CliError::ConnectionRefused
    })
}

/// Send a request and classify non-success statuses.
pub(crate) async fn send_checked(
    builder: RequestBuilder,
    path: &str,
    overrides: &[(StatusCode, &str)],
) -> CliResult<Response> {
    let response = send(builder, path).await?;
    debug!(path, status = %response.status(), "response received");
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(classify_status(response, overrides).await)
    }
}

/// Read a response body as text.
pub(crate) async fn read_text(response: Response) -> CliResult<String> {
    response
        .text()
        .await
        .map_err(|err| CliError::failure(anyhow!("failed to read response body: {err}")))
}

/// Decode a JSON response body; a literal `null` is an unexpected response.
pub(crate) async fn decode_json<T: DeserializeOwned>(response: Response) -> CliResult<T> {
    let body = read_text(response).await?;
    if body.trim() == "null" {
        return Err(CliError::failure(anyhow!(
            "Unexpected endpoint response : {}",
            body.trim()
        )));
    }
    serde_json::from_str(&body)
        .map_err(|err| CliError::failure(anyhow!("failed to decode response: {err}")))
}

/// Decode a JSON array body; an empty or `null` body is an empty list.
pub(crate) async fn decode_list<T: DeserializeOwned>(response: Response) -> CliResult<Vec<T>> {
    let body = read_text(response).await?;
    let body = body.trim();
    if body.is_empty() || body == "null" {
        return Ok(Vec::new());
    }
    serde_json::from_str(body)
        .map_err(|err| CliError::failure(anyhow!("failed to decode response: {err}")))
}

/// Classify a non-success HTTP response into a CLI error.
///
/// Per-call overrides win; otherwise auth statuses get fixed messages and the
/// rest surface the server's `message` field or raw body.
pub(crate) async fn classify_status(
    response: Response,
    overrides: &[(StatusCode, &str)],
) -> CliError {
    let status = response.status();
    let bytes = response.bytes().await.unwrap_or_default();
    let body_text = String::from_utf8_lossy(&bytes).trim().to_string();
    let server_message = serde_json::from_slice::<ApiMessage>(&bytes)
        .ok()
        .map(|api| api.message)
        .filter(|message| !message.is_empty());

    if let Some((_, message)) = overrides.iter().find(|(code, _)| *code == status) {
        return by_status(status, (*message).to_string());
    }

    let detail = match status {
        StatusCode::UNAUTHORIZED => "Invalid session, please log in".to_string(),
        StatusCode::FORBIDDEN => NO_PERMISSION.to_string(),
        _ => server_message.unwrap_or_else(|| {
            if body_text.is_empty() {
                format!("request failed with status {status}")
            } else {
                body_text
            }
        }),
    };
    by_status(status, detail)
}

fn by_status(status: StatusCode, message: String) -> CliError {
    if matches!(
        status,
        StatusCode::BAD_REQUEST
            | StatusCode::UNAUTHORIZED
            | StatusCode::FORBIDDEN
            | StatusCode::CONFLICT
            | StatusCode::UNPROCESSABLE_ENTITY
    ) {
        CliError::validation(message)
    } else {
        CliError::failure(anyhow!(message))
    }
}

/// Wrap a local configuration error as an operational failure.
pub(crate) fn config_failure(err: ConfigError) -> CliError {
    CliError::failure(anyhow!(err))
}

/// Prompt for a secret on the terminal; refuse when stdin is not interactive.
pub(crate) fn prompt_secret(prompt: &str, missing: &str) -> CliResult<String> {
    if !io::stdin().is_terminal() {
        return Err(CliError::validation(missing));
    }
    rpassword::prompt_password(prompt)
        .map_err(|err| CliError::failure(anyhow!("failed to read password: {err}")))
}

/// Generate a random alphanumeric string of the requested length.
#[must_use]
pub(crate) fn random_string(len: usize) -> String {
    let mut rng = rand::rng();
    std::iter::repeat_with(|| rng.sample(Alphanumeric) as char)
        .take(len)
        .collect()
}
