//! Optional forwarding of command outcomes to a collector endpoint.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use reqwest::{Client, Url};
use serde::Serialize;

/// Environment variable naming the collector endpoint.
pub const TELEMETRY_ENDPOINT_ENV: &str = "ERNEST_TELEMETRY_ENDPOINT";

/// Telemetry emitter used to forward CLI outcomes.
#[derive(Clone, Debug)]
pub struct TelemetryEmitter {
    client: Client,
    endpoint: Url,
}

impl TelemetryEmitter {
    /// Build an emitter from `ERNEST_TELEMETRY_ENDPOINT`, if set and valid.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let endpoint = std::env::var(TELEMETRY_ENDPOINT_ENV).ok()?;
        let endpoint = endpoint.parse().ok()?;
        Self::new(endpoint)
    }

    /// Build an emitter targeting `endpoint` with a short request timeout.
    #[must_use]
    pub fn new(endpoint: Url) -> Option<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(2))
            .build()
            .ok()?;
        Some(Self { client, endpoint })
    }

    /// Post a single outcome record. Delivery failures are logged and dropped.
    pub async fn emit(
        &self,
        trace_id: &str,
        command: &str,
        outcome: &str,
        exit_code: i32,
        message: Option<&str>,
    ) {
        let event = TelemetryEvent {
            command,
            outcome,
            trace_id,
            exit_code,
            message,
            timestamp_ms: timestamp_now_ms(),
        };

        if let Err(err) = self
            .client
            .post(self.endpoint.clone())
            .json(&event)
            .send()
            .await
        {
            tracing::debug!(error = %err, "telemetry emit failed");
        }
    }
}

#[derive(Serialize)]
struct TelemetryEvent<'a> {
    command: &'a str,
    outcome: &'a str,
    trace_id: &'a str,
    exit_code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
    timestamp_ms: u64,
}

/// Millisecond timestamp helper for telemetry.
#[must_use]
pub fn timestamp_now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
