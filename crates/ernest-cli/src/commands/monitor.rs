//! Live build progress over the `/events` server-sent event stream.

use std::time::Duration;

use anyhow::anyhow;
use ernest_api_models::Build;
use ernest_events::{BuildEvent, BuildOutcome, SseDecoder};
use futures_util::StreamExt;
use reqwest::header::ACCEPT;
use reqwest::{Client, Method, Response, Url};
use tracing::{debug, info, warn};

use crate::cli::EnvRef;
use crate::client::{
    AppContext, CliError, CliResult, HEADER_LAST_EVENT_ID, classify_status, decode_list,
    send_checked,
};

const EVENT_STREAM: &str = "text/event-stream";
/// Overrides the client-wide timeout; builds can run for a long time.
const STREAM_TIMEOUT: Duration = Duration::from_secs(6 * 60 * 60);

/// Reconnection policy for a build stream.
#[derive(Debug, Clone, Copy)]
pub(crate) struct MonitorOptions {
    pub(crate) reconnect_attempts: u32,
    pub(crate) retry: Duration,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self {
            reconnect_attempts: 3,
            retry: Duration::from_secs(2),
        }
    }
}

/// How a monitored stream ended when the build did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MonitorOutcome {
    Completed,
    Disconnected,
}

/// Listener for one build stream; owns everything it needs so it can be
/// spawned onto the runtime.
pub(crate) struct EventMonitor {
    client: Client,
    url: Url,
    token: String,
    stream_id: String,
    options: MonitorOptions,
}

impl EventMonitor {
    pub(crate) fn new(ctx: &AppContext, stream_id: &str, options: MonitorOptions) -> CliResult<Self> {
        let token = ctx.require_token()?.to_string();
        let mut url = ctx.endpoint("/events")?;
        url.query_pairs_mut().append_pair("stream", stream_id);
        Ok(Self {
            client: ctx.client.clone(),
            url,
            token,
            stream_id: stream_id.to_string(),
            options,
        })
    }

    pub(crate) async fn run(self) -> CliResult<MonitorOutcome> {
        let mut decoder = SseDecoder::new();
        let mut attempt: u32 = 0;

        loop {
            let mut request = self
                .client
                .get(self.url.clone())
                .bearer_auth(&self.token)
                .header(ACCEPT, EVENT_STREAM)
                .timeout(STREAM_TIMEOUT);
            if let Some(last_id) = decoder.last_event_id().filter(|id| !id.is_empty()) {
                request = request.header(HEADER_LAST_EVENT_ID, last_id);
            }

            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    debug!(stream_id = %self.stream_id, attempt, "event stream open");
                    if let Some(outcome) = self.consume(response, &mut decoder).await? {
                        return Ok(outcome);
                    }
                }
                Ok(response) => return Err(classify_status(response, &[]).await),
                Err(err) if attempt == 0 => {
                    debug!(stream_id = %self.stream_id, error = %err, "event stream unreachable");
                    return Err(CliError::ConnectionRefused);
                }
                Err(err) => {
                    warn!(stream_id = %self.stream_id, attempt, error = %err, "event stream reconnect failed");
                }
            }

            attempt += 1;
            if attempt > self.options.reconnect_attempts {
                warn!(stream_id = %self.stream_id, "giving up on event stream");
                return Ok(MonitorOutcome::Disconnected);
            }
            let delay = decoder
                .retry_ms()
                .map_or(self.options.retry, Duration::from_millis);
            decoder.reset();
            info!(stream_id = %self.stream_id, attempt, "reconnecting to event stream");
            tokio::time::sleep(delay).await;
        }
    }

    /// Print progress until a terminal event or the end of the response.
    async fn consume(
        &self,
        response: Response,
        decoder: &mut SseDecoder,
    ) -> CliResult<Option<MonitorOutcome>> {
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(err) => {
                    warn!(stream_id = %self.stream_id, error = %err, "event stream dropped");
                    return Ok(None);
                }
            };

            for frame in decoder.push(&chunk) {
                let event = match BuildEvent::from_frame(&frame) {
                    Ok(event) => event,
                    Err(err) => {
                        warn!(payload = err.payload(), error = %err, "skipping malformed build event");
                        continue;
                    }
                };
                for change in &event.changes {
                    println!("{}", change.describe());
                }
                match event.outcome() {
                    BuildOutcome::Done => return Ok(Some(MonitorOutcome::Completed)),
                    BuildOutcome::Errored => return Err(build_failure(&event)),
                    BuildOutcome::InProgress => {}
                }
            }
        }
        Ok(None)
    }
}

fn build_failure(event: &BuildEvent) -> CliError {
    let errors = event.errors();
    if errors.is_empty() {
        return CliError::failure(anyhow!("Build '{}' failed", event.id));
    }
    let mut message = format!("Build '{}' failed:", event.id);
    for error in errors {
        message.push_str("\n  - ");
        message.push_str(&error);
    }
    CliError::failure(anyhow!(message))
}

/// Follow a build stream in the foreground.
pub(crate) async fn monitorize(
    ctx: &AppContext,
    stream_id: &str,
    options: &MonitorOptions,
) -> CliResult<MonitorOutcome> {
    let outcome = EventMonitor::new(ctx, stream_id, *options)?.run().await?;
    report(outcome);
    Ok(outcome)
}

pub(crate) fn report(outcome: MonitorOutcome) {
    if outcome == MonitorOutcome::Disconnected {
        println!("Lost connection to the build event stream; the build continues on the server");
    }
}

pub(crate) async fn handle_monitor(ctx: &AppContext, args: EnvRef) -> CliResult<()> {
    let path = format!("/api/projects/{}/envs/{}/builds/", args.project, args.env);
    let response = send_checked(ctx.authorized(Method::GET, &path)?, &path, &[]).await?;
    let builds: Vec<Build> = decode_list(response).await?;
    let Some(latest) = builds.into_iter().max_by(|a, b| a.created_at.cmp(&b.created_at)) else {
        return Err(CliError::validation(format!(
            "There are no builds for environment '{} / {}'",
            args.project, args.env
        )));
    };

    if latest.is_done() {
        println!("Environment has been successfully built");
        return Ok(());
    }
    monitorize(ctx, &latest.id, &MonitorOptions::default()).await?;
    Ok(())
}
