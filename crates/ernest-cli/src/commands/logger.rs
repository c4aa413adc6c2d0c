//! Server-side log sinks. Every operation here needs an admin session.

use ernest_api_models::Logger;
use reqwest::{Method, StatusCode};

use crate::cli::{LoggerAdd, LoggerCommand, LoggerDeleteArgs};
use crate::client::{AppContext, CliError, CliResult, decode_list, send_checked};
use crate::output::render_loggers;

const LOGGERS: &str = "/api/loggers/";
const ADMIN_ONLY: &str =
    "You're not allowed to perform this action, please log in with an admin account";

pub(crate) async fn handle_logger(ctx: &AppContext, command: LoggerCommand) -> CliResult<()> {
    match command {
        LoggerCommand::List => handle_list(ctx).await,
        LoggerCommand::Add(add) => handle_add(ctx, add).await,
        LoggerCommand::Delete(args) => handle_delete(ctx, args).await,
    }
}

async fn handle_list(ctx: &AppContext) -> CliResult<()> {
    let response = send_checked(
        ctx.authorized(Method::GET, LOGGERS)?,
        LOGGERS,
        &[(StatusCode::FORBIDDEN, ADMIN_ONLY)],
    )
    .await?;
    let loggers: Vec<Logger> = decode_list(response).await?;
    render_loggers(&loggers, ctx.output)
}

fn required(value: Option<String>, message: &str) -> CliResult<String> {
    value
        .filter(|value| !value.is_empty())
        .ok_or_else(|| CliError::validation(message))
}

fn logger(add: LoggerAdd) -> CliResult<Logger> {
    let logger = match add {
        LoggerAdd::Basic(args) => Logger {
            kind: "basic".into(),
            logfile: required(args.logfile, "You should specify a logfile with --logfile")?,
            ..Logger::default()
        },
        LoggerAdd::Logstash(args) => Logger {
            kind: "logstash".into(),
            hostname: required(args.hostname, "You should specify a hostname with --hostname")?,
            port: Some(
                args.port
                    .filter(|port| *port != 0)
                    .ok_or_else(|| CliError::validation("You should specify a port with --port"))?,
            ),
            timeout: Some(args.timeout),
            ..Logger::default()
        },
        LoggerAdd::Rollbar(args) => Logger {
            kind: "rollbar".into(),
            token: required(args.token, "You should specify a token with --token")?,
            environment: args.environment.unwrap_or_default(),
            ..Logger::default()
        },
    };
    Ok(logger)
}

async fn handle_add(ctx: &AppContext, add: LoggerAdd) -> CliResult<()> {
    ctx.require_token()?;
    let logger = logger(add)?;
    send_checked(
        ctx.authorized(Method::POST, LOGGERS)?.json(&logger),
        LOGGERS,
        &[(StatusCode::FORBIDDEN, ADMIN_ONLY)],
    )
    .await?;
    println!("Logger '{}' successfully configured", logger.kind);
    Ok(())
}

async fn handle_delete(ctx: &AppContext, args: LoggerDeleteArgs) -> CliResult<()> {
    let path = format!("{LOGGERS}{}", args.kind);
    let body = Logger {
        kind: args.kind.clone(),
        ..Logger::default()
    };
    send_checked(
        ctx.authorized(Method::DELETE, &path)?.json(&body),
        &path,
        &[(StatusCode::FORBIDDEN, ADMIN_ONLY)],
    )
    .await?;
    println!("Logger '{}' successfully deleted", args.kind);
    Ok(())
}
