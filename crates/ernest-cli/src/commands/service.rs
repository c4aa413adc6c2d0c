//! Legacy service API.
//!
//! Services predate projects and environments. Their builds are correlated
//! to an event stream id requested up front, so the listener is running
//! before the build request is sent.

use anyhow::anyhow;
use ernest_api_models::{
    Build, Service, ServiceImportRequest, StreamIdRequest, StreamIdResponse,
};
use ernest_definition::{Definition, DefinitionError};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use tracing::info;

use crate::cli::{
    ApplyArgs, NameArgs, ServiceCommand, ServiceDestroyArgs, ServiceImportArgs, ServiceRevertArgs,
};
use crate::client::{
    AppContext, CONTENT_TYPE_YAML, CliError, CliResult, NO_PERMISSION, decode_json, decode_list,
    read_text, send_checked,
};
use crate::commands::monitor::{EventMonitor, MonitorOptions, monitorize, report};
use crate::output::{render_builds, render_dry_run, render_service, render_services};

const SERVICES: &str = "/api/services/";

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    #[serde(default)]
    stream_id: String,
}

pub(crate) async fn handle_service(ctx: &AppContext, command: ServiceCommand) -> CliResult<()> {
    match command {
        ServiceCommand::List => handle_list(ctx).await,
        ServiceCommand::Info(args) => handle_info(ctx, &args).await,
        ServiceCommand::Apply(args) => handle_apply(ctx, args).await,
        ServiceCommand::Destroy(args) => handle_destroy(ctx, args).await,
        ServiceCommand::ForceDestroy(args) => handle_force_destroy(ctx, &args).await,
        ServiceCommand::Reset(args) => handle_reset(ctx, &args).await,
        ServiceCommand::Revert(args) => handle_revert(ctx, args).await,
        ServiceCommand::Import(args) => handle_import(ctx, args).await,
        ServiceCommand::Sync(args) => handle_sync(ctx, &args).await,
        ServiceCommand::History(args) => handle_history(ctx, &args).await,
    }
}

fn service_path(name: &str) -> String {
    format!("{SERVICES}{name}")
}

fn definition_error(err: DefinitionError) -> CliError {
    CliError::validation(err.to_string())
}

async fn handle_list(ctx: &AppContext) -> CliResult<()> {
    let response = send_checked(ctx.authorized(Method::GET, SERVICES)?, SERVICES, &[]).await?;
    let services: Vec<Service> = decode_list(response).await?;
    render_services(&services, ctx.output)
}

async fn fetch_service(ctx: &AppContext, name: &str) -> CliResult<Service> {
    let path = service_path(name);
    let response = send_checked(
        ctx.authorized(Method::GET, &path)?,
        &path,
        &[
            (StatusCode::FORBIDDEN, NO_PERMISSION),
            (StatusCode::NOT_FOUND, "Specified service name does not exist"),
        ],
    )
    .await?;
    decode_json(response).await
}

async fn handle_info(ctx: &AppContext, args: &NameArgs) -> CliResult<()> {
    let service = fetch_service(ctx, &args.name).await?;
    render_service(&service, ctx.output)
}

async fn handle_apply(ctx: &AppContext, args: ApplyArgs) -> CliResult<()> {
    ctx.require_token()?;
    let mut definition = Definition::load_path(&args.file).map_err(definition_error)?;
    definition.load_file_imports().map_err(definition_error)?;
    submit(ctx, &definition, args.dry, args.no_monitor).await
}

async fn handle_revert(ctx: &AppContext, args: ServiceRevertArgs) -> CliResult<()> {
    let path = format!("{}/builds/{}", service_path(&args.name), args.build_id);
    let response = send_checked(
        ctx.authorized(Method::GET, &path)?,
        &path,
        &[(StatusCode::NOT_FOUND, "Specified build does not exist")],
    )
    .await?;
    let build: Build = decode_json(response).await?;
    let definition = Definition::load(build.definition.as_bytes()).map_err(definition_error)?;
    submit(ctx, &definition, args.dry, false).await
}

async fn submit(
    ctx: &AppContext,
    definition: &Definition,
    dry: bool,
    no_monitor: bool,
) -> CliResult<()> {
    let name = definition
        .name()
        .ok_or_else(|| CliError::validation("Please specify a name on your definition file"))?;
    let datacenter = definition.datacenter().ok_or_else(|| {
        CliError::validation("Please specify a datacenter on your definition file")
    })?;
    let yaml = definition.save().map_err(definition_error)?;

    if dry {
        let path = format!("{SERVICES}?dry=true");
        let response = send_checked(yaml_post(ctx, &path, yaml)?, &path, &[]).await?;
        let body = read_text(response).await?;
        return render_dry_run(&body, ctx.output);
    }

    let stream_id = stream_id(ctx, name, datacenter).await?;
    info!(stream_id = %stream_id, service = name, "submitting service definition");
    monitored(ctx, &stream_id, no_monitor, yaml_post(ctx, SERVICES, yaml)?, SERVICES).await
}

fn yaml_post(ctx: &AppContext, path: &str, yaml: String) -> CliResult<RequestBuilder> {
    Ok(ctx
        .authorized(Method::POST, path)?
        .header(CONTENT_TYPE, CONTENT_TYPE_YAML)
        .body(yaml))
}

async fn stream_id(ctx: &AppContext, name: &str, datacenter: &str) -> CliResult<String> {
    let path = "/api/services/uuid/";
    let request = StreamIdRequest {
        id: format!("{name}-{datacenter}"),
    };
    let response =
        send_checked(ctx.authorized(Method::POST, path)?.json(&request), path, &[]).await?;
    let StreamIdResponse { uuid } = decode_json(response).await?;
    if uuid.is_empty() {
        return Err(CliError::failure(anyhow!(
            "server did not return a build stream id"
        )));
    }
    Ok(uuid)
}

/// Start listening on `stream_id`, send `request`, then wait for the build.
async fn monitored(
    ctx: &AppContext,
    stream_id: &str,
    no_monitor: bool,
    request: RequestBuilder,
    path: &str,
) -> CliResult<()> {
    if no_monitor {
        send_checked(request, path, &[]).await?;
        println!("Build ID: {stream_id}");
        return Ok(());
    }

    let listener = EventMonitor::new(ctx, stream_id, MonitorOptions::default())?;
    let handle = tokio::spawn(listener.run());
    if let Err(err) = send_checked(request, path, &[]).await {
        handle.abort();
        return Err(err);
    }

    let outcome = handle
        .await
        .map_err(|err| CliError::failure(anyhow!("build monitor stopped unexpectedly: {err}")))??;
    report(outcome);
    Ok(())
}

async fn handle_destroy(ctx: &AppContext, args: ServiceDestroyArgs) -> CliResult<()> {
    let service = fetch_service(ctx, &args.name).await?;
    if service.status == "in_progress" {
        return Err(CliError::validation(format!(
            "The service {} cannot be destroyed as it is currently 'in_progress'",
            args.name
        )));
    }

    let path = service_path(&args.name);
    let response = send_checked(ctx.authorized(Method::DELETE, &path)?, &path, &[]).await?;
    let destroy: DestroyResponse = decode_json(response).await?;
    if args.no_monitor || destroy.stream_id.is_empty() {
        println!("Service '{}' destroy requested", args.name);
        return Ok(());
    }
    monitorize(ctx, &destroy.stream_id, &MonitorOptions::default()).await?;
    Ok(())
}

async fn handle_force_destroy(ctx: &AppContext, args: &NameArgs) -> CliResult<()> {
    let path = format!("{}/force/", service_path(&args.name));
    send_checked(ctx.authorized(Method::DELETE, &path)?, &path, &[]).await?;
    println!("Service '{}' successfully removed", args.name);
    Ok(())
}

async fn handle_reset(ctx: &AppContext, args: &NameArgs) -> CliResult<()> {
    let service = fetch_service(ctx, &args.name).await?;
    if service.status != "in_progress" {
        return Err(CliError::validation(format!(
            "The service '{}' cannot be reset as its status is '{}'",
            args.name, service.status
        )));
    }

    let path = format!("{}/reset/", service_path(&args.name));
    send_checked(ctx.authorized(Method::POST, &path)?, &path, &[]).await?;
    println!("Service '{}' successfully reset", args.name);
    Ok(())
}

async fn handle_import(ctx: &AppContext, args: ServiceImportArgs) -> CliResult<()> {
    ctx.require_token()?;
    let stream_id = stream_id(ctx, &args.name, &args.datacenter).await?;
    let path = "/api/services/import/";
    let request = ServiceImportRequest {
        name: args.name,
        datacenter: args.datacenter,
        import_filters: args.filters,
    };
    let builder = ctx.authorized(Method::POST, path)?.json(&request);
    monitored(ctx, &stream_id, false, builder, path).await
}

async fn handle_sync(ctx: &AppContext, args: &NameArgs) -> CliResult<()> {
    let path = format!("{}/sync/", service_path(&args.name));
    let response = send_checked(ctx.authorized(Method::POST, &path)?, &path, &[]).await?;
    let body = read_text(response).await?;
    if !body.trim().is_empty() {
        println!("{}", body.trim());
    }
    Ok(())
}

async fn handle_history(ctx: &AppContext, args: &NameArgs) -> CliResult<()> {
    let path = format!("{}/builds/", service_path(&args.name));
    let response = send_checked(ctx.authorized(Method::GET, &path)?, &path, &[]).await?;
    let builds: Vec<Build> = decode_list(response).await?;
    render_builds(&builds, ctx.output)
}
