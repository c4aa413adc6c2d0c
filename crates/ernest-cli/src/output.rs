//! Output renderers and formatting helpers for CLI commands.

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use ernest_api_models::{Build, Component, Env, Logger, Project, Service, User};
use serde::Serialize;
use serde_json::Value;

use crate::cli::OutputFormat;
use crate::client::{CliError, CliResult};

fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))?;
    println!("{text}");
    Ok(())
}

/// Provider families in display order with their table headings.
const PROVIDER_GROUPS: [(&str, &str); 3] = [("aws", "AWS"), ("vcloud", "VCloud"), ("azure", "Azure")];

pub(crate) fn render_projects(
    projects: &[Project],
    noun: &str,
    format: OutputFormat,
) -> CliResult<()> {
    if let OutputFormat::Json = format {
        return print_json(projects);
    }
    if projects.is_empty() {
        println!("There are no {} created yet.", noun.to_ascii_lowercase());
        return Ok(());
    }

    for (provider, heading) in PROVIDER_GROUPS {
        let group: Vec<_> = projects
            .iter()
            .filter(|project| project.provider() == provider)
            .collect();
        if group.is_empty() {
            continue;
        }
        println!();
        println!("{heading} {noun}");
        if provider == "vcloud" {
            println!(
                "{:<6} {:<24} {:<12} {:<32} {:<20} ORG",
                "ID", "NAME", "TYPE", "URL", "EXTERNAL NETWORK"
            );
            for project in group {
                println!(
                    "{:<6} {:<24} {:<12} {:<32} {:<20} {}",
                    project.id,
                    project.name,
                    project.kind,
                    project.credential("vcloud_url"),
                    project.credential("external_network"),
                    vcloud_org(project.credential("username"))
                );
            }
        } else {
            println!("{:<6} {:<24} {:<12} REGION", "ID", "NAME", "TYPE");
            for project in group {
                println!(
                    "{:<6} {:<24} {:<12} {}",
                    project.id,
                    project.name,
                    project.kind,
                    project.credential("region")
                );
            }
        }
    }
    Ok(())
}

pub(crate) fn render_project(project: &Project, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(project),
        OutputFormat::Table => {
            println!("Name: {}", project.name);
            println!("Type: {}", project.kind);
            match project.provider() {
                "vcloud" => {
                    println!("URL: {}", project.credential("vcloud_url"));
                    println!("Network: {}", project.credential("external_network"));
                    println!("Org: {}", vcloud_org(project.credential("username")));
                }
                "azure" => {
                    println!("Environment: {}", project.credential("azure_environment"));
                }
                _ => println!("Region: {}", project.credential("region")),
            }
            Ok(())
        }
    }
}

pub(crate) fn render_envs(envs: &[Env], format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(envs),
        OutputFormat::Table => {
            println!("{:<24} {:<24} {:<14} PROVIDER", "NAME", "PROJECT", "STATUS");
            for env in envs {
                println!(
                    "{:<24} {:<24} {:<14} {}",
                    env.name,
                    env.project,
                    env.status.as_str(),
                    env.provider
                );
            }
            Ok(())
        }
    }
}

pub(crate) fn render_env(env: &Env, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(env),
        OutputFormat::Table => {
            println!("Name: {}", env.name);
            println!("Project: {}", env.project);
            println!("Provider: {}", env.provider);
            println!("Status: {}", env.status.as_str());
            if !env.options.is_empty() {
                let options: Vec<_> = env
                    .options
                    .iter()
                    .map(|(key, value)| format!("{key}={}", plain(value)))
                    .collect();
                println!("Options: {}", options.join(", "));
            }
            Ok(())
        }
    }
}

pub(crate) fn render_builds(builds: &[Build], format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(builds),
        OutputFormat::Table => {
            println!("{:<38} {:<14} {:<16} CREATED", "ID", "STATUS", "USER");
            for build in builds {
                println!(
                    "{:<38} {:<14} {:<16} {}",
                    build.id,
                    build.status,
                    build.user_name,
                    format_timestamp(&build.created_at)
                );
            }
            Ok(())
        }
    }
}

pub(crate) fn render_build(build: &Build, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(build),
        OutputFormat::Table => {
            println!("Build: {}", build.id);
            println!("Status: {}", build.status);
            println!("User: {}", build.user_name);
            println!("Created: {}", format_timestamp(&build.created_at));
            if !build.updated_at.is_empty() {
                println!("Updated: {}", format_timestamp(&build.updated_at));
            }
            if !build.components.is_empty() {
                println!();
                print_component_table(&build.components);
            }
            Ok(())
        }
    }
}

pub(crate) fn render_services(services: &[Service], format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(services),
        OutputFormat::Table => {
            println!(
                "{:<24} {:<20} {:<14} {:<16} UPDATED",
                "NAME", "DATACENTER", "STATUS", "USER"
            );
            for service in services {
                println!(
                    "{:<24} {:<20} {:<14} {:<16} {}",
                    service.name,
                    service.datacenter,
                    service.status,
                    service.user_name,
                    format_timestamp(&service.version)
                );
            }
            Ok(())
        }
    }
}

pub(crate) fn render_service(service: &Service, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(service),
        OutputFormat::Table => {
            println!("Name: {}", service.name);
            println!("Datacenter: {}", service.datacenter);
            println!("Status: {}", service.status);
            println!("User: {}", service.user_name);
            println!("Updated: {}", format_timestamp(&service.version));
            if !service.endpoint.is_empty() {
                println!("Endpoint: {}", service.endpoint);
            }
            Ok(())
        }
    }
}

pub(crate) fn render_users(users: &[User], format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(users),
        OutputFormat::Table => {
            println!("{:<6} {:<24} {:<20} ADMIN", "ID", "NAME", "GROUP");
            for user in users {
                println!(
                    "{:<6} {:<24} {:<20} {}",
                    user.id,
                    user.username,
                    user.group_name,
                    yes_no(user.admin)
                );
            }
            Ok(())
        }
    }
}

pub(crate) fn render_user(user: &User, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(user),
        OutputFormat::Table => {
            println!("Name: {}", user.username);
            println!("Email: {}", user.email);
            println!("Group: {}", user.group_name);
            println!("Admin: {}", yes_no(user.admin));
            Ok(())
        }
    }
}

pub(crate) fn render_loggers(loggers: &[Logger], format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(loggers),
        OutputFormat::Table => {
            println!("{:<10} DETAILS", "TYPE");
            for logger in loggers {
                println!("{:<10} {}", logger.kind, logger_details(logger));
            }
            Ok(())
        }
    }
}

pub(crate) fn render_components(components: &[Component], format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(components),
        OutputFormat::Table => {
            print_component_table(components);
            Ok(())
        }
    }
}

/// Print the body returned by a dry-run submission.
pub(crate) fn render_dry_run(body: &str, format: OutputFormat) -> CliResult<()> {
    if let OutputFormat::Json = format {
        println!("{body}");
        return Ok(());
    }
    let lines = dry_run_lines(body);
    if lines.is_empty() {
        println!("No changes would be applied.");
    } else {
        println!("The following changes would be applied:");
        for line in lines {
            println!("  - {line}");
        }
    }
    Ok(())
}

fn print_component_table(components: &[Component]) {
    println!("{:<14} {:<28} {:<12} ID", "COMPONENT", "NAME", "STATE");
    for component in components {
        println!(
            "{:<14} {:<28} {:<12} {}",
            component.kind, component.name, component.state, component.component_id
        );
    }
}

#[must_use]
pub(crate) fn dry_run_lines(body: &str) -> Vec<String> {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Array(items)) => items.iter().map(describe_change).collect(),
        Ok(Value::Null) => Vec::new(),
        Ok(other) => vec![describe_change(&other)],
        Err(_) => body
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect(),
    }
}

fn describe_change(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let field = |key: &str| map.get(key).and_then(Value::as_str).unwrap_or_default();
            let action = field("_subject").split('.').nth(1).unwrap_or_default();
            format!(
                "{} {} {}",
                field("_component"),
                field("name"),
                action
            )
            .trim()
            .to_string()
        }
        other => plain(other),
    }
}

fn logger_details(logger: &Logger) -> String {
    match logger.kind.as_str() {
        "basic" => format!("logfile={}", logger.logfile),
        "logstash" => format!(
            "hostname={} port={} timeout={}",
            logger.hostname,
            logger.port.map_or_else(String::new, |port| port.to_string()),
            logger
                .timeout
                .map_or_else(String::new, |timeout| timeout.to_string())
        ),
        "rollbar" => format!("environment={}", logger.environment),
        _ => String::new(),
    }
}

/// Organisation part of a `user@org` VCloud username.
#[must_use]
pub(crate) fn vcloud_org(username: &str) -> &str {
    match username.split_once('@') {
        Some((_, org)) if !org.contains('@') => org,
        _ => "",
    }
}

/// Render RFC 3339 timestamps in a compact UTC form, passing other text through.
#[must_use]
pub(crate) fn format_timestamp(raw: &str) -> String {
    DateTime::parse_from_rfc3339(raw).map_or_else(
        |_| raw.to_string(),
        |parsed| {
            parsed
                .with_timezone(&Utc)
                .format("%Y-%m-%d %H:%M:%S UTC")
                .to_string()
        },
    )
}

const fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

fn plain(value: &Value) -> String {
    value
        .as_str()
        .map_or_else(|| value.to_string(), str::to_string)
}
