//! Project and datacenter management.
//!
//! Both resources share one command surface; the legacy datacenter API takes
//! credentials flattened into the request body while projects nest them under
//! `credentials`.

use std::fmt::Display;
use std::path::Path;

use ernest_api_models::{JsonMap, Project};
use ernest_config::{ProviderTemplate, load_provider_template};
use reqwest::{Method, StatusCode};
use serde_json::{Value, json};
use tracing::info;

use crate::cli::{
    AwsCreateArgs, AwsUpdateArgs, AzureCreateArgs, NameArgs, ProviderCommand, ProviderCreate,
    ProviderUpdate, VcloudCreateArgs, VcloudUpdateArgs,
};
use crate::client::{AppContext, CliError, CliResult, decode_json, decode_list, send_checked};
use crate::output::{render_project, render_projects};

const FIX_ERRORS: &str = "Please, fix the error shown below to continue";
const AZURE_ENVIRONMENTS: [&str; 4] = ["public", "usgovernment", "german", "china"];

/// Which provider resource a command operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProviderApi {
    Projects,
    Datacenters,
}

impl ProviderApi {
    const fn path(self) -> &'static str {
        match self {
            Self::Projects => "/api/projects/",
            Self::Datacenters => "/api/datacenters/",
        }
    }

    const fn label(self) -> &'static str {
        match self {
            Self::Projects => "Project",
            Self::Datacenters => "Datacenter",
        }
    }

    const fn plural(self) -> &'static str {
        match self {
            Self::Projects => "Projects",
            Self::Datacenters => "Datacenters",
        }
    }

    fn item_path(self, id: impl Display) -> String {
        format!("{}{id}", self.path())
    }

    fn not_found(self, name: &str) -> String {
        format!(
            "{} '{name}' does not exist, please specify a different {} name",
            self.label(),
            self.label().to_ascii_lowercase()
        )
    }

    fn body(self, name: &str, kind: Option<&str>, credentials: JsonMap) -> Value {
        match self {
            Self::Projects => {
                let mut body = json!({ "name": name, "credentials": credentials });
                if let (Some(kind), Value::Object(map)) = (kind, &mut body) {
                    map.insert("type".into(), Value::from(kind));
                }
                body
            }
            Self::Datacenters => {
                let mut map = credentials;
                map.insert("name".into(), Value::from(name));
                if let Some(kind) = kind {
                    map.insert("type".into(), Value::from(kind));
                }
                Value::Object(map)
            }
        }
    }
}

pub(crate) async fn handle_provider(
    ctx: &AppContext,
    api: ProviderApi,
    command: ProviderCommand,
) -> CliResult<()> {
    match command {
        ProviderCommand::List => handle_list(ctx, api).await,
        ProviderCommand::Info(args) => handle_info(ctx, api, args).await,
        ProviderCommand::Create(create) => handle_create(ctx, api, create).await,
        ProviderCommand::Update(update) => handle_update(ctx, api, update).await,
        ProviderCommand::Delete(args) => handle_delete(ctx, api, args).await,
    }
}

async fn handle_list(ctx: &AppContext, api: ProviderApi) -> CliResult<()> {
    let projects = list(ctx, api).await?;
    render_projects(&projects, api.plural(), ctx.output)
}

async fn handle_info(ctx: &AppContext, api: ProviderApi, args: NameArgs) -> CliResult<()> {
    let path = api.item_path(&args.name);
    let not_found = api.not_found(&args.name);
    let response = send_checked(
        ctx.authorized(Method::GET, &path)?,
        &path,
        &[(StatusCode::NOT_FOUND, not_found.as_str())],
    )
    .await?;
    let project: Project = decode_json(response).await?;
    render_project(&project, ctx.output)
}

/// Name, type and credentials of a provider about to be created.
struct NewProvider {
    name: String,
    kind: String,
    credentials: JsonMap,
}

async fn handle_create(ctx: &AppContext, api: ProviderApi, create: ProviderCreate) -> CliResult<()> {
    ctx.require_token()?;
    let provider = match create {
        ProviderCreate::Aws(args) => aws_provider(args)?,
        ProviderCreate::Vcloud(args) => vcloud_provider(args)?,
        ProviderCreate::Azure(args) => azure_provider(args)?,
    };

    let conflict = format!(
        "{} '{}' already exists, please specify a different name",
        api.label(),
        provider.name
    );
    let body = api.body(&provider.name, Some(&provider.kind), provider.credentials);
    send_checked(
        ctx.authorized(Method::POST, api.path())?.json(&body),
        api.path(),
        &[(StatusCode::CONFLICT, conflict.as_str())],
    )
    .await?;

    info!(name = %provider.name, kind = %provider.kind, "provider created");
    println!("'{}' successfully created", provider.name);
    Ok(())
}

async fn handle_update(ctx: &AppContext, api: ProviderApi, update: ProviderUpdate) -> CliResult<()> {
    ctx.require_token()?;
    let (name, credentials) = match update {
        ProviderUpdate::Aws(args) => aws_update(args)?,
        ProviderUpdate::Vcloud(args) => vcloud_update(args)?,
    };

    let id = resolve_id(ctx, api, &name).await?;
    let path = api.item_path(id);
    let body = api.body(&name, None, credentials);
    send_checked(ctx.authorized(Method::PUT, &path)?.json(&body), &path, &[]).await?;

    println!("{} {name} successfully updated", api.label());
    Ok(())
}

async fn handle_delete(ctx: &AppContext, api: ProviderApi, args: NameArgs) -> CliResult<()> {
    let id = resolve_id(ctx, api, &args.name).await?;
    let path = api.item_path(id);
    send_checked(ctx.authorized(Method::DELETE, &path)?, &path, &[]).await?;

    println!("{} {} successfully removed", api.label(), args.name);
    Ok(())
}

async fn list(ctx: &AppContext, api: ProviderApi) -> CliResult<Vec<Project>> {
    let response = send_checked(ctx.authorized(Method::GET, api.path())?, api.path(), &[]).await?;
    decode_list(response).await
}

async fn resolve_id(ctx: &AppContext, api: ProviderApi, name: &str) -> CliResult<i64> {
    list(ctx, api)
        .await?
        .into_iter()
        .find(|project| project.name == name)
        .map(|project| project.id)
        .ok_or_else(|| CliError::validation(api.not_found(name)))
}

fn template(path: Option<&Path>) -> CliResult<ProviderTemplate> {
    path.map_or_else(
        || Ok(ProviderTemplate::default()),
        |path| load_provider_template(path).map_err(|err| CliError::validation(err.to_string())),
    )
}

/// Collects every missing required value so they can be reported together.
#[derive(Default)]
struct Missing(Vec<&'static str>);

impl Missing {
    fn take(&mut self, value: Option<String>, hint: &'static str) -> String {
        match value.filter(|value| !value.is_empty()) {
            Some(value) => value,
            None => {
                self.0.push(hint);
                String::new()
            }
        }
    }

    fn finish(self) -> CliResult<()> {
        if self.0.is_empty() {
            return Ok(());
        }
        let mut message = FIX_ERRORS.to_string();
        for hint in self.0 {
            message.push_str("\n  - ");
            message.push_str(hint);
        }
        Err(CliError::validation(message))
    }
}

fn kind(provider: &str, fake: bool) -> String {
    if fake {
        format!("{provider}-fake")
    } else {
        provider.to_string()
    }
}

fn credentials<const N: usize>(pairs: [(&str, String); N]) -> JsonMap {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_string(), Value::from(value)))
        .collect()
}

fn aws_provider(args: AwsCreateArgs) -> CliResult<NewProvider> {
    let template = template(args.template.as_deref())?;
    let mut missing = Missing::default();
    let secret = missing.take(
        args.secret_access_key.or(template.secret_access_key),
        "Specify a valid secret access key with --secret_access_key flag",
    );
    let key_id = missing.take(
        args.access_key_id.or(template.access_key_id),
        "Specify a valid access key id with --access_key_id flag",
    );
    let region = missing.take(
        args.region.or(template.region),
        "Specify a valid region with --region flag",
    );
    missing.finish()?;

    Ok(NewProvider {
        kind: kind("aws", args.fake || template.fake),
        credentials: credentials([
            ("username", args.name.clone()),
            ("region", region),
            ("aws_access_key_id", key_id),
            ("aws_secret_access_key", secret),
        ]),
        name: args.name,
    })
}

fn vcloud_provider(args: VcloudCreateArgs) -> CliResult<NewProvider> {
    let template = template(args.template.as_deref())?;
    let mut missing = Missing::default();
    let vcloud_url = missing.take(
        args.vcloud_url.or(template.vcloud_url),
        "Specify a valid VCloud URL with --vcloud-url flag",
    );
    let network = missing.take(
        args.public_network.or(template.public_network),
        "Specify a valid public network with --public-network flag",
    );
    let user = missing.take(
        args.user.or(template.user),
        "Specify a valid user name with --user",
    );
    let org = missing.take(
        args.org.or(template.org),
        "Specify a valid organization with --org",
    );
    let password = missing.take(
        args.password.or(template.password),
        "Specify a valid password with --password",
    );
    missing.finish()?;

    Ok(NewProvider {
        kind: kind("vcloud", args.fake || template.fake),
        credentials: credentials([
            ("username", format!("{user}@{org}")),
            ("password", password),
            ("external_network", network),
            ("vcloud_url", vcloud_url),
            (
                "vse_url",
                args.vse_url.or(template.vse_url).unwrap_or_default(),
            ),
        ]),
        name: args.name,
    })
}

fn azure_provider(args: AzureCreateArgs) -> CliResult<NewProvider> {
    let template = template(args.template.as_deref())?;
    let mut missing = Missing::default();
    let subscription = missing.take(
        args.subscription_id.or(template.subscription_id),
        "Specify a valid subscription id with --subscription_id flag",
    );
    let client_id = missing.take(
        args.client_id.or(template.client_id),
        "Specify a valid client id with --client_id flag",
    );
    let client_secret = missing.take(
        args.client_secret.or(template.client_secret),
        "Specify a valid client secret with --client_secret flag",
    );
    let tenant = missing.take(
        args.tenant_id.or(template.tenant_id),
        "Specify a valid tenant id with --tenant_id flag",
    );
    let environment = args
        .environment
        .or(template.environment)
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| AZURE_ENVIRONMENTS[0].to_string());
    if !AZURE_ENVIRONMENTS.contains(&environment.as_str()) {
        missing.0.push(
            "Specify a valid environment with --environment flag. Valid values are public, usgovernment, german and china",
        );
    }
    missing.finish()?;

    Ok(NewProvider {
        kind: kind("azure", args.fake || template.fake),
        credentials: credentials([
            ("azure_subscription_id", subscription),
            ("azure_client_id", client_id),
            ("azure_client_secret", client_secret),
            ("azure_tenant_id", tenant),
            ("azure_environment", environment),
        ]),
        name: args.name,
    })
}

fn required(value: Option<String>, message: &str) -> CliResult<String> {
    value
        .filter(|value| !value.is_empty())
        .ok_or_else(|| CliError::validation(message))
}

fn aws_update(args: AwsUpdateArgs) -> CliResult<(String, JsonMap)> {
    let key_id = required(
        args.access_key_id,
        "You should specify your aws access key id with '--access_key_id' flag",
    )?;
    let secret = required(
        args.secret_access_key,
        "You should specify your aws secret access key with '--secret_access_key' flag",
    )?;
    Ok((
        args.name,
        credentials([
            ("aws_access_key_id", key_id),
            ("aws_secret_access_key", secret),
        ]),
    ))
}

fn vcloud_update(args: VcloudUpdateArgs) -> CliResult<(String, JsonMap)> {
    let user = required(args.user, "You should specify user name with '--user' flag")?;
    let password = required(
        args.password,
        "You should specify user password with '--password' flag",
    )?;
    let org = required(args.org, "You should specify user org with '--org' flag")?;
    Ok((
        args.name,
        credentials([
            ("username", format!("{user}@{org}")),
            ("password", password),
        ]),
    ))
}
