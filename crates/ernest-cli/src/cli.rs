//! Argument parsing, dispatch and process outcome for the `ernest` binary.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use ernest_config::ConfigStore;
use ernest_telemetry::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, build_sha, init_logging};
use uuid::Uuid;

use crate::client::{AppContext, CliDependencies, CliResult, config_failure};
use crate::commands::{component, env, logger, monitor, provider, service, session, target, user};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Parses CLI arguments, executes the requested command, and handles
/// user-facing telemetry emission. Returns the process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();
    install_logging(&cli);

    let command_name = command_label(&cli.command);
    let trace_id = Uuid::new_v4().to_string();
    let deps = match CliDependencies::from_env(cli.timeout, &trace_id) {
        Ok(deps) => deps,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            return err.exit_code();
        }
    };
    let telemetry = deps.telemetry.clone();

    let result = dispatch(cli, &deps).await;

    let (exit_code, message, outcome) = match result {
        Ok(()) => (0, None, "success"),
        Err(err) => {
            let exit_code = err.exit_code();
            let message = err.display_message();
            eprintln!("error: {message}");
            (exit_code, Some(message), "error")
        }
    };

    if let Some(emitter) = &telemetry {
        emitter
            .emit(
                &trace_id,
                command_name,
                outcome,
                exit_code,
                message.as_deref(),
            )
            .await;
    }

    exit_code
}

fn install_logging(cli: &Cli) {
    let config = LoggingConfig {
        level: &cli.log_level,
        format: cli.log_format.into(),
        build_sha: build_sha(),
    };
    if let Err(err) = init_logging(&config) {
        eprintln!("warning: {err}");
    }
}

async fn dispatch(cli: Cli, deps: &CliDependencies) -> CliResult<()> {
    let store = match cli.config {
        Some(path) => ConfigStore::new(path),
        None => ConfigStore::default_location().map_err(config_failure)?,
    };
    let config = store.load().map_err(config_failure)?;
    let ctx = AppContext::from_config(deps.client.clone(), store, config, cli.output);

    match cli.command {
        Command::Target(args) => target::handle_target(&ctx, args),
        Command::Login(args) => session::handle_login(&ctx, args).await,
        Command::Logout => session::handle_logout(&ctx),
        Command::Info => session::handle_info(&ctx),
        Command::Project(command) => {
            provider::handle_provider(&ctx, provider::ProviderApi::Projects, command).await
        }
        Command::Datacenter(command) => {
            provider::handle_provider(&ctx, provider::ProviderApi::Datacenters, command).await
        }
        Command::Env(command) => env::handle_env(&ctx, command).await,
        Command::Service(command) => service::handle_service(&ctx, command).await,
        Command::User(command) => user::handle_user(&ctx, command).await,
        Command::Logger(command) => logger::handle_logger(&ctx, command).await,
        Command::Component(ComponentCommand::List(args)) => {
            component::handle_component_list(&ctx, args).await
        }
        Command::Monitor(args) => monitor::handle_monitor(&ctx, args).await,
    }
}

#[derive(Parser)]
#[command(
    name = "ernest",
    version,
    about = "Command line client for the Ernest orchestration service"
)]
pub(crate) struct Cli {
    #[arg(long, global = true, env = "ERNEST_CONFIG", help = "Config file (defaults to ~/.ernest)")]
    config: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        env = "ERNEST_HTTP_TIMEOUT_SECS",
        default_value_t = DEFAULT_TIMEOUT_SECS
    )]
    timeout: u64,
    #[arg(
        long = "output",
        alias = "format",
        global = true,
        value_enum,
        default_value_t = OutputFormat::Table,
        help = "Select output format for commands that render structured data"
    )]
    output: OutputFormat,
    #[arg(long, global = true, env = "ERNEST_LOG", default_value = DEFAULT_LOG_LEVEL)]
    log_level: String,
    #[arg(long, global = true, value_enum, default_value_t = LogFormatArg::Pretty)]
    log_format: LogFormatArg,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Show or set the Ernest instance to talk to.
    #[command(alias = "t")]
    Target(TargetArgs),
    /// Log in and store the session token.
    Login(LoginArgs),
    /// Forget the stored session.
    Logout,
    /// Print the current target and session.
    Info,
    /// Manage provider projects.
    #[command(subcommand)]
    Project(ProviderCommand),
    /// Manage provider datacenters (legacy API).
    #[command(subcommand)]
    Datacenter(ProviderCommand),
    /// Manage environments.
    #[command(subcommand)]
    Env(EnvCommand),
    /// Manage services (legacy API).
    #[command(subcommand)]
    Service(ServiceCommand),
    /// Manage users.
    #[command(subcommand)]
    User(UserCommand),
    /// Manage log forwarding.
    #[command(subcommand)]
    Logger(LoggerCommand),
    /// Inspect provisioned components.
    #[command(subcommand)]
    Component(ComponentCommand),
    /// Follow the latest build of an environment.
    #[command(alias = "m")]
    Monitor(EnvRef),
}

#[derive(Args)]
pub(crate) struct TargetArgs {
    #[arg(help = "Ernest instance URL; omit to print the current target")]
    pub(crate) url: Option<String>,
}

#[derive(Args)]
pub(crate) struct LoginArgs {
    #[arg(long)]
    pub(crate) user: String,
    #[arg(long, env = "ERNEST_PASSWORD", hide_env_values = true)]
    pub(crate) password: Option<String>,
}

#[derive(Subcommand)]
pub(crate) enum ProviderCommand {
    /// List every entry grouped by provider.
    List,
    /// Show one entry.
    Info(NameArgs),
    /// Register a new entry.
    #[command(subcommand)]
    Create(ProviderCreate),
    /// Rotate credentials of an existing entry.
    #[command(subcommand)]
    Update(ProviderUpdate),
    /// Remove an entry.
    Delete(NameArgs),
}

#[derive(Args)]
pub(crate) struct NameArgs {
    pub(crate) name: String,
}

#[derive(Subcommand)]
pub(crate) enum ProviderCreate {
    Aws(AwsCreateArgs),
    Vcloud(VcloudCreateArgs),
    Azure(AzureCreateArgs),
}

#[derive(Subcommand)]
pub(crate) enum ProviderUpdate {
    Aws(AwsUpdateArgs),
    Vcloud(VcloudUpdateArgs),
}

#[derive(Args, Default)]
pub(crate) struct AwsCreateArgs {
    pub(crate) name: String,
    #[arg(short = 'r', long)]
    pub(crate) region: Option<String>,
    #[arg(short = 'k', long = "access_key_id")]
    pub(crate) access_key_id: Option<String>,
    #[arg(short = 's', long = "secret_access_key")]
    pub(crate) secret_access_key: Option<String>,
    #[arg(short = 't', long)]
    pub(crate) template: Option<PathBuf>,
    #[arg(short = 'f', long)]
    pub(crate) fake: bool,
}

#[derive(Args, Default)]
pub(crate) struct VcloudCreateArgs {
    pub(crate) name: String,
    #[arg(long)]
    pub(crate) user: Option<String>,
    #[arg(long)]
    pub(crate) password: Option<String>,
    #[arg(long)]
    pub(crate) org: Option<String>,
    #[arg(long = "vse-url")]
    pub(crate) vse_url: Option<String>,
    #[arg(long = "vcloud-url")]
    pub(crate) vcloud_url: Option<String>,
    #[arg(long = "public-network")]
    pub(crate) public_network: Option<String>,
    #[arg(long)]
    pub(crate) template: Option<PathBuf>,
    #[arg(long)]
    pub(crate) fake: bool,
}

#[derive(Args, Default)]
pub(crate) struct AzureCreateArgs {
    pub(crate) name: String,
    #[arg(short = 's', long = "subscription_id")]
    pub(crate) subscription_id: Option<String>,
    #[arg(long = "client_id")]
    pub(crate) client_id: Option<String>,
    #[arg(long = "client_secret")]
    pub(crate) client_secret: Option<String>,
    #[arg(short = 't', long = "tenant_id")]
    pub(crate) tenant_id: Option<String>,
    #[arg(short = 'e', long)]
    pub(crate) environment: Option<String>,
    #[arg(long)]
    pub(crate) template: Option<PathBuf>,
    #[arg(short = 'f', long)]
    pub(crate) fake: bool,
}

#[derive(Args, Default)]
pub(crate) struct AwsUpdateArgs {
    pub(crate) name: String,
    #[arg(long = "access_key_id")]
    pub(crate) access_key_id: Option<String>,
    #[arg(long = "secret_access_key")]
    pub(crate) secret_access_key: Option<String>,
}

#[derive(Args, Default)]
pub(crate) struct VcloudUpdateArgs {
    pub(crate) name: String,
    #[arg(long)]
    pub(crate) user: Option<String>,
    #[arg(long)]
    pub(crate) password: Option<String>,
    #[arg(long)]
    pub(crate) org: Option<String>,
}

#[derive(Subcommand)]
pub(crate) enum EnvCommand {
    /// List every environment.
    List,
    /// Show an environment with its latest build.
    Info(EnvRef),
    /// Create an empty environment.
    Create(EnvCredentialsArgs),
    /// Update environment credentials.
    Update(EnvCredentialsArgs),
    /// Destroy an environment and its resources.
    #[command(alias = "destroy")]
    Delete(EnvRef),
    /// Remove an environment without destroying resources.
    ForceDelete(EnvRef),
    /// Unlock an environment stuck in progress.
    Reset(EnvRef),
    /// Submit a definition file.
    Apply(ApplyArgs),
    /// Resubmit the definition of a previous build.
    Revert(RevertArgs),
    /// List builds of an environment.
    History(EnvRef),
    /// Show a single build with its components.
    Build(BuildRef),
}

#[derive(Args, Clone, Default)]
pub(crate) struct EnvRef {
    pub(crate) project: String,
    pub(crate) env: String,
}

#[derive(Args, Default)]
pub(crate) struct EnvCredentialsArgs {
    pub(crate) project: String,
    pub(crate) env: String,
    #[arg(long = "access_key_id")]
    pub(crate) access_key_id: Option<String>,
    #[arg(long = "secret_access_key")]
    pub(crate) secret_access_key: Option<String>,
    #[arg(long = "subscription_id")]
    pub(crate) subscription_id: Option<String>,
    #[arg(long = "client_id")]
    pub(crate) client_id: Option<String>,
    #[arg(long = "client_secret")]
    pub(crate) client_secret: Option<String>,
    #[arg(long = "tenant_id")]
    pub(crate) tenant_id: Option<String>,
    #[arg(long)]
    pub(crate) environment: Option<String>,
}

#[derive(Args, Default)]
pub(crate) struct ApplyArgs {
    #[arg(default_value = "ernest.yml")]
    pub(crate) file: PathBuf,
    #[arg(long, help = "Print the planned changes without applying them")]
    pub(crate) dry: bool,
    #[arg(long = "no-monitor", help = "Return the build id instead of following it")]
    pub(crate) no_monitor: bool,
}

#[derive(Args, Default)]
pub(crate) struct RevertArgs {
    pub(crate) project: String,
    pub(crate) env: String,
    pub(crate) build_id: String,
    #[arg(long)]
    pub(crate) dry: bool,
}

#[derive(Args, Default)]
pub(crate) struct BuildRef {
    pub(crate) project: String,
    pub(crate) env: String,
    pub(crate) build_id: String,
}

#[derive(Subcommand)]
pub(crate) enum ServiceCommand {
    /// List every service.
    List,
    /// Show one service.
    Info(NameArgs),
    /// Submit a definition file.
    Apply(ApplyArgs),
    /// Destroy a service and its resources.
    Destroy(ServiceDestroyArgs),
    /// Remove a service without destroying resources.
    ForceDestroy(NameArgs),
    /// Unlock a service stuck in progress.
    Reset(NameArgs),
    /// Resubmit the definition of a previous build.
    Revert(ServiceRevertArgs),
    /// Adopt existing provider resources as a service.
    Import(ServiceImportArgs),
    /// Refresh a service from its provider.
    Sync(NameArgs),
    /// List builds of a service.
    History(NameArgs),
}

#[derive(Args, Default)]
pub(crate) struct ServiceDestroyArgs {
    pub(crate) name: String,
    #[arg(long = "no-monitor")]
    pub(crate) no_monitor: bool,
}

#[derive(Args, Default)]
pub(crate) struct ServiceRevertArgs {
    pub(crate) name: String,
    pub(crate) build_id: String,
    #[arg(long)]
    pub(crate) dry: bool,
}

#[derive(Args, Default)]
pub(crate) struct ServiceImportArgs {
    pub(crate) name: String,
    #[arg(long)]
    pub(crate) datacenter: String,
    #[arg(long, value_delimiter = ',')]
    pub(crate) filters: Vec<String>,
}

#[derive(Subcommand)]
pub(crate) enum UserCommand {
    /// List users visible to the session.
    List,
    /// Create a user.
    Create(UserCreateArgs),
    /// Show a user.
    Info(UserInfoArgs),
    /// Change a password.
    ChangePassword(ChangePasswordArgs),
    /// Lock a user out by resetting the password.
    Disable(UserDisableArgs),
}

#[derive(Args, Default)]
pub(crate) struct UserCreateArgs {
    pub(crate) username: String,
    pub(crate) password: String,
    #[arg(long)]
    pub(crate) email: Option<String>,
}

#[derive(Args, Default)]
pub(crate) struct UserInfoArgs {
    #[arg(long)]
    pub(crate) user: Option<String>,
}

#[derive(Args, Default)]
pub(crate) struct ChangePasswordArgs {
    #[arg(long)]
    pub(crate) user: Option<String>,
    #[arg(long)]
    pub(crate) password: Option<String>,
    #[arg(long = "current-password")]
    pub(crate) current_password: Option<String>,
}

#[derive(Args, Default)]
pub(crate) struct UserDisableArgs {
    pub(crate) username: String,
}

#[derive(Subcommand)]
pub(crate) enum LoggerCommand {
    /// List configured loggers.
    List,
    /// Configure a logger.
    #[command(subcommand)]
    Add(LoggerAdd),
    /// Remove a logger by type.
    Delete(LoggerDeleteArgs),
}

#[derive(Subcommand)]
pub(crate) enum LoggerAdd {
    Basic(BasicLoggerArgs),
    Logstash(LogstashLoggerArgs),
    Rollbar(RollbarLoggerArgs),
}

#[derive(Args, Default)]
pub(crate) struct BasicLoggerArgs {
    #[arg(long)]
    pub(crate) logfile: Option<String>,
}

#[derive(Args, Default)]
pub(crate) struct LogstashLoggerArgs {
    #[arg(long)]
    pub(crate) hostname: Option<String>,
    #[arg(long)]
    pub(crate) port: Option<u16>,
    #[arg(long, default_value_t = 50_000)]
    pub(crate) timeout: u64,
}

#[derive(Args, Default)]
pub(crate) struct RollbarLoggerArgs {
    #[arg(long)]
    pub(crate) token: Option<String>,
    #[arg(long = "env")]
    pub(crate) environment: Option<String>,
}

#[derive(Args, Default)]
pub(crate) struct LoggerDeleteArgs {
    #[arg(value_parser = ["basic", "logstash", "rollbar"])]
    pub(crate) kind: String,
}

#[derive(Subcommand)]
pub(crate) enum ComponentCommand {
    /// List components of one kind in an environment.
    List(ComponentListArgs),
}

#[derive(Args, Default)]
pub(crate) struct ComponentListArgs {
    pub(crate) component: String,
    #[arg(long)]
    pub(crate) project: String,
    #[arg(long)]
    pub(crate) env: String,
}

#[derive(Copy, Clone, Debug, Default, ValueEnum)]
pub(crate) enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum LogFormatArg {
    Pretty,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(value: LogFormatArg) -> Self {
        match value {
            LogFormatArg::Pretty => Self::Pretty,
            LogFormatArg::Json => Self::Json,
        }
    }
}

const fn command_label(command: &Command) -> &'static str {
    match command {
        Command::Target(_) => "target",
        Command::Login(_) => "login",
        Command::Logout => "logout",
        Command::Info => "info",
        Command::Project(command) => match command {
            ProviderCommand::List => "project_list",
            ProviderCommand::Info(_) => "project_info",
            ProviderCommand::Create(_) => "project_create",
            ProviderCommand::Update(_) => "project_update",
            ProviderCommand::Delete(_) => "project_delete",
        },
        Command::Datacenter(command) => match command {
            ProviderCommand::List => "datacenter_list",
            ProviderCommand::Info(_) => "datacenter_info",
            ProviderCommand::Create(_) => "datacenter_create",
            ProviderCommand::Update(_) => "datacenter_update",
            ProviderCommand::Delete(_) => "datacenter_delete",
        },
        Command::Env(command) => match command {
            EnvCommand::List => "env_list",
            EnvCommand::Info(_) => "env_info",
            EnvCommand::Create(_) => "env_create",
            EnvCommand::Update(_) => "env_update",
            EnvCommand::Delete(_) => "env_delete",
            EnvCommand::ForceDelete(_) => "env_force_delete",
            EnvCommand::Reset(_) => "env_reset",
            EnvCommand::Apply(_) => "env_apply",
            EnvCommand::Revert(_) => "env_revert",
            EnvCommand::History(_) => "env_history",
            EnvCommand::Build(_) => "env_build",
        },
        Command::Service(command) => match command {
            ServiceCommand::List => "service_list",
            ServiceCommand::Info(_) => "service_info",
            ServiceCommand::Apply(_) => "service_apply",
            ServiceCommand::Destroy(_) => "service_destroy",
            ServiceCommand::ForceDestroy(_) => "service_force_destroy",
            ServiceCommand::Reset(_) => "service_reset",
            ServiceCommand::Revert(_) => "service_revert",
            ServiceCommand::Import(_) => "service_import",
            ServiceCommand::Sync(_) => "service_sync",
            ServiceCommand::History(_) => "service_history",
        },
        Command::User(command) => match command {
            UserCommand::List => "user_list",
            UserCommand::Create(_) => "user_create",
            UserCommand::Info(_) => "user_info",
            UserCommand::ChangePassword(_) => "user_change_password",
            UserCommand::Disable(_) => "user_disable",
        },
        Command::Logger(command) => match command {
            LoggerCommand::List => "logger_list",
            LoggerCommand::Add(_) => "logger_add",
            LoggerCommand::Delete(_) => "logger_delete",
        },
        Command::Component(ComponentCommand::List(_)) => "component_list",
        Command::Monitor(_) => "monitor",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args.iter().copied()).expect("arguments should parse")
    }

    #[test]
    fn command_labels_cover_nested_commands() {
        let cli = parse(&["ernest", "project", "create", "aws", "acme", "--region", "eu-west-1"]);
        assert_eq!(command_label(&cli.command), "project_create");

        let cli = parse(&["ernest", "datacenter", "delete", "old"]);
        assert_eq!(command_label(&cli.command), "datacenter_delete");

        let cli = parse(&["ernest", "env", "force-delete", "acme", "stg"]);
        assert_eq!(command_label(&cli.command), "env_force_delete");
    }

    #[test]
    fn global_flags_apply_after_subcommands() {
        let cli = parse(&[
            "ernest",
            "env",
            "list",
            "--output",
            "json",
            "--timeout",
            "5",
            "--config",
            "/tmp/ernest-test",
        ]);
        assert!(matches!(cli.output, OutputFormat::Json));
        assert_eq!(cli.timeout, 5);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/ernest-test")));
    }

    #[test]
    fn apply_defaults_to_ernest_yml() {
        let cli = parse(&["ernest", "env", "apply", "--dry"]);
        match cli.command {
            Command::Env(EnvCommand::Apply(args)) => {
                assert_eq!(args.file, PathBuf::from("ernest.yml"));
                assert!(args.dry);
                assert!(!args.no_monitor);
            }
            _ => panic!("expected env apply"),
        }
    }

    #[test]
    fn provider_flags_keep_underscored_names() {
        let cli = parse(&[
            "ernest",
            "project",
            "create",
            "aws",
            "acme",
            "--access_key_id",
            "AKIA",
            "--secret_access_key",
            "secret",
            "--fake",
        ]);
        match cli.command {
            Command::Project(ProviderCommand::Create(ProviderCreate::Aws(args))) => {
                assert_eq!(args.access_key_id.as_deref(), Some("AKIA"));
                assert_eq!(args.secret_access_key.as_deref(), Some("secret"));
                assert!(args.fake);
                assert!(args.region.is_none());
            }
            _ => panic!("expected aws project create"),
        }
    }

    #[test]
    fn logger_delete_rejects_unknown_types() {
        assert!(Cli::try_parse_from(["ernest", "logger", "delete", "syslog"]).is_err());
        let cli = parse(&["ernest", "logger", "delete", "rollbar"]);
        assert_eq!(command_label(&cli.command), "logger_delete");
    }

    #[test]
    fn service_import_splits_filters() {
        let cli = parse(&[
            "ernest",
            "service",
            "import",
            "web",
            "--datacenter",
            "aws-eu",
            "--filters",
            "vpc-1,vpc-2",
        ]);
        match cli.command {
            Command::Service(ServiceCommand::Import(args)) => {
                assert_eq!(args.filters, vec!["vpc-1", "vpc-2"]);
            }
            _ => panic!("expected service import"),
        }
    }
}
