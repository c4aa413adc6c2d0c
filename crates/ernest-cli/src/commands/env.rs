//! Environment lifecycle: CRUD, definition submission and build history.

use ernest_api_models::{Build, BuildSubmission, Env, EnvAction, EnvStatus, JsonMap};
use ernest_definition::{Definition, DefinitionError};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, StatusCode};
use serde_json::Value;
use tracing::info;

use crate::cli::{ApplyArgs, BuildRef, EnvCommand, EnvCredentialsArgs, EnvRef, RevertArgs};
use crate::client::{
    AppContext, CONTENT_TYPE_YAML, CliError, CliResult, NO_PERMISSION, decode_json, decode_list,
    read_text, send_checked,
};
use crate::commands::monitor::{MonitorOptions, MonitorOutcome, monitorize};
use crate::output::{render_build, render_builds, render_dry_run, render_env, render_envs};

const OWNER_ONLY: &str =
    "You don't have permissions to perform this action, please login as a resource owner";

pub(crate) async fn handle_env(ctx: &AppContext, command: EnvCommand) -> CliResult<()> {
    match command {
        EnvCommand::List => handle_list(ctx).await,
        EnvCommand::Info(args) => handle_info(ctx, &args).await,
        EnvCommand::Create(args) => handle_create(ctx, args).await,
        EnvCommand::Update(args) => handle_update(ctx, args).await,
        EnvCommand::Delete(args) => handle_delete(ctx, &args).await,
        EnvCommand::ForceDelete(args) => handle_force_delete(ctx, &args).await,
        EnvCommand::Reset(args) => handle_reset(ctx, &args).await,
        EnvCommand::Apply(args) => handle_apply(ctx, args).await,
        EnvCommand::Revert(args) => handle_revert(ctx, args).await,
        EnvCommand::History(args) => handle_history(ctx, &args).await,
        EnvCommand::Build(args) => handle_build(ctx, &args).await,
    }
}

fn envs_path(project: &str) -> String {
    format!("/api/projects/{project}/envs/")
}

fn env_path(project: &str, env: &str) -> String {
    format!("/api/projects/{project}/envs/{env}")
}

fn definition_error(err: DefinitionError) -> CliError {
    CliError::validation(err.to_string())
}

async fn handle_list(ctx: &AppContext) -> CliResult<()> {
    let path = "/api/envs/";
    let response = send_checked(ctx.authorized(Method::GET, path)?, path, &[]).await?;
    let envs: Vec<Env> = decode_list(response).await?;
    render_envs(&envs, ctx.output)
}

async fn fetch_env(ctx: &AppContext, args: &EnvRef) -> CliResult<Env> {
    let path = env_path(&args.project, &args.env);
    let response = send_checked(
        ctx.authorized(Method::GET, &path)?,
        &path,
        &[
            (StatusCode::FORBIDDEN, NO_PERMISSION),
            (StatusCode::NOT_FOUND, "Specified environment name does not exist"),
        ],
    )
    .await?;
    decode_json(response).await
}

async fn handle_info(ctx: &AppContext, args: &EnvRef) -> CliResult<()> {
    let env = fetch_env(ctx, args).await?;
    render_env(&env, ctx.output)
}

fn credentials(args: EnvCredentialsArgs) -> JsonMap {
    [
        ("aws_access_key_id", args.access_key_id),
        ("aws_secret_access_key", args.secret_access_key),
        ("azure_subscription_id", args.subscription_id),
        ("azure_client_id", args.client_id),
        ("azure_client_secret", args.client_secret),
        ("azure_tenant_id", args.tenant_id),
        ("azure_environment", args.environment),
    ]
    .into_iter()
    .filter_map(|(key, value)| {
        value
            .filter(|value| !value.is_empty())
            .map(|value| (key.to_string(), Value::from(value)))
    })
    .collect()
}

async fn handle_create(ctx: &AppContext, args: EnvCredentialsArgs) -> CliResult<()> {
    let path = envs_path(&args.project);
    let name = args.env.clone();
    let body = Env {
        name: name.clone(),
        credentials: credentials(args),
        ..Env::default()
    };
    send_checked(
        ctx.authorized(Method::POST, &path)?.json(&body),
        &path,
        &[
            (StatusCode::NOT_FOUND, "Specified project does not exist"),
            (StatusCode::FORBIDDEN, OWNER_ONLY),
        ],
    )
    .await?;
    println!("Environment '{name}' successfully created");
    Ok(())
}

async fn handle_update(ctx: &AppContext, args: EnvCredentialsArgs) -> CliResult<()> {
    let path = env_path(&args.project, &args.env);
    let name = args.env.clone();
    let body = Env {
        name: name.clone(),
        credentials: credentials(args),
        ..Env::default()
    };
    send_checked(
        ctx.authorized(Method::PUT, &path)?.json(&body),
        &path,
        &[
            (StatusCode::NOT_FOUND, "Specified environment does not exist"),
            (StatusCode::FORBIDDEN, OWNER_ONLY),
            (StatusCode::UNAUTHORIZED, "Invalid session, please log in"),
        ],
    )
    .await?;
    println!("Environment '{name}' successfully updated");
    Ok(())
}

async fn handle_delete(ctx: &AppContext, args: &EnvRef) -> CliResult<()> {
    let env = fetch_env(ctx, args).await?;
    if env.status == EnvStatus::InProgress {
        return Err(CliError::validation(format!(
            "The environment {} cannot be destroyed as it is currently 'in_progress'",
            args.env
        )));
    }

    let path = env_path(&args.project, &args.env);
    let response = send_checked(ctx.authorized(Method::DELETE, &path)?, &path, &[]).await?;
    let build: BuildSubmission = decode_json(response).await?;
    info!(build_id = %build.id, env = %args.env, "environment deletion submitted");

    if monitorize(ctx, &build.id, &MonitorOptions::default()).await? == MonitorOutcome::Completed {
        println!("Environment successfully deleted");
    }
    Ok(())
}

async fn handle_force_delete(ctx: &AppContext, args: &EnvRef) -> CliResult<()> {
    let path = format!("{}/actions/force/", env_path(&args.project, &args.env));
    send_checked(ctx.authorized(Method::DELETE, &path)?, &path, &[]).await?;
    println!("Environment successfully removed");
    Ok(())
}

async fn handle_reset(ctx: &AppContext, args: &EnvRef) -> CliResult<()> {
    let env = fetch_env(ctx, args).await?;
    if env.status != EnvStatus::InProgress {
        return Err(CliError::validation(format!(
            "The environment '{} / {}' cannot be reset as its status is '{}'",
            args.project,
            args.env,
            env.status.as_str()
        )));
    }

    let path = format!("{}/actions/", env_path(&args.project, &args.env));
    send_checked(
        ctx.authorized(Method::POST, &path)?
            .json(&EnvAction { kind: "reset" }),
        &path,
        &[],
    )
    .await?;
    println!("Environment '{}' successfully reset", args.env);
    Ok(())
}

async fn handle_apply(ctx: &AppContext, args: ApplyArgs) -> CliResult<()> {
    ctx.require_token()?;
    let mut definition = Definition::load_path(&args.file).map_err(definition_error)?;
    definition.load_file_imports().map_err(definition_error)?;

    let project = definition
        .project()
        .ok_or_else(|| CliError::validation("Please specify a project on your definition file"))?
        .to_string();
    let env = definition
        .name()
        .ok_or_else(|| CliError::validation("Please specify a name on your definition file"))?
        .to_string();
    let yaml = definition.save().map_err(definition_error)?;

    submit(ctx, &EnvRef { project, env }, yaml, args.dry, args.no_monitor).await
}

async fn handle_revert(ctx: &AppContext, args: RevertArgs) -> CliResult<()> {
    let stored = EnvRef {
        project: args.project,
        env: args.env,
    };
    let build = fetch_build(ctx, &stored, &args.build_id).await?;
    let definition = Definition::load(build.definition.as_bytes()).map_err(definition_error)?;
    let yaml = definition.save().map_err(definition_error)?;

    let target = EnvRef {
        project: definition
            .project()
            .filter(|project| !project.is_empty())
            .map_or(stored.project, str::to_string),
        env: stored.env,
    };
    submit(ctx, &target, yaml, args.dry, false).await
}

/// POST a rendered definition and follow or report the resulting build.
async fn submit(
    ctx: &AppContext,
    target: &EnvRef,
    yaml: String,
    dry: bool,
    no_monitor: bool,
) -> CliResult<()> {
    let mut path = envs_path(&target.project);
    if dry {
        path.push_str("?dry=true");
    }
    let response = send_checked(
        ctx.authorized(Method::POST, &path)?
            .header(CONTENT_TYPE, CONTENT_TYPE_YAML)
            .body(yaml),
        &path,
        &[(StatusCode::NOT_FOUND, "Specified project does not exist")],
    )
    .await?;

    if dry {
        let body = read_text(response).await?;
        return render_dry_run(&body, ctx.output);
    }

    let submission: BuildSubmission = decode_json(response).await?;
    info!(build_id = %submission.id, env = %target.env, "definition submitted");
    if no_monitor {
        println!("Build ID: {}", submission.id);
        return Ok(());
    }

    monitorize(ctx, &submission.id, &MonitorOptions::default()).await?;
    let build = fetch_build(ctx, target, &submission.id).await?;
    render_build(&build, ctx.output)
}

async fn fetch_build(ctx: &AppContext, target: &EnvRef, build_id: &str) -> CliResult<Build> {
    let path = format!("{}/builds/{build_id}", env_path(&target.project, &target.env));
    let response = send_checked(
        ctx.authorized(Method::GET, &path)?,
        &path,
        &[(StatusCode::NOT_FOUND, "Specified build does not exist")],
    )
    .await?;
    decode_json(response).await
}

async fn handle_history(ctx: &AppContext, args: &EnvRef) -> CliResult<()> {
    let path = format!("{}/builds/", env_path(&args.project, &args.env));
    let response = send_checked(ctx.authorized(Method::GET, &path)?, &path, &[]).await?;
    let builds: Vec<Build> = decode_list(response).await?;
    render_builds(&builds, ctx.output)
}

async fn handle_build(ctx: &AppContext, args: &BuildRef) -> CliResult<()> {
    let target = EnvRef {
        project: args.project.clone(),
        env: args.env.clone(),
    };
    let build = fetch_build(ctx, &target, &args.build_id).await?;
    render_build(&build, ctx.output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_support::{bearer, context_with, logged_in, unreachable};
    use ernest_test_support::fixtures::{build_event_json, sse_body, write_tree};
    use httpmock::prelude::*;
    use serde_json::json;
    use std::path::Path;

    fn env_ref() -> EnvRef {
        EnvRef {
            project: "acme".into(),
            env: "prod".into(),
        }
    }

    fn merged(path: &Path) -> String {
        let mut definition = Definition::load_path(path).expect("load");
        definition.load_file_imports().expect("imports");
        definition.save().expect("save")
    }

    #[tokio::test]
    async fn info_maps_missing_envs() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/projects/acme/envs/prod");
            then.status(404);
        });

        let err = handle_env(&logged_in(&server), EnvCommand::Info(env_ref()))
            .await
            .expect_err("missing");
        assert_eq!(
            err.display_message(),
            "Specified environment name does not exist"
        );
    }

    #[tokio::test]
    async fn info_rejects_null_bodies() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/projects/acme/envs/prod");
            then.status(200).body("null");
        });

        let err = handle_env(&logged_in(&server), EnvCommand::Info(env_ref()))
            .await
            .expect_err("null");
        assert_eq!(err.display_message(), "Unexpected endpoint response : null");
    }

    #[tokio::test]
    async fn create_sends_only_supplied_credentials() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/projects/acme/envs/")
                .header("authorization", bearer())
                .json_body(json!({
                    "name": "prod",
                    "credentials": {
                        "aws_access_key_id": "AKIA",
                        "aws_secret_access_key": "secret"
                    }
                }));
            then.status(200).json_body(json!({"name": "prod"}));
        });

        handle_env(
            &logged_in(&server),
            EnvCommand::Create(EnvCredentialsArgs {
                project: "acme".into(),
                env: "prod".into(),
                access_key_id: Some("AKIA".into()),
                secret_access_key: Some("secret".into()),
                ..EnvCredentialsArgs::default()
            }),
        )
        .await
        .expect("create");
        mock.assert();
    }

    #[tokio::test]
    async fn create_in_missing_project_is_reported() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/api/projects/ghost/envs/");
            then.status(404);
        });

        let err = handle_env(
            &logged_in(&server),
            EnvCommand::Create(EnvCredentialsArgs {
                project: "ghost".into(),
                env: "prod".into(),
                ..EnvCredentialsArgs::default()
            }),
        )
        .await
        .expect_err("missing project");
        assert_eq!(err.display_message(), "Specified project does not exist");
    }

    #[tokio::test]
    async fn reset_requires_in_progress_status() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/projects/acme/envs/prod");
            then.status(200)
                .json_body(json!({"name": "prod", "status": "done"}));
        });
        let action = server.mock(|when, then| {
            when.method(POST).path("/api/projects/acme/envs/prod/actions/");
            then.status(200);
        });

        let err = handle_env(&logged_in(&server), EnvCommand::Reset(env_ref()))
            .await
            .expect_err("not resettable");
        assert_eq!(
            err.display_message(),
            "The environment 'acme / prod' cannot be reset as its status is 'done'"
        );
        assert_eq!(action.hits(), 0);
    }

    #[tokio::test]
    async fn reset_posts_reset_action() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/projects/acme/envs/prod");
            then.status(200)
                .json_body(json!({"name": "prod", "status": "in_progress"}));
        });
        let action = server.mock(|when, then| {
            when.method(POST)
                .path("/api/projects/acme/envs/prod/actions/")
                .json_body(json!({"type": "reset"}));
            then.status(200);
        });

        handle_env(&logged_in(&server), EnvCommand::Reset(env_ref()))
            .await
            .expect("reset");
        action.assert();
    }

    #[tokio::test]
    async fn delete_is_refused_while_in_progress() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/projects/acme/envs/prod");
            then.status(200)
                .json_body(json!({"name": "prod", "status": "in_progress"}));
        });
        let delete = server.mock(|when, then| {
            when.method(DELETE).path("/api/projects/acme/envs/prod");
            then.status(200);
        });

        let err = handle_env(&logged_in(&server), EnvCommand::Delete(env_ref()))
            .await
            .expect_err("busy");
        assert!(err.display_message().contains("currently 'in_progress'"));
        assert_eq!(delete.hits(), 0);
    }

    #[tokio::test]
    async fn delete_follows_the_destroy_build() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/projects/acme/envs/prod");
            then.status(200)
                .json_body(json!({"name": "prod", "status": "done"}));
        });
        let delete = server.mock(|when, then| {
            when.method(DELETE).path("/api/projects/acme/envs/prod");
            then.status(200).json_body(json!({"id": "d-1"}));
        });
        let done = build_event_json("d-1", "build.delete.done", &[]);
        let stream = server.mock(|when, then| {
            when.method(GET).path("/events").query_param("stream", "d-1");
            then.status(200).body(sse_body(&[("1", &done)]));
        });

        handle_env(&logged_in(&server), EnvCommand::Delete(env_ref()))
            .await
            .expect("delete");
        delete.assert();
        stream.assert();
    }

    #[tokio::test]
    async fn apply_posts_the_merged_definition() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_tree(
            dir.path(),
            &[
                (
                    "ernest.yml",
                    "name: prod\nproject: acme\nimport: networks.yml\ninstances:\n  - name: web\n",
                ),
                ("networks.yml", "networks:\n  - name: net\n    subnet: 10.1.0.0/24\n"),
            ],
        )
        .expect("tree");
        let file = dir.path().join("ernest.yml");
        let expected = merged(&file);
        assert!(expected.contains("subnet"));

        let server = MockServer::start_async().await;
        let post = server.mock(|when, then| {
            when.method(POST)
                .path("/api/projects/acme/envs/")
                .header("content-type", "application/yaml")
                .body(expected.clone());
            then.status(200).json_body(json!({"id": "b-1"}));
        });

        handle_env(
            &logged_in(&server),
            EnvCommand::Apply(ApplyArgs {
                file,
                dry: false,
                no_monitor: true,
            }),
        )
        .await
        .expect("apply");
        post.assert();
    }

    #[tokio::test]
    async fn apply_monitors_then_shows_the_build() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_tree(dir.path(), &[("ernest.yml", "name: prod\nproject: acme\n")])
            .expect("tree");

        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/api/projects/acme/envs/");
            then.status(200).json_body(json!({"id": "b-2"}));
        });
        let done = build_event_json("b-2", "build.create.done", &[]);
        let stream = server.mock(|when, then| {
            when.method(GET).path("/events").query_param("stream", "b-2");
            then.status(200).body(sse_body(&[("1", &done)]));
        });
        let build = server.mock(|when, then| {
            when.method(GET)
                .path("/api/projects/acme/envs/prod/builds/b-2");
            then.status(200)
                .json_body(json!({"id": "b-2", "status": "done", "components": []}));
        });

        handle_env(
            &logged_in(&server),
            EnvCommand::Apply(ApplyArgs {
                file: dir.path().join("ernest.yml"),
                ..ApplyArgs::default()
            }),
        )
        .await
        .expect("apply");
        stream.assert();
        build.assert();
    }

    #[tokio::test]
    async fn dry_apply_uses_the_dry_query() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_tree(dir.path(), &[("ernest.yml", "name: prod\nproject: acme\n")])
            .expect("tree");

        let server = MockServer::start_async().await;
        let dry = server.mock(|when, then| {
            when.method(POST)
                .path("/api/projects/acme/envs/")
                .query_param("dry", "true");
            then.status(200)
                .json_body(json!([{"_component_id": "instance::web", "_action": "create"}]));
        });

        handle_env(
            &logged_in(&server),
            EnvCommand::Apply(ApplyArgs {
                file: dir.path().join("ernest.yml"),
                dry: true,
                no_monitor: false,
            }),
        )
        .await
        .expect("dry run");
        dry.assert();
    }

    #[tokio::test]
    async fn apply_without_project_is_rejected_locally() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_tree(dir.path(), &[("ernest.yml", "name: prod\n")]).expect("tree");

        let server = MockServer::start_async().await;
        let err = handle_env(
            &logged_in(&server),
            EnvCommand::Apply(ApplyArgs {
                file: dir.path().join("ernest.yml"),
                ..ApplyArgs::default()
            }),
        )
        .await
        .expect_err("no project");
        assert!(matches!(err, CliError::Validation(_)));
    }

    #[tokio::test]
    async fn apply_requires_a_session_before_reading_files() {
        let server = MockServer::start_async().await;
        let err = handle_env(
            &context_with(&server, None),
            EnvCommand::Apply(ApplyArgs {
                file: "does-not-exist.yml".into(),
                ..ApplyArgs::default()
            }),
        )
        .await
        .expect_err("logged out");
        assert_eq!(
            err.display_message(),
            "You're not allowed to perform this action, please log in"
        );
    }

    #[tokio::test]
    async fn revert_resubmits_the_stored_definition() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET)
                .path("/api/projects/acme/envs/prod/builds/old");
            then.status(200).json_body(json!({
                "id": "old",
                "definition": "name: prod\nproject: acme\ninstances: []\n"
            }));
        });
        let post = server.mock(|when, then| {
            when.method(POST)
                .path("/api/projects/acme/envs/")
                .body("name: prod\nproject: acme\ninstances: []\n");
            then.status(200).json_body(json!({"id": "new"}));
        });
        let done = build_event_json("new", "build.create.done", &[]);
        server.mock(|when, then| {
            when.method(GET).path("/events");
            then.status(200).body(sse_body(&[("1", &done)]));
        });
        server.mock(|when, then| {
            when.method(GET)
                .path("/api/projects/acme/envs/prod/builds/new");
            then.status(200).json_body(json!({"id": "new", "status": "done"}));
        });

        handle_env(
            &logged_in(&server),
            EnvCommand::Revert(RevertArgs {
                project: "acme".into(),
                env: "prod".into(),
                build_id: "old".into(),
                dry: false,
            }),
        )
        .await
        .expect("revert");
        post.assert();
    }

    #[tokio::test]
    async fn revert_targets_the_project_of_the_stored_definition() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET)
                .path("/api/projects/acme/envs/prod/builds/old");
            then.status(200).json_body(json!({
                "id": "old",
                "definition": "name: prod\nproject: other\ninstances: []\n"
            }));
        });
        let stale = server.mock(|when, then| {
            when.method(POST).path("/api/projects/acme/envs/");
            then.status(200).json_body(json!({"id": "wrong"}));
        });
        let post = server.mock(|when, then| {
            when.method(POST)
                .path("/api/projects/other/envs/")
                .body("name: prod\nproject: other\ninstances: []\n");
            then.status(200).json_body(json!({"id": "new"}));
        });
        let done = build_event_json("new", "build.create.done", &[]);
        server.mock(|when, then| {
            when.method(GET).path("/events");
            then.status(200).body(sse_body(&[("1", &done)]));
        });
        let build = server.mock(|when, then| {
            when.method(GET)
                .path("/api/projects/other/envs/prod/builds/new");
            then.status(200).json_body(json!({"id": "new", "status": "done"}));
        });

        handle_env(
            &logged_in(&server),
            EnvCommand::Revert(RevertArgs {
                project: "acme".into(),
                env: "prod".into(),
                build_id: "old".into(),
                dry: false,
            }),
        )
        .await
        .expect("revert");
        post.assert();
        build.assert();
        assert_eq!(stale.hits(), 0);
    }

    #[tokio::test]
    async fn history_lists_builds() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/projects/acme/envs/prod/builds/");
            then.status(200).json_body(json!([
                {"id": "b-1", "status": "done", "user_name": "alice",
                 "created_at": "2024-01-01T10:00:00Z"}
            ]));
        });

        handle_env(&logged_in(&server), EnvCommand::History(env_ref()))
            .await
            .expect("history");
        mock.assert();
    }

    #[tokio::test]
    async fn list_is_connection_refused_when_unreachable() {
        let err = handle_env(&unreachable(), EnvCommand::List)
            .await
            .expect_err("refused");
        assert!(matches!(err, CliError::ConnectionRefused));
    }
}
