use anyhow::anyhow;
use ernest_api_models::{LoginRequest, LoginResponse};
use reqwest::StatusCode;
use tracing::info;

use crate::cli::LoginArgs;
use crate::client::{
    AppContext, CliError, CliResult, config_failure, decode_json, prompt_secret, send_checked,
};

const BAD_CREDENTIALS: &str =
    "The keypair user / password does not match any user on the database, please try again";

pub(crate) async fn handle_login(ctx: &AppContext, args: LoginArgs) -> CliResult<()> {
    let password = match args.password {
        Some(password) if !password.is_empty() => password,
        _ => prompt_secret(
            "Password: ",
            "You should specify the user password with --password",
        )?,
    };

    let url = ctx.endpoint("/auth")?;
    let request = ctx.client.post(url).json(&LoginRequest {
        username: &args.user,
        password: &password,
    });
    let response = send_checked(
        request,
        "/auth",
        &[
            (StatusCode::UNAUTHORIZED, BAD_CREDENTIALS),
            (StatusCode::FORBIDDEN, BAD_CREDENTIALS),
        ],
    )
    .await?;
    let login: LoginResponse = decode_json(response).await?;
    if login.token.is_empty() {
        return Err(CliError::failure(anyhow!(
            "authentication response did not include a token"
        )));
    }

    let mut config = ctx.store.load().map_err(config_failure)?;
    config.set_session(args.user.clone(), login.token);
    ctx.store.save(&config).map_err(config_failure)?;
    info!(user = %args.user, "session stored");
    println!("Welcome back {}", args.user);
    Ok(())
}

pub(crate) fn handle_logout(ctx: &AppContext) -> CliResult<()> {
    let mut config = ctx.store.load().map_err(config_failure)?;
    config.clear_session();
    ctx.store.save(&config).map_err(config_failure)?;
    println!("Bye.");
    Ok(())
}

pub(crate) fn handle_info(ctx: &AppContext) -> CliResult<()> {
    match &ctx.base_url {
        Some(url) => println!("Target: {url}"),
        None => println!("Target: not configured"),
    }
    println!("User: {}", ctx.user.as_deref().unwrap_or("-"));
    println!(
        "Session: {}",
        if ctx.token.is_some() { "active" } else { "none" }
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ernest_config::{Config, ConfigStore};
    use httpmock::prelude::*;
    use reqwest::Client;
    use serde_json::json;

    use crate::cli::OutputFormat;

    fn context(server: &MockServer, store: ConfigStore) -> AppContext {
        let config = Config {
            url: Some(server.base_url()),
            ..Config::default()
        };
        AppContext::from_config(Client::new(), store, config, OutputFormat::Table)
    }

    #[tokio::test]
    async fn login_stores_token_and_user() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/auth")
                .json_body(json!({"username": "alice", "password": "secret"}));
            then.status(200).json_body(json!({"token": "tok-1"}));
        });

        let dir = tempfile::tempdir().expect("tempdir");
        let store = ConfigStore::new(dir.path().join(".ernest"));
        let ctx = context(&server, store.clone());

        handle_login(
            &ctx,
            LoginArgs {
                user: "alice".into(),
                password: Some("secret".into()),
            },
        )
        .await
        .expect("login");

        mock.assert();
        let saved = store.load().expect("load");
        assert_eq!(saved.session_token(), Some("tok-1"));
        assert_eq!(saved.user.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn rejected_credentials_are_reported() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/auth");
            then.status(403);
        });

        let dir = tempfile::tempdir().expect("tempdir");
        let store = ConfigStore::new(dir.path().join(".ernest"));
        let ctx = context(&server, store.clone());

        let err = handle_login(
            &ctx,
            LoginArgs {
                user: "alice".into(),
                password: Some("wrong".into()),
            },
        )
        .await
        .expect_err("rejected");
        assert_eq!(err.display_message(), BAD_CREDENTIALS);
        assert!(store.load().expect("load").session_token().is_none());
    }

    #[test]
    fn logout_keeps_target() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ConfigStore::new(dir.path().join(".ernest"));
        let mut config = Config {
            url: Some("https://ernest.local".into()),
            ..Config::default()
        };
        config.set_session("alice", "tok");
        store.save(&config).expect("seed");

        let ctx = AppContext::from_config(
            Client::new(),
            store.clone(),
            config,
            OutputFormat::Table,
        );
        handle_logout(&ctx).expect("logout");
        handle_info(&ctx).expect("info");

        let saved = store.load().expect("load");
        assert_eq!(saved.url.as_deref(), Some("https://ernest.local"));
        assert!(saved.session_token().is_none());
        assert!(saved.user.is_none());
    }
}
