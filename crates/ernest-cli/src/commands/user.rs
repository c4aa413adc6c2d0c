use ernest_api_models::{Session, User, UserUpdate};
use reqwest::{Method, StatusCode};
use tracing::info;

use crate::cli::{ChangePasswordArgs, UserCommand, UserCreateArgs, UserDisableArgs, UserInfoArgs};
use crate::client::{
    AppContext, CliError, CliResult, NO_PERMISSION, decode_json, decode_list, prompt_secret,
    random_string, send_checked,
};
use crate::output::{render_user, render_users};

const USERS: &str = "/api/users/";
const DISABLED_PASSWORD_LEN: usize = 16;

pub(crate) async fn handle_user(ctx: &AppContext, command: UserCommand) -> CliResult<()> {
    match command {
        UserCommand::List => handle_list(ctx).await,
        UserCommand::Create(args) => handle_create(ctx, args).await,
        UserCommand::Info(args) => handle_info(ctx, args).await,
        UserCommand::ChangePassword(args) => handle_change_password(ctx, args).await,
        UserCommand::Disable(args) => handle_disable(ctx, args).await,
    }
}

async fn list(ctx: &AppContext) -> CliResult<Vec<User>> {
    let response = send_checked(ctx.authorized(Method::GET, USERS)?, USERS, &[]).await?;
    decode_list(response).await
}

async fn find_user(ctx: &AppContext, username: &str) -> CliResult<User> {
    list(ctx)
        .await?
        .into_iter()
        .find(|user| user.username == username)
        .ok_or_else(|| CliError::validation(format!("User '{username}' does not exist")))
}

async fn session(ctx: &AppContext) -> CliResult<Session> {
    let path = "/api/session/";
    let response = send_checked(ctx.authorized(Method::GET, path)?, path, &[]).await?;
    decode_json(response).await
}

async fn update(ctx: &AppContext, user: &User, password: String, old: Option<String>) -> CliResult<()> {
    let path = format!("{USERS}{}", user.id);
    let body = UserUpdate {
        id: Some(user.id),
        username: user.username.clone(),
        group_id: Some(user.group_id),
        email: None,
        password,
        oldpassword: old,
    };
    send_checked(ctx.authorized(Method::PUT, &path)?.json(&body), &path, &[]).await?;
    Ok(())
}

async fn handle_list(ctx: &AppContext) -> CliResult<()> {
    let users = list(ctx).await?;
    render_users(&users, ctx.output)
}

async fn handle_create(ctx: &AppContext, args: UserCreateArgs) -> CliResult<()> {
    let conflict = format!("User '{}' already exists", args.username);
    let body = UserUpdate {
        id: None,
        username: args.username,
        group_id: None,
        email: args.email.filter(|email| !email.is_empty()),
        password: args.password,
        oldpassword: None,
    };
    send_checked(
        ctx.authorized(Method::POST, USERS)?.json(&body),
        USERS,
        &[(StatusCode::CONFLICT, conflict.as_str())],
    )
    .await?;
    println!("User {} successfully created", body.username);
    Ok(())
}

async fn handle_info(ctx: &AppContext, args: UserInfoArgs) -> CliResult<()> {
    let session = session(ctx).await?;
    let username = args.user.unwrap_or_else(|| session.username.clone());
    if username != session.username && !session.admin {
        return Err(CliError::validation(format!(
            "You don't have permissions to access '{username}' information"
        )));
    }

    let path = format!("{USERS}{username}");
    let response = send_checked(
        ctx.authorized(Method::GET, &path)?,
        &path,
        &[(StatusCode::NOT_FOUND, "Specified user does not exist")],
    )
    .await?;
    let user: User = decode_json(response).await?;
    render_user(&user, ctx.output)
}

async fn handle_change_password(ctx: &AppContext, args: ChangePasswordArgs) -> CliResult<()> {
    let session = session(ctx).await?;

    if let Some(username) = args.user.filter(|name| *name != session.username) {
        if !session.admin {
            return Err(CliError::validation(NO_PERMISSION));
        }
        let password = args.password.filter(|value| !value.is_empty()).ok_or_else(|| {
            CliError::validation("Please provide a valid password for the user with `--password`")
        })?;
        let user = find_user(ctx, &username).await?;
        update(ctx, &user, password, None).await?;
        info!(user = %username, "password reset by admin");
        println!("'{username}' password has been successfully updated");
        return Ok(());
    }

    let current = match args.current_password.filter(|value| !value.is_empty()) {
        Some(current) => current,
        None => prompt_secret(
            "Current password: ",
            "You should specify your current password with --current-password",
        )?,
    };
    let password = match args.password.filter(|value| !value.is_empty()) {
        Some(password) => password,
        None => {
            let missing = "You should specify the new password with --password";
            let password = prompt_secret("New password: ", missing)?;
            let confirmation = prompt_secret("Confirm new password: ", missing)?;
            if password != confirmation {
                return Err(CliError::validation(
                    "Aborting... New password and confirmation doesn't match.",
                ));
            }
            password
        }
    };

    let user = find_user(ctx, &session.username).await?;
    update(ctx, &user, password, Some(current)).await?;
    println!("Your password has been successfully changed");
    Ok(())
}

async fn handle_disable(ctx: &AppContext, args: UserDisableArgs) -> CliResult<()> {
    let session = session(ctx).await?;
    if !session.admin {
        return Err(CliError::validation(NO_PERMISSION));
    }
    let user = find_user(ctx, &args.username).await?;
    update(ctx, &user, random_string(DISABLED_PASSWORD_LEN), None).await?;
    println!("Account '{}' successfully disabled", args.username);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_support::{bearer, logged_in, unreachable};
    use httpmock::prelude::*;
    use serde_json::json;

    fn session_mock(server: &MockServer, admin: bool) {
        server.mock(|when, then| {
            when.method(GET)
                .path("/api/session/")
                .header("authorization", bearer());
            then.status(200)
                .json_body(json!({"id": 1, "username": "alice", "group_id": 2, "admin": admin}));
        });
    }

    fn users_mock(server: &MockServer) {
        server.mock(|when, then| {
            when.method(GET).path("/api/users/");
            then.status(200).json_body(json!([
                {"id": 1, "username": "alice", "group_id": 2},
                {"id": 5, "username": "bob", "group_id": 3, "email": "bob@example.com"}
            ]));
        });
    }

    #[tokio::test]
    async fn create_posts_the_new_user() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST).path("/api/users/").json_body(json!({
                "username": "carol",
                "email": "carol@example.com",
                "password": "pw"
            }));
            then.status(200).json_body(json!({"id": 9}));
        });

        handle_user(
            &logged_in(&server),
            UserCommand::Create(UserCreateArgs {
                username: "carol".into(),
                password: "pw".into(),
                email: Some("carol@example.com".into()),
            }),
        )
        .await
        .expect("create");
        mock.assert();
    }

    #[tokio::test]
    async fn non_admins_only_see_themselves() {
        let server = MockServer::start_async().await;
        session_mock(&server, false);
        let lookup = server.mock(|when, then| {
            when.method(GET).path("/api/users/bob");
            then.status(200).json_body(json!({"username": "bob"}));
        });

        let err = handle_user(
            &logged_in(&server),
            UserCommand::Info(UserInfoArgs {
                user: Some("bob".into()),
            }),
        )
        .await
        .expect_err("forbidden");
        assert_eq!(
            err.display_message(),
            "You don't have permissions to access 'bob' information"
        );
        assert_eq!(lookup.hits(), 0);
    }

    #[tokio::test]
    async fn info_defaults_to_the_session_user() {
        let server = MockServer::start_async().await;
        session_mock(&server, false);
        let lookup = server.mock(|when, then| {
            when.method(GET).path("/api/users/alice");
            then.status(200)
                .json_body(json!({"id": 1, "username": "alice", "group_name": "ops"}));
        });

        handle_user(&logged_in(&server), UserCommand::Info(UserInfoArgs::default()))
            .await
            .expect("info");
        lookup.assert();
    }

    #[tokio::test]
    async fn admins_reset_other_passwords_directly() {
        let server = MockServer::start_async().await;
        session_mock(&server, true);
        users_mock(&server);
        let put = server.mock(|when, then| {
            when.method(PUT).path("/api/users/5").json_body(json!({
                "id": 5,
                "username": "bob",
                "group_id": 3,
                "password": "fresh"
            }));
            then.status(200).json_body(json!({}));
        });

        handle_user(
            &logged_in(&server),
            UserCommand::ChangePassword(ChangePasswordArgs {
                user: Some("bob".into()),
                password: Some("fresh".into()),
                current_password: None,
            }),
        )
        .await
        .expect("reset");
        put.assert();
    }

    #[tokio::test]
    async fn admin_reset_requires_a_password() {
        let server = MockServer::start_async().await;
        session_mock(&server, true);
        let put = server.mock(|when, then| {
            when.method(PUT).path("/api/users/5");
            then.status(200);
        });

        let err = handle_user(
            &logged_in(&server),
            UserCommand::ChangePassword(ChangePasswordArgs {
                user: Some("bob".into()),
                ..ChangePasswordArgs::default()
            }),
        )
        .await
        .expect_err("missing password");
        assert_eq!(
            err.display_message(),
            "Please provide a valid password for the user with `--password`"
        );
        assert_eq!(put.hits(), 0);
    }

    #[tokio::test]
    async fn self_service_sends_the_current_password() {
        let server = MockServer::start_async().await;
        session_mock(&server, false);
        users_mock(&server);
        let put = server.mock(|when, then| {
            when.method(PUT).path("/api/users/1").json_body(json!({
                "id": 1,
                "username": "alice",
                "group_id": 2,
                "password": "new",
                "oldpassword": "old"
            }));
            then.status(200).json_body(json!({}));
        });

        handle_user(
            &logged_in(&server),
            UserCommand::ChangePassword(ChangePasswordArgs {
                user: None,
                password: Some("new".into()),
                current_password: Some("old".into()),
            }),
        )
        .await
        .expect("change");
        put.assert();
    }

    #[tokio::test]
    async fn disable_is_admin_only() {
        let server = MockServer::start_async().await;
        session_mock(&server, false);
        let put = server.mock(|when, then| {
            when.method(PUT).path("/api/users/5");
            then.status(200);
        });

        let err = handle_user(
            &logged_in(&server),
            UserCommand::Disable(UserDisableArgs {
                username: "bob".into(),
            }),
        )
        .await
        .expect_err("forbidden");
        assert!(matches!(err, CliError::Validation(_)));
        assert_eq!(put.hits(), 0);
    }

    #[tokio::test]
    async fn disable_replaces_the_password() {
        let server = MockServer::start_async().await;
        session_mock(&server, true);
        users_mock(&server);
        let put = server.mock(|when, then| {
            when.method(PUT).path("/api/users/5");
            then.status(200).json_body(json!({}));
        });

        handle_user(
            &logged_in(&server),
            UserCommand::Disable(UserDisableArgs {
                username: "bob".into(),
            }),
        )
        .await
        .expect("disable");
        put.assert();
    }

    #[tokio::test]
    async fn list_is_connection_refused_when_unreachable() {
        let err = handle_user(&unreachable(), UserCommand::List)
            .await
            .expect_err("refused");
        assert!(matches!(err, CliError::ConnectionRefused));
    }
}
