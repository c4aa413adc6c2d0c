use ernest_api_models::Component;
use reqwest::Method;

use crate::cli::ComponentListArgs;
use crate::client::{AppContext, CliResult, decode_list, send_checked};
use crate::output::render_components;

pub(crate) async fn handle_component_list(
    ctx: &AppContext,
    args: ComponentListArgs,
) -> CliResult<()> {
    let path = format!("/api/components/{}/", args.component);
    let request = ctx
        .authorized(Method::GET, &path)?
        .query(&[("project", args.project.as_str()), ("service", args.env.as_str())]);

    let response = send_checked(request, &path, &[]).await?;
    let components: Vec<Component> = decode_list(response).await?;
    render_components(&components, ctx.output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::CliError;
    use crate::client::test_support::{bearer, context_with, logged_in};
    use httpmock::prelude::*;
    use serde_json::json;

    fn args() -> ComponentListArgs {
        ComponentListArgs {
            component: "instance".into(),
            project: "acme".into(),
            env: "prod".into(),
        }
    }

    #[tokio::test]
    async fn lists_components_of_an_environment() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/components/instance/")
                .query_param("project", "acme")
                .query_param("service", "prod")
                .header("authorization", bearer());
            then.status(200).json_body(json!([
                {"_component_id": "instance::web-1", "_component": "instance",
                 "name": "web-1", "_state": "running", "public_ip": "10.0.0.4"}
            ]));
        });

        handle_component_list(&logged_in(&server), args())
            .await
            .expect("list");
        mock.assert();
    }

    #[tokio::test]
    async fn requires_a_session() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET).path("/api/components/instance/");
            then.status(200).json_body(json!([]));
        });

        let err = handle_component_list(&context_with(&server, None), args())
            .await
            .expect_err("logged out");
        assert!(matches!(err, CliError::Validation(_)));
        assert_eq!(mock.hits(), 0);
    }
}
