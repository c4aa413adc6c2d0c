use ernest_config::{TargetCheck, validate_target};
use tracing::warn;

use crate::cli::TargetArgs;
use crate::client::{AppContext, CliError, CliResult, config_failure};

pub(crate) fn handle_target(ctx: &AppContext, args: TargetArgs) -> CliResult<()> {
    let Some(raw) = args.url else {
        match &ctx.base_url {
            Some(url) => println!("Current target: {url}"),
            None => println!("No target configured; run `ernest target <url>`"),
        }
        return Ok(());
    };

    let check = validate_target(&raw).map_err(|err| CliError::validation(err.to_string()))?;
    if let TargetCheck::Insecure(url) = &check {
        warn!(url = %url, "Warning! You are using an insecure target for Ernest");
    }

    let mut config = ctx.store.load().map_err(config_failure)?;
    config.url = Some(check.url().to_string());
    ctx.store.save(&config).map_err(config_failure)?;
    println!("Target set");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ernest_config::{Config, ConfigStore};
    use reqwest::Client;

    use crate::cli::OutputFormat;

    fn context(store: ConfigStore) -> AppContext {
        AppContext::from_config(Client::new(), store, Config::default(), OutputFormat::Table)
    }

    #[test]
    fn target_is_persisted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ConfigStore::new(dir.path().join(".ernest"));
        let ctx = context(store.clone());

        handle_target(
            &ctx,
            TargetArgs {
                url: Some("http://ernest.local".into()),
            },
        )
        .expect("target");

        let saved = store.load().expect("load");
        assert_eq!(saved.url.as_deref(), Some("http://ernest.local/"));
    }

    #[test]
    fn non_http_targets_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ConfigStore::new(dir.path().join(".ernest"));
        let ctx = context(store.clone());

        let err = handle_target(
            &ctx,
            TargetArgs {
                url: Some("ftp://ernest.local".into()),
            },
        )
        .expect_err("invalid scheme");
        assert!(matches!(err, CliError::Validation(_)));
        assert!(!store.path().exists());
    }

    #[test]
    fn target_without_url_only_prints() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ConfigStore::new(dir.path().join(".ernest"));
        handle_target(&context(store.clone()), TargetArgs { url: None }).expect("print");
        assert!(!store.path().exists());
    }
}
