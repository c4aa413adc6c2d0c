//! Provider credential templates.
//!
//! A template is a YAML file holding the same values the provider flags accept,
//! so credentials need not be typed on the command line. Flags supplied
//! alongside a template override its values.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{ConfigError, ConfigResult};

/// Union of every provider field a template may carry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProviderTemplate {
    /// Create the resource against the provider's fake backend.
    pub fake: bool,
    /// AWS access key id.
    #[serde(alias = "token")]
    pub access_key_id: Option<String>,
    /// AWS secret access key.
    #[serde(alias = "secret")]
    pub secret_access_key: Option<String>,
    /// AWS or Azure region.
    pub region: Option<String>,
    /// VCloud user name (without organisation).
    pub user: Option<String>,
    /// VCloud organisation.
    pub org: Option<String>,
    /// VCloud password.
    pub password: Option<String>,
    /// VCloud API endpoint.
    #[serde(rename = "vcloud-url", alias = "vcloud_url")]
    pub vcloud_url: Option<String>,
    /// VCloud external network.
    #[serde(rename = "public-network", alias = "public_network")]
    pub public_network: Option<String>,
    /// VCloud VSE endpoint.
    #[serde(rename = "vse-url", alias = "vse_url")]
    pub vse_url: Option<String>,
    /// Azure subscription id.
    pub subscription_id: Option<String>,
    /// Azure client id.
    pub client_id: Option<String>,
    /// Azure client secret.
    pub client_secret: Option<String>,
    /// Azure tenant id.
    pub tenant_id: Option<String>,
    /// Azure cloud environment.
    pub environment: Option<String>,
}

/// Read and parse a provider template.
///
/// # Errors
///
/// Returns [`ConfigError::TemplateNotFound`] when the file cannot be read and
/// [`ConfigError::TemplateInvalid`] when it is not valid YAML.
pub fn load_provider_template(path: &Path) -> ConfigResult<ProviderTemplate> {
    let raw = fs::read_to_string(path).map_err(|_| ConfigError::TemplateNotFound {
        path: path.to_path_buf(),
    })?;
    if raw.trim().is_empty() {
        return Ok(ProviderTemplate::default());
    }
    serde_yaml::from_str(&raw).map_err(|_| ConfigError::TemplateInvalid {
        path: path.to_path_buf(),
    })
}
