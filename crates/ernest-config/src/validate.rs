//! Validation helpers for user-supplied configuration values.

use url::Url;

use crate::error::{ConfigError, ConfigResult};

/// Outcome of a target URL check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetCheck {
    /// Target uses TLS.
    Secure(Url),
    /// Target uses plain HTTP; usable but worth a warning.
    Insecure(Url),
}

impl TargetCheck {
    /// Parsed URL regardless of transport security.
    #[must_use]
    pub const fn url(&self) -> &Url {
        match self {
            Self::Secure(url) | Self::Insecure(url) => url,
        }
    }
}

/// Accept only absolute `http`/`https` targets.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidTarget`] for unparsable URLs or other schemes.
pub fn validate_target(raw: &str) -> ConfigResult<TargetCheck> {
    let trimmed = raw.trim();
    let url = Url::parse(trimmed).map_err(|_| ConfigError::InvalidTarget {
        value: trimmed.to_string(),
        reason: "not an absolute URL",
    })?;

    match url.scheme() {
        "https" => Ok(TargetCheck::Secure(url)),
        "http" => Ok(TargetCheck::Insecure(url)),
        _ => Err(ConfigError::InvalidTarget {
            value: trimmed.to_string(),
            reason: "scheme must be http or https",
        }),
    }
}
