//! GitHub authentication for Copilot
//!
//! Three pieces:
//! - [`DeviceAuthClient`] runs the OAuth device flow and yields a long-lived
//!   [`AccessToken`]
//! - [`TokenCache`] exchanges that token for a short-lived Copilot
//!   [`BearerToken`] and memoizes it until expiry
//! - [`TokenStore`] persists the access token on disk for the CLI
//!
//! SECURITY: the access token is only ever sent to the configured GitHub
//! endpoints.

mod bearer;
mod device_flow;
mod token_store;

pub use bearer::{BearerToken, TokenCache};
pub use device_flow::{DeviceAuthClient, DEVICE_GRANT_TYPE, OAUTH_SCOPE};
pub use token_store::TokenStore;

use serde::{Deserialize, Serialize};

/// Device code response from GitHub
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceAuthorization {
    /// The device verification code
    pub device_code: String,
    /// The code the user must enter
    pub user_code: String,
    /// URL where user must authorize
    pub verification_uri: String,
    /// How long until the codes expire (seconds)
    pub expires_in: u64,
    /// Minimum seconds between polling attempts
    #[serde(rename = "interval")]
    pub poll_interval: u64,
}

impl DeviceAuthorization {
    /// User code formatted for display ("ABCD-EFGH")
    pub fn display_code(&self) -> String {
        let code = &self.user_code;
        if code.len() == 8 && code.is_ascii() && !code.contains('-') {
            format!("{}-{}", &code[..4], &code[4..])
        } else {
            code.clone()
        }
    }
}

/// Long-lived GitHub OAuth access token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessToken {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub scope: String,
}

/// Where the active access token came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    Environment,
    ConfigFile,
    TokenStore,
}

impl std::fmt::Display for TokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenSource::Environment => write!(f, "${}", crate::config::ENV_ACCESS_TOKEN),
            TokenSource::ConfigFile => f.write_str("config file"),
            TokenSource::TokenStore => f.write_str("token store"),
        }
    }
}

/// Resolve the access token: environment / config file first, then the
/// token store written by `login`.
///
/// `Config::load` has already folded the environment variable into
/// `auth.access_token`, so the two are told apart by re-reading the variable.
pub fn resolve_access_token(
    config: &crate::Config,
    store: Option<&TokenStore>,
) -> Option<(String, TokenSource)> {
    if let Some(token) = config.access_token() {
        let from_env = std::env::var(crate::config::ENV_ACCESS_TOKEN)
            .map(|v| v.trim() == token)
            .unwrap_or(false);
        let source = if from_env {
            TokenSource::Environment
        } else {
            TokenSource::ConfigFile
        };
        return Some((token.to_string(), source));
    }

    let store = store?;
    match store.load() {
        Ok(token) if !token.access_token.is_empty() => {
            Some((token.access_token, TokenSource::TokenStore))
        }
        Ok(_) => None,
        Err(e) => {
            if store.exists() {
                tracing::warn!("Ignoring unreadable token store {:?}: {}", store.path(), e);
            }
            None
        }
    }
}
