//! OAuth 2.0 device authorization flow against GitHub
//!
//! Reference: RFC 8628. GitHub answers `200 OK` with an `error` field while
//! the user has not yet authorized, so the poll loop inspects the body before
//! trusting the status.

use super::{AccessToken, DeviceAuthorization};
use crate::config::Config;
use crate::{Error, Result};
use serde::Deserialize;
use std::time::Duration;

/// Scope requested for the Copilot token exchange
pub const OAUTH_SCOPE: &str = "read:user";
/// Device flow grant type
pub const DEVICE_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// Extra delay GitHub asks for on `slow_down`
const SLOW_DOWN_STEP_SECS: u64 = 5;

/// Body of a token poll: either the token or an OAuth error
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PollResponse {
    Error {
        error: String,
        #[serde(default)]
        error_description: Option<String>,
    },
    Granted(AccessToken),
}

pub struct DeviceAuthClient {
    client: reqwest::Client,
    client_id: String,
    device_code_url: String,
    access_token_url: String,
    open_browser: bool,
}

impl DeviceAuthClient {
    pub fn new(config: &Config, client: reqwest::Client) -> Self {
        Self {
            client,
            client_id: config.auth.client_id.clone(),
            device_code_url: config.endpoints.device_code_url.clone(),
            access_token_url: config.endpoints.access_token_url.clone(),
            open_browser: config.auth.open_browser,
        }
    }

    pub fn with_browser(mut self, open_browser: bool) -> Self {
        self.open_browser = open_browser;
        self
    }

    /// Request a device code from GitHub and open the verification page
    pub async fn begin_device_login(&self) -> Result<DeviceAuthorization> {
        let body = serde_json::json!({
            "client_id": self.client_id,
            "scope": OAUTH_SCOPE,
        });

        let response = self
            .client
            .post(&self.device_code_url)
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            tracing::error!(
                "GitHub device code request failed, status {}, body:\n{}",
                status,
                text
            );
            return Err(Error::auth_protocol(status, text));
        }

        let authorization: DeviceAuthorization = response.json().await?;

        tracing::info!(
            "GitHub device login started: visit {} and enter code {}",
            authorization.verification_uri,
            authorization.display_code()
        );

        if self.open_browser {
            open_verification_uri(&authorization.verification_uri);
        }

        Ok(authorization)
    }

    /// Poll the token endpoint until the user authorizes, the code expires
    /// or GitHub reports a terminal error.
    ///
    /// Returns `Ok(None)` when the device code expires without authorization.
    pub async fn poll_for_access_token(
        &self,
        auth: &DeviceAuthorization,
    ) -> Result<Option<AccessToken>> {
        let start = tokio::time::Instant::now();
        let expires_in = Duration::from_secs(auth.expires_in);
        let mut interval = auth.poll_interval;

        tracing::info!(
            "Polling for login session status until {}",
            (chrono::Utc::now() + chrono::Duration::seconds(auth.expires_in as i64)).to_rfc3339()
        );

        loop {
            tokio::time::sleep(Duration::from_secs(interval)).await;

            match self.poll_once(&auth.device_code).await? {
                PollResponse::Granted(token) => {
                    tracing::info!("GitHub device login authorized");
                    return Ok(Some(token));
                }
                PollResponse::Error {
                    error,
                    error_description,
                } => match error.as_str() {
                    "authorization_pending" => {
                        tracing::debug!("Polling for login session status: {}", error);
                    }
                    "slow_down" => {
                        interval += SLOW_DOWN_STEP_SECS;
                        tracing::debug!("GitHub asked to slow down, polling every {}s", interval);
                    }
                    "expired_token" => {
                        tracing::warn!("Device code expired before authorization");
                        return Ok(None);
                    }
                    _ => {
                        tracing::error!(
                            "GitHub device login failed: {} {:?}",
                            error,
                            error_description
                        );
                        return Err(Error::AuthDenied {
                            error,
                            description: error_description,
                        });
                    }
                },
            }

            if start.elapsed() >= expires_in {
                tracing::warn!(
                    "Device login not authorized within {}s",
                    expires_in.as_secs()
                );
                return Ok(None);
            }
        }
    }

    async fn poll_once(&self, device_code: &str) -> Result<PollResponse> {
        let body = serde_json::json!({
            "client_id": self.client_id,
            "device_code": device_code,
            "grant_type": DEVICE_GRANT_TYPE,
        });

        let response = self
            .client
            .post(&self.access_token_url)
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                "GitHub token poll failed, status {}, body:\n{}",
                status,
                text
            );
            return Err(Error::auth_protocol(status, text));
        }

        serde_json::from_str(&text).map_err(|e| Error::AuthProtocol {
            status: status.as_u16(),
            body: format!("unexpected token response ({}): {}", e, text),
        })
    }
}

/// Open the verification page in the system browser. Best-effort: the user
/// can always navigate there by hand.
fn open_verification_uri(uri: &str) {
    if let Err(e) = webbrowser::open(uri) {
        tracing::debug!("Could not open browser for {}: {}", uri, e);
    }
}
