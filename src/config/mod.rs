//! Configuration management for copilot-completer
//!
//! Settings are read from `config.toml` in the platform config directory and
//! then overridden by the `GITHUB_COPILOT_*` environment variables the shell
//! extension has always honoured. The loaded `Config` is passed explicitly
//! into the pipeline; call [`Config::refresh`] to pick up changes.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const ENV_ACCESS_TOKEN: &str = "GITHUB_COPILOT_ACCESS_TOKEN";
pub const ENV_INLINE: &str = "GITHUB_COPILOT_INLINE_COMPLETIONS";
pub const ENV_AUTO_SUGGEST: &str = "GITHUB_COPILOT_AUTO_SUGGEST";
pub const ENV_KEY_BINDING: &str = "GITHUB_COPILOT_KEY_BINDING";

/// OAuth client id of the VS Code GitHub authentication app
pub const DEFAULT_CLIENT_ID: &str = "01ab8ac9400c4e429b23";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub auth: AuthConfig,
    pub endpoints: EndpointsConfig,
    pub suggest: SuggestConfig,
    pub http: HttpConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuthConfig {
    /// Long-lived GitHub access token. Usually left empty and supplied via
    /// the environment or the token store instead.
    pub access_token: Option<String>,
    pub client_id: String,
    /// Open the verification page in a browser during `login`
    pub open_browser: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            client_id: DEFAULT_CLIENT_ID.to_string(),
            open_browser: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EndpointsConfig {
    pub device_code_url: String,
    pub access_token_url: String,
    pub copilot_token_url: String,
    pub completions_url: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            device_code_url: "https://github.com/login/device/code".to_string(),
            access_token_url: "https://github.com/login/oauth/access_token".to_string(),
            copilot_token_url: "https://api.github.com/copilot_internal/v2/token".to_string(),
            completions_url:
                "https://copilot-proxy.githubusercontent.com/v1/engines/copilot-codex/completions"
                    .to_string(),
        }
    }
}

impl EndpointsConfig {
    /// Point every endpoint at a single base URL (used against local mocks)
    pub fn with_base_url(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            device_code_url: format!("{base}/login/device/code"),
            access_token_url: format!("{base}/login/oauth/access_token"),
            copilot_token_url: format!("{base}/copilot_internal/v2/token"),
            completions_url: format!("{base}/v1/engines/copilot-codex/completions"),
        }
    }
}

/// How the shell integration presents suggestions
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SuggestMode {
    /// Mixed into tab completions, placed first
    Inline,
    /// Shown as an auto-suggestion while typing
    #[default]
    AutoSuggestion,
    /// Requested explicitly with a key binding
    KeyBinding,
}

impl std::fmt::Display for SuggestMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SuggestMode::Inline => "inline",
            SuggestMode::AutoSuggestion => "auto_suggestion",
            SuggestMode::KeyBinding => "key_binding",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SuggestConfig {
    pub mode: SuggestMode,
    pub debounce_ms: u64,
}

impl Default for SuggestConfig {
    fn default() -> Self {
        Self {
            mode: SuggestMode::AutoSuggestion,
            debounce_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HttpConfig {
    pub connect_timeout_secs: u64,
    /// Abort a completion stream that stays silent this long
    pub stream_chunk_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            stream_chunk_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8766,
        }
    }
}

impl Config {
    /// Load configuration from default location or create default,
    /// then apply environment overrides
    pub fn load() -> Result<Self> {
        Self::load_at(&Self::config_path()?)
    }

    /// Load `path` (defaults when missing), apply the environment and validate
    pub fn load_at(path: &std::path::Path) -> Result<Self> {
        let mut config = Self::load_from(path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from an explicit file, without environment overrides
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {:?}", path))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file {:?}", path))?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Re-read `path` and the environment, replacing `self`. On error
    /// `self` is left untouched.
    pub fn refresh(&mut self, path: &std::path::Path) -> Result<()> {
        *self = Self::load_at(path)?;
        tracing::debug!("Configuration reloaded from {:?}", path);
        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "copilot-completer") {
            let config_dir = proj_dirs.config_dir();
            std::fs::create_dir_all(config_dir)?;
            Ok(config_dir.join("config.toml"))
        } else {
            Ok(PathBuf::from("config.toml"))
        }
    }

    /// Apply `GITHUB_COPILOT_*` overrides read through `lookup`.
    ///
    /// Mode flags are checked in the order inline, auto-suggestion, key
    /// binding; the first one set to `"1"` wins.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // An empty variable does not mask a token from the config file
        if let Some(token) = lookup(ENV_ACCESS_TOKEN).filter(|t| !t.trim().is_empty()) {
            self.auth.access_token = Some(token);
        }

        let enabled = |key: &str| lookup(key).map(|v| v == "1");
        let flags = [
            (ENV_INLINE, SuggestMode::Inline),
            (ENV_AUTO_SUGGEST, SuggestMode::AutoSuggestion),
            (ENV_KEY_BINDING, SuggestMode::KeyBinding),
        ];

        if let Some((_, mode)) = flags.iter().find(|(key, _)| enabled(*key) == Some(true)) {
            self.suggest.mode = *mode;
        }
    }

    /// The configured access token, treating an empty string as absent
    pub fn access_token(&self) -> Option<&str> {
        self.auth
            .access_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// Check that every endpoint is a valid absolute URL and the stream
    /// timeout is usable
    pub fn validate(&self) -> crate::Result<()> {
        let endpoints = [
            ("device_code_url", &self.endpoints.device_code_url),
            ("access_token_url", &self.endpoints.access_token_url),
            ("copilot_token_url", &self.endpoints.copilot_token_url),
            ("completions_url", &self.endpoints.completions_url),
        ];

        for (name, value) in endpoints {
            url::Url::parse(value)
                .map_err(|e| crate::Error::Config(format!("endpoints.{name} = {value:?}: {e}")))?;
        }

        if self.http.stream_chunk_timeout_secs == 0 {
            return Err(crate::Error::Config(
                "http.stream_chunk_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.auth.client_id.trim().is_empty() {
            return Err(crate::Error::Config("auth.client_id is empty".to_string()));
        }

        Ok(())
    }

    /// Build the shared HTTP client used by every pipeline component
    pub fn http_client(&self) -> crate::Result<reqwest::Client> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("copilot-completer/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(std::time::Duration::from_secs(
                self.http.connect_timeout_secs,
            ))
            .build()?;
        Ok(client)
    }
}
