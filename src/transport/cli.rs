//! CLI command implementations

use crate::auth::{self, DeviceAuthClient, TokenStore};
use crate::completion::{SessionHistory, SuggestionService};
use crate::config::Config;
use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;
use std::sync::Arc;

/// Interactive GitHub device-flow login; stores the access token
pub async fn run_login(config: &Config) -> Result<()> {
    println!("{}", "=== GitHub Copilot Login ===".bold().cyan());
    println!();

    let client = config.http_client()?;
    let device = DeviceAuthClient::new(config, client);

    println!("Initializing a login session with GitHub...");
    let authorization = device
        .begin_device_login()
        .await
        .context("Failed to start GitHub device login")?;

    println!();
    println!("1. Visit this URL in your browser:");
    println!("   {}", authorization.verification_uri.underline());
    println!();
    println!("2. Enter this code:");
    println!("   {}", authorization.display_code().bold().green());
    println!();
    println!("Waiting for authorization...");

    let token = device
        .poll_for_access_token(&authorization)
        .await
        .context("GitHub device login failed")?;

    let Some(token) = token else {
        anyhow::bail!("Failed to log in to GitHub: the device code expired before authorization");
    };

    let store = TokenStore::new()?;
    store.save(&token)?;

    println!();
    println!("✅ Successfully authenticated with GitHub!");
    println!("Token saved to: {}", store.path().display());
    println!();
    println!(
        "The stored token is used automatically; set {} to override it.",
        crate::config::ENV_ACCESS_TOKEN
    );

    Ok(())
}

/// Remove the stored access token
pub async fn run_logout() -> Result<()> {
    let store = TokenStore::new()?;
    if store.exists() {
        store.delete()?;
        println!("✅ Removed stored GitHub token");
    } else {
        println!("No stored GitHub token");
    }

    if std::env::var(crate::config::ENV_ACCESS_TOKEN).is_ok() {
        println!(
            "Note: {} is still set in the environment",
            crate::config::ENV_ACCESS_TOKEN
        );
    }
    Ok(())
}

/// Show where the access token comes from and the configured mode
pub async fn run_status(config: &Config) -> Result<()> {
    let store = TokenStore::new().ok();

    match auth::resolve_access_token(config, store.as_ref()) {
        Some((token, source)) => {
            println!("{} {}", "Authenticated:".bold(), "yes".green());
            println!("  source: {}", source);
            println!("  token:  {}", mask_token(&token));
        }
        None => {
            println!("{} {}", "Authenticated:".bold(), "no".red());
            println!("  run `copilot-completer login` to authenticate");
        }
    }

    println!("{} {}", "Mode:".bold(), config.suggest.mode);
    println!("{} {}ms", "Debounce:".bold(), config.suggest.debounce_ms);
    Ok(())
}

/// One-shot suggestion for `text`; prints the suggestion or nothing
pub async fn run_suggest(
    config: &Config,
    text: &str,
    history: Option<&Path>,
    token_fragment: &str,
) -> Result<()> {
    let history = match history {
        Some(path) => SessionHistory::from_file(path)?,
        None => SessionHistory::new(),
    };

    let store = TokenStore::new().ok();
    let token = auth::resolve_access_token(config, store.as_ref())
        .map(|(token, _)| token)
        .unwrap_or_default();

    if token.is_empty() {
        tracing::info!("No GitHub access token configured - Copilot will not suggest anything");
    }

    let service = SuggestionService::new(config, config.http_client()?, Arc::new(history));
    if let Some(suggestion) = service
        .suggest_with_fragment(text, &token, token_fragment)
        .await
    {
        println!("{}", suggestion.text);
    }

    Ok(())
}

/// Show the first few characters of a secret
fn mask_token(token: &str) -> String {
    let visible: String = token.chars().take(8).collect();
    if token.chars().count() > 8 {
        format!("{}…", visible)
    } else {
        "…".to_string()
    }
}
