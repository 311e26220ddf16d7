//! Local HTTP endpoint for the shell integration
//!
//! The shell extension posts executed cells to `/history` and asks
//! `/suggest` for the line being edited. Suggestions never fail the
//! request: anything that goes wrong comes back as `"suggestion": null`.

use crate::auth::{self, TokenStore};
use crate::completion::{Debouncer, SessionHistory, SuggestionService};
use crate::config::{Config, SuggestMode};
use anyhow::Result;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Shared application state
pub struct AppState {
    service: SuggestionService,
    history: Arc<SessionHistory>,
    debouncer: Debouncer,
    access_token: RwLock<Option<String>>,
    mode: SuggestMode,
    /// Where `/refresh` re-reads the access token from
    token_sources: Option<TokenSources>,
}

/// Config file and token store consulted again on `/refresh`
pub struct TokenSources {
    pub config_path: PathBuf,
    pub token_store: Option<TokenStore>,
}

impl TokenSources {
    /// The config file and token store the CLI uses
    pub fn standard() -> anyhow::Result<Self> {
        Ok(Self {
            config_path: Config::config_path()?,
            token_store: TokenStore::new().ok(),
        })
    }

    fn resolve(&self) -> anyhow::Result<Option<String>> {
        let mut config = Config::default();
        config.refresh(&self.config_path)?;
        Ok(auth::resolve_access_token(&config, self.token_store.as_ref()).map(
            |(token, source)| {
                tracing::info!("Reloaded GitHub access token from {}", source);
                token
            },
        ))
    }
}

impl AppState {
    pub fn new(config: &Config, access_token: Option<String>) -> crate::Result<Self> {
        let client = config.http_client()?;
        let history = Arc::new(SessionHistory::new());
        let service = SuggestionService::new(config, client, history.clone());

        Ok(Self {
            service,
            history,
            debouncer: Debouncer::new(Duration::from_millis(config.suggest.debounce_ms)),
            access_token: RwLock::new(access_token),
            mode: config.suggest.mode,
            token_sources: None,
        })
    }

    /// Let `/refresh` reload the access token from `sources`. Without
    /// sources the token given to [`AppState::new`] is kept.
    pub fn with_token_sources(mut self, sources: TokenSources) -> Self {
        self.token_sources = Some(sources);
        self
    }
}

/// Request for a suggestion
#[derive(Debug, Deserialize)]
struct SuggestRequest {
    /// Full buffer text; only the last line is completed
    text: String,
    #[serde(default)]
    token_fragment: String,
    /// Wait out the debounce window and drop the request if newer input arrived
    #[serde(default)]
    debounce: bool,
}

#[derive(Debug, Serialize)]
struct SuggestResponse {
    suggestion: Option<String>,
    /// The request was superseded by newer input while debouncing
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    superseded: bool,
}

#[derive(Debug, Deserialize)]
struct HistoryRequest {
    lines: Vec<String>,
}

#[derive(Debug, Serialize)]
struct HistoryResponse {
    len: usize,
}

/// Health check response
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    authenticated: bool,
}

#[derive(Debug, Serialize)]
struct SettingsResponse {
    mode: SuggestMode,
    debounce_ms: u64,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/settings", get(settings))
        .route("/suggest", post(handle_suggest))
        .route("/history", post(append_history).delete(clear_history))
        .route("/refresh", post(refresh))
        .with_state(state)
}

/// Run the HTTP server
pub async fn run_http_server(config: &Config, access_token: Option<String>) -> Result<()> {
    if access_token.is_none() {
        tracing::warn!(
            "No GitHub access token configured - suggestions are disabled until `login` is run"
        );
    }

    let state = Arc::new(
        AppState::new(config, access_token)?.with_token_sources(TokenSources::standard()?),
    );
    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("HTTP server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let authenticated = state.access_token.read().await.is_some();
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        authenticated,
    })
}

async fn settings(State(state): State<Arc<AppState>>) -> Json<SettingsResponse> {
    Json(SettingsResponse {
        mode: state.mode,
        debounce_ms: state.debouncer.delay().as_millis() as u64,
    })
}

async fn handle_suggest(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SuggestRequest>,
) -> Json<SuggestResponse> {
    // Repeats of the accepted line and input overtaken during the window
    // are both reported as superseded
    if req.debounce && !state.debouncer.settle(&req.text).await {
        tracing::trace!("Dropping superseded suggestion request");
        return Json(SuggestResponse {
            suggestion: None,
            superseded: true,
        });
    }

    let token = state.access_token.read().await.clone().unwrap_or_default();
    let suggestion = state
        .service
        .suggest_with_fragment(&req.text, &token, &req.token_fragment)
        .await
        .map(|s| s.text);

    Json(SuggestResponse {
        suggestion,
        superseded: false,
    })
}

async fn append_history(
    State(state): State<Arc<AppState>>,
    Json(req): Json<HistoryRequest>,
) -> Json<HistoryResponse> {
    state.history.extend(req.lines);
    Json(HistoryResponse {
        len: state.history.len(),
    })
}

async fn clear_history(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.history.clear();
    StatusCode::NO_CONTENT
}

/// Reload the access token (after `login` or `logout`) and drop the cached
/// bearer token
async fn refresh(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if let Some(sources) = &state.token_sources {
        match sources.resolve() {
            Ok(token) => *state.access_token.write().await = token,
            Err(e) => {
                tracing::warn!("Refresh failed, keeping the current token: {:#}", e);
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(serde_json::json!({ "success": false, "error": format!("{:#}", e) })),
                );
            }
        }
    }

    state.service.refresh().await;
    let authenticated = state.access_token.read().await.is_some();
    (
        StatusCode::OK,
        Json(serde_json::json!({ "success": true, "authenticated": authenticated })),
    )
}
