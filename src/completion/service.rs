//! Suggestion façade called by the shell integration

use super::client::CompletionClient;
use super::history::HistorySource;
use super::prompt::PromptBuilder;
use crate::auth::TokenCache;
use crate::config::Config;
use crate::Result;
use serde::Serialize;
use std::sync::Arc;

/// A suggestion together with the input it was computed for
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suggestion {
    /// Input text the suggestion was computed for
    pub origin: String,
    /// Text to insert at the cursor
    pub text: String,
}

impl Suggestion {
    /// The input changed while the request was in flight; drop the result
    pub fn is_stale(&self, current_text: &str) -> bool {
        self.origin != current_text
    }
}

pub struct SuggestionService {
    prompts: PromptBuilder,
    tokens: TokenCache,
    completions: CompletionClient,
    history: Arc<dyn HistorySource>,
}

impl SuggestionService {
    pub fn new(config: &Config, client: reqwest::Client, history: Arc<dyn HistorySource>) -> Self {
        Self {
            prompts: PromptBuilder::new(),
            tokens: TokenCache::new(config, client.clone()),
            completions: CompletionClient::new(config, client),
            history,
        }
    }

    pub fn with_token_cache(mut self, tokens: TokenCache) -> Self {
        self.tokens = tokens;
        self
    }

    /// Suggest a continuation of the last line of `full_text`
    pub async fn suggest(&self, full_text: &str, access_token: &str) -> Option<Suggestion> {
        self.suggest_with_fragment(full_text, access_token, "").await
    }

    /// Like [`suggest`](Self::suggest), prefixing the result with the token
    /// fragment the host's completer assigned to the cursor position.
    ///
    /// Failures are logged and reported as no suggestion.
    pub async fn suggest_with_fragment(
        &self,
        full_text: &str,
        access_token: &str,
        token_fragment: &str,
    ) -> Option<Suggestion> {
        match self.try_suggest(full_text, access_token, token_fragment).await {
            Ok(suggestion) => suggestion,
            Err(e) => {
                if e.degrades_to_no_suggestion() {
                    tracing::debug!("No suggestion: {}", e);
                } else {
                    tracing::warn!("Suggestion failed: {}", e);
                }
                None
            }
        }
    }

    pub async fn try_suggest(
        &self,
        full_text: &str,
        access_token: &str,
        token_fragment: &str,
    ) -> Result<Option<Suggestion>> {
        if access_token.is_empty() {
            return Ok(None);
        }

        let current_line = full_text.rsplit('\n').next().unwrap_or_default();
        if current_line.trim().is_empty() {
            return Ok(None);
        }

        let session = self.history.session_lines();
        let prompt = self.prompts.build_prompt(&session, current_line);

        let bearer = self.tokens.get_bearer_token(access_token).await?;
        let code = self
            .completions
            .stream_completion(&bearer, &prompt.text, &prompt.stop, "")
            .await?;

        if code.is_empty() {
            tracing::debug!("Copilot returned an empty completion");
            return Ok(None);
        }

        let text = if prompt.is_comment {
            format!("{token_fragment}\n{code}")
        } else {
            format!("{token_fragment}{code}")
        };

        Ok(Some(Suggestion {
            origin: full_text.to_string(),
            text,
        }))
    }

    /// Drop the cached bearer token
    pub async fn refresh(&self) {
        self.tokens.refresh().await;
    }
}
