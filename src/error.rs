//! Typed errors for the suggestion pipeline
//!
//! Login failures are surfaced to the user with status and body. Everything
//! on the suggestion path degrades to "no suggestion" at the service boundary.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Device-flow endpoint answered with a non-2xx status
    #[error("GitHub device flow request failed ({status}): {body}")]
    AuthProtocol { status: u16, body: String },

    /// The identity provider ended the flow with a terminal OAuth error
    /// (`access_denied`, `unsupported_grant_type`, ...)
    #[error("GitHub authorization failed: {error}{}", description_suffix(.description))]
    AuthDenied {
        error: String,
        description: Option<String>,
    },

    /// Exchanging the access token for a Copilot bearer token failed
    #[error("Copilot token exchange failed: {0}")]
    TokenExchange(String),

    /// Connection or HTTP failure while streaming a completion
    #[error("Copilot completion backend error: {0}")]
    CompletionBackend(String),

    /// A single stream line that could not be parsed. Recovered locally.
    #[error("Malformed stream fragment: {0}")]
    MalformedStreamFragment(String),

    /// Transport failure outside the suggestion path (login)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

fn description_suffix(description: &Option<String>) -> String {
    description
        .as_deref()
        .map(|d| format!(" ({d})"))
        .unwrap_or_default()
}

impl Error {
    /// Build an `AuthProtocol` error from a failed device-flow response
    pub fn auth_protocol(status: reqwest::StatusCode, body: String) -> Self {
        Error::AuthProtocol {
            status: status.as_u16(),
            body,
        }
    }

    /// Token exchange failure from an HTTP status
    pub fn token_exchange_status(status: reqwest::StatusCode, body: &str) -> Self {
        Error::TokenExchange(format!("HTTP {}: {}", status, body))
    }

    /// Completion failure from an HTTP status
    pub fn completion_status(status: reqwest::StatusCode, body: &str) -> Self {
        Error::CompletionBackend(format!("HTTP {}: {}", status, body))
    }

    /// Whether the suggestion path should swallow this error and show nothing
    pub fn degrades_to_no_suggestion(&self) -> bool {
        matches!(
            self,
            Error::TokenExchange(_) | Error::CompletionBackend(_) | Error::MalformedStreamFragment(_)
        )
    }
}
