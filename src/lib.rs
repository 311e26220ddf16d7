//! copilot-completer: GitHub Copilot suggestions for interactive Python shells
//!
//! This library provides:
//! - GitHub OAuth device-flow login and Copilot token exchange
//! - Prompt construction from the shell session
//! - Streamed completions from the Copilot backend
//! - A local HTTP endpoint the shell extension talks to

pub mod auth;
pub mod completion;
pub mod config;
mod error;
pub mod transport;

pub use completion::{Suggestion, SuggestionService};
pub use config::Config;
pub use error::{Error, Result};
