//! Copilot suggestion pipeline

mod client;
mod debounce;
mod history;
mod prompt;
mod request;
mod service;
pub mod stream;

pub use client::CompletionClient;
pub use debounce::Debouncer;
pub use history::{HistorySource, SessionHistory};
pub use prompt::{Prompt, PromptBuilder, PROMPT_HEADER};
pub use request::{temperature, temperature_for_prompt, CompletionRequest, FIM_STOPS};
pub use service::{Suggestion, SuggestionService};
