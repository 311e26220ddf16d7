//! Completion request body

use serde::Serialize;

/// Extra stops used in fill-in-the-middle mode
pub const FIM_STOPS: [&str; 4] = ["def ", "class ", "if ", "\n#"];

/// Fixed completion length budget
const MAX_TOKENS: u32 = 200;

/// Lines of the prompt header that are not session context
const HEADER_LINES: usize = 2;

/// Body of a streamed completion request
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub suffix: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: u32,
    pub n: u32,
    /// The backend only answers streamed requests
    pub stream: bool,
    pub stop: Vec<String>,
    pub extra: RequestExtra,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RequestExtra {
    pub language: String,
    pub next_indent: u32,
    pub trim_by_indentation: bool,
}

impl Default for RequestExtra {
    fn default() -> Self {
        Self {
            language: "python".to_string(),
            next_indent: 0,
            trim_by_indentation: true,
        }
    }
}

impl CompletionRequest {
    pub fn new(prompt: &str, stop: &[String], suffix: &str) -> Self {
        let mut stop = stop.to_vec();
        if !suffix.is_empty() {
            stop.extend(FIM_STOPS.iter().map(|s| s.to_string()));
        }

        Self {
            prompt: prompt.to_string(),
            suffix: suffix.to_string(),
            max_tokens: MAX_TOKENS,
            temperature: temperature_for_prompt(prompt),
            top_p: 1,
            n: 1,
            stream: true,
            stop,
            extra: RequestExtra::default(),
        }
    }
}

/// Sampling temperature for a context of `line_count` lines: conservative
/// for short contexts, more exploratory for long ones
pub fn temperature(line_count: usize) -> f32 {
    match line_count.max(1) {
        0..=1 => 0.0,
        2..=10 => 0.2,
        11..=19 => 0.4,
        _ => 0.8,
    }
}

/// Temperature for a full prompt, not counting the header lines
pub fn temperature_for_prompt(prompt: &str) -> f32 {
    let newlines = prompt.matches('\n').count();
    temperature(newlines.saturating_sub(HEADER_LINES))
}
