//! Session history used as prompt context

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::RwLock;

/// Source of the current session's executed input, oldest first
pub trait HistorySource: Send + Sync {
    fn session_lines(&self) -> Vec<String>;
}

impl HistorySource for Vec<String> {
    fn session_lines(&self) -> Vec<String> {
        self.clone()
    }
}

/// In-memory session history fed by the shell integration
#[derive(Debug, Default)]
pub struct SessionHistory {
    lines: RwLock<Vec<String>>,
}

impl SessionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a newline-delimited history file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read history file {:?}", path))?;
        let history = Self::new();
        history.extend(content.lines().map(str::to_string));
        Ok(history)
    }

    pub fn push(&self, line: impl Into<String>) {
        if let Ok(mut lines) = self.lines.write() {
            lines.push(line.into());
        }
    }

    pub fn extend<I: IntoIterator<Item = String>>(&self, new_lines: I) {
        if let Ok(mut lines) = self.lines.write() {
            lines.extend(new_lines);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut lines) = self.lines.write() {
            lines.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.lines.read().map(|l| l.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl HistorySource for SessionHistory {
    fn session_lines(&self) -> Vec<String> {
        self.lines.read().map(|l| l.clone()).unwrap_or_default()
    }
}
