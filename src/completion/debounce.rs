//! Debouncing of as-you-type suggestion requests

use std::sync::Mutex;
use std::time::Duration;

/// Tracks the line being edited and lets a request through only once that
/// line has been stable for the debounce window
///
/// Only the last line of the input, trimmed, is compared. Repeating the
/// line that was already accepted is rejected up front, so identical
/// concurrent requests reach the backend once.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    latest: Mutex<String>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            latest: Mutex::new(String::new()),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// True when the edited line of `text` is the one already accepted
    pub fn is_duplicate(&self, text: &str) -> bool {
        let line = tracked_line(text);
        self.latest.lock().map(|l| *l == line).unwrap_or(false)
    }

    /// Accept `text` as the latest input, wait out the window and report
    /// whether nothing newer arrived meanwhile. Returns `false` at once
    /// when the edited line has not changed.
    pub async fn settle(&self, text: &str) -> bool {
        if !self.record(text) {
            return false;
        }
        tokio::time::sleep(self.delay).await;
        self.is_duplicate(text)
    }

    /// Store the edited line; `false` when it equals the stored one
    fn record(&self, text: &str) -> bool {
        let line = tracked_line(text);
        match self.latest.lock() {
            Ok(mut latest) if *latest != line => {
                *latest = line.to_string();
                true
            }
            Ok(_) => false,
            Err(_) => true,
        }
    }
}

fn tracked_line(text: &str) -> &str {
    text.rsplit('\n').next().unwrap_or_default().trim()
}
