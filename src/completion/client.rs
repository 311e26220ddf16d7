//! Streaming client for the Copilot completions endpoint

use super::request::CompletionRequest;
use super::stream::{FragmentCollector, LineDecoder};
use crate::config::Config;
use crate::{Error, Result};
use futures::StreamExt;
use std::time::Duration;

pub struct CompletionClient {
    client: reqwest::Client,
    completions_url: String,
    chunk_timeout: Duration,
}

impl CompletionClient {
    pub fn new(config: &Config, client: reqwest::Client) -> Self {
        Self {
            client,
            completions_url: config.endpoints.completions_url.clone(),
            chunk_timeout: Duration::from_secs(config.http.stream_chunk_timeout_secs),
        }
    }

    /// Stream a completion for `prompt` and return the concatenated text.
    ///
    /// A non-empty `suffix` switches to fill-in-the-middle mode.
    pub async fn stream_completion(
        &self,
        bearer: &str,
        prompt: &str,
        stop: &[String],
        suffix: &str,
    ) -> Result<String> {
        let request = CompletionRequest::new(prompt, stop, suffix);

        tracing::debug!(
            "Requesting completion: {} prompt bytes, temperature {}, stop {:?}",
            request.prompt.len(),
            request.temperature,
            request.stop
        );

        let response = self
            .client
            .post(&self.completions_url)
            .header("Authorization", format!("Bearer {}", bearer))
            .header("OpenAI-Intent", "copilot-ghost")
            .header("OpenAI-Organization", "github-copilot")
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::CompletionBackend(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::completion_status(status, &text));
        }

        let mut stream = response.bytes_stream();
        let mut decoder = LineDecoder::new();
        let mut collector = FragmentCollector::new();

        loop {
            let chunk = match tokio::time::timeout(self.chunk_timeout, stream.next()).await {
                Ok(Some(chunk)) => chunk.map_err(|e| Error::CompletionBackend(e.to_string()))?,
                Ok(None) => break,
                Err(_) => {
                    return Err(Error::CompletionBackend(format!(
                        "stream timeout - no data for {} seconds",
                        self.chunk_timeout.as_secs()
                    )))
                }
            };

            for line in decoder.push(&chunk) {
                collector.push_line(&line);
            }
        }

        if let Some(line) = decoder.finish() {
            collector.push_line(&line);
        }

        if collector.skipped() > 0 {
            tracing::trace!("Skipped {} unparsable stream lines", collector.skipped());
        }

        Ok(collector.finish())
    }
}
