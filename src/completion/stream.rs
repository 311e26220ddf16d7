//! Parsing of the Copilot completion stream
//!
//! The backend answers with newline-delimited events of the form
//! `data: {"choices":[{"text":"..."}]}` separated by blank lines, finishing
//! with `data: [DONE]`. Lines that do not parse are dropped.

use crate::Error;
use serde::Deserialize;

/// Length of the `data: ` framing in front of every event
const FRAME_PREFIX_LEN: usize = 6;

#[derive(Debug, Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    text: String,
}

/// Splits incoming bytes into complete event lines
///
/// Bytes are buffered until a `\n` arrives so that events and multi-byte
/// characters split across chunks are reassembled.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push incoming bytes and return the non-blank lines they complete
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(line) = decode_line(&raw[..raw.len() - 1]) {
                lines.push(line);
            }
        }
        lines
    }

    /// Flush a final line that had no trailing newline
    pub fn finish(&mut self) -> Option<String> {
        let raw = std::mem::take(&mut self.buffer);
        decode_line(&raw)
    }
}

fn decode_line(raw: &[u8]) -> Option<String> {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    if raw.is_empty() {
        return None;
    }
    Some(String::from_utf8_lossy(raw).into_owned())
}

/// Extract the text fragment carried by one event line
pub fn parse_fragment(line: &str) -> Result<String, Error> {
    let payload = line
        .get(FRAME_PREFIX_LEN..)
        .ok_or_else(|| Error::MalformedStreamFragment(line.to_string()))?;

    let chunk: StreamChunk = serde_json::from_str(payload)
        .map_err(|e| Error::MalformedStreamFragment(format!("{}: {}", e, line)))?;

    chunk
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.text)
        .ok_or_else(|| Error::MalformedStreamFragment(format!("no choices: {}", line)))
}

/// Accumulates fragments in arrival order, skipping malformed lines
#[derive(Debug, Default)]
pub struct FragmentCollector {
    text: String,
    skipped: usize,
}

impl FragmentCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_line(&mut self, line: &str) {
        match parse_fragment(line) {
            Ok(fragment) => self.text.push_str(&fragment),
            Err(e) => {
                self.skipped += 1;
                tracing::trace!("{}", e);
            }
        }
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn finish(self) -> String {
        self.text
    }
}

/// Collect a complete stream held in memory
pub fn collect_lines<'a, I>(lines: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut collector = FragmentCollector::new();
    for line in lines {
        if !line.trim_end_matches('\r').is_empty() {
            collector.push_line(line);
        }
    }
    collector.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_skips_blank_and_garbage() {
        let lines = [
            r#"data: {"choices":[{"text":"a"}]}"#,
            "",
            "garbage",
            r#"data: {"choices":[{"text":"b"}]}"#,
        ];
        assert_eq!(collect_lines(lines), "ab");
    }

    #[test]
    fn test_done_marker_is_skipped() {
        let lines = [r#"data: {"choices":[{"text":"os"}]}"#, "data: [DONE]"];
        assert_eq!(collect_lines(lines), "os");
    }

    #[test]
    fn test_parse_fragment_errors() {
        assert!(matches!(
            parse_fragment("data"),
            Err(Error::MalformedStreamFragment(_))
        ));
        assert!(matches!(
            parse_fragment(r#"data: {"choices":[]}"#),
            Err(Error::MalformedStreamFragment(_))
        ));
        assert_eq!(
            parse_fragment(r#"data: {"choices":[{"text":"x","index":0,"finish_reason":null}]}"#)
                .unwrap(),
            "x"
        );
    }

    #[test]
    fn test_decoder_reassembles_split_events() {
        let mut decoder = LineDecoder::new();

        assert!(decoder.push(b"data: {\"choices\":[{\"te").is_empty());
        assert_eq!(
            decoder.push(b"xt\":\"a\"}]}\r\n\r\ndata: [DONE]"),
            vec!["data: {\"choices\":[{\"text\":\"a\"}]}"]
        );
        assert_eq!(decoder.finish(), Some("data: [DONE]".to_string()));
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_decoder_keeps_multibyte_split() {
        let line = "data: {\"choices\":[{\"text\":\"é\"}]}\n".as_bytes();
        let split = line.iter().position(|&b| b == 0xC3).unwrap() + 1;

        let mut decoder = LineDecoder::new();
        assert!(decoder.push(&line[..split]).is_empty());
        let lines = decoder.push(&line[split..]);

        assert_eq!(collect_lines(lines.iter().map(String::as_str)), "é");
    }

    #[test]
    fn test_collector_counts_skipped() {
        let mut collector = FragmentCollector::new();
        collector.push_line("nope");
        collector.push_line(r#"data: {"choices":[{"text":"1"}]}"#);
        assert_eq!(collector.skipped(), 1);
        assert_eq!(collector.finish(), "1");
    }
}
