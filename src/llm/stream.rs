//! Incremental server-sent-event decoding for completion streams.
//!
//! Two small state machines, both pure so the stop/accumulation contract
//! is unit-testable without a network:
//!
//! - [`SseDecoder`] reassembles `data:` payloads from raw byte chunks,
//!   which may split an SSE line at any byte boundary.
//! - [`TokenScanner`] turns decoded payloads into token/stop events,
//!   handling the `[DONE]` frame and configured end-of-turn sentinels.

use serde::Deserialize;

use super::StopReason;

// ── SseDecoder ────────────────────────────────────────────────────────────────

/// Reassembles complete SSE `data:` payloads from arbitrary byte chunks.
///
/// Lines are delimited by `\n`; a trailing `\r` is stripped. Anything that
/// is not a `data:` field (comments, `event:` lines, blanks) is ignored.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one network read; returns the `data:` payloads completed by it.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let mut line = &line[..line.len() - 1];
            if line.last() == Some(&b'\r') {
                line = &line[..line.len() - 1];
            }
            if let Some(data) = parse_data_line(line) {
                payloads.push(data);
            }
        }
        payloads
    }
}

/// Extract the payload of a `data:` line, tolerating a missing space after
/// the colon. Returns `None` for every other field.
fn parse_data_line(line: &[u8]) -> Option<String> {
    let rest = line.strip_prefix(b"data:")?;
    let rest = rest.strip_prefix(b" ").unwrap_or(rest);
    Some(String::from_utf8_lossy(rest).into_owned())
}

// ── TokenScanner ──────────────────────────────────────────────────────────────

/// Wire shape of one completion chunk. Only the text field matters here.
#[derive(Debug, Deserialize)]
struct CompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    text: Option<String>,
}

/// Outcome of scanning one decoded payload.
#[derive(Debug, PartialEq, Eq)]
pub enum Scan {
    /// Text to append to the output buffer.
    Token(String),
    /// Nothing usable in this payload (malformed JSON, empty text) — skip.
    Skip,
    /// Stream is over; any prefix before a sentinel has already been
    /// returned via `Token` by [`TokenScanner::scan`].
    Finished(StopReason),
}

/// Detects `[DONE]` frames and end-of-turn sentinels in chunk text.
///
/// A chunk whose text contains a sentinel contributes only the text before
/// it; the sentinel itself is never part of the accumulated output.
#[derive(Debug, Clone)]
pub struct TokenScanner {
    sentinels: Vec<String>,
}

impl TokenScanner {
    pub fn new(sentinels: Vec<String>) -> Self {
        Self { sentinels: sentinels.into_iter().filter(|s| !s.is_empty()).collect() }
    }

    /// Scan one `data:` payload. Returns at most one token followed (on the
    /// next call or within the same result) by a finish marker.
    pub fn scan(&self, payload: &str) -> Vec<Scan> {
        if payload == "[DONE]" {
            return vec![Scan::Finished(StopReason::Done)];
        }

        let chunk: CompletionChunk = match serde_json::from_str(payload) {
            Ok(c) => c,
            Err(e) => {
                tracing::debug!(error = %e, "skipping malformed stream payload");
                return vec![Scan::Skip];
            }
        };

        let Some(text) = chunk.choices.into_iter().next().and_then(|c| c.text) else {
            return vec![Scan::Skip];
        };
        if text.is_empty() {
            return vec![Scan::Skip];
        }

        // Earliest sentinel wins; everything before it is still output.
        let hit = self
            .sentinels
            .iter()
            .filter_map(|s| text.find(s.as_str()))
            .min();

        match hit {
            Some(0) => vec![Scan::Finished(StopReason::Sentinel)],
            Some(pos) => vec![
                Scan::Token(text[..pos].to_string()),
                Scan::Finished(StopReason::Sentinel),
            ],
            None => vec![Scan::Token(text)],
        }
    }
}
