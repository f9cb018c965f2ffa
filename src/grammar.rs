//! Grammar checking via the LanguageTool HTTP API.
//!
//! One form-encoded POST per check; the interesting part is applying a
//! suggested replacement back into the draft. Match offsets are character
//! offsets into the text that was checked, so splicing goes through
//! `char_indices`, not byte slicing.

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error};

use crate::config::GrammarConfig;
use crate::error::AppError;

// ── Response types ────────────────────────────────────────────────────────────

/// One grammar finding: where it is, what is wrong, what to do about it.
#[derive(Debug, Clone, Deserialize)]
pub struct GrammarMatch {
    /// Character offset into the checked text.
    pub offset: usize,
    /// Length of the flagged span, in characters.
    pub length: usize,
    pub message: String,
    #[serde(default)]
    pub replacements: Vec<Replacement>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Replacement {
    pub value: String,
}

#[derive(Debug, Default, Deserialize)]
struct CheckResponse {
    #[serde(default)]
    matches: Vec<GrammarMatch>,
}

// ── Checker ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct GrammarChecker {
    client: Client,
    api_url: String,
    language: String,
}

impl GrammarChecker {
    pub fn new(config: &GrammarConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Grammar(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            language: config.language.clone(),
        })
    }

    /// Check `text` and return all findings, in document order.
    pub async fn check(&self, text: &str) -> Result<Vec<GrammarMatch>, AppError> {
        let response = self
            .client
            .post(&self.api_url)
            .form(&[("text", text), ("language", self.language.as_str())])
            .send()
            .await
            .map_err(|e| {
                error!(url = %self.api_url, error = %e, "grammar check failed (transport)");
                AppError::Grammar(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Grammar(format!("HTTP {status}: {body}")));
        }

        let parsed: CheckResponse = response
            .json()
            .await
            .map_err(|e| AppError::Grammar(format!("failed to parse response: {e}")))?;

        debug!(matches = parsed.matches.len(), "grammar check complete");
        Ok(parsed.matches)
    }
}

/// Splice `replacement` into `text` over the span a match flagged.
///
/// Offsets refer to the text that was checked — callers must not mutate the
/// draft between checking and applying, or the span may no longer line up.
pub fn apply_replacement(
    text: &str,
    m: &GrammarMatch,
    replacement: &str,
) -> Result<String, AppError> {
    let char_count = text.chars().count();
    if m.offset + m.length > char_count {
        return Err(AppError::Grammar(format!(
            "match span {}..{} outside text of {} chars",
            m.offset,
            m.offset + m.length,
            char_count
        )));
    }

    let byte_at = |char_idx: usize| -> usize {
        text.char_indices()
            .nth(char_idx)
            .map(|(b, _)| b)
            .unwrap_or(text.len())
    };
    let start = byte_at(m.offset);
    let end = byte_at(m.offset + m.length);

    let mut out = String::with_capacity(text.len() - (end - start) + replacement.len());
    out.push_str(&text[..start]);
    out.push_str(replacement);
    out.push_str(&text[end..]);
    Ok(out)
}
