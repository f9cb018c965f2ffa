//! OpenAI-compatible text-completion provider (`/completions` + `/models`).
//!
//! Targets Infermatic-style hosted endpoints and local servers exposing the
//! same surface. All wire types are private to this module — callers only
//! see [`StreamEvent`]s. Constructed once at startup, then cheaply cloned
//! because `reqwest::Client` is an `Arc` internally.

use futures_util::StreamExt;
use reqwest::Client;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use crate::llm::stream::{Scan, SseDecoder, TokenScanner};
use crate::llm::{
    CompletionRequest, ProviderError, StopReason, StreamEvent, TOKEN_CHANNEL_CAPACITY,
};
use crate::presets::SamplingParams;

// ── Public provider ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct OpenAiCompatibleProvider {
    client: Client,
    api_base_url: String,
    scanner: TokenScanner,
    api_key: Option<String>,
}

impl OpenAiCompatibleProvider {
    /// Build a provider from config values and an optional API key.
    ///
    /// `api_key` is `None` for keyless local endpoints. When present it is
    /// sent as `Authorization: Bearer <key>` on every request.
    pub fn new(
        api_base_url: String,
        timeout_seconds: u64,
        stop_sequences: Vec<String>,
        api_key: Option<String>,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| ProviderError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            scanner: TokenScanner::new(stop_sequences),
            api_key,
        })
    }

    /// GET `{base}/models` and extract model ids.
    ///
    /// The endpoint family is loose about shape: some servers return a bare
    /// array, others a `{ "data": [...] }` envelope; entries may carry `id`
    /// or `name`. Both shapes are accepted.
    pub async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        let url = format!("{}/models", self.api_base_url);
        let mut req = self.client.get(&url);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await.map_err(|e| {
            error!(url = %url, error = %e, "model list request failed (transport)");
            ProviderError::Request(e.to_string())
        })?;
        let response = check_status(response).await?;

        let body: serde_json::Value = response.json().await.map_err(|e| {
            ProviderError::Request(format!("failed to parse model list: {e}"))
        })?;

        let models = extract_model_ids(&body);
        debug!(count = models.len(), "fetched model list");
        Ok(models)
    }

    /// POST `{base}/completions` with `stream: true` and consume the SSE
    /// response on a spawned task.
    pub async fn stream_completion(
        &self,
        request: CompletionRequest,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<StreamEvent>, ProviderError> {
        let url = format!("{}/completions", self.api_base_url);
        let payload = CompletionBody {
            model: &request.model,
            prompt: &request.prompt,
            stream: true,
            seed: -1,
            params: &request.params,
        };

        debug!(
            model = %request.model,
            prompt_len = request.prompt.len(),
            "sending streaming completion request"
        );
        if tracing::enabled!(tracing::Level::TRACE) {
            let json = serde_json::to_string_pretty(&payload)
                .unwrap_or_else(|e| format!("<serialization failed: {e}>"));
            trace!(payload = %json, "full completion request payload");
        }

        let mut req = self.client.post(&url).json(&payload);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await.map_err(|e| {
            error!(url = %url, error = %e, "completion request failed (transport)");
            ProviderError::Request(e.to_string())
        })?;
        let response = check_status(response).await?;

        let (tx, rx) = mpsc::channel(TOKEN_CHANNEL_CAPACITY);
        let scanner = self.scanner.clone();
        tokio::spawn(read_stream(response, scanner, tx, cancel));
        Ok(rx)
    }
}

// ── Stream read loop ──────────────────────────────────────────────────────────

/// Pull byte chunks off the response, decode SSE frames, forward tokens.
///
/// Exits on the first terminator: `[DONE]`, a sentinel hit, cancellation,
/// end of body, or a dropped receiver.
async fn read_stream(
    response: reqwest::Response,
    scanner: TokenScanner,
    tx: mpsc::Sender<StreamEvent>,
    cancel: CancellationToken,
) {
    let mut decoder = SseDecoder::new();
    let mut body = response.bytes_stream();

    loop {
        let chunk = tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("completion stream cancelled mid-read");
                let _ = tx.send(StreamEvent::Finished(StopReason::Cancelled)).await;
                return;
            }

            chunk = body.next() => chunk,
        };

        let bytes = match chunk {
            None => {
                // Server closed without a [DONE] frame — treat as complete.
                let _ = tx.send(StreamEvent::Finished(StopReason::Done)).await;
                return;
            }
            Some(Err(e)) => {
                warn!(error = %e, "completion stream read error");
                let _ = tx
                    .send(StreamEvent::Failed(ProviderError::Request(e.to_string())))
                    .await;
                return;
            }
            Some(Ok(bytes)) => bytes,
        };

        for payload in decoder.feed(&bytes) {
            for scan in scanner.scan(&payload) {
                match scan {
                    Scan::Skip => {}
                    Scan::Token(text) => {
                        if tx.send(StreamEvent::Token(text)).await.is_err() {
                            return;
                        }
                    }
                    Scan::Finished(reason) => {
                        let _ = tx.send(StreamEvent::Finished(reason)).await;
                        return;
                    }
                }
            }
        }
    }
}

// ── Private wire types ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    seed: i64,
    #[serde(flatten)]
    params: &'a SamplingParams,
}

/// Pull model ids out of either response shape, `id` falling back to `name`.
fn extract_model_ids(body: &serde_json::Value) -> Vec<String> {
    let list = match body {
        serde_json::Value::Array(items) => items.as_slice(),
        serde_json::Value::Object(map) => match map.get("data") {
            Some(serde_json::Value::Array(items)) => items.as_slice(),
            _ => {
                warn!("unexpected model list response structure");
                return Vec::new();
            }
        },
        _ => {
            warn!("unexpected model list response structure");
            return Vec::new();
        }
    };

    list.iter()
        .filter_map(|m| {
            m.get("id")
                .or_else(|| m.get("name"))
                .and_then(|v| v.as_str())
                .map(str::to_string)
        })
        .collect()
}

// Error envelope used by OpenAI and compatible APIs.
#[derive(Debug, serde::Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, serde::Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    code: Option<serde_json::Value>,
}

/// Consume the response and return it if successful, or a structured error.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read error body>".to_string());

    let message = if let Ok(env) = serde_json::from_str::<ErrorEnvelope>(&body) {
        let code = env.error.code.map(|v| match v {
            serde_json::Value::String(s) => format!(" [code={s}]"),
            other => format!(" [code={other}]"),
        }).unwrap_or_default();
        format!("HTTP {status}{code}: {}", env.error.message)
    } else {
        format!("HTTP {status}: {body}")
    };

    error!(%status, %message, "completion endpoint returned HTTP error");
    Err(ProviderError::Request(message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_ids_from_enveloped_list() {
        let body = json!({ "data": [ { "id": "model-a" }, { "id": "model-b" } ] });
        assert_eq!(extract_model_ids(&body), vec!["model-a", "model-b"]);
    }

    #[test]
    fn extracts_ids_from_bare_array() {
        let body = json!([ { "id": "model-a" }, { "name": "model-b" } ]);
        assert_eq!(extract_model_ids(&body), vec!["model-a", "model-b"]);
    }

    #[test]
    fn name_falls_back_when_id_missing() {
        let body = json!({ "data": [ { "name": "only-name" } ] });
        assert_eq!(extract_model_ids(&body), vec!["only-name"]);
    }

    #[test]
    fn unexpected_shape_yields_empty() {
        assert!(extract_model_ids(&json!("nope")).is_empty());
        assert!(extract_model_ids(&json!({ "models": [] })).is_empty());
    }

    #[test]
    fn entries_without_usable_id_are_dropped() {
        let body = json!({ "data": [ { "id": "ok" }, { "other": 1 }, 42 ] });
        assert_eq!(extract_model_ids(&body), vec!["ok"]);
    }

    #[test]
    fn completion_body_serialises_flat() {
        let params = SamplingParams::default();
        let body = CompletionBody {
            model: "m",
            prompt: "p",
            stream: true,
            seed: -1,
            params: &params,
        };
        let v: serde_json::Value = serde_json::to_value(&body).unwrap();
        assert_eq!(v["model"], "m");
        assert_eq!(v["stream"], true);
        assert_eq!(v["seed"], -1);
        // Sampling params flatten to top level, matching the wire format.
        assert_eq!(v["max_tokens"], 222);
        assert_eq!(v["top_k"], -1);
    }
}
