//! Completion provider abstraction.
//!
//! `CompletionProvider` is an enum over concrete provider implementations.
//! Add a new variant + module in `providers/` for each additional backend.
//!
//! Provider instances are shared immutable capabilities — clone them freely.
//! Enum dispatch avoids `dyn` trait objects and the `async-trait` dependency.

pub mod providers;
pub mod stream;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::presets::SamplingParams;

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("provider request failed: {0}")]
    Request(String),
}

// ── Request / stream types ────────────────────────────────────────────────────

/// One streaming completion request, fully resolved before dispatch.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub prompt: String,
    pub params: SamplingParams,
}

/// Why a token stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The server sent a `[DONE]` frame or closed the stream.
    Done,
    /// A configured end-of-turn sentinel appeared in a chunk.
    Sentinel,
    /// The caller cancelled mid-stream.
    Cancelled,
}

/// Events delivered over the token channel, in arrival order.
#[derive(Debug)]
pub enum StreamEvent {
    Token(String),
    Finished(StopReason),
    Failed(ProviderError),
}

/// Channel capacity for token delivery. Generation produces tokens far
/// slower than the console consumes them; a small buffer suffices.
pub(crate) const TOKEN_CHANNEL_CAPACITY: usize = 64;

// ── Provider enum ─────────────────────────────────────────────────────────────

/// All available provider backends.
///
/// Adding a backend = new module + new variant + new match arms.
#[derive(Debug, Clone)]
pub enum CompletionProvider {
    Dummy(providers::dummy::DummyProvider),
    OpenAiCompatible(providers::openai_compatible::OpenAiCompatibleProvider),
}

impl CompletionProvider {
    /// Fetch the model ids the endpoint offers.
    pub async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        match self {
            CompletionProvider::Dummy(p) => p.list_models().await,
            CompletionProvider::OpenAiCompatible(p) => p.list_models().await,
        }
    }

    /// Start a streaming completion.
    ///
    /// Returns immediately with the receiving end of the token channel; the
    /// stream is consumed on a spawned task. Cancelling `cancel` stops the
    /// read loop promptly and a final [`StreamEvent::Finished`] is delivered.
    pub async fn stream_completion(
        &self,
        request: CompletionRequest,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<StreamEvent>, ProviderError> {
        match self {
            CompletionProvider::Dummy(p) => p.stream_completion(request, cancel).await,
            CompletionProvider::OpenAiCompatible(p) => p.stream_completion(request, cancel).await,
        }
    }
}
