//! Completion provider implementations.
//!
//! `build(config, api_key)` is the factory — called at startup.
//! Adding a new backend = new module + new match arm.

pub mod dummy;
pub mod openai_compatible;

use crate::config::LlmConfig;
use crate::llm::{CompletionProvider, ProviderError};

/// Construct a `CompletionProvider` from config and an optional API key.
///
/// `api_key` is sourced from `LLM_API_KEY` env (never TOML) and is `None`
/// for keyless local endpoints.
pub fn build(config: &LlmConfig, api_key: Option<String>) -> Result<CompletionProvider, ProviderError> {
    match config.provider.as_str() {
        "dummy" => Ok(CompletionProvider::Dummy(dummy::DummyProvider)),
        "openai" | "openai-compatible" | "infermatic" => {
            let p = openai_compatible::OpenAiCompatibleProvider::new(
                config.api_base_url.clone(),
                config.timeout_seconds,
                config.stop_sequences.clone(),
                api_key,
            )?;
            Ok(CompletionProvider::OpenAiCompatible(p))
        }
        other => Err(ProviderError::UnknownProvider(other.to_string())),
    }
}
