//! Optional text-to-speech pipeline.
//!
//! Synthesis goes through one of two REST providers (enum dispatch, same
//! shape as the completion providers), the MP3 lands in the work dir, and
//! playback runs on a blocking task that polls a shared stop flag.
//!
//! The engine is only constructed when `[tts] enabled = true`; the rest of
//! the application treats it as `Option<VoiceEngine>`.

pub mod novelai;
pub mod openai_speech;
pub mod playback;

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::config::TtsConfig;

const OUTPUT_FILENAME: &str = "voice.mp3";

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum VoiceError {
    #[error("unknown tts provider: {0}")]
    UnknownProvider(String),
    #[error("synthesis failed: {0}")]
    Synthesis(String),
    #[error("playback failed: {0}")]
    Playback(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

// ── Provider enum ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum TtsProvider {
    NovelAi(novelai::NovelAiVoice),
    OpenAiSpeech(openai_speech::OpenAiSpeech),
}

impl TtsProvider {
    /// Synthesize `text` and return the MP3 bytes.
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>, VoiceError> {
        match self {
            TtsProvider::NovelAi(p) => p.synthesize(text).await,
            TtsProvider::OpenAiSpeech(p) => p.synthesize(text).await,
        }
    }
}

// ── Engine ────────────────────────────────────────────────────────────────────

/// Synthesis + playback front door. Clone-cheap; the stop flag is shared
/// across clones so any holder can interrupt playback.
#[derive(Debug, Clone)]
pub struct VoiceEngine {
    provider: TtsProvider,
    output_path: PathBuf,
    playing: Arc<AtomicBool>,
}

impl VoiceEngine {
    /// Build the engine from config. `novelai_api_key` comes from env and
    /// is required only by the NovelAI provider.
    pub fn build(
        config: &TtsConfig,
        work_dir: &Path,
        novelai_api_key: Option<String>,
    ) -> Result<Self, VoiceError> {
        let provider = match config.provider.as_str() {
            "novelai" => {
                let key = novelai_api_key.ok_or_else(|| {
                    VoiceError::Synthesis("NOVELAI_API_KEY not set".into())
                })?;
                TtsProvider::NovelAi(novelai::NovelAiVoice::new(
                    config.api_base_url.clone(),
                    config.voice.clone(),
                    key,
                )?)
            }
            "openai-speech" => TtsProvider::OpenAiSpeech(openai_speech::OpenAiSpeech::new(
                config.api_base_url.clone(),
                config.voice.clone(),
            )?),
            other => return Err(VoiceError::UnknownProvider(other.to_string())),
        };

        Ok(Self {
            provider,
            output_path: work_dir.join(OUTPUT_FILENAME),
            playing: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Synthesize `text`, write the MP3 to the work dir, and play it.
    /// Returns once playback finishes or [`stop`](Self::stop) is called.
    pub async fn speak(&self, text: &str) -> Result<(), VoiceError> {
        let cleaned = strip_markup(text);
        if cleaned.trim().is_empty() {
            debug!("nothing to speak after markup stripping");
            return Ok(());
        }

        let audio = self.provider.synthesize(&cleaned).await?;
        tokio::fs::write(&self.output_path, &audio).await?;
        info!(
            bytes = audio.len(),
            path = %self.output_path.display(),
            "voice synthesized"
        );

        playback::play(self.output_path.clone(), self.playing.clone()).await
    }

    /// Interrupt playback. Safe to call when nothing is playing.
    pub fn stop(&self) {
        self.playing.store(false, std::sync::atomic::Ordering::Release);
    }
}

/// Remove markup that reads badly aloud — currently emphasis asterisks.
pub fn strip_markup(text: &str) -> String {
    text.replace('*', "")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TtsConfig;

    fn tts_config(provider: &str) -> TtsConfig {
        TtsConfig {
            enabled: true,
            provider: provider.into(),
            api_base_url: "http://localhost:0".into(),
            voice: "Crina".into(),
        }
    }

    #[test]
    fn strip_markup_removes_asterisks() {
        assert_eq!(strip_markup("*waves* hello *there*"), "waves hello there");
        assert_eq!(strip_markup("no markup"), "no markup");
        assert_eq!(strip_markup("***"), "");
    }

    #[test]
    fn build_requires_novelai_key() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = VoiceEngine::build(&tts_config("novelai"), dir.path(), None).unwrap_err();
        assert!(err.to_string().contains("NOVELAI_API_KEY"));
    }

    #[test]
    fn build_openai_speech_needs_no_key() {
        let dir = tempfile::TempDir::new().unwrap();
        let engine = VoiceEngine::build(&tts_config("openai-speech"), dir.path(), None).unwrap();
        assert!(matches!(engine.provider, TtsProvider::OpenAiSpeech(_)));
    }

    #[test]
    fn build_unknown_provider_errors() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = VoiceEngine::build(&tts_config("espeak"), dir.path(), None).unwrap_err();
        assert!(matches!(err, VoiceError::UnknownProvider(_)));
    }
}
