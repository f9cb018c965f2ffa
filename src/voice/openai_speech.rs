//! OpenAI-compatible speech synthesis (`/v1/audio/speech`).
//!
//! Alternative to the NovelAI provider for local or hosted endpoints that
//! expose the speech route. One JSON POST returning MP3 bytes.

use reqwest::Client;
use serde::Serialize;

use super::VoiceError;

const SPEECH_MODEL: &str = "tts-1";

#[derive(Debug, Serialize)]
struct SpeechBody<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'a str,
}

#[derive(Debug, Clone)]
pub struct OpenAiSpeech {
    client: Client,
    api_base_url: String,
    voice: String,
}

impl OpenAiSpeech {
    pub fn new(api_base_url: String, voice: String) -> Result<Self, VoiceError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|e| VoiceError::Synthesis(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            voice,
        })
    }

    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>, VoiceError> {
        let url = format!("{}/v1/audio/speech", self.api_base_url);
        let body = SpeechBody {
            model: SPEECH_MODEL,
            input: text,
            voice: &self.voice,
            response_format: "mp3",
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| VoiceError::Synthesis(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(VoiceError::Synthesis(format!("HTTP {status}: {text}")));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| VoiceError::Synthesis(format!("failed to read audio body: {e}")))?;
        Ok(bytes.to_vec())
    }
}
