//! NovelAI voice synthesis (`/ai/generate-voice`).
//!
//! A single authenticated GET returning MP3 bytes. The speaker is selected
//! by name through the `seed` query parameter with `voice=-1`, which is how
//! the v1 engine addresses its named speakers.

use reqwest::Client;

use super::VoiceError;

#[derive(Debug, Clone)]
pub struct NovelAiVoice {
    client: Client,
    api_base_url: String,
    voice: String,
    api_key: String,
}

impl NovelAiVoice {
    pub fn new(api_base_url: String, voice: String, api_key: String) -> Result<Self, VoiceError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|e| VoiceError::Synthesis(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            voice,
            api_key,
        })
    }

    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>, VoiceError> {
        let url = format!("{}/ai/generate-voice", self.api_base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("text", text),
                ("voice", "-1"),
                ("seed", self.voice.as_str()),
                ("opus", "false"),
                ("version", "v1"),
            ])
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| VoiceError::Synthesis(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VoiceError::Synthesis(format!("HTTP {status}: {body}")));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| VoiceError::Synthesis(format!("failed to read audio body: {e}")))?;
        Ok(bytes.to_vec())
    }
}
