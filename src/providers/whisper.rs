//! Speech-to-text over an OpenAI-compatible transcription endpoint

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{Provider, Transcriber, classify_status, retry_after_seconds, wire_error};
use crate::error::{Error, Result};

/// Default transcription endpoint (Groq, OpenAI-compatible)
const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Default model
const DEFAULT_MODEL: &str = "whisper-large-v3-turbo";

/// Default per-request timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Whisper transcription over multipart WAV upload
pub struct WhisperTranscriber {
    client: reqwest::Client,
    name: String,
    api_key: String,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl WhisperTranscriber {
    /// Transcriber against the Groq whisper endpoint
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is empty.
    pub fn new(api_key: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(
                "API key required for transcription".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            name: "groq_whisper".to_string(),
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Point at a different OpenAI-compatible endpoint
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override the model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[async_trait]
impl Provider for WhisperTranscriber {
    fn name(&self) -> &str {
        &self.name
    }

    async fn is_available(&self) -> bool {
        let response = self
            .client
            .get(format!("{}/models", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(Duration::from_secs(5))
            .send()
            .await;
        matches!(response, Ok(r) if r.status().is_success())
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, audio: &[u8]) -> Result<String> {
        tracing::debug!(provider = %self.name, audio_bytes = audio.len(), "starting transcription");

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio.to_vec())
                    .file_name("audio.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Provider {
                        provider: self.name.clone(),
                        message: e.to_string(),
                    })?,
            )
            .text("model", self.model.clone());

        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .multipart(form)
            .send()
            .await
            .map_err(|e| wire_error(&self.name, self.timeout, &e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = retry_after_seconds(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(&self.name, status, &body, retry_after));
        }

        let result: TranscriptionResponse = response.json().await?;
        let transcript = result.text.trim().to_string();
        tracing::info!(provider = %self.name, chars = transcript.len(), "transcription complete");
        Ok(transcript)
    }
}
