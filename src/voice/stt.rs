//! Speech-to-text (STT) processing

use std::path::Path;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use super::AudioFormat;
use crate::{Error, Result};

/// Trait for transcription backends
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe the audio file at `audio` to text
    ///
    /// # Errors
    ///
    /// Returns error if the remote call fails or nothing intelligible was heard
    async fn transcribe(&self, audio: &Path) -> Result<String>;

    /// Backend name for logging
    fn name(&self) -> &'static str;
}

/// Response from OpenAI Whisper transcription API
#[derive(serde::Deserialize)]
struct WhisperResponse {
    text: String,
}

/// Transcribes speech to text with `OpenAI` Whisper
pub struct SpeechToText {
    client: reqwest::Client,
    api_key: SecretString,
    endpoint: Url,
    model: String,
}

impl SpeechToText {
    /// Create a new STT instance using `OpenAI` Whisper
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_whisper(api_key: SecretString, api_base: &Url, model: String) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config(
                "OpenAI API key required for Whisper".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            endpoint: api_base.join("audio/transcriptions")?,
            model,
        })
    }
}

#[async_trait]
impl Transcriber for SpeechToText {
    async fn transcribe(&self, audio: &Path) -> Result<String> {
        let bytes = tokio::fs::read(audio).await?;
        let format = AudioFormat::from_path(audio);
        tracing::debug!(audio_bytes = bytes.len(), format = ?format, "starting Whisper transcription");

        let file_name = format!("audio.{}", format.extension());
        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(bytes)
                    .file_name(file_name)
                    .mime_str(format.mime())
                    .map_err(|e| Error::Stt(e.to_string()))?,
            )
            .text("model", self.model.clone());

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(self.api_key.expose_secret())
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Whisper request failed");
                e
            })?;

        let status = response.status();
        tracing::debug!(status = %status, "received response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Whisper API error");
            return Err(Error::Stt(format!("Whisper API error {status}: {body}")));
        }

        let result: WhisperResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse response");
            e
        })?;

        let transcript = result.text.trim();
        if transcript.is_empty() {
            tracing::warn!("transcription was empty");
            return Err(Error::Stt("no speech recognized".to_string()));
        }

        tracing::info!(transcript = %transcript, "transcription complete");
        Ok(transcript.to_string())
    }

    fn name(&self) -> &'static str {
        "whisper"
    }
}
