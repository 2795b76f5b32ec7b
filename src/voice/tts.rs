//! Text-to-speech (TTS) processing

use std::path::PathBuf;

use async_trait::async_trait;
use futures::StreamExt;
use secrecy::{ExposeSecret, SecretString};
use tokio::io::AsyncWriteExt;
use url::Url;

use super::{AudioFormat, SpeechFile, audio::reply_tempfile};
use crate::{Error, Result};

/// Trait for speech synthesis backends
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesize `text` into an audio file owned by the caller
    ///
    /// # Errors
    ///
    /// Returns error if synthesis fails
    async fn synthesize(&self, text: &str) -> Result<SpeechFile>;

    /// Backend name for logging
    fn name(&self) -> &'static str;
}

/// Synthesizes speech from text with `OpenAI` TTS
pub struct TextToSpeech {
    client: reqwest::Client,
    api_key: SecretString,
    endpoint: Url,
    voice: String,
    speed: f32,
    model: String,
    output_dir: PathBuf,
}

impl TextToSpeech {
    /// Create a new TTS instance using `OpenAI`
    ///
    /// Synthesized files are written to `output_dir`.
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_openai(
        api_key: SecretString,
        api_base: &Url,
        voice: String,
        speed: f32,
        model: String,
        output_dir: PathBuf,
    ) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config("OpenAI API key required for TTS".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            endpoint: api_base.join("audio/speech")?,
            voice,
            speed,
            model,
            output_dir,
        })
    }
}

#[async_trait]
impl Synthesizer for TextToSpeech {
    async fn synthesize(&self, text: &str) -> Result<SpeechFile> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f32,
        }

        let request = TtsRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
            speed: self.speed,
        };

        tracing::debug!(chars = text.chars().count(), voice = %self.voice, "starting OpenAI TTS");

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("OpenAI TTS error {status}: {body}")));
        }

        // Dropping `path` on any error below removes the partial file
        let (file, path) = reply_tempfile(&self.output_dir, AudioFormat::Mp3)?.into_parts();
        let mut file = tokio::fs::File::from_std(file);
        let mut stream = response.bytes_stream();
        let mut written = 0usize;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len();
        }
        file.flush().await?;

        if written == 0 {
            return Err(Error::Tts("OpenAI TTS returned no audio".to_string()));
        }

        tracing::info!(bytes = written, path = %path.display(), "speech synthesized");
        Ok(SpeechFile::new(path, AudioFormat::Mp3))
    }

    fn name(&self) -> &'static str {
        "openai-tts"
    }
}
