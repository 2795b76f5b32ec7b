//! Chat completion client

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::conversation::{Role, Turn};
use crate::{Error, Result};

/// One message of a chat completion request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl From<&Turn> for ChatMessage {
    fn from(turn: &Turn) -> Self {
        Self {
            role: turn.role(),
            content: turn.content().to_string(),
        }
    }
}

/// Trait for chat completion backends
#[async_trait]
pub trait ChatCompleter: Send + Sync {
    /// Send the ordered message list and return the reply text
    ///
    /// # Errors
    ///
    /// Returns error if the remote call fails or yields no reply
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;

    /// Backend name for logging
    fn name(&self) -> &'static str;
}

/// `OpenAI` chat completions backend
pub struct OpenAiChat {
    client: Client,
    api_key: SecretString,
    endpoint: Url,
    model: String,
}

impl OpenAiChat {
    /// Create a new chat completion client
    ///
    /// # Errors
    ///
    /// Returns error if the API key is empty or the endpoint cannot be built
    pub fn new(api_key: SecretString, api_base: &Url, model: String) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config(
                "OpenAI API key required for chat completions".to_string(),
            ));
        }

        Ok(Self {
            client: Client::new(),
            api_key,
            endpoint: api_base.join("chat/completions")?,
            model,
        })
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ChatCompleter for OpenAiChat {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        tracing::debug!(
            model = %self.model,
            messages = messages.len(),
            "requesting chat completion"
        );

        let request = ChatCompletionRequest {
            model: &self.model,
            messages,
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "chat completion request failed");
                e
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "chat completion API error");
            return Err(Error::Completion(format!("OpenAI API error {status}: {body}")));
        }

        let result: ChatCompletionResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse chat completion response");
            e
        })?;

        let reply = result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::Completion("response contained no reply".to_string()))?;

        tracing::info!(reply_chars = reply.chars().count(), "chat completion received");
        Ok(reply)
    }

    fn name(&self) -> &'static str {
        "openai-chat"
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}
