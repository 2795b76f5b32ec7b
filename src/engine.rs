//! Conversation engine: persona + history → assistant reply

use std::sync::Arc;

use crate::completion::{ChatCompleter, ChatMessage};
use crate::conversation::{Transcript, Turn};
use crate::{Persona, Result};

/// Builds completion requests for a session and asks the backend for a reply
pub struct ConversationEngine {
    completer: Arc<dyn ChatCompleter>,
    persona: Persona,
}

impl ConversationEngine {
    #[must_use]
    pub fn new(completer: Arc<dyn ChatCompleter>, persona: Persona) -> Self {
        Self { completer, persona }
    }

    #[must_use]
    pub const fn persona(&self) -> &Persona {
        &self.persona
    }

    /// Build the message list for a pending user turn
    ///
    /// The persona is always first, followed by the transcript in order and
    /// then the pending turn.
    #[must_use]
    pub fn build_request(&self, transcript: &Transcript, pending: &Turn) -> Vec<ChatMessage> {
        let system = Turn::system(self.persona.prompt());
        std::iter::once(&system)
            .chain(transcript.turns())
            .chain(std::iter::once(pending))
            .map(ChatMessage::from)
            .collect()
    }

    /// Ask the completion backend for the assistant's reply
    ///
    /// The reply is returned verbatim; the transcript is not modified.
    ///
    /// # Errors
    ///
    /// Returns error if the completion call fails
    pub async fn reply(&self, transcript: &Transcript, pending: &Turn) -> Result<String> {
        let messages = self.build_request(transcript, pending);
        tracing::debug!(
            backend = self.completer.name(),
            history = transcript.len(),
            "consulting completion backend"
        );
        self.completer.complete(&messages).await
    }
}
