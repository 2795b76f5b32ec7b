//! Conversation state: turns, transcript and per-session state
//!
//! The transcript only grows by whole exchanges (user turn followed by the
//! assistant reply), so a session's history always alternates roles and never
//! contains the system persona.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// Speaker of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Wire name used by chat completion APIs
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message in the conversation, tagged with its speaker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Turn {
    role: Role,
    content: String,
}

impl Turn {
    /// Create a user turn
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant turn
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    /// Create a system turn
    ///
    /// System turns are only built at request time; a transcript refuses them.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }
}

/// Ordered conversation history of one session
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    /// Create an empty transcript
    #[must_use]
    pub const fn new() -> Self {
        Self { turns: Vec::new() }
    }

    /// Append one completed exchange
    ///
    /// # Errors
    ///
    /// Returns error if the turns are not a user turn followed by an assistant turn
    pub fn commit_exchange(&mut self, user: Turn, assistant: Turn) -> Result<()> {
        if user.role != Role::User || assistant.role != Role::Assistant {
            return Err(Error::Conversation(format!(
                "exchange must be user then assistant, got {} then {}",
                user.role, assistant.role
            )));
        }

        self.turns.push(user);
        self.turns.push(assistant);
        Ok(())
    }

    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Number of completed exchanges
    #[must_use]
    pub fn exchanges(&self) -> usize {
        self.turns.len() / 2
    }

    fn clear(&mut self) {
        self.turns.clear();
    }
}

/// How the user interacts during a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Mode {
    /// Typed question ("Escribir")
    #[default]
    #[serde(rename = "Escribir")]
    Write,
    /// Spoken question ("Hablar")
    #[serde(rename = "Hablar")]
    Speak,
}

impl Mode {
    /// Both modes in selector order
    pub const ALL: [Self; 2] = [Self::Write, Self::Speak];

    /// Label shown in the mode selector
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Write => "Escribir",
            Self::Speak => "Hablar",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "escribir" | "write" | "text" => Ok(Self::Write),
            "hablar" | "speak" | "voice" => Ok(Self::Speak),
            other => Err(Error::Config(format!("unknown interaction mode: {other}"))),
        }
    }
}

/// State owned by one conversation session
#[derive(Debug, Clone)]
pub struct SessionState {
    id: Uuid,
    created_at: DateTime<Utc>,
    transcript: Transcript,
}

impl SessionState {
    /// Start a fresh session with an empty transcript
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            transcript: Transcript::new(),
        }
    }

    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub const fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub(crate) const fn transcript_mut(&mut self) -> &mut Transcript {
        &mut self.transcript
    }

    /// Discard the conversation history, keeping the session id
    pub fn reset(&mut self) {
        tracing::debug!(session = %self.id, turns = self.transcript.len(), "resetting session");
        self.transcript.clear();
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}
