//! Sommelier - conversational wine assistant with text and voice turns
//!
//! This library provides the core functionality for the assistant:
//! - Session transcripts and the fixed sommelier persona
//! - Speech-to-text, chat completion and text-to-speech adapters
//! - Turn orchestration with all-or-nothing transcript updates
//! - The HTTP widget server and the terminal chat
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    Interfaces                        │
//! │        Web widget (axum)   │   Terminal chat         │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                  Orchestrator                        │
//! │   Capture → Transcription → Engine → Synthesis      │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │            OpenAI-compatible API                     │
//! │   Whisper  │  Chat completions  │  TTS               │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod chat;
pub mod completion;
pub mod config;
pub mod conversation;
pub mod engine;
pub mod error;
pub mod orchestrator;
pub mod persona;
pub mod voice;

pub use completion::{ChatCompleter, ChatMessage, OpenAiChat};
pub use config::Config;
pub use conversation::{Mode, Role, SessionState, Transcript, Turn};
pub use engine::ConversationEngine;
pub use error::{Error, Result};
pub use orchestrator::{Orchestrator, SessionStore, Stage, TurnError, TurnOutcome};
pub use persona::Persona;
