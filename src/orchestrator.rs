//! Turn orchestration: capture → transcription → completion → synthesis
//!
//! A turn either commits a full user/assistant exchange to the session's
//! transcript or leaves it untouched.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use mini_moka::sync::Cache;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::completion::OpenAiChat;
use crate::conversation::{SessionState, Turn};
use crate::engine::ConversationEngine;
use crate::voice::{AudioBlob, SpeechToText, Synthesizer, TextToSpeech, Transcriber};
use crate::{Config, Error, Result};

/// Shown when the recording could not be transcribed
pub const TRANSCRIPTION_FAILED_MESSAGE: &str = "¡No se pudo escuchar tu mensaje! Intenta hacer click en el micrófono, \
hablar cuando se ponga color rojo y, cuando dejes de hablar, automáticamente se procesará tu pregunta";

/// Shown when the assistant could not be reached
pub const COMPLETION_FAILED_MESSAGE: &str =
    "No se pudo consultar la IA en este momento. Intenta de nuevo en unos segundos.";

/// Shown when the reply could not be converted to audio
pub const SYNTHESIS_FAILED_MESSAGE: &str =
    "No se pudo convertir la respuesta a audio. Intenta de nuevo.";

/// Pipeline stage a turn failed in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Transcription,
    Completion,
    Synthesis,
}

impl Stage {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Transcription => "transcription",
            Self::Completion => "completion",
            Self::Synthesis => "synthesis",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A turn that was aborted; the transcript was left unchanged
#[derive(Debug, thiserror::Error)]
#[error("{stage} failed: {source}")]
pub struct TurnError {
    pub stage: Stage,
    #[source]
    pub source: Error,
}

impl TurnError {
    const fn new(stage: Stage, source: Error) -> Self {
        Self { stage, source }
    }

    /// Fixed message to show the user
    #[must_use]
    pub const fn user_message(&self) -> &'static str {
        match self.stage {
            Stage::Transcription => TRANSCRIPTION_FAILED_MESSAGE,
            Stage::Completion => COMPLETION_FAILED_MESSAGE,
            Stage::Synthesis => SYNTHESIS_FAILED_MESSAGE,
        }
    }
}

/// Result of a completed turn
#[derive(Debug)]
pub struct TurnOutcome {
    pub user: Turn,
    pub assistant: Turn,
    /// Synthesized reply, already read back from its temp file
    pub speech: Option<AudioBlob>,
}

/// Runs user turns against the remote services
pub struct Orchestrator {
    transcriber: Arc<dyn Transcriber>,
    engine: ConversationEngine,
    synthesizer: Arc<dyn Synthesizer>,
    temp_dir: PathBuf,
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        transcriber: Arc<dyn Transcriber>,
        engine: ConversationEngine,
        synthesizer: Arc<dyn Synthesizer>,
        temp_dir: PathBuf,
    ) -> Self {
        Self {
            transcriber,
            engine,
            synthesizer,
            temp_dir,
        }
    }

    /// Wire the `OpenAI` adapters from configuration
    ///
    /// # Errors
    ///
    /// Returns error if an adapter cannot be built or the temp dir cannot be created
    pub fn from_config(config: &Config) -> Result<Self> {
        std::fs::create_dir_all(&config.temp_dir)?;

        let transcriber = SpeechToText::new_whisper(
            config.api_key.clone(),
            &config.api_base,
            config.voice.stt_model.clone(),
        )?;
        let completer = OpenAiChat::new(
            config.api_key.clone(),
            &config.api_base,
            config.llm.model.clone(),
        )?;
        let synthesizer = TextToSpeech::new_openai(
            config.api_key.clone(),
            &config.api_base,
            config.voice.tts_voice.clone(),
            config.voice.tts_speed,
            config.voice.tts_model.clone(),
            config.temp_dir.clone(),
        )?;

        tracing::debug!(
            chat_model = %config.llm.model,
            stt_model = %config.voice.stt_model,
            tts_model = %config.voice.tts_model,
            temp_dir = %config.temp_dir.display(),
            "orchestrator configured"
        );

        Ok(Self::new(
            Arc::new(transcriber),
            ConversationEngine::new(Arc::new(completer), config.persona.clone()),
            Arc::new(synthesizer),
            config.temp_dir.clone(),
        ))
    }

    #[must_use]
    pub const fn engine(&self) -> &ConversationEngine {
        &self.engine
    }

    /// Handle a typed question
    ///
    /// Returns `Ok(None)` when the input is blank and no turn is processed.
    ///
    /// # Errors
    ///
    /// Returns [`TurnError`] if the completion fails; the transcript is unchanged
    pub async fn handle_text(
        &self,
        session: &mut SessionState,
        text: &str,
    ) -> std::result::Result<Option<TurnOutcome>, TurnError> {
        if text.trim().is_empty() {
            tracing::debug!(session = %session.id(), "empty text input, skipping turn");
            return Ok(None);
        }

        self.run_turn(session, Turn::user(text), false).await.map(Some)
    }

    /// Handle a recorded question
    ///
    /// Returns `Ok(None)` when nothing was recorded. The recording is written
    /// to a temp file for transcription and that file is removed before this
    /// returns, whatever the outcome.
    ///
    /// # Errors
    ///
    /// Returns [`TurnError`] if any stage fails; the transcript is unchanged
    pub async fn handle_audio(
        &self,
        session: &mut SessionState,
        audio: &AudioBlob,
        speak: bool,
    ) -> std::result::Result<Option<TurnOutcome>, TurnError> {
        if audio.is_empty() {
            tracing::debug!(session = %session.id(), "no audio recorded, skipping turn");
            return Ok(None);
        }

        let question = self
            .transcribe(audio)
            .await
            .map_err(|e| self.fail(session, Stage::Transcription, e))?;

        self.run_turn(session, Turn::user(question), speak)
            .await
            .map(Some)
    }

    async fn transcribe(&self, audio: &AudioBlob) -> Result<String> {
        let input = audio.write_temp(&self.temp_dir)?;
        let result = self.transcriber.transcribe(&input).await;

        if let Err(e) = input.close() {
            tracing::warn!(error = %e, "failed to remove input audio");
        }
        result
    }

    async fn run_turn(
        &self,
        session: &mut SessionState,
        user: Turn,
        speak: bool,
    ) -> std::result::Result<TurnOutcome, TurnError> {
        let reply = self
            .engine
            .reply(session.transcript(), &user)
            .await
            .map_err(|e| self.fail(session, Stage::Completion, e))?;

        let speech = if speak {
            let audio = self
                .speak(&reply)
                .await
                .map_err(|e| self.fail(session, Stage::Synthesis, e))?;
            Some(audio)
        } else {
            None
        };

        let assistant = Turn::assistant(reply);
        session
            .transcript_mut()
            .commit_exchange(user.clone(), assistant.clone())
            .map_err(|e| TurnError::new(Stage::Completion, e))?;

        tracing::info!(
            session = %session.id(),
            turns = session.transcript().len(),
            spoken = speech.is_some(),
            "turn complete"
        );

        Ok(TurnOutcome {
            user,
            assistant,
            speech,
        })
    }

    /// Synthesize the reply and read it back, removing the file either way
    async fn speak(&self, reply: &str) -> Result<AudioBlob> {
        let file = self.synthesizer.synthesize(reply).await?;
        let format = file.format();
        let read = file.read().await;

        if let Err(e) = file.delete() {
            tracing::warn!(error = %e, "failed to remove synthesized audio");
        }
        Ok(AudioBlob::new(read?, format))
    }

    fn fail(&self, session: &SessionState, stage: Stage, error: Error) -> TurnError {
        let backend = match stage {
            Stage::Transcription => self.transcriber.name(),
            Stage::Completion => "completion",
            Stage::Synthesis => self.synthesizer.name(),
        };
        tracing::warn!(
            session = %session.id(),
            stage = %stage,
            backend,
            error = %error,
            "turn aborted"
        );
        TurnError::new(stage, error)
    }
}

/// Shared handle to one session; turns on a session run one at a time
pub type SharedSession = Arc<Mutex<SessionState>>;

/// Idle time after which a session and its transcript are discarded
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 60);

/// Upper bound on live sessions
const MAX_SESSIONS: u64 = 10_000;

/// Live sessions keyed by id
///
/// A session not touched for the idle TTL is evicted, so tabs that never say
/// goodbye do not keep their transcripts forever.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Cache<Uuid, SharedSession>,
}

impl SessionStore {
    /// Create a store evicting sessions idle for longer than `ttl`
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Cache::builder()
                .max_capacity(MAX_SESSIONS)
                .time_to_idle(ttl)
                .build(),
        }
    }

    /// Create a new empty session
    #[must_use]
    pub fn create(&self) -> SharedSession {
        let state = SessionState::new();
        let id = state.id();
        let session = Arc::new(Mutex::new(state));
        self.sessions.insert(id, Arc::clone(&session));
        tracing::debug!(session = %id, "session created");
        session
    }

    /// Look up a session, refreshing its idle timer
    ///
    /// # Errors
    ///
    /// Returns error if no live session has this id
    pub fn get(&self, id: Uuid) -> Result<SharedSession> {
        self.sessions
            .get(&id)
            .ok_or_else(|| Error::SessionNotFound(id.to_string()))
    }

    /// Drop a session and its transcript
    ///
    /// # Errors
    ///
    /// Returns error if no live session has this id
    pub fn remove(&self, id: Uuid) -> Result<()> {
        if self.sessions.get(&id).is_none() {
            return Err(Error::SessionNotFound(id.to_string()));
        }
        self.sessions.invalidate(&id);
        tracing::debug!(session = %id, "session removed");
        Ok(())
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TTL)
    }
}
