//! Configuration management for the sommelier assistant
//!
//! Precedence is env > TOML file > defaults. The API credential is read once
//! at startup and kept as a [`SecretString`].

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use crate::orchestrator::DEFAULT_SESSION_TTL;
use crate::{Error, Persona, Result};

use file::SommelierConfigFile;

/// Fine-tuned chat model used for every completion
pub const DEFAULT_CHAT_MODEL: &str = "ft:gpt-4o-mini-2024-07-18:tae::AFlqsMGP";

/// Default OpenAI-compatible API base
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1/";

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 8501;

/// Sommelier configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// API credential for all remote services
    pub api_key: SecretString,

    /// Base URL of the OpenAI-compatible API
    pub api_base: Url,

    /// Chat completion configuration
    pub llm: LlmConfig,

    /// Speech configuration
    pub voice: VoiceConfig,

    /// HTTP server configuration
    pub server: ServerConfig,

    /// Directory for transient audio files
    pub temp_dir: PathBuf,

    /// System persona
    pub persona: Persona,
}

/// Chat completion configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Model identifier for chat completions
    pub model: String,
}

/// Speech configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// STT model (e.g. "whisper-1")
    pub stt_model: String,

    /// TTS model (e.g. "tts-1")
    pub tts_model: String,

    /// TTS voice identifier
    pub tts_voice: String,

    /// TTS speed multiplier (0.25 to 4.0)
    pub tts_speed: f32,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            stt_model: "whisper-1".to_string(),
            tts_model: "tts-1".to_string(),
            tts_voice: "alloy".to_string(),
            tts_speed: 1.0,
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,

    /// Path to static files directory (web UI), replaces the embedded page
    pub static_dir: Option<PathBuf>,

    /// Idle time after which a session is discarded
    pub session_ttl: Duration,
}

impl Config {
    /// Load configuration from the environment and the config file
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing or a value is invalid
    pub fn load() -> Result<Self> {
        let fc = file::load_config_file();
        Self::from_sources(fc, |key| std::env::var(key).ok())
    }

    /// Build configuration from a parsed config file and an env lookup
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing or a value is invalid
    pub fn from_sources(
        fc: SommelierConfigFile,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let api_key = env("OPENAI_API_KEY")
            .or(fc.api_keys.openai)
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                Error::Config(
                    "OpenAI API key required (set OPENAI_API_KEY or [api_keys] openai)"
                        .to_string(),
                )
            })?;

        let api_base = parse_api_base(
            &env("SOMMELIER_API_BASE")
                .or(fc.llm.api_base)
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
        )?;

        let llm = LlmConfig {
            model: env("SOMMELIER_CHAT_MODEL")
                .or(fc.llm.model)
                .unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
        };

        let defaults = VoiceConfig::default();
        let tts_speed = match env("SOMMELIER_TTS_SPEED") {
            Some(s) => s
                .parse()
                .map_err(|_| Error::Config(format!("invalid SOMMELIER_TTS_SPEED: {s}")))?,
            None => fc.voice.tts_speed.unwrap_or(defaults.tts_speed),
        };
        if !(0.25..=4.0).contains(&tts_speed) {
            return Err(Error::Config(format!(
                "TTS speed must be between 0.25 and 4.0, got {tts_speed}"
            )));
        }
        let voice = VoiceConfig {
            stt_model: env("SOMMELIER_STT_MODEL")
                .or(fc.voice.stt_model)
                .unwrap_or(defaults.stt_model),
            tts_model: env("SOMMELIER_TTS_MODEL")
                .or(fc.voice.tts_model)
                .unwrap_or(defaults.tts_model),
            tts_voice: env("SOMMELIER_TTS_VOICE")
                .or(fc.voice.tts_voice)
                .unwrap_or(defaults.tts_voice),
            tts_speed,
        };

        let server = ServerConfig {
            port: env("SOMMELIER_PORT")
                .or_else(|| env("PORT"))
                .and_then(|s| s.parse().ok())
                .or(fc.server.port)
                .unwrap_or(DEFAULT_PORT),
            static_dir: env("SOMMELIER_STATIC_DIR")
                .or(fc.server.static_dir)
                .map(PathBuf::from),
            session_ttl: env("SOMMELIER_SESSION_TTL_SECS")
                .and_then(|s| s.parse().ok())
                .or(fc.server.session_ttl_secs)
                .filter(|secs| *secs > 0)
                .map_or(DEFAULT_SESSION_TTL, Duration::from_secs),
        };

        let temp_dir = env("SOMMELIER_TEMP_DIR")
            .or(fc.server.temp_dir)
            .map_or_else(std::env::temp_dir, PathBuf::from);

        let persona = match env("SOMMELIER_PERSONA_FILE").or(fc.persona.prompt_file) {
            Some(path) => Persona::from_file(&PathBuf::from(path))?,
            None => Persona::default(),
        };

        Ok(Self {
            api_key: SecretString::from(api_key),
            api_base,
            llm,
            voice,
            server,
            temp_dir,
            persona,
        })
    }
}

/// Parse an API base URL, ensuring a trailing slash so endpoints join below it
///
/// # Errors
///
/// Returns error if the URL is malformed
pub fn parse_api_base(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw.trim())?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
