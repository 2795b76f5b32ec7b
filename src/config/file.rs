//! TOML configuration file loading
//!
//! Supports `~/.config/sommelier/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::PathBuf;

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct SommelierConfigFile {
    /// Chat completion configuration
    #[serde(default)]
    pub llm: LlmFileConfig,

    /// Speech configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,

    /// Server/runtime configuration
    #[serde(default)]
    pub server: ServerFileConfig,

    /// Persona override
    #[serde(default)]
    pub persona: PersonaFileConfig,
}

/// Chat completion configuration
#[derive(Debug, Default, Deserialize)]
pub struct LlmFileConfig {
    /// Model identifier (e.g. "ft:gpt-4o-mini-2024-07-18:tae::AFlqsMGP")
    pub model: Option<String>,

    /// Base URL of the OpenAI-compatible API
    pub api_base: Option<String>,
}

/// Speech configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// STT model (e.g. "whisper-1")
    pub stt_model: Option<String>,

    /// TTS model (e.g. "tts-1")
    pub tts_model: Option<String>,

    /// TTS voice identifier (e.g. "alloy")
    pub tts_voice: Option<String>,

    /// TTS speed multiplier
    pub tts_speed: Option<f32>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub openai: Option<String>,
}

/// Server/runtime configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// HTTP port
    pub port: Option<u16>,

    /// Directory with web UI files replacing the embedded page
    pub static_dir: Option<String>,

    /// Directory for transient audio files
    pub temp_dir: Option<String>,

    /// Seconds a browser session may sit idle before it is discarded
    pub session_ttl_secs: Option<u64>,
}

/// Persona override
#[derive(Debug, Default, Deserialize)]
pub struct PersonaFileConfig {
    /// Path to a text file with the system prompt
    pub prompt_file: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `SommelierConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> SommelierConfigFile {
    let Some(path) = config_file_path() else {
        return SommelierConfigFile::default();
    };

    if !path.exists() {
        return SommelierConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => parse_config(&content).unwrap_or_else(|e| {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to parse config file, using defaults"
            );
            SommelierConfigFile::default()
        }),
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            SommelierConfigFile::default()
        }
    }
}

/// Parse config file contents
///
/// # Errors
///
/// Returns error if the TOML is malformed
pub fn parse_config(content: &str) -> crate::Result<SommelierConfigFile> {
    Ok(toml::from_str(content)?)
}

/// Return the config file path: `~/.config/sommelier/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("sommelier").join("config.toml"))
}
