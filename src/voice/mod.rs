//! Voice processing module
//!
//! Speech-to-text and text-to-speech adapters plus the transient audio files
//! passed between them. Microphone and speaker access is behind the
//! `local-audio` feature.

mod audio;
#[cfg(feature = "local-audio")]
mod capture;
#[cfg(feature = "local-audio")]
mod playback;
mod stt;
mod tts;

pub use audio::{AudioBlob, AudioFormat, SAMPLE_RATE, SpeechFile, resample, samples_to_wav};
#[cfg(feature = "local-audio")]
pub use capture::AudioCapture;
#[cfg(feature = "local-audio")]
pub use playback::AudioPlayback;
pub use stt::{SpeechToText, Transcriber};
pub use tts::{Synthesizer, TextToSpeech};
