//! Shared test utilities

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use sommelier::voice::{AudioFormat, SpeechFile, Synthesizer, Transcriber};
use sommelier::{ChatCompleter, ChatMessage, ConversationEngine, Error, Orchestrator, Persona, Result};

/// Transcriber returning a fixed transcript, or failing when there is none
pub struct FakeTranscriber {
    pub transcript: Option<String>,
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, audio: &Path) -> Result<String> {
        assert!(audio.exists(), "input audio must exist during transcription");
        self.transcript
            .clone()
            .ok_or_else(|| Error::Stt("no speech recognized".to_string()))
    }

    fn name(&self) -> &'static str {
        "fake-stt"
    }
}

/// Completer answering "respuesta N" and counting calls
#[derive(Default)]
pub struct FakeCompleter {
    pub calls: AtomicUsize,
    pub fail: bool,
}

impl FakeCompleter {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatCompleter for FakeCompleter {
    async fn complete(&self, _messages: &[ChatMessage]) -> Result<String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::Completion("service unavailable".to_string()));
        }
        Ok(format!("respuesta {n}"))
    }

    fn name(&self) -> &'static str {
        "fake-chat"
    }
}

/// Synthesizer writing the reply text as the "audio"
pub struct FakeSynthesizer {
    pub dir: PathBuf,
}

#[async_trait]
impl Synthesizer for FakeSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<SpeechFile> {
        SpeechFile::write_in(&self.dir, text.as_bytes(), AudioFormat::Mp3)
    }

    fn name(&self) -> &'static str {
        "fake-tts"
    }
}

/// Orchestrator wired to fakes, working in its own temp dir
pub struct TestOrchestrator {
    pub orchestrator: Arc<Orchestrator>,
    pub completer: Arc<FakeCompleter>,
    pub dir: tempfile::TempDir,
}

/// Build an orchestrator whose transcriber yields `transcript`
pub fn test_orchestrator(transcript: Option<&str>, fail_completion: bool) -> TestOrchestrator {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let completer = Arc::new(FakeCompleter {
        fail: fail_completion,
        ..FakeCompleter::default()
    });

    let orchestrator = Orchestrator::new(
        Arc::new(FakeTranscriber {
            transcript: transcript.map(str::to_string),
        }),
        ConversationEngine::new(completer.clone(), Persona::default()),
        Arc::new(FakeSynthesizer {
            dir: dir.path().to_path_buf(),
        }),
        dir.path().to_path_buf(),
    );

    TestOrchestrator {
        orchestrator: Arc::new(orchestrator),
        completer,
        dir,
    }
}

/// Whether a directory has no entries
pub fn dir_is_empty(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .expect("failed to read temp dir")
        .next()
        .is_none()
}
