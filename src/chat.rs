//! Interactive terminal chat (`sommelier chat`)

use dialoguer::{Input, Select};

use crate::conversation::{Mode, Role, SessionState, Turn};
use crate::orchestrator::{Orchestrator, TurnError, TurnOutcome};
use crate::persona::ASSISTANT_AVATAR;
use crate::voice::AudioBlob;

/// One pick in the terminal mode selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Turn(Mode),
    Reset,
    Quit,
}

impl Action {
    const MENU: [Self; 4] = [
        Self::Turn(Mode::Write),
        Self::Turn(Mode::Speak),
        Self::Reset,
        Self::Quit,
    ];

    const fn label(self) -> &'static str {
        match self {
            Self::Turn(mode) => mode.label(),
            Self::Reset => "Reiniciar conversación",
            Self::Quit => "Salir",
        }
    }
}

/// Run the chat loop until the user quits
///
/// # Errors
///
/// Returns error if terminal input fails
pub async fn run_chat(orchestrator: &Orchestrator) -> anyhow::Result<()> {
    println!("Asistente de Vinos: Chatbot y Voz\n");

    let mut session = SessionState::new();
    let labels: Vec<&str> = Action::MENU.iter().map(|a| a.label()).collect();
    let mut last = 0;

    loop {
        last = Select::new()
            .with_prompt("¿Cómo te gustaría interactuar?")
            .items(&labels)
            .default(last)
            .interact()?;

        let result = match Action::MENU[last] {
            Action::Turn(Mode::Write) => text_turn(orchestrator, &mut session).await?,
            Action::Turn(Mode::Speak) => voice_turn(orchestrator, &mut session).await?,
            Action::Reset => {
                session.reset();
                println!("Conversación reiniciada.\n");
                continue;
            }
            Action::Quit => break,
        };

        match result {
            Ok(Some(outcome)) => finish_turn(outcome).await,
            Ok(None) => {}
            Err(e) => {
                tracing::debug!(error = %e, "turn failed");
                println!("🚨 {}\n", e.user_message());
            }
        }
    }

    tracing::info!(turns = session.transcript().len(), "chat ended");
    Ok(())
}

type TurnResult = std::result::Result<Option<TurnOutcome>, TurnError>;

async fn text_turn(orchestrator: &Orchestrator, session: &mut SessionState) -> anyhow::Result<TurnResult> {
    let question: String = Input::new()
        .with_prompt("Ingresa tu pregunta")
        .allow_empty(true)
        .interact_text()?;

    println!("Consultando la IA...");
    Ok(orchestrator.handle_text(session, &question).await)
}

async fn voice_turn(orchestrator: &Orchestrator, session: &mut SessionState) -> anyhow::Result<TurnResult> {
    let audio = record().await?;
    if !audio.is_empty() {
        println!("Transcribiendo el audio...");
    }
    Ok(orchestrator
        .handle_audio(session, &audio, cfg!(feature = "local-audio"))
        .await)
}

/// Record from the microphone until Enter is pressed
#[cfg(feature = "local-audio")]
async fn record() -> anyhow::Result<AudioBlob> {
    let mut capture = crate::voice::AudioCapture::new()?;
    capture.start()?;
    println!("🔴 Grabando... pulsa Enter cuando termines de hablar.");

    tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        std::io::stdin().read_line(&mut line).map(|_| ())
    })
    .await??;

    Ok(capture.finish()?)
}

/// Read a recording from a file when no microphone support is compiled in
#[cfg(not(feature = "local-audio"))]
async fn record() -> anyhow::Result<AudioBlob> {
    let path: String = Input::new()
        .with_prompt("Ruta del archivo de audio")
        .allow_empty(true)
        .interact_text()?;
    let path = path.trim();
    if path.is_empty() {
        return Ok(AudioBlob::default());
    }

    let path = std::path::Path::new(path);
    let bytes = tokio::fs::read(path).await?;
    Ok(AudioBlob::new(bytes, crate::voice::AudioFormat::from_path(path)))
}

async fn finish_turn(outcome: TurnOutcome) {
    print_turn(&outcome.user);
    print_turn(&outcome.assistant);

    if let Some(speech) = outcome.speech {
        play(&speech).await;
    }
}

#[cfg(feature = "local-audio")]
async fn play(speech: &AudioBlob) {
    let played = match crate::voice::AudioPlayback::new() {
        Ok(playback) => playback.play(speech).await,
        Err(e) => Err(e),
    };
    if let Err(e) = played {
        tracing::warn!(error = %e, "playback failed");
    }
}

#[cfg(not(feature = "local-audio"))]
#[allow(clippy::unused_async)]
async fn play(speech: &AudioBlob) {
    tracing::debug!(bytes = speech.bytes.len(), "no audio output compiled in");
}

fn print_turn(turn: &Turn) {
    let avatar = match turn.role() {
        Role::Assistant => ASSISTANT_AVATAR,
        Role::User | Role::System => "🙂",
    };
    println!("{avatar} {}\n", turn.content());
}
