use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sommelier::api::ApiServerBuilder;
use sommelier::voice::{Synthesizer, TextToSpeech};
use sommelier::{Config, Orchestrator, SessionStore};

/// Sommelier - conversational wine assistant
#[derive(Parser)]
#[command(name = "sommelier", version, about)]
struct Cli {
    /// Port to listen on (overrides config)
    #[arg(long, env = "SOMMELIER_PORT")]
    port: Option<u16>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the web widget (default)
    Serve,
    /// Chat in the terminal
    Chat,
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "¡Hola! Soy tu sommelier. ¿Qué vino te apetece hoy?")]
        text: String,
        /// Keep the synthesized audio at this path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Test microphone input
    #[cfg(feature = "local-audio")]
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,sommelier=info",
        1 => "info,sommelier=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    tracing::debug!(?config, "loaded configuration");

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Chat => {
            let orchestrator = Orchestrator::from_config(&config)?;
            sommelier::chat::run_chat(&orchestrator).await
        }
        Command::TestTts { text, output } => test_tts(&config, &text, output).await,
        #[cfg(feature = "local-audio")]
        Command::TestMic { duration } => test_mic(duration).await,
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let orchestrator = Arc::new(Orchestrator::from_config(&config)?);

    tracing::info!(
        port = config.server.port,
        model = %config.llm.model,
        session_ttl_secs = config.server.session_ttl.as_secs(),
        "starting sommelier"
    );

    ApiServerBuilder::new(orchestrator, config.server.port)
        .sessions(Arc::new(SessionStore::new(config.server.session_ttl)))
        .static_dir(config.server.static_dir.clone())
        .build()
        .run()
        .await?;

    Ok(())
}

/// Synthesize a sample reply
async fn test_tts(config: &Config, text: &str, output: Option<PathBuf>) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let tts = TextToSpeech::new_openai(
        config.api_key.clone(),
        &config.api_base,
        config.voice.tts_voice.clone(),
        config.voice.tts_speed,
        config.voice.tts_model.clone(),
        config.temp_dir.clone(),
    )?;

    println!("Synthesizing speech...");
    let speech = tts.synthesize(text).await?;
    let audio = speech.read().await?;
    println!("Got {} bytes of audio data", audio.len());

    if let Some(path) = output {
        tokio::fs::write(&path, &audio).await?;
        println!("Saved to {}", path.display());
    }

    #[cfg(feature = "local-audio")]
    {
        println!("Playing audio...");
        let blob = sommelier::voice::AudioBlob::new(audio, speech.format());
        sommelier::voice::AudioPlayback::new()?.play(&blob).await?;
    }

    speech.delete()?;
    println!("\n---");
    println!("If you got audio, TTS is working!");
    Ok(())
}

/// Show microphone levels once per second
#[cfg(feature = "local-audio")]
#[allow(clippy::future_not_send)]
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    use std::time::Duration;

    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut capture = sommelier::voice::AudioCapture::new()?;
    capture.start()?;

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = capture.take_buffer();
        let energy = calculate_rms(&samples);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "█".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!("[{:2}s] RMS: {energy:.4} | [{meter}]", i + 1);
    }

    capture.stop();
    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    Ok(())
}

/// Calculate RMS energy
#[cfg(feature = "local-audio")]
#[allow(clippy::cast_precision_loss)]
fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}
