use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use voice_turns::client::console::{ConsoleCapability, SilentOutput};
use voice_turns::client::{
    build_synthesizer, ClientNotice, ClientSession, PlaybackController, RecognitionController,
};
use voice_turns::config::SynthesizerBackend;
use voice_turns::{create_router, AppState, Config, LogSummarySink, OpenAiResponder};

#[derive(Parser)]
#[command(name = "voice-turns", version, about = "Turn coordination for voice conversations")]
struct Cli {
    /// Config file path (without extension)
    #[arg(long, global = true, default_value = "config/voice-turns")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the session server
    Serve {
        /// Override the configured port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Talk to a server from the terminal (stdin lines are your utterances)
    Talk {
        #[arg(long, default_value = "ws://127.0.0.1:8080/ws")]
        url: String,

        /// Override the configured synthesizer backend
        #[arg(long, value_enum)]
        voice: Option<SynthesizerBackend>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;

    match cli.command {
        Command::Serve { port } => serve(cfg, port).await,
        Command::Talk { url, voice } => talk(cfg, &url, voice).await,
    }
}

async fn serve(cfg: Config, port: Option<u16>) -> Result<()> {
    info!("Voice Turns v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded config: {}", cfg.service.name);
    info!(
        "{} phases, session limit {}s",
        cfg.phases.len(),
        cfg.session.duration_secs
    );

    let addr = format!(
        "{}:{}",
        cfg.service.http.bind,
        port.unwrap_or(cfg.service.http.port)
    );

    let responder = Arc::new(OpenAiResponder::new(&cfg.responder));
    let state = AppState::new(cfg, responder, Arc::new(LogSummarySink));
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

async fn talk(mut cfg: Config, url: &str, voice: Option<SynthesizerBackend>) -> Result<()> {
    if let Some(backend) = voice {
        cfg.synthesizer.backend = backend;
    }
    let synthesizer = build_synthesizer(&cfg.synthesizer);

    let channel = voice_turns::channel::connect(url).await?;

    let (capability, stdin_closed) = ConsoleCapability::spawn();
    let (recognition, recognition_rx) =
        RecognitionController::spawn(capability, cfg.client.clone());
    let (playback, playback_rx) = PlaybackController::spawn(
        Box::new(SilentOutput::default()),
        recognition.clone(),
        cfg.client.clone(),
    );

    let (session, control, mut notices) = ClientSession::new(
        channel,
        recognition,
        recognition_rx,
        playback,
        playback_rx,
        synthesizer,
        cfg.client.clone(),
    );

    tokio::spawn(async move {
        if stdin_closed.await.is_ok() {
            control.end_session();
        }
    });

    tokio::spawn(async move {
        while let Some(notice) = notices.recv().await {
            match notice {
                ClientNotice::Interim(_) | ClientNotice::UserSaid(_) => {}
                ClientNotice::AssistantSaid(text) => println!("assistant> {}", text),
                ClientNotice::Retry(text) => println!("(!) {}", text),
                ClientNotice::Blocking(text) => println!("(blocked) {}", text),
                ClientNotice::Phase {
                    name,
                    remaining_secs,
                } => println!("-- {} ({}s) --", name, remaining_secs),
                ClientNotice::Summary(text) => println!("summary> {}", text),
                ClientNotice::Ended(reason) => println!("-- session ended: {} --", reason),
            }
        }
    });

    let transcript = session.run().await;
    info!("Conversation had {} messages", transcript.len());

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            tracing::error!("Failed to install CTRL+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
