use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand, ValueEnum};
use live_voice::{
    create_router, AppState, Config, EventLog, FileAudioDevices, GeminiLiveConnector, MainTab,
    SessionEngine, SessionObserver, SessionState, SessionVariant, TranscriptEntry,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "live-voice", version, about = "Real-time voice sessions with a live model")]
struct Cli {
    /// Config file (extension optional)
    #[arg(short, long, default_value = "config/live-voice")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP control API
    Serve,

    /// Run one headless session from a WAV file
    Talk {
        /// Session profile (defaults to the configured one)
        #[arg(short, long, value_enum)]
        profile: Option<ProfileArg>,

        /// WAV file used as the microphone
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// WAV file the model's speech is written to
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Stop after this many seconds
        #[arg(short, long, default_value_t = 30)]
        seconds: u64,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ProfileArg {
    Companion,
    Assistant,
}

impl From<ProfileArg> for SessionVariant {
    fn from(arg: ProfileArg) -> Self {
        match arg {
            ProfileArg::Companion => SessionVariant::Companion,
            ProfileArg::Assistant => SessionVariant::Assistant,
        }
    }
}

/// Prints what a UI would show
struct ConsoleObserver;

impl SessionObserver for ConsoleObserver {
    fn on_state_change(&self, state: SessionState) {
        println!("-- {}", state);
    }

    fn on_transcript_appended(&self, entry: &TranscriptEntry) {
        println!("{:?}: {}", entry.speaker, entry.text);
    }

    fn on_navigate_requested(&self, tab_id: &str) {
        match MainTab::from_id(tab_id) {
            Some(tab) => println!(">> navigate to {:?}", tab),
            None => println!(">> navigate to unknown tab '{}'", tab_id),
        }
    }

    fn on_generate_requested(&self, prompt: &str) {
        println!(">> generate image: {}", prompt);
    }

    fn on_error(&self, message: &str) {
        eprintln!("!! {}", message);
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "live_voice=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    // Must happen before the first TLS connection
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install default crypto provider"))?;

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));
    if cfg.model.api_key.is_empty() {
        warn!("No model API key configured; set LIVE_VOICE__MODEL__API_KEY");
    }

    match cli.command {
        Command::Serve => serve(cfg).await,
        Command::Talk {
            profile,
            input,
            output,
            seconds,
        } => {
            let variant = profile.map(SessionVariant::from).unwrap_or(cfg.session.profile);
            let input = input.unwrap_or_else(|| PathBuf::from(&cfg.audio.input_path));
            let output = output.unwrap_or_else(|| PathBuf::from(&cfg.audio.output_path));
            talk(cfg, variant, FileAudioDevices::new(input, output), seconds).await
        }
    }
}

fn connector(cfg: &Config) -> Arc<GeminiLiveConnector> {
    Arc::new(GeminiLiveConnector::new(&cfg.model.endpoint, &cfg.model.api_key))
}

async fn serve(cfg: Config) -> Result<()> {
    let events = Arc::new(EventLog::new());
    let devices = FileAudioDevices::new(&cfg.audio.input_path, &cfg.audio.output_path);
    let engine = Arc::new(SessionEngine::new(
        cfg.profile(cfg.session.profile),
        connector(&cfg),
        Arc::new(devices),
        events.clone(),
    ));

    let app = create_router(AppState::new(engine.clone(), events));
    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("HTTP server listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    let stats = engine.stop().await;
    info!("Shut down after {} turns", stats.turns_completed);
    Ok(())
}

async fn talk(
    cfg: Config,
    variant: SessionVariant,
    devices: FileAudioDevices,
    seconds: u64,
) -> Result<()> {
    let output = devices.output_path.clone();
    let engine = SessionEngine::new(
        cfg.profile(variant),
        connector(&cfg),
        Arc::new(devices),
        Arc::new(ConsoleObserver),
    );
    let mut state_rx = engine.subscribe();

    engine.start().await?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Interrupted"),
        _ = tokio::time::sleep(Duration::from_secs(seconds)) => info!("Time limit reached"),
        _ = state_rx.wait_for(|state| !state.is_open()) => info!("Session ended"),
    }

    let ended_in_error = engine.state() == SessionState::Error;
    let stats = engine.stop().await;

    println!();
    println!("Session {}", stats.session_id.as_deref().unwrap_or("-"));
    println!("  duration:      {:.1}s", stats.duration_secs);
    println!("  frames sent:   {} ({} dropped)", stats.frames_sent, stats.frames_dropped);
    println!("  chunks played: {}", stats.chunks_played);
    println!("  turns:         {}", stats.turns_completed);
    println!("  tool calls:    {}", stats.tool_calls);
    println!("  model speech:  {}", output.display());

    if ended_in_error {
        return Err(anyhow!("Session ended with an error"));
    }
    Ok(())
}
