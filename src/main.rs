use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use live_interview::audio::{AudioSink, AudioSource, ClockSink, MediaBackendFactory, MediaDevices};
use live_interview::persist::{save_result, InterviewRecord, SaveStatus, WebhookArchive};
use live_interview::session::{self, SessionDeps, SinkFactory};
use live_interview::{
    create_router, AppState, Config, InterviewLog, JobRole, Language, SessionConfig,
    SessionLauncher, SessionSettings, WsTransport,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "live-interview", version, about = "Automated live voice interviews")]
struct Cli {
    /// Configuration file (without extension)
    #[arg(long, default_value = "config/live-interview")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP control API
    Serve,
    /// Run one interview in the foreground
    Run {
        /// Candidate name
        #[arg(long)]
        name: String,
        #[arg(long, value_enum)]
        role: JobRole,
        #[arg(long, value_enum, default_value = "english")]
        language: Language,
        /// Capture from a WAV file instead of the microphone
        #[arg(long)]
        input: Option<String>,
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

    info!("Live Interview v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded config: {}", cfg.service.name);

    if cfg.agent.api_key.is_empty() {
        warn!("No agent API key configured (set LIVE_INTERVIEW__AGENT__API_KEY)");
    }

    match cli.command {
        Command::Serve => serve(cfg).await,
        Command::Run {
            name,
            role,
            language,
            input,
        } => {
            let session = SessionConfig::new(name, role, language)?;
            run_interview(cfg, session, input).await
        }
    }
}

fn media_backend(cfg: &Config, input: Option<String>) -> Result<Arc<dyn MediaDevices>> {
    let source = match input.or_else(|| cfg.audio.input_file.clone()) {
        Some(path) => AudioSource::File(path),
        None => AudioSource::Microphone,
    };
    let media = MediaBackendFactory::create(source).context("Failed to create media backend")?;
    Ok(Arc::from(media))
}

fn sink_factory() -> SinkFactory {
    Arc::new(|| -> Result<Box<dyn AudioSink>> {
        #[cfg(feature = "device")]
        {
            Ok(Box::new(live_interview::audio::device::DeviceSink::open()?))
        }

        #[cfg(not(feature = "device"))]
        {
            Ok(Box::new(ClockSink::new()))
        }
    })
}

async fn serve(cfg: Config) -> Result<()> {
    let launcher = SessionLauncher::new(
        SessionSettings::from_config(&cfg),
        Arc::new(WsTransport::from_config(&cfg.agent)),
        media_backend(&cfg, None)?,
        sink_factory(),
    );
    let state = AppState::new(launcher, WebhookArchive::from_config(&cfg.persistence))
        .with_retention(Duration::from_secs(cfg.service.http.retention_secs));
    let app = create_router(state);

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("HTTP API listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
        .context("HTTP server failed")?;

    Ok(())
}

async fn run_interview(cfg: Config, config: SessionConfig, input: Option<String>) -> Result<()> {
    let settings = SessionSettings::from_config(&cfg);
    let sink = (sink_factory())()?;
    let handle = session::start(
        config.clone(),
        settings,
        SessionDeps {
            transport: Arc::new(WsTransport::from_config(&cfg.agent)),
            media: media_backend(&cfg, input)?,
            sink,
        },
    );

    let control = handle.control();
    let mut status = handle.status();
    tokio::spawn(async move {
        let mut last_reconnect = 0;
        while status.changed().await.is_ok() {
            let snapshot = status.borrow_and_update().clone();
            if snapshot.is_reconnecting() && snapshot.reconnect_attempt != last_reconnect {
                last_reconnect = snapshot.reconnect_attempt;
                info!(
                    "RECONNECTING (Attempt {}/{})...",
                    snapshot.reconnect_attempt, snapshot.max_retries
                );
            }
            if snapshot.finished {
                break;
            }
        }
    });

    let terminate = control.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, ending interview");
            terminate.terminate();
        }
    });

    let result = match handle.finished().await {
        Ok(result) => result,
        Err(e) => {
            error!("{}", e);
            return Err(e.into());
        }
    };

    let at = Local::now();
    println!();
    println!("Result: {}", result.status_label());
    println!("Notes: {}", result.notes_or_na());
    println!("Transcript entries: {}", result.transcript.len());

    let log = InterviewLog::new(&config, &result, &cfg.recruiter, at);
    match log.write_to(&cfg.persistence.log_dir)? {
        Some(path) => println!("Log written to {}", path.display()),
        None => println!("No transcript recorded, log not written"),
    }

    let archive = WebhookArchive::from_config(&cfg.persistence);
    let (saved_tx, _saved_rx) = watch::channel(SaveStatus::Idle);
    let record = InterviewRecord::new(&config, &result, at);
    match save_result(archive.as_ref(), &record, &saved_tx).await {
        SaveStatus::Success => println!("Result saved to database"),
        SaveStatus::Error => println!("Failed to save result to database"),
        _ => {}
    }

    Ok(())
}
