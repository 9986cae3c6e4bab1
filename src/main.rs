use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::sync::{mpsc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use voice_chat::config::DEFAULT_CONFIG_PATH;
use voice_chat::console::InputEvent;
use voice_chat::http::spawn_connection_monitor;
use voice_chat::{console, create_router, AppState, Config, SessionController, UdpEngine};

/// How often the HTTP server checks the engine for a dead session
const CONNECTION_CHECK_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Parser)]
#[command(name = "voice-chat")]
#[command(about = "Push-to-talk voice chat client")]
struct Args {
    /// Config file (default: config/voice-chat.toml if present)
    #[arg(short, long)]
    config: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Append logs to this file instead of stdout
    #[arg(long)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Interactive console on stdin
    Console,
    /// HTTP control API
    Serve,
}

fn init_logging(args: &Args) -> Result<()> {
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };

    match &args.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .append(true)
                .create(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;

            tracing_subscriber::fmt()
                .with_max_level(level)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            // Console mode owns stdout for its prompt output
            tracing_subscriber::fmt()
                .with_max_level(level)
                .with_writer(io::stderr)
                .init();
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args)?;

    let cfg = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_optional(DEFAULT_CONFIG_PATH)?,
    };

    info!("Voice chat v{}", env!("CARGO_PKG_VERSION"));
    info!("Default server {}:{}", cfg.server.host, cfg.server.port);

    let engine = UdpEngine::new(cfg.engine_config());
    let controller = SessionController::new(engine, cfg.bitrate.clone());
    let runtime = tokio::runtime::Runtime::new().context("Failed to start tokio runtime")?;

    match args.mode {
        Mode::Console => {
            let mut controller = controller;
            let (input_tx, input_rx) = mpsc::channel();
            console::spawn_stdin_reader(input_tx.clone())
                .context("Failed to start console input thread")?;

            // Ctrl-C ends the input so the console disconnects before exiting
            runtime.spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    let _ = input_tx.send(InputEvent::Interrupt);
                }
            });

            console::run(
                &mut controller,
                &cfg.server,
                console::lines_until_interrupt(input_rx),
                io::stdout(),
            )
        }
        Mode::Serve => runtime.block_on(serve(cfg, controller)),
    }
}

async fn serve(cfg: Config, controller: SessionController<UdpEngine>) -> Result<()> {
    let state = AppState::new(controller, cfg.server.clone());
    let monitor = spawn_connection_monitor(state.clone(), CONNECTION_CHECK_INTERVAL);
    let app = create_router(state.clone());

    let addr = format!("{}:{}", cfg.http.bind, cfg.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind HTTP server to {}", addr))?;

    info!("HTTP control API listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
        })
        .await
        .context("HTTP server failed")?;

    monitor.abort();

    // Release the microphone and engine session before exiting
    let mut controller = state.controller.lock().await;
    controller.disconnect();

    Ok(())
}
