//! Application entry point for dictation-relay.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Parse the command line and resolve [`AppPaths`].
//! 3. Load [`AppConfig`] from disk (returns default on first run).
//! 4. Create the [`tokio`] runtime (multi-thread, 2 workers).
//! 5. Build the shared store and the wake channel for this platform.
//! 6. Run the selected command:
//!    - `app`: capture-capable coordinator + stdin commands until Ctrl-C
//!    - `keyboard`: observer coordinator that prints delivered transcripts
//!    - `record` / `stop`: one-shot requests through a short-lived coordinator
//!    - `status`: print the shared record
//!    - `credential`: manage stored secrets

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;

use dictation_relay::{
    audio::MicRecorder,
    config::{AppConfig, AppPaths, SettingsSource},
    coordinator::{CaptureBackend, Coordinator, CoordinatorHandle, Timing, TranscriptSink, ViewModel},
    credentials::{CredentialStore, FileCredentialStore, CUSTOM_AUTH_HEADER, PROVIDER_API_KEY},
    state::{FileStore, OperationState, OperationStatus, StateStore},
    upload::HttpTransport,
    wake::WakeChannel,
};

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

#[derive(Debug, Parser)]
#[command(name = "dictation-relay", version, about = "Record, transcribe and hand off dictation between processes")]
struct Cli {
    /// Directory shared by cooperating processes (state record + wake sockets)
    #[arg(long, global = true)]
    shared_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the primary, capture-capable process
    App {
        /// Handle a deep link such as `dictation-relay://record` on startup
        #[arg(long)]
        open_url: Option<String>,
    },
    /// Run an observer that inserts (prints) finished transcripts
    Keyboard,
    /// Ask the primary process to start recording
    Record,
    /// Ask the primary process to stop recording
    Stop,
    /// Print the shared record
    Status,
    /// Manage stored credentials
    Credential {
        #[command(subcommand)]
        action: CredentialAction,
    },
}

#[derive(Debug, Subcommand)]
enum CredentialAction {
    /// Store a credential
    Set { key: CredentialKey, value: String },
    /// Remove a credential
    Clear { key: CredentialKey },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CredentialKey {
    /// Provider API key (OpenAI mode)
    ApiKey,
    /// Raw Authorization header value (custom endpoint mode)
    AuthHeader,
}

impl CredentialKey {
    fn store_key(self) -> &'static str {
        match self {
            CredentialKey::ApiKey => PROVIDER_API_KEY,
            CredentialKey::AuthHeader => CUSTOM_AUTH_HEADER,
        }
    }
}

// ---------------------------------------------------------------------------
// Platform wiring
// ---------------------------------------------------------------------------

#[cfg(unix)]
fn wake_channel(paths: &AppPaths) -> Arc<dyn WakeChannel> {
    Arc::new(dictation_relay::wake::SocketWakeChannel::new(&paths.wake_dir))
}

#[cfg(not(unix))]
fn wake_channel(_paths: &AppPaths) -> Arc<dyn WakeChannel> {
    log::warn!("cross-process wake signals are unavailable here; relying on activation polling");
    Arc::new(dictation_relay::wake::LocalWakeHub::new().endpoint())
}

/// Prints transcripts to stdout, standing in for text insertion.
struct StdoutSink;

impl TranscriptSink for StdoutSink {
    fn deliver(&mut self, text: &str) {
        println!("{text}");
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

struct AppContext {
    paths: AppPaths,
    config: AppConfig,
    store: Arc<dyn StateStore>,
    wake: Arc<dyn WakeChannel>,
}

impl AppContext {
    fn coordinator(&self) -> (Coordinator, CoordinatorHandle) {
        Coordinator::new(
            Arc::clone(&self.store),
            Arc::clone(&self.wake),
            Timing::from(&self.config.sync),
        )
    }
}

async fn run_app(ctx: AppContext, open_url: Option<String>) -> Result<()> {
    let credentials: Arc<dyn CredentialStore> =
        Arc::new(FileCredentialStore::new(&ctx.paths.credentials_file));
    if !ctx.config.is_configured(credentials.as_ref()) {
        log::warn!(
            "transcription is not configured; edit {} or run `dictation-relay credential set api-key <KEY>`",
            ctx.paths.settings_file.display()
        );
    }

    let backend = CaptureBackend::new(
        MicRecorder::new(ctx.config.audio.device.clone(), ctx.config.audio.max_recording_secs),
        Arc::new(HttpTransport::new()),
        Arc::new(SettingsSource::new(&ctx.paths.settings_file, credentials)),
    );

    let (coordinator, handle) = ctx.coordinator();
    let task = tokio::spawn(coordinator.with_capture(backend).run());
    tokio::spawn(report_changes(handle.subscribe()));

    if let Some(url) = open_url {
        if let Err(e) = handle.open_url(&url).await {
            log::warn!("ignoring deep link {url}: {e}");
        }
    }

    log::info!("primary process ready (commands: record, stop, status, quit)");
    interactive(&handle).await;

    handle.shutdown().await;
    task.await.context("coordinator task failed")?;
    Ok(())
}

async fn run_keyboard(ctx: AppContext) -> Result<()> {
    let (coordinator, handle) = ctx.coordinator();
    let task = tokio::spawn(coordinator.with_sink(StdoutSink).run());
    tokio::spawn(report_changes(handle.subscribe()));

    log::info!("observer ready (commands: record, stop, status, quit)");
    interactive(&handle).await;

    handle.shutdown().await;
    task.await.context("coordinator task failed")?;
    Ok(())
}

/// Send one request through a short-lived observer coordinator.
async fn run_once(ctx: AppContext, stop: bool) -> Result<()> {
    let (coordinator, handle) = ctx.coordinator();
    let task = tokio::spawn(coordinator.run());

    if stop {
        handle.request_stop().await;
    } else {
        handle.request_start().await;
    }
    if let Some(state) = handle.snapshot().await {
        println!("{}", describe(&state));
    }

    handle.shutdown().await;
    task.await.context("coordinator task failed")?;
    Ok(())
}

fn run_credential(ctx: &AppContext, action: CredentialAction) -> Result<()> {
    let store = FileCredentialStore::new(&ctx.paths.credentials_file);
    match action {
        CredentialAction::Set { key, value } => {
            store.set(key.store_key(), &value)?;
            println!("stored {}", key.store_key());
        }
        CredentialAction::Clear { key } => {
            store.delete(key.store_key())?;
            println!("cleared {}", key.store_key());
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Interaction helpers
// ---------------------------------------------------------------------------

/// Read commands from stdin until `quit`, EOF or Ctrl-C.
async fn interactive(handle: &CoordinatorHandle) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => line,
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                log::warn!("stdin closed: {e}");
                break;
            }
        };

        match line.trim() {
            "" => {}
            "record" | "start" => handle.request_start().await,
            "stop" => handle.request_stop().await,
            "status" => {
                handle.activate().await;
                if let Some(state) = handle.snapshot().await {
                    println!("{}", describe(&state));
                }
            }
            "quit" | "exit" => break,
            url if url.contains("://") => {
                if let Err(e) = handle.open_url(url).await {
                    println!("{e}");
                }
            }
            other => println!("unknown command `{other}`"),
        }
    }
}

async fn report_changes(mut rx: watch::Receiver<OperationState>) {
    while rx.changed().await.is_ok() {
        let state = rx.borrow_and_update().clone();
        log::info!("state: {}", describe(&state));
    }
}

fn describe(state: &OperationState) -> String {
    let view = ViewModel::from_state(state);
    match (state.status(), view.status_text) {
        (OperationStatus::Done, _) => {
            format!("done: {}", state.transcription().unwrap_or_default())
        }
        (status, Some(text)) => format!("{status}: {text}"),
        (status, None) => status.to_string(),
    }
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // 2. Command line + paths
    let cli = Cli::parse();
    let mut paths = AppPaths::new();
    if let Some(dir) = &cli.shared_dir {
        paths = paths.with_shared_dir(dir);
    }

    // 3. Configuration
    let config = AppConfig::load_from(&paths.settings_file).unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    // 4. Tokio runtime
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    // 5. Shared store + wake channel
    let store: Arc<dyn StateStore> = Arc::new(FileStore::new(&paths.shared_dir));
    let wake = wake_channel(&paths);
    log::debug!("shared state at {}", paths.shared_dir.display());

    let ctx = AppContext {
        paths,
        config,
        store,
        wake,
    };

    // 6. Command
    match cli.command {
        Command::App { open_url } => rt.block_on(run_app(ctx, open_url)),
        Command::Keyboard => rt.block_on(run_keyboard(ctx)),
        Command::Record => rt.block_on(run_once(ctx, false)),
        Command::Stop => rt.block_on(run_once(ctx, true)),
        Command::Status => {
            println!("{}", describe(&ctx.store.load()));
            Ok(())
        }
        Command::Credential { action } => run_credential(&ctx, action),
    }
}
