//! bchk - BeatChecker companion client
//!
//! Terminal front end for the local BeatChecker service: checks health,
//! analyzes a video and saves the track, and manages the device license.
//! Modals are answered on the terminal, or auto-confirmed with `--yes`.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use bchk_client::analysis::{AnalysisEvent, AnalysisState};
use bchk_client::license::{LicenseAction, LicenseEvent, LicenseView, LicenseViewState};
use bchk_client::modal::{ModalKind, ModalRequest};
use bchk_client::{Session, WorkflowError};
use bchk_common::config::{ClientConfig, ConfigOverrides, LoggingConfig};
use bchk_common::events::{Notice, NoticeLevel};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for bchk
#[derive(Parser, Debug)]
#[command(name = "bchk")]
#[command(about = "BeatChecker companion client")]
#[command(version)]
struct Args {
    /// Config file (default: <config dir>/beatchecker/client.toml)
    #[arg(long, env = "BEATCHECKER_CONFIG")]
    config: Option<PathBuf>,

    /// Service host (overrides BEATCHECKER_HOST and the config file)
    #[arg(long)]
    host: Option<String>,

    /// Service port (overrides BEATCHECKER_PORT and the config file)
    #[arg(long)]
    port: Option<u16>,

    /// Directory saved tracks are written to
    #[arg(long)]
    save_dir: Option<PathBuf>,

    /// Answer yes to every confirmation
    #[arg(short, long)]
    yes: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that the background service is running
    Health,

    /// Analyze a video for tempo and key
    Analyze {
        /// YouTube video URL
        url: String,

        /// Video length in seconds (long videos ask for confirmation)
        #[arg(long)]
        duration: Option<f64>,

        /// Displayed title, used for the saved file name
        #[arg(long)]
        title: Option<String>,

        /// Save the track after a successful analysis
        #[arg(long)]
        save: bool,
    },

    /// Manage the device license
    License {
        #[command(subcommand)]
        action: LicenseCommand,
    },
}

#[derive(Subcommand, Debug)]
enum LicenseCommand {
    /// Show the current license
    Status,
    /// Activate a license key on this device
    Activate { key: String },
    /// Re-validate the stored license
    Refresh,
    /// Remove the license from this device
    Deactivate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = ClientConfig::load(ConfigOverrides {
        config_path: args.config.clone(),
        host: args.host.clone(),
        port: args.port,
        save_directory: args.save_dir.clone(),
    })
    .context("Failed to load configuration")?;

    init_tracing(&config.logging)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        service = %config.base_url(),
        config_file = ?config.config_file,
        "Starting bchk"
    );

    let (session, presenter) =
        Session::from_config(&config).context("Failed to create client session")?;
    let presenter = spawn_presenter(presenter, args.yes);
    let interrupt = spawn_interrupt_handler(&session);

    let outcome = run(&session, args.command).await;

    interrupt.abort();
    presenter.abort();
    session.close();

    outcome
}

async fn run(session: &Session, command: Command) -> Result<()> {
    match command {
        Command::Health => health(session).await,
        Command::Analyze {
            url,
            duration,
            title,
            save,
        } => analyze(session, url, duration, title, save).await,
        Command::License { action } => license(session, action).await,
    }
}

async fn health(session: &Session) -> Result<()> {
    match session.gateway().health(&CancellationToken::new()).await {
        Ok(health) => {
            println!("BeatChecker service is running at {}", session.gateway().base_url());
            if let Some(message) = health.message.filter(|m| !m.is_empty()) {
                println!("  {}", message);
            }
            Ok(())
        }
        Err(err) => {
            let message = WorkflowError::from_gateway(err).user_message();
            bail!(message)
        }
    }
}

async fn analyze(
    session: &Session,
    url: String,
    duration: Option<f64>,
    title: Option<String>,
    save: bool,
) -> Result<()> {
    let analysis = session.analysis();
    let outcome = analysis
        .dispatch(AnalysisEvent::Activate {
            video_url: Some(url),
            duration_seconds: duration,
            title,
        })
        .await;

    let result = match outcome {
        AnalysisState::ResultsReady { result } => result,
        AnalysisState::Failed { message } => bail!(message),
        AnalysisState::LicenseRequired { detail } => bail!("License required: {}", detail),
        other => {
            println!("Analysis did not run ({:?}).", other.phase());
            return Ok(());
        }
    };

    match result.bpm_value() {
        Some(bpm) => println!("BPM: {}", bpm.round()),
        None => println!("BPM: unknown"),
    }
    println!("Key: {}", result.key_value().unwrap_or("unknown"));

    if !save {
        return Ok(());
    }

    match analysis.dispatch(AnalysisEvent::Save { title: None }).await {
        AnalysisState::Saved { path, .. } => {
            println!("Saved to {}", path.display());
            Ok(())
        }
        AnalysisState::SaveFailed { message } => bail!(message),
        other => {
            println!("Save did not run ({:?}).", other.phase());
            Ok(())
        }
    }
}

async fn license(session: &Session, action: LicenseCommand) -> Result<()> {
    let license = session.license();
    let event = match action {
        LicenseCommand::Status => LicenseEvent::Load,
        LicenseCommand::Activate { key } => LicenseEvent::Activate { key },
        LicenseCommand::Refresh => {
            // Refresh validates the stored key locally first
            license.dispatch(LicenseEvent::Load).await;
            LicenseEvent::Refresh
        }
        LicenseCommand::Deactivate => {
            license.dispatch(LicenseEvent::Load).await;
            LicenseEvent::Deactivate
        }
    };

    let view = license.dispatch(event).await;
    print_license(&view);

    match (&view.state, &view.notice) {
        (_, Some(Notice { level: NoticeLevel::Error, .. })) => bail!("License action failed"),
        (LicenseViewState::ServiceUnavailable { .. }, _) => bail!("License status unavailable"),
        _ => Ok(()),
    }
}

fn print_license(view: &LicenseView) {
    match &view.state {
        LicenseViewState::Loading => println!("License: loading"),
        LicenseViewState::ServiceUnavailable { message } => {
            println!("License: unavailable");
            println!("  {}", message);
        }
        LicenseViewState::StatusKnown { status, display } => {
            println!("License: {}", display);
            if let Some(key) = &status.license_key {
                println!("  Key:      {}", key);
            }
            if let Some(name) = &status.customer_name {
                println!("  Customer: {}", name);
            }
            if let Some(expires_at) = &status.expires_at {
                println!("  Expires:  {}", expires_at);
            }
            if let (Some(used), Some(max)) = (status.activated_machines, status.max_machines) {
                println!("  Machines: {}/{}", used, max);
            }
            if let Some(message) = status.message.as_deref().filter(|m| !m.is_empty()) {
                println!("  {}", message);
            }
            if display.shows_activation_form() {
                println!("  Activate with: bchk license activate <KEY>");
            }
        }
    }

    if let Some(notice) = &view.notice {
        let label = match notice.level {
            NoticeLevel::Info => "info",
            NoticeLevel::Success => "ok",
            NoticeLevel::Warning => "warning",
            NoticeLevel::Error => "error",
        };
        println!("[{}] {}", label, notice.message);
    }
}

/// Answer modal requests on the terminal
fn spawn_presenter(mut requests: mpsc::Receiver<ModalRequest>, assume_yes: bool) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(request) = requests.recv().await {
            if request.is_abandoned() {
                debug!(kind = ?request.kind, "Skipping modal for a cancelled action");
                continue;
            }

            println!();
            println!("== {} ==", request.content.title);
            println!("{}", request.content.body);

            match request.kind {
                ModalKind::Confirmation if assume_yes => {
                    println!("(yes)");
                    request.confirm(true);
                }
                ModalKind::Confirmation => {
                    let accepted = prompt_yes_no().await;
                    request.confirm(accepted);
                }
                ModalKind::ServiceMissing | ModalKind::LicenseRequired => request.acknowledge(),
            }
        }
    })
}

async fn prompt_yes_no() -> bool {
    tokio::task::spawn_blocking(|| {
        print!("Continue? [y/N] ");
        let _ = std::io::stdout().flush();
        let mut line = String::new();
        if std::io::stdin().read_line(&mut line).is_err() {
            return false;
        }
        matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    })
    .await
    .unwrap_or(false)
}

/// Ctrl+C cancels whatever is in flight
fn spawn_interrupt_handler(session: &Session) -> JoinHandle<()> {
    let analysis = session.analysis().clone();
    let license = session.license().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        info!("Interrupted, cancelling in-flight actions");
        analysis.dispatch(AnalysisEvent::Cancel).await;
        for action in [
            LicenseAction::Load,
            LicenseAction::Activate,
            LicenseAction::Refresh,
            LicenseAction::Deactivate,
        ] {
            license.dispatch(LicenseEvent::Cancel(action)).await;
        }
    })
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "bchk={level},bchk_client={level},bchk_common={level}",
            level = logging.level
        ))
    });

    let file_layer = match &logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(fmt::layer().with_ansi(false).with_writer(Arc::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(())
}
