//! Terminal front-end for the voxbook booking assistant.

mod render;

use clap::{Parser, Subcommand};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;
use voxbook_session::{
    format_slot, load_config, retrieve_summary, CallController, CallEvent, ClientConfig,
    ConfigError, ControllerOptions, EndReason, HttpBackend, LiveKitRoom, SessionError,
};

use render::render_summary;

#[derive(Parser, Debug)]
#[command(name = "voxbook", version, about = "Voice booking assistant client", long_about = None)]
struct Cli {
    /// Client configuration file (defaults to voxbook.toml)
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start a call, end it with Enter or Ctrl-C, then print its summary
    Call,
    /// Fetch and print the latest call summary
    Summary,
    /// Print the display form of an appointment slot
    FormatSlot {
        /// Slot date-time, e.g. 2026-01-20T10:00:00
        slot: String,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("call events stopped before the summary arrived")]
    EventsClosed,
}

fn resolve_config_path(cli: &Cli) -> String {
    if let Some(path) = cli.config.as_ref().filter(|p| !p.trim().is_empty()) {
        return path.clone();
    }
    match std::env::var("VOXBOOK_CONFIG_PATH") {
        Ok(path) if !path.trim().is_empty() => path,
        _ => "voxbook.toml".to_string(),
    }
}

fn init_tracing(config: &ClientConfig) {
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    // Logs go to stderr so the rendered summary stays clean on stdout.
    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Command::FormatSlot { slot } = &cli.command {
        println!("{}", format_slot(slot));
        return;
    }

    let _ = dotenvy::dotenv();

    if let Err(e) = run(&cli).await {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: &Cli) -> Result<(), CliError> {
    let config_path = resolve_config_path(cli);
    let config = load_config(Some(&config_path))?;
    init_tracing(&config);
    tracing::debug!(path = %config_path, backend = %config.backend_url, "loaded client configuration");

    match &cli.command {
        Command::Call => run_call(&config).await,
        Command::Summary => run_summary(&config).await,
        Command::FormatSlot { .. } => Ok(()),
    }
}

async fn run_summary(config: &ClientConfig) -> Result<(), CliError> {
    let backend = HttpBackend::new(&config.backend_url, config.request_timeout());
    let retrieved = retrieve_summary(&backend, config.retry_policy()).await;
    if retrieved.is_fallback() {
        eprintln!("No summary available from the backend.");
    }
    print!("{}", render_summary(&retrieved.summary));
    Ok(())
}

async fn run_call(config: &ClientConfig) -> Result<(), CliError> {
    let backend = Arc::new(HttpBackend::new(
        &config.backend_url,
        config.request_timeout(),
    ));
    let room = Arc::new(LiveKitRoom::new(config.livekit.clone()));
    let mut options = ControllerOptions::new(&config.livekit.url);
    options.retry = config.retry_policy();

    let controller = CallController::new(backend, room, options);
    let mut events = controller.subscribe();

    println!("Connecting...");
    let call_id = controller.start().await?;
    println!("Connected. Press Enter to end the call.");

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut ending = false;
    let mut stdin_open = true;

    loop {
        tokio::select! {
            line = stdin.next_line(), if stdin_open && !ending => match stdin_input(line) {
                StdinInput::EndCall => {
                    ending = true;
                    controller.end();
                }
                StdinInput::Closed => stdin_open = false,
            },
            _ = &mut ctrl_c, if !ending => {
                ending = true;
                controller.end();
            }
            event = events.recv() => match event {
                Ok(CallEvent::AgentJoined { call_id: id }) if id == call_id => {
                    println!("Assistant joined the call.");
                }
                Ok(CallEvent::Ended { call_id: id, reason }) if id == call_id => {
                    ending = true;
                    println!("{} Preparing summary...", describe(reason));
                }
                Ok(CallEvent::SummaryReady { call_id: id, summary, fallback }) if id == call_id => {
                    if fallback {
                        tracing::warn!(call_id, "backend summary unavailable, showing fallback");
                    }
                    println!();
                    print!("{}", render_summary(&summary));
                    controller.dismiss_summary();
                    return Ok(());
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "call event receiver lagged");
                }
                Err(RecvError::Closed) => return Err(CliError::EventsClosed),
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum StdinInput {
    EndCall,
    Closed,
}

/// Enter ends the call. End of input (no terminal attached) only stops
/// watching stdin; the call keeps going until Ctrl-C or the assistant leaves.
fn stdin_input(line: std::io::Result<Option<String>>) -> StdinInput {
    match line {
        Ok(Some(_)) => StdinInput::EndCall,
        Ok(None) | Err(_) => StdinInput::Closed,
    }
}

fn describe(reason: EndReason) -> &'static str {
    match reason {
        EndReason::User => "Call ended.",
        EndReason::AgentLeft => "The assistant ended the call.",
        EndReason::RoomDisconnected => "Connection lost.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enter_ends_the_call() {
        assert_eq!(stdin_input(Ok(Some(String::new()))), StdinInput::EndCall);
        assert_eq!(stdin_input(Ok(Some("bye".to_string()))), StdinInput::EndCall);
    }

    #[test]
    fn end_of_input_does_not_end_the_call() {
        assert_eq!(stdin_input(Ok(None)), StdinInput::Closed);
        let err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed");
        assert_eq!(stdin_input(Err(err)), StdinInput::Closed);
    }

    #[test]
    fn cli_parses_format_slot() {
        let cli = Cli::try_parse_from([
            "voxbook",
            "--config",
            "x.toml",
            "format-slot",
            "2026-01-20T10:00:00",
        ])
        .unwrap();
        assert_eq!(cli.config.as_deref(), Some("x.toml"));
        assert!(matches!(
            &cli.command,
            Command::FormatSlot { slot } if slot == "2026-01-20T10:00:00"
        ));
    }
}
