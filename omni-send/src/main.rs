//! omni-send - Background daemon for scheduled publishing
//!
//! Polls the post queue and publishes each post when it comes due, retrying
//! transient platform failures with exponential backoff.

use clap::Parser;
use libomnipost::logging::LoggingConfig;
use libomnipost::service::OmnipostService;
use libomnipost::{Config, OmnipostError, Result};
use std::io::Write;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "omni-send")]
#[command(version)]
#[command(about = "Background daemon for scheduled publishing")]
#[command(long_about = "\
omni-send - Background daemon for scheduled publishing

DESCRIPTION:
    omni-send is a long-running daemon that watches the Omnipost queue and
    publishes scheduled posts when they come due.

    Every poll it claims due posts and publishes each one concurrently.
    Retryable failures (expired auth, rate limits, temporary bad requests,
    timeouts) are rescheduled with exponential backoff; after the retry
    ceiling, or on any other error, the post is marked failed.

USAGE:
    # Run in foreground (logs to stderr)
    omni-send

    # Run with custom poll interval
    omni-send --poll-interval 30

    # Process due posts once, print the publish log as JSON lines, exit
    omni-send --once

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown (in-flight publishes finish)

CONFIGURATION:
    Configuration file: ~/.config/omnipost/config.toml (or $OMNIPOST_CONFIG)
    Database location:  ~/.local/share/omnipost/posts.db (or $OMNIPOST_DB_PATH)

    [scheduler]
    poll_interval = 60     # seconds between polls
    max_retries = 3        # attempts after the first failure
    publish_timeout = 30   # seconds per publish call

    [rate_limits.twitter]
    limit = 300
    interval = 3600

LOGGING:
    OMNIPOST_LOG_FORMAT=text|json|pretty
    OMNIPOST_LOG_LEVEL=error|warn|info|debug|trace

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime error
    2 - Configuration error
    3 - Invalid arguments
")]
struct Cli {
    /// Poll interval in seconds (overrides config)
    #[arg(long, value_name = "SECONDS")]
    #[arg(help = "How often to check for due posts (default: from config, 60)")]
    poll_interval: Option<u64>,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    #[arg(help = "Enable verbose logging (useful for debugging)")]
    verbose: bool,

    /// Run a single tick and exit
    #[arg(long)]
    #[arg(help = "Process due posts once, wait for them, print the publish log and exit")]
    once: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    LoggingConfig::from_env(cli.verbose).init();

    if let Err(e) = run(cli).await {
        error!("omni-send failed: {}", e);
        eprintln!("Error: {}", e);
        process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load()?;
    if let Some(seconds) = cli.poll_interval {
        if seconds == 0 {
            return Err(OmnipostError::InvalidInput(
                "--poll-interval must be at least 1 second".to_string(),
            ));
        }
        config.scheduler.poll_interval = seconds;
    }

    let service = OmnipostService::from_config(config).await?;
    info!(
        poll_interval = ?service.scheduler().poll_interval(),
        adapters_enabled = service.registry().is_enabled(),
        "omni-send daemon starting"
    );

    if cli.once {
        return run_once(&service).await;
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    setup_signal_handlers(shutdown.clone())?;

    service.scheduler().run(shutdown).await;

    info!("omni-send daemon stopped");
    Ok(())
}

/// One tick, awaiting every worker, then the publish log on stdout
async fn run_once(service: &OmnipostService) -> Result<()> {
    let handles = service.scheduler().tick().await?;
    let dispatched = handles.len();

    for result in futures::future::join_all(handles).await {
        if let Err(e) = result {
            error!(error = %e, "worker task panicked");
        }
    }
    info!(dispatched, "processed due posts once, exiting");

    // Oldest first reads naturally as a transcript
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for entry in service.publishing().logs().iter().rev() {
        let line = serde_json::to_string(entry)
            .map_err(|e| OmnipostError::InvalidInput(format!("unserializable log entry: {}", e)))?;
        if writeln!(out, "{}", line).is_err() {
            break;
        }
    }
    Ok(())
}

/// Set up signal handlers for graceful shutdown
#[cfg(unix)]
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM])
        .map_err(|e| OmnipostError::InvalidInput(format!("Signal setup failed: {}", e)))?;

    std::thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            info!(signal = sig, "Received shutdown signal, stopping gracefully...");
            shutdown.store(true, Ordering::Relaxed);
        }
    });

    Ok(())
}

#[cfg(not(unix))]
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> Result<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C, stopping gracefully...");
            shutdown.store(true, Ordering::Relaxed);
        }
    });
    Ok(())
}
