//! tube-send - Background daemon for scheduled uploads
//!
//! Monitors the schedule and uploads each video once its scheduled time
//! has passed.

use clap::Parser;
use libtubecast::credentials::TokenFileProvider;
use libtubecast::logging::LoggingConfig;
use libtubecast::platforms::youtube::YouTubeUploader;
use libtubecast::{Config, Database, Result, TubecastError, Worker};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "tube-send")]
#[command(version)]
#[command(about = "Background daemon for scheduled uploads")]
#[command(long_about = "\
tube-send - Background daemon for scheduled uploads

DESCRIPTION:
    tube-send is a long-running daemon that watches the Tubecast schedule
    and uploads videos to YouTube when they are due.

    Every poll it claims each due post, uploads it, and records the result:
    'posted' with the video id (the local file is removed), or 'error'
    with the cause (the file is kept). Failed posts are not retried.

USAGE:
    # Run in foreground (logs to stderr)
    tube-send

    # Run with custom poll interval
    tube-send --poll-interval 30

    # Process due posts once and exit (cron, testing)
    tube-send --once

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown (finishes current upload)

CONFIGURATION:
    Configuration file: ~/.config/tubecast/config.toml
    Database location: ~/.local/share/tubecast/schedule.db

    [youtube]
    token_file = \"~/.config/tubecast/youtube_token.json\"

    [scheduling]
    poll_interval = 60          # seconds between polls
    delete_after_upload = true  # remove the local file once posted

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime error
    2 - Configuration error
")]
struct Cli {
    /// Poll interval in seconds (overrides config)
    #[arg(long, value_name = "SECONDS")]
    poll_interval: Option<u64>,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Log format: text, json or pretty
    #[arg(long, env = "TUBECAST_LOG_FORMAT", default_value = "text")]
    log_format: String,

    /// Process due posts once and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    // Initialize logging
    let format = cli.log_format.parse().map_err(TubecastError::Validation)?;
    let level = std::env::var("TUBECAST_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    LoggingConfig::new(format, level, cli.verbose).init();

    // Load configuration
    let config = Config::load()?;

    let poll_interval = cli.poll_interval.unwrap_or(config.scheduling.poll_interval);
    if poll_interval == 0 {
        return Err(TubecastError::Validation(
            "Poll interval must be at least 1 second".to_string(),
        ));
    }

    let db = Database::new(&config.database_path()).await?;

    let credentials = Arc::new(TokenFileProvider::new(config.token_file()));
    let uploader = Arc::new(YouTubeUploader::from_config(&config.youtube, credentials));
    let worker = Worker::new(db.clone(), uploader)
        .delete_after_upload(config.scheduling.delete_after_upload);

    info!("tube-send daemon starting");

    if cli.once {
        let outcome = worker.check_and_post_videos().await;
        db.close().await;
        let report = outcome?;
        info!(
            discovered = report.discovered,
            posted = report.posted,
            failed = report.failed,
            "tube-send: processed posts once, exiting"
        );
        return Ok(());
    }

    // Set up graceful shutdown
    let shutdown = Arc::new(AtomicBool::new(false));
    setup_signal_handlers(shutdown.clone())?;

    info!("Poll interval: {}s", poll_interval);
    worker
        .run(Duration::from_secs(poll_interval), shutdown)
        .await;

    db.close().await;
    info!("tube-send daemon stopped");
    Ok(())
}

/// Set up signal handlers for graceful shutdown
#[cfg(unix)]
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM])
        .map_err(|e| TubecastError::Validation(format!("Signal setup failed: {}", e)))?;

    // Spawn thread to handle signals
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
            info!("Received shutdown signal, stopping gracefully...");
            shutdown.store(true, Ordering::Relaxed);
        }
    });
    Ok(())
}
