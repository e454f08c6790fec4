//! crosspost CLI
//!
//! One invocation performs one check-and-publish attempt and exits. Schedule
//! it with cron; the exit code tells the scheduler what happened.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use crosspost::{
    error::{AppError, Result},
    models::Config,
    nostr::{SigningKey, WebSocketTransport},
    pipeline::Pipeline,
    services::{BroadcastPublisher, NitterFetcher},
    storage::{LocalStore, WatermarkStore},
    utils::http,
};

/// crosspost - republish new posts to Nostr
#[derive(Parser, Debug)]
#[command(name = "crosspost", version, about = "Republish new posts to Nostr relays")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "crosspost.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check the source once and publish a new post (default)
    Run {
        /// Format the note but neither publish it nor record it
        #[arg(long)]
        dry_run: bool,
    },

    /// Validate the configuration and signing key
    Validate,

    /// Show the stored watermark
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            log::error!("Hint: {}", e.hint());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(&cli.config)?;
    log::debug!("Loaded configuration from {}", cli.config.display());

    match cli.command.unwrap_or(Command::Run { dry_run: false }) {
        Command::Run { dry_run } => {
            config.validate()?;
            let key = SigningKey::from_credential(&config.publish.secret_key)?;

            let client = http::create_async_client(&config.source)?;
            let fetcher = NitterFetcher::new(config.source.clone(), client);
            let store = LocalStore::from_config(&config.state);
            let publisher = BroadcastPublisher::new(Arc::new(WebSocketTransport::new()), &config.publish);

            log::info!("crosspost check starting for @{}", config.source.handle());
            let pipeline =
                Pipeline::new(&config, &fetcher, &store, &publisher, &key).dry_run(dry_run);

            // Dropping the run future on a signal discards in-flight work
            // before the watermark write.
            let report = tokio::select! {
                report = pipeline.run_once() => report?,
                _ = shutdown_signal() => {
                    log::warn!("Termination signal received; watermark left unchanged");
                    return Err(AppError::Interrupted);
                }
            };

            if let Some(outcome) = &report.outcome {
                for failure in outcome.failures() {
                    log::warn!(
                        "  {} failed: {}",
                        failure.endpoint,
                        failure.error.as_deref().unwrap_or("unknown error")
                    );
                }
            }
            log::info!("Check completed: {}", report.state);
        }

        Command::Validate => {
            log::info!("Validating configuration...");
            config.validate()?;
            let key = SigningKey::from_credential(&config.publish.secret_key)?;
            log::info!("✓ Config OK");
            log::info!("✓ Signing key OK (pubkey {})", key.public_key_hex());
            log::info!("Source: {}", config.source.profile_url());
            for relay in &config.publish.relays {
                log::info!("Relay: {}", relay);
            }
        }

        Command::Info => {
            let store = LocalStore::from_config(&config.state);
            let mark = store.load().await?;
            log::info!("State file: {}", store.location());
            match (&mark.last_post_id, &mark.last_updated) {
                (Some(id), updated) => {
                    log::info!("Last published post: {}", id);
                    if let Some(updated) = updated {
                        log::info!("Last updated: {}", updated.to_rfc3339());
                    }
                }
                (None, _) => log::info!("No post published yet."),
            }
        }
    }

    Ok(())
}

/// Resolves on SIGINT, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::warn!("Cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::warn!("Cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
