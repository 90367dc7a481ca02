use std::path::PathBuf;

use clap::Parser;
use colored::Colorize;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use uwsgi_wait::config::Config;
use uwsgi_wait::error::WaitError;
use uwsgi_wait::poller::{wait_for_idle, PollOutcome, Poller};
use uwsgi_wait::source::UnixSocketSource;

/// Connect to a uWSGI stats socket and wait until all workers are idle.
///
/// Exits 0 once every worker is idle, 2 when the timeout is reached first
/// and 1 on connection or protocol errors.
#[derive(Parser, Debug)]
#[command(name = "uwsgi-wait")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Filename of the uWSGI stats UNIX socket
    socket: PathBuf,

    /// Timeout in seconds (default: 30)
    #[arg(
        short = 't',
        long = "timeout",
        value_name = "N",
        allow_negative_numbers = true
    )]
    timeout: Option<i64>,

    /// Delay between polls in milliseconds (default: 1000)
    #[arg(long = "interval", value_name = "MS")]
    interval: Option<u64>,

    /// Config file (TOML format)
    #[arg(long = "config")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

fn setup_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("uwsgi_wait=debug,info")
    } else {
        EnvFilter::new("warn,uwsgi_wait=error")
    };

    // stdout carries the status lines
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<Config, WaitError> {
    let mut config = if let Some(ref config_path) = cli.config {
        Config::from_file(config_path)?
    } else {
        Config::default()
    };

    // A negative timeout gives up right after the first poll
    let timeout_secs = cli.timeout.map(|t| u64::try_from(t).unwrap_or(0));
    config.merge_cli_args(Some(cli.socket.clone()), timeout_secs, cli.interval);
    config.validate()?;

    Ok(config)
}

async fn run(
    config: Config,
    shutdown_rx: broadcast::Receiver<()>,
) -> Result<PollOutcome, WaitError> {
    info!(
        "Waiting up to {}s for workers on {}",
        config.timeout_secs,
        config.socket.display()
    );
    let source = UnixSocketSource::new(config.socket.clone());
    let poller = Poller::new(config, source);

    wait_for_idle(&poller, shutdown_rx).await
}

fn report_error(e: &WaitError) {
    eprintln!("{} {}", "ERROR:".red().bold(), e);
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let config = match load_config(&cli) {
        Ok(c) => c,
        Err(e) => {
            report_error(&e);
            std::process::exit(e.exit_code());
        }
    };
    let timeout_secs = config.timeout_secs;

    // Setup shutdown signal handling; SIGINT is caught from here on
    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
    match signal(SignalKind::interrupt()) {
        Ok(mut sigint) => {
            let shutdown_tx_clone = shutdown_tx.clone();
            tokio::spawn(async move {
                if sigint.recv().await.is_some() {
                    debug!("Received Ctrl+C, stopping");
                    let _ = shutdown_tx_clone.send(());
                }
            });
        }
        Err(e) => warn!("Failed to install Ctrl+C handler: {}", e),
    }

    let code = match run(config, shutdown_rx).await {
        Ok(outcome @ PollOutcome::AllIdle { .. }) => {
            println!("All workers are idle");
            outcome.exit_code()
        }
        Ok(outcome @ PollOutcome::TimedOut { .. }) => {
            eprintln!("Timeout ({}s) reached.", timeout_secs);
            outcome.exit_code()
        }
        // Interrupted by the user: leave quietly
        Ok(outcome @ PollOutcome::Interrupted) => outcome.exit_code(),
        Err(e) => {
            report_error(&e);
            e.exit_code()
        }
    };

    drop(shutdown_tx);
    std::process::exit(code);
}
