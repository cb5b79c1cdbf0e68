use std::path::PathBuf;

use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use checkin_guard::config::GuardConfig;
use checkin_guard::ratelimit::{Limiters, Policy};

/// Command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "checkin-guard", version, about = "Rate limiting for the hackathon check-in service")]
struct Args {
    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log filter directive, overrides the configured level
    #[arg(long)]
    log_level: Option<String>,

    /// Emit JSON log lines
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration before logging so the configured level applies
    let mut config = GuardConfig::load(args.config.as_deref())?;
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    config.logging.json |= args.json_logs;

    init_tracing(&config);

    info!("Starting Checkin Guard");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let limiters = Limiters::new(&config.limits)?;
    for policy in Policy::ALL {
        let limit = limiters.get(policy).config();
        info!(
            policy = %policy,
            max_requests = limit.max_requests,
            window_ms = limit.window_ms,
            "Rate limiter initialized"
        );
    }

    limiters.start_cleanup(config.cleanup.interval())?;

    shutdown_signal().await;

    limiters.destroy();
    info!("Checkin Guard stopped");
    Ok(())
}

/// Install the global subscriber; `RUST_LOG` wins over the configured level.
fn init_tracing(config: &GuardConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true);

    if config.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
