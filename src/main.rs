//! ramscope - per-process memory telemetry with bounded history.
//!
//! This is the main entry point: it resolves configuration, wires the
//! monitor together, starts the collection loops and runs until a shutdown
//! signal arrives.

use clap::Parser;
use ramscope::catalog::HostOs;
use ramscope::cli::Args;
use ramscope::config::{resolve_config, show_config, validate_effective_config, Config};
use ramscope::scheduler::Scheduler;
use ramscope::{build_monitor, Update};
use tokio::signal;
use tracing::{debug, error, info, Level};

/// Initializes tracing logging subsystem with configured log level.
fn setup_logging(config: &Config) {
    let level = config.log_level.as_deref().unwrap_or("info");
    let log_level = match level {
        "off" | "error" => Level::ERROR,
        "warn" => Level::WARN,
        "debug" => Level::DEBUG,
        "trace" => Level::TRACE,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    info!("Logging initialized with level: {level}");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Early config resolution for show/check modes
    if args.show_config || args.check_config {
        let config = resolve_config(&args)?;

        if args.check_config {
            if let Err(e) = validate_effective_config(&config) {
                eprintln!("Configuration invalid: {e}");
                std::process::exit(1);
            }
            println!("Configuration is valid");
            return Ok(());
        }

        return show_config(&config, args.config_format);
    }

    let config = resolve_config(&args)?;
    if let Err(e) = validate_effective_config(&config) {
        eprintln!("Configuration invalid: {e}");
        std::process::exit(1);
    }

    setup_logging(&config);

    let Some(host) = HostOs::current() else {
        error!("unsupported platform: no memory sources available");
        std::process::exit(1);
    };
    info!(?host, "starting ramscope");

    let (handle, collector) = build_monitor(host, &config);

    if config.include_descendants.unwrap_or(false) {
        handle.include_descendants();
    }
    if let Some(pids) = &config.follow {
        handle.follow(pids);
        info!(pids = ?pids, "following processes from configuration");
    }

    // Drain the output stream so the log shows what subscribers would see.
    let mut updates = handle.subscribe();
    let drainer = tokio::spawn(async move {
        while let Some(update) = updates.recv().await {
            match update {
                Update::Processes(listing) => {
                    debug!(processes = listing.len(), "discovery listing")
                }
                Update::Series(snapshot) => {
                    debug!(followed = snapshot.len(), "series snapshot")
                }
            }
        }
    });

    let scheduler = Scheduler::start(
        collector,
        config.metrics_interval(),
        config.discovery_interval(),
    );

    // Graceful shutdown on SIGINT/SIGTERM
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), shutting down gracefully...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        }
    }

    scheduler.shutdown();
    drainer.abort();
    info!("ramscope stopped gracefully");
    Ok(())
}
