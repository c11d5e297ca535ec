//! glitter-boot
//!
//! Bootstraps and operates a glitter node on this host:
//! - init: download binaries, render configs, generate keys, install units
//! - start / stop: switch between full node and validator mode
//! - fullnode / validator setup: init and bring the node up in one go
//! - show-node-info: identity and service status

use anyhow::Result;
use clap::Parser;
use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use boot_core::BootConfig;
use boot_lifecycle::{Collaborators, Dispatcher};

mod cli;

use cli::Cli;

const LOG_TARGETS: &[&str] = &[
    "glitter_boot",
    "boot_core",
    "boot_state_store",
    "boot_workflows",
    "boot_rpc",
    "boot_plugins",
    "boot_lifecycle",
];

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load environment from /etc/glitter-boot/environment (if exists)
    boot_core::load_environment();

    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref())?;

    let config = BootConfig::from_env();
    info!(install_dir = %config.install_dir.display(), "glitter-boot starting");

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = cancel_tx.send(true);
    });

    let dispatcher =
        Dispatcher::new(config, Collaborators::system()?).with_cancellation(cancel_rx);

    if dispatcher.execute(cli.command.into_operation()).await.is_err() {
        std::process::exit(1);
    }
    Ok(())
}

fn init_tracing(level: Option<&str>) -> Result<()> {
    let mut filter = EnvFilter::from_default_env();
    let level = match level {
        Some(level) => Some(level),
        None if std::env::var_os("RUST_LOG").is_none() => Some("warn"),
        None => None,
    };
    if let Some(level) = level {
        for target in LOG_TARGETS {
            filter = filter.add_directive(format!("{}={}", target, level).parse()?);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, cancelling...");
        },
        _ = terminate => {
            info!("Received terminate signal, cancelling...");
        },
    }
}
