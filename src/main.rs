use std::path::PathBuf;

use anyhow::Context;
use beacon::config::{Config, DEFAULT_PORT};
use beacon::server::Server;
use clap::Parser;

/// Serves static files for the virtual hosts in the configuration file.
#[derive(Debug, Parser)]
#[command(name = "beacon", version, about)]
struct Cli {
    /// Port to listen on, on all interfaces
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Configuration file (`.yaml`/`.yml` for YAML, line format otherwise)
    #[arg(short, long, default_value = "web.conf")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    let mut cfg = Config::load(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;
    cfg.server.port = cli.port;

    let mut server = Server::bind(cfg)?;
    let stop = server.stop_handle();

    // The event loop blocks in poll; the runtime only watches for signals.
    let mut event_loop = tokio::task::spawn_blocking(move || server.run());

    tokio::select! {
        res = &mut event_loop => {
            res??;
        }

        signal = shutdown_signal() => {
            match signal {
                Ok(()) => {
                    tracing::info!("Shutdown signal received");
                    stop.stop().context("waking event loop")?;
                }
                Err(e) => tracing::warn!(error = %e, "signal handling unavailable"),
            }
            event_loop.await??;
        }
    }

    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res,
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
