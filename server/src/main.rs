//! Standalone server binary for the chat-to-cast bridge.
//!
//! Loads the `.ini` configuration, bootstraps the reader/discovery/gateway
//! services, starts the HTTP gateway and the bot conversation shim, and
//! waits for a shutdown signal.

use std::path::PathBuf;

use anyhow::{Context, Result};
use bridge_core::{bootstrap_services, start_server};
use clap::Parser;
use tokio::signal;

mod bot;

/// Turns a chat-hosted file message into a streamable HTTP URL for
/// DLNA/UPnP, Chromecast, Kodi/XBMC, VLC and browser-poll renderers.
#[derive(Parser, Debug)]
#[command(name = "bridge-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", value_name = "FILE", default_value = "config.ini")]
    config: PathBuf,

    /// Log verbosity: 0 = warn, 1 = info, 2 = debug.
    #[arg(short = 'v', long = "verbosity", default_value_t = 1)]
    verbosity: u8,

    /// Connects to `http://listen_host:listen_port/healthcheck` and exits
    /// 0 on success, 1 otherwise, instead of starting the server.
    #[arg(long = "healthcheck", visible_alias = "hc")]
    healthcheck: bool,
}

fn level_filter(verbosity: u8) -> log::LevelFilter {
    match verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    }
}

async fn run_healthcheck(config: &bridge_core::Config) -> Result<()> {
    let url = format!("http://{}:{}/healthcheck", config.http.listen_host, config.http.listen_port);
    let client = reqwest::Client::new();
    let healthy = client
        .get(&url)
        .send()
        .await
        .map(|resp| resp.status().is_success())
        .unwrap_or(false);

    if healthy {
        Ok(())
    } else {
        anyhow::bail!("healthcheck failed against {url}")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(level_filter(args.verbosity))
        .format_timestamp_millis()
        .init();

    let config = bridge_core::Config::load(&args.config)
        .with_context(|| format!("failed to load configuration from {}", args.config.display()))?;

    if args.healthcheck {
        return match run_healthcheck(&config).await {
            Ok(()) => Ok(()),
            Err(e) => {
                log::error!("{e}");
                std::process::exit(1);
            }
        };
    }

    log::info!("bridge-server v{}", env!("CARGO_PKG_VERSION"));

    let services = bootstrap_services(config)
        .await
        .context("failed to bootstrap services")?;

    let bot_handle = bot::spawn(&services).await.context("failed to start bot conversation shim")?;

    let app_state = services.app_state.clone();
    let extra_routers = services.extra_routers.clone();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(app_state, extra_routers).await {
            log::error!("server error: {e}");
        }
    });

    log::info!(
        "gateway listening on http://{}:{}",
        services.config.http.listen_host,
        services.config.http.listen_port
    );

    shutdown_signal().await;
    log::info!("shutdown signal received");

    server_handle.abort();
    bot_handle.abort();

    log::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
