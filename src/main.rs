use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use broadcast_relay::config::{AppConfig, CONFIG_ENV};
use broadcast_relay::state::AppState;
use broadcast_relay::web;
use broadcast_relay::webrtc::RtcTransport;

/// Log level for the application
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Verbose,
    Debug,
    Trace,
}

/// broadcast-relay command line arguments
#[derive(Parser, Debug)]
#[command(name = "broadcast-relay")]
#[command(version, about = "Single-broadcaster WebRTC relay", long_about = None)]
struct CliArgs {
    /// JSON configuration file
    #[arg(short = 'c', long, value_name = "FILE", env = CONFIG_ENV)]
    config: Option<PathBuf>,

    /// Listen address (overrides config file)
    #[arg(short = 'a', long, value_name = "ADDRESS")]
    address: Option<String>,

    /// HTTP port (overrides config file)
    #[arg(short = 'p', long, value_name = "PORT")]
    port: Option<u16>,

    /// Directory with the static web client (overrides config file)
    #[arg(long, value_name = "DIR")]
    static_dir: Option<String>,

    /// STUN server URL, may be repeated (replaces the configured list)
    #[arg(long, value_name = "URL")]
    stun: Vec<String>,

    /// Log level (error, warn, info, verbose, debug, trace)
    #[arg(short = 'l', long, value_name = "LEVEL", default_value = "info")]
    log_level: LogLevel,

    /// Increase verbosity (-v for verbose, -vv for debug, -vvv for trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    init_logging(args.log_level, args.verbose);

    tracing::info!("Starting broadcast-relay v{}", env!("CARGO_PKG_VERSION"));

    let mut config = AppConfig::load_or_default(args.config.as_deref())
        .await
        .context("Failed to load configuration")?;
    apply_cli_overrides(&mut config, &args);
    config.validate()?;

    let transport = RtcTransport::new(config.webrtc.clone())?;
    let bind_addr = format!("{}:{}", config.web.bind_address, config.web.http_port);
    let state = AppState::new(config, Arc::new(transport));

    let app = web::create_router(state.clone());

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    tracing::info!("Starting HTTP server on {}", listener.local_addr()?);

    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    );

    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for CTRL+C: {}", e);
            std::future::pending::<()>().await;
        }
        tracing::info!("Shutdown signal received");
    };

    tokio::select! {
        _ = shutdown_signal => {}
        result = async move { server.await } => {
            if let Err(e) = result {
                tracing::error!("HTTP server error: {}", e);
            }
        }
    }

    if let Some(broadcast) = state.registry.snapshot() {
        tracing::info!(
            "Dropping active broadcast {} ({} clients connected)",
            broadcast.broadcaster_id,
            state.client_count()
        );
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

fn apply_cli_overrides(config: &mut AppConfig, args: &CliArgs) {
    if let Some(address) = &args.address {
        config.web.bind_address = address.clone();
    }
    if let Some(port) = args.port {
        config.web.http_port = port;
    }
    if let Some(dir) = &args.static_dir {
        config.web.static_dir = dir.clone();
    }
    if !args.stun.is_empty() {
        config.webrtc.stun_servers = args.stun.clone();
    }
}

fn init_logging(level: LogLevel, verbose_count: u8) {
    // Verbose count overrides log level
    let effective_level = match verbose_count {
        0 => level,
        1 => LogLevel::Verbose,
        2 => LogLevel::Debug,
        _ => LogLevel::Trace,
    };

    let filter = match effective_level {
        LogLevel::Error => "broadcast_relay=error,tower_http=error",
        LogLevel::Warn => "broadcast_relay=warn,tower_http=warn",
        LogLevel::Info => "broadcast_relay=info,tower_http=info",
        LogLevel::Verbose => "broadcast_relay=debug,tower_http=info",
        LogLevel::Debug => "broadcast_relay=debug,tower_http=debug,webrtc=info",
        LogLevel::Trace => "broadcast_relay=trace,tower_http=debug,webrtc=debug",
    };

    // Environment variable takes highest priority
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

    if let Err(err) = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
    {
        eprintln!("failed to initialize tracing: {}", err);
    }
}
