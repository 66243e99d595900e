//! tellod - Tello drone daemon
//!
//! Serves the drone's command, video and log operations over HTTP.
//!
//! Usage:
//!   tellod [OPTIONS]
//!
//! With no config file the built-in defaults are used: drone at
//! 192.168.10.1:8889, replies on UDP 9000, API on 127.0.0.1:8765.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tello_api::{create_router, AppState};
use tello_link::video::{self, MockVideoDecoder, VideoDecoder};
use tello_link::{DroneSession, TelloConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "tellod")]
#[command(about = "HTTP control surface for a Tello drone")]
struct Args {
    /// Config file (TOML)
    #[arg(short, long, env = "TELLOD_CONFIG")]
    config: Option<String>,

    /// Override the API bind host
    #[arg(long)]
    host: Option<String>,

    /// Override the API port
    #[arg(short, long)]
    port: Option<u16>,

    /// Serve a generated test pattern instead of the drone's feed
    #[arg(long)]
    mock_video: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Log as JSON lines
    #[arg(long)]
    log_json: bool,
}

fn init_tracing(args: &Args) {
    let default = if args.verbose {
        "tellod=debug,tello_api=debug,tello_link=trace,tower_http=debug"
    } else {
        "tellod=info,tello_api=info,tello_link=debug"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default.into());

    let registry = tracing_subscriber::registry().with(filter);
    if args.log_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn load_config(args: &Args) -> anyhow::Result<TelloConfig> {
    let mut config = match &args.config {
        Some(path) => {
            tracing::info!("Loading config from: {}", path);
            TelloConfig::load(path).with_context(|| format!("Failed to load config {}", path))?
        }
        None => {
            tracing::info!("No config file provided, using defaults");
            TelloConfig::default()
        }
    };

    if let Some(host) = &args.host {
        config.server.host = host.clone();
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args);

    tracing::info!("Starting tellod (Tello drone daemon)");

    let config = load_config(&args)?;

    let decoder: Option<Arc<dyn VideoDecoder>> = if args.mock_video {
        tracing::info!("Using mock video decoder");
        Some(Arc::new(MockVideoDecoder::with_pattern(320, 240)))
    } else {
        video::default_decoder()
    };
    match &decoder {
        Some(d) => tracing::info!(decoder = d.name(), "Video decoding available"),
        None => tracing::warn!("Built without a video decoder; video disabled"),
    }

    let session = Arc::new(DroneSession::new(&config, decoder));
    tracing::info!(
        drone = %config.drone.address,
        local_port = config.drone.local_port,
        "Drone session ready"
    );

    let app = create_router(AppState::new(session.clone()));

    let bind = (config.server.host.as_str(), config.server.port);
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {}:{}", bind.0, bind.1))?;
    let addr: SocketAddr = listener.local_addr()?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down drone session");
    tokio::task::spawn_blocking(move || session.shutdown()).await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
