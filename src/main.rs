//! Co-op platformer peer
//!
//! Runs one side of a two-peer session:
//! - host: authoritative simulation, accepts the guest over WebSocket
//! - guest: connects to the host and mirrors its snapshots
//!
//! Both sides serve a small HTTP surface for health, live tuning and debug frames.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use coop_platformer::app::AppState;
use coop_platformer::config::Config;
use coop_platformer::game::input::InputScript;
use coop_platformer::game::{MapLevels, PeerSession, SimConfig, Simulation, TuningHandle};
use coop_platformer::http::build_router;
use coop_platformer::util::time::init_peer_time;
use coop_platformer::ws::client::connect_to_host;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level);

    init_peer_time();

    info!(role = %config.role, "Starting co-op platformer peer");

    let input = load_input_script(&config).await?;
    let levels = Arc::new(MapLevels::builtin()?);
    let tuning = TuningHandle::default();

    let sim = Simulation::new(
        SimConfig {
            role: config.role,
            start_level: config.start_level,
            snapshot_interval: config.snapshot_interval,
            seed: config.sim_seed,
            tuning: tuning.get(),
        },
        levels,
    );
    let (session, handle) = PeerSession::new(sim, input, tuning);
    tokio::spawn(session.run());

    if let Some(host_url) = config.host_url.clone().filter(|_| !config.role.is_authority()) {
        let handle = handle.clone();
        tokio::spawn(async move {
            if let Err(e) = connect_to_host(&host_url, &handle).await {
                error!(error = %e, "Guest link failed; continuing in shadow mode");
            }
        });
    }

    let addr: SocketAddr = config.server_addr;
    let is_host = config.role.is_authority();
    let router = build_router(AppState::new(config, handle));

    let listener = TcpListener::bind(addr).await?;

    info!("Peer listening on {}", addr);
    info!("Health check: http://{}/health", addr);
    if is_host {
        info!("WebSocket endpoint: ws://{}/ws", addr);
    }

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Peer shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Scripted input for a headless peer; idles without one
async fn load_input_script(config: &Config) -> anyhow::Result<InputScript> {
    let Some(path) = &config.input_script else {
        return Ok(InputScript::default());
    };
    let json = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading input script {}", path.display()))?;
    let script = InputScript::from_json(&json)
        .with_context(|| format!("parsing input script {}", path.display()))?;
    if script.is_empty() {
        warn!(path = %path.display(), "Input script has no frames");
    }
    info!(frames = script.len(), "Loaded input script");
    Ok(script)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
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
                error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        }
    }
}
