//! Drone control server: exclusive WebSocket control plus a fleet directory.

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use drone_core::{Fleet, LoggingDriver};
use drone_server::config::Config;
use drone_server::state::AppState;
use drone_server::{api, loops};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("drone_server=debug".parse()?)
            .add_directive("drone_core=info".parse()?))
        .init();

    tracing::info!("Starting drone control server...");

    let config = Config::from_env();
    let fleet = Fleet::new(&config.fleet_entries()?, Arc::new(LoggingDriver))?;
    for device in fleet.devices() {
        tracing::info!("Fleet drone: {}", device);
    }
    let state = Arc::new(AppState::new(config.clone(), fleet));

    // Start background loops
    let lease_loop = tokio::spawn(loops::lease_expiry_loop::run_lease_expiry_loop(
        state.clone(),
        state.subscribe_shutdown(),
    ));
    tokio::spawn(watch_signals(state.clone()));

    let control_addr = SocketAddr::new(config.bind_addr, config.control_port);
    let directory_addr = SocketAddr::new(config.bind_addr, config.directory_port);

    let control_app = api::control_router()
        .with_state(state.clone())
        .into_make_service_with_connect_info::<SocketAddr>();
    let directory_app = api::directory_router().with_state(state.clone());

    let control_listener = tokio::net::TcpListener::bind(control_addr).await?;
    let directory_listener = tokio::net::TcpListener::bind(directory_addr).await?;
    tracing::info!("Control socket listening on ws://{}", control_addr);
    tracing::info!("Directory listening on http://{}/drones", directory_addr);

    let control = axum::serve(control_listener, control_app)
        .with_graceful_shutdown(shutdown_signal(state.subscribe_shutdown()));
    let directory = axum::serve(directory_listener, directory_app)
        .with_graceful_shutdown(shutdown_signal(state.subscribe_shutdown()));

    tokio::try_join!(async { control.await }, async { directory.await })?;
    lease_loop.await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Resolves once the process-wide shutdown has been signalled.
async fn shutdown_signal(mut rx: broadcast::Receiver<()>) {
    let _ = rx.recv().await;
}

async fn watch_signals(state: Arc<AppState>) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to listen for SIGTERM: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl-C"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }
    state.shutdown();
}
