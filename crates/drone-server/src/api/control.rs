//! WebSocket control endpoint.
//!
//! Each connection gets its own [`Session`]; text frames are client lines and
//! every line is answered with one status line. The server pings the peer on a
//! heartbeat and any frame that comes back renews the session's lease, so an
//! idle but live client keeps its drone while an unresponsive one loses it.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    response::IntoResponse,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use drone_core::{ControlError, Session};

use crate::state::AppState;

/// Upgrade a client connection to a control session.
/// GET / (WebSocket)
pub async fn control_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, peer))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>, peer: SocketAddr) {
    // Dropping the session releases its lock, even if this task is cancelled.
    let mut session = state.open_session(peer);
    let mut shutdown = state.subscribe_shutdown();
    tracing::info!("Client connected: {}", session.identity());

    let heartbeat = state.config().heartbeat_interval();
    match run_session(&mut socket, &mut session, &mut shutdown, heartbeat).await {
        Ok(()) => tracing::info!("Client {} disconnected", session.identity()),
        Err(err) => tracing::warn!("Connection with {} closed: {}", session.identity(), err),
    }

    if let Some(device_id) = session.controlled_device() {
        tracing::info!("Freeing drone {} held by {}", device_id, session.identity());
    }
    session.close();
}

async fn run_session(
    socket: &mut WebSocket,
    session: &mut Session,
    shutdown: &mut broadcast::Receiver<()>,
    heartbeat: Duration,
) -> Result<(), ControlError> {
    let mut ticker = interval_at(Instant::now() + heartbeat, heartbeat);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                // Best effort; the peer may already be gone.
                let _ = socket.send(Message::Close(None)).await;
                return Ok(());
            }
            _ = ticker.tick() => {
                socket
                    .send(Message::Ping(Vec::new()))
                    .await
                    .map_err(|err| ControlError::ConnectionFault(err.to_string()))?;
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(line))) => {
                        let reply = session.handle_line(&line);
                        socket
                            .send(Message::Text(reply.to_string()))
                            .await
                            .map_err(|err| ControlError::ConnectionFault(err.to_string()))?;
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        session.keep_alive();
                        socket
                            .send(Message::Pong(payload))
                            .await
                            .map_err(|err| ControlError::ConnectionFault(err.to_string()))?;
                    }
                    Some(Ok(Message::Close(_))) | None => return Ok(()),
                    Some(Ok(_)) => {
                        session.keep_alive();
                    }
                    Some(Err(err)) => return Err(ControlError::ConnectionFault(err.to_string())),
                }
            }
        }
    }
}
