//! Lease expiry loop.
//!
//! Frees drones whose controlling session vanished without a clean disconnect
//! (network partition, half-open socket) once their lease runs out.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};

use crate::state::AppState;

pub async fn run_lease_expiry_loop(state: Arc<AppState>, mut shutdown: broadcast::Receiver<()>) {
    let Some(lease) = state.locks().lease() else {
        tracing::info!("Lease expiry loop disabled (no lock lease configured)");
        return;
    };

    let mut ticker = interval(state.config().lease_sweep_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tracing::info!("Lease expiry loop started (lease {:?})", lease);

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("Lease expiry loop shutting down");
                break;
            }
            _ = ticker.tick() => {
                for (device_id, holder) in state.locks().sweep_expired() {
                    tracing::warn!("Lease on drone {} held by {} expired, drone freed", device_id, holder);
                }
            }
        }
    }
}
