//! Fleet directory endpoints.

use axum::{extract::State, Json};
use std::sync::Arc;

use drone_core::{DeviceInfo, LockSnapshot};

use crate::state::AppState;

/// List the fleet in configured order.
/// GET /drones
pub async fn list_drones(State(state): State<Arc<AppState>>) -> Json<Vec<DeviceInfo>> {
    Json(state.fleet().directory().to_vec())
}

/// Current drone locks (for debugging/UI).
/// GET /locks
pub async fn list_locks(State(state): State<Arc<AppState>>) -> Json<Vec<LockSnapshot>> {
    Json(state.locks().snapshot())
}
