//! Pass-through routes over the engine bridge.
//!
//! ```text
//! GET    /status   -> broker topology (liveness probe)
//! GET    /start    -> start one instance of the bootstrap process
//! ```

use axum::extract::State;
use axum::{routing::get, Json, Router};
use flowbridge_core::variables;
use flowbridge_engine::types::{BrokerTopology, ProcessInstance};

use crate::bootstrap::BOOTSTRAP_PROCESS_ID;
use crate::error::AppResult;
use crate::state::AppState;

/// GET /status -- render the broker topology.
async fn status(State(state): State<AppState>) -> AppResult<Json<BrokerTopology>> {
    let topology = state.connection.topology().await?;
    Ok(Json(topology))
}

/// GET /start -- start an instance of the bootstrap process and wait
/// for its result.
async fn start(State(state): State<AppState>) -> AppResult<Json<ProcessInstance>> {
    let instance = state
        .dispatcher
        .start_instance(BOOTSTRAP_PROCESS_ID, variables::empty(), true)
        .await?;
    Ok(Json(instance))
}

/// Mount the pass-through routes at root level.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/status", get(status))
        .route("/start", get(start))
}
