pub mod error;
pub mod health;
pub mod routes;
pub mod stations;
pub mod trips;
pub mod ws;

pub use error::{bad_request, internal_error, not_found, ErrorResponse};

use axum::{routing::get, Router};
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::monitor::Monitor;
use crate::providers::transit::TransitClient;

pub fn router(pool: SqlitePool, monitor: Arc<Monitor>, client: TransitClient) -> Router {
    let ws_state = ws::WsState {
        status_tx: monitor.status_sender(),
    };

    Router::new()
        .nest("/stations", stations::router(pool.clone()))
        .nest("/trips", trips::router(client))
        .nest("/routes", routes::router(pool.clone(), monitor))
        .nest("/health", health::router(pool))
        .route("/ws/status", get(ws::ws_status).with_state(ws_state))
}
