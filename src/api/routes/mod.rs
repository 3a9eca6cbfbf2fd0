mod check;
mod manage;

pub use check::*;
pub use manage::*;

use axum::{
    routing::{get, post},
    Router,
};
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::monitor::Monitor;

#[derive(Clone)]
pub struct RoutesState {
    pub pool: SqlitePool,
    pub monitor: Arc<Monitor>,
}

pub fn router(pool: SqlitePool, monitor: Arc<Monitor>) -> Router {
    let state = RoutesState { pool, monitor };
    Router::new()
        .route("/", get(list_routes).post(create_route))
        .route(
            "/{id}",
            get(get_route).put(update_route).delete(delete_route),
        )
        .route("/{id}/check", post(check_route))
        .route("/{id}/viewed", post(mark_route_viewed))
        .with_state(state)
}
