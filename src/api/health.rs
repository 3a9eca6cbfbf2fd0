use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use sqlx::SqlitePool;
use utoipa::ToSchema;

use crate::api::{internal_error, ErrorResponse};
use crate::store::{routes, stations};

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Whether the service is running
    pub healthy: bool,
    /// Number of stations in the local directory cache
    pub stations_cached: i64,
    /// Timestamp of the last station directory sync, if any
    pub last_station_sync: Option<String>,
    /// Number of monitored routes
    pub routes_monitored: i64,
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service health status", body = HealthResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "health"
)]
pub async fn health_check(
    State(pool): State<SqlitePool>,
) -> Result<Json<HealthResponse>, (StatusCode, Json<ErrorResponse>)> {
    let stations_cached = stations::count(&pool).await.map_err(internal_error)?;
    let last_station_sync = stations::last_synced(&pool).await.map_err(internal_error)?;
    let routes_monitored = routes::count(&pool).await.map_err(internal_error)?;

    Ok(Json(HealthResponse {
        healthy: true,
        stations_cached,
        last_station_sync,
        routes_monitored,
    }))
}

pub fn router(pool: SqlitePool) -> Router {
    Router::new().route("/", get(health_check)).with_state(pool)
}
