use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use tracing::warn;
use utoipa::ToSchema;

use crate::api::{internal_error, not_found, ErrorResponse};
use crate::monitor::{CheckOutcome, MonitorError};

use super::RoutesState;

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckResponse {
    pub route_id: i64,
    /// New disruptions cached by this check
    pub inserted: usize,
    /// Existing records whose content changed
    pub updated: usize,
    /// Records re-reported with identical content
    pub refreshed: usize,
    /// Active records the provider stopped reporting
    pub retired: usize,
    /// Active disruption count after the check
    pub active: i64,
    pub changed: bool,
}

/// Trigger an immediate disruption check for a route
///
/// A provider failure leaves the cache and status untouched; the last known
/// data stays served.
#[utoipa::path(
    post,
    path = "/api/routes/{id}/check",
    params(("id" = i64, Path, description = "Route id")),
    responses(
        (status = 200, description = "Check completed", body = CheckResponse),
        (status = 404, description = "Route not found", body = ErrorResponse),
        (status = 502, description = "Transit provider unavailable", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "routes"
)]
pub async fn check_route(
    State(state): State<RoutesState>,
    Path(id): Path<i64>,
) -> Result<Json<CheckResponse>, (StatusCode, Json<ErrorResponse>)> {
    match state.monitor.check_route_now(id).await {
        Ok(CheckOutcome::Completed(stats)) => Ok(Json(CheckResponse {
            route_id: id,
            inserted: stats.inserted,
            updated: stats.updated,
            refreshed: stats.refreshed,
            retired: stats.retired,
            active: stats.active,
            changed: stats.changed,
        })),
        Ok(CheckOutcome::RouteGone) => Err(not_found("Route not found")),
        Err(MonitorError::Provider(e)) => {
            warn!(route_id = id, error = %e, "Manual check failed at the provider");
            Err((
                StatusCode::BAD_GATEWAY,
                Json(ErrorResponse {
                    error: "Transit provider unavailable".to_string(),
                }),
            ))
        }
        Err(e) => Err(internal_error(e)),
    }
}
