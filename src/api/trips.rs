use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::warn;
use utoipa::{IntoParams, ToSchema};

use crate::api::ErrorResponse;
use crate::providers::transit::TransitClient;

#[derive(Debug, Serialize, ToSchema)]
pub struct TripStationView {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TripOptionView {
    /// Planned duration in minutes
    pub duration_minutes: Option<i64>,
    pub transfers: Option<i64>,
    /// Ordered station path of the journey
    pub stations: Vec<TripStationView>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TripListResponse {
    pub trips: Vec<TripOptionView>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct TripQuery {
    /// Origin station code
    pub from: String,
    /// Destination station code
    pub to: String,
}

/// Search journey options between two stations (live provider call)
#[utoipa::path(
    get,
    path = "/api/trips",
    params(TripQuery),
    responses(
        (status = 200, description = "Journey options", body = TripListResponse),
        (status = 502, description = "Transit provider unavailable", body = ErrorResponse)
    ),
    tag = "trips"
)]
pub async fn search_trips(
    State(client): State<TransitClient>,
    Query(query): Query<TripQuery>,
) -> Result<Json<TripListResponse>, (StatusCode, Json<ErrorResponse>)> {
    let options = client
        .search_trips(&query.from, &query.to)
        .await
        .map_err(|e| {
            warn!(from = %query.from, to = %query.to, error = %e, "Trip search failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(ErrorResponse {
                    error: "Transit provider unavailable".to_string(),
                }),
            )
        })?;

    let trips = options
        .iter()
        .map(|option| TripOptionView {
            duration_minutes: option.planned_duration_minutes,
            transfers: option.transfers,
            stations: option
                .station_path()
                .into_iter()
                .map(|stop| TripStationView {
                    code: stop.code,
                    name: stop.name,
                })
                .collect(),
        })
        .collect();

    Ok(Json(TripListResponse { trips }))
}

pub fn router(client: TransitClient) -> Router {
    Router::new().route("/", get(search_trips)).with_state(client)
}
