use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use utoipa::{IntoParams, ToSchema};

use crate::api::{internal_error, ErrorResponse};
use crate::store::stations;

#[derive(Debug, Serialize, ToSchema)]
pub struct StationView {
    pub code: String,
    pub name: String,
    pub name_medium: Option<String>,
    pub name_short: Option<String>,
    pub uic_code: Option<String>,
    /// Alternative names, useful for autocomplete matching
    pub synonyms: Vec<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub country: Option<String>,
}

impl From<stations::Station> for StationView {
    fn from(station: stations::Station) -> Self {
        StationView {
            synonyms: station.synonym_list(),
            code: station.code,
            name: station.name_long,
            name_medium: station.name_medium,
            name_short: station.name_short,
            uic_code: station.uic_code,
            lat: station.lat,
            lng: station.lng,
            country: station.country,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StationListResponse {
    pub stations: Vec<StationView>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct StationQuery {
    /// Substring to match against station names and codes
    pub query: Option<String>,
    /// Maximum number of results (default 20, capped at 100)
    pub limit: Option<i64>,
}

/// Search the locally cached station directory
#[utoipa::path(
    get,
    path = "/api/stations",
    params(StationQuery),
    responses(
        (status = 200, description = "Matching stations", body = StationListResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "stations"
)]
pub async fn list_stations(
    State(pool): State<SqlitePool>,
    Query(query): Query<StationQuery>,
) -> Result<Json<StationListResponse>, (StatusCode, Json<ErrorResponse>)> {
    let limit = query.limit.unwrap_or(20).clamp(1, 100);

    let rows = stations::search(&pool, query.query.as_deref(), limit)
        .await
        .map_err(internal_error)?;

    Ok(Json(StationListResponse {
        stations: rows.into_iter().map(StationView::from).collect(),
    }))
}

pub fn router(pool: SqlitePool) -> Router {
    Router::new().route("/", get(list_stations)).with_state(pool)
}
