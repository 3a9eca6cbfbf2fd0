use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::warn;
use utoipa::{IntoParams, ToSchema};

use crate::api::{bad_request, internal_error, not_found, ErrorResponse};
use crate::monitor::{schedule, DisruptionType, Urgency};
use crate::store::{disruptions, routes, stations, status};

use super::RoutesState;

#[derive(Debug, Serialize, ToSchema)]
pub struct StationRef {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Default, Serialize, ToSchema)]
pub struct RouteStatusView {
    /// When the route was last checked, if ever
    pub last_checked_at: Option<String>,
    pub has_active_disruptions: bool,
    /// True until the owner marks the route as viewed
    pub changed_since_last_view: bool,
}

impl From<status::RouteStatus> for RouteStatusView {
    fn from(row: status::RouteStatus) -> Self {
        RouteStatusView {
            last_checked_at: row.last_checked_at,
            has_active_disruptions: row.has_active_disruptions,
            changed_since_last_view: row.changed_since_last_view,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RouteSummary {
    pub id: i64,
    pub owner_id: String,
    pub space_id: Option<String>,
    pub name: String,
    pub origin: StationRef,
    pub destination: StationRef,
    /// Days of week the route is monitored, 0 = Sunday
    pub schedule_days: Vec<u8>,
    /// Civil departure time, "HH:MM"
    pub departure_time: String,
    pub urgency: Urgency,
    pub status: RouteStatusView,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DisruptionView {
    pub id: i64,
    pub route_id: i64,
    /// Provider's id for the disruption
    pub disruption_id: String,
    #[serde(rename = "type")]
    pub disruption_type: DisruptionType,
    pub title: String,
    pub description: Option<String>,
    pub period: Option<String>,
    pub advice: Option<String>,
    pub travel_time_label: Option<String>,
    pub travel_time_short_label: Option<String>,
    pub travel_time_min: Option<i64>,
    pub travel_time_max: Option<i64>,
    pub cause_label: Option<String>,
    pub impact_value: Option<i64>,
    pub alternative_transport_label: Option<String>,
    pub affected_stations: Vec<String>,
    /// False once the provider stops reporting the disruption
    pub is_active: bool,
    pub first_seen: String,
    pub last_seen: String,
}

impl From<disruptions::Disruption> for DisruptionView {
    fn from(row: disruptions::Disruption) -> Self {
        DisruptionView {
            id: row.id,
            route_id: row.route_id,
            disruption_type: row.disruption_type(),
            affected_stations: row.affected_station_list(),
            disruption_id: row.disruption_id,
            title: row.title,
            description: row.description,
            period: row.period,
            advice: row.advice,
            travel_time_label: row.travel_time_label,
            travel_time_short_label: row.travel_time_short_label,
            travel_time_min: row.travel_time_min,
            travel_time_max: row.travel_time_max,
            cause_label: row.cause_label,
            impact_value: row.impact_value,
            alternative_transport_label: row.alternative_transport_label,
            is_active: row.is_active,
            first_seen: row.first_seen,
            last_seen: row.last_seen,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RouteDetailResponse {
    pub id: i64,
    pub owner_id: String,
    pub space_id: Option<String>,
    pub name: String,
    pub origin: StationRef,
    pub destination: StationRef,
    /// Full ordered station path, origin to destination
    pub path: Vec<StationRef>,
    /// Days of week the route is monitored, 0 = Sunday
    pub schedule_days: Vec<u8>,
    /// Civil departure time, "HH:MM"
    pub departure_time: String,
    pub urgency: Urgency,
    pub created_at: String,
    pub status: RouteStatusView,
    /// Cached disruptions, active first
    pub disruptions: Vec<DisruptionView>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RouteListResponse {
    pub routes: Vec<RouteSummary>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct RouteListQuery {
    /// Filter by owner
    pub owner: Option<String>,
    /// Filter by shared space
    pub space: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateRouteRequest {
    /// Identifier of the user the route belongs to
    pub owner_id: String,
    /// Optional shared-space identifier
    pub space_id: Option<String>,
    pub name: String,
    pub origin_code: String,
    pub destination_code: String,
    /// Full station-code path including origin and destination. Defaults to
    /// the direct [origin, destination] pair.
    pub path: Option<Vec<String>>,
    /// Days of week to monitor, 0 = Sunday
    pub schedule_days: Vec<u8>,
    /// Civil departure time, "HH:MM"
    pub departure_time: String,
    /// Defaults to normal
    pub urgency: Option<Urgency>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateRouteRequest {
    pub name: Option<String>,
    /// Days of week to monitor, 0 = Sunday
    pub schedule_days: Option<Vec<u8>>,
    /// Civil departure time, "HH:MM"
    pub departure_time: Option<String>,
    pub urgency: Option<Urgency>,
}

fn summarize(route: routes::Route, status: Option<status::RouteStatus>) -> RouteSummary {
    RouteSummary {
        id: route.id,
        schedule_days: route.days(),
        urgency: route.urgency(),
        owner_id: route.owner_id,
        space_id: route.space_id,
        name: route.name,
        origin: StationRef {
            code: route.origin_code,
            name: route.origin_name,
        },
        destination: StationRef {
            code: route.destination_code,
            name: route.destination_name,
        },
        departure_time: route.departure_time,
        status: status.map(RouteStatusView::from).unwrap_or_default(),
    }
}

async fn build_detail(
    pool: &SqlitePool,
    route: routes::Route,
) -> Result<RouteDetailResponse, sqlx::Error> {
    let path = routes::stations_for(pool, route.id).await?;
    let status = status::find(pool, route.id).await?;
    let cached = disruptions::for_route(pool, route.id).await?;

    Ok(RouteDetailResponse {
        id: route.id,
        schedule_days: route.days(),
        urgency: route.urgency(),
        owner_id: route.owner_id,
        space_id: route.space_id,
        name: route.name,
        origin: StationRef {
            code: route.origin_code,
            name: route.origin_name,
        },
        destination: StationRef {
            code: route.destination_code,
            name: route.destination_name,
        },
        path: path
            .into_iter()
            .map(|s| StationRef {
                code: s.station_code,
                name: s.station_name,
            })
            .collect(),
        departure_time: route.departure_time,
        created_at: route.created_at,
        status: status.map(RouteStatusView::from).unwrap_or_default(),
        disruptions: cached.into_iter().map(DisruptionView::from).collect(),
    })
}

fn validate_schedule_days(days: &[u8]) -> Result<Vec<u8>, (StatusCode, Json<ErrorResponse>)> {
    if days.iter().any(|d| *d > 6) {
        return Err(bad_request(
            "schedule_days entries must be between 0 (Sunday) and 6 (Saturday)",
        ));
    }
    let mut cleaned: Vec<u8> = days.to_vec();
    cleaned.sort_unstable();
    cleaned.dedup();
    Ok(cleaned)
}

fn validate_departure_time(value: &str) -> Result<(), (StatusCode, Json<ErrorResponse>)> {
    if schedule::parse_departure_time(value).is_none() {
        return Err(bad_request(format!(
            "Invalid departure_time (expected HH:MM): {}",
            value
        )));
    }
    Ok(())
}

/// List monitored routes with their current status
#[utoipa::path(
    get,
    path = "/api/routes",
    params(RouteListQuery),
    responses(
        (status = 200, description = "Monitored routes", body = RouteListResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "routes"
)]
pub async fn list_routes(
    State(state): State<RoutesState>,
    Query(query): Query<RouteListQuery>,
) -> Result<Json<RouteListResponse>, (StatusCode, Json<ErrorResponse>)> {
    let all = routes::list_all(&state.pool).await.map_err(internal_error)?;

    let mut summaries = Vec::new();
    for route in all {
        if let Some(owner) = &query.owner {
            if &route.owner_id != owner {
                continue;
            }
        }
        if let Some(space) = &query.space {
            if route.space_id.as_deref() != Some(space.as_str()) {
                continue;
            }
        }

        let status = status::find(&state.pool, route.id)
            .await
            .map_err(internal_error)?;
        summaries.push(summarize(route, status));
    }

    Ok(Json(RouteListResponse { routes: summaries }))
}

/// Register a route for monitoring
///
/// The first disruption check runs in the background right after creation;
/// the response does not wait for the provider.
#[utoipa::path(
    post,
    path = "/api/routes",
    request_body = CreateRouteRequest,
    responses(
        (status = 201, description = "Route created", body = RouteDetailResponse),
        (status = 400, description = "Invalid route definition", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "routes"
)]
pub async fn create_route(
    State(state): State<RoutesState>,
    Json(request): Json<CreateRouteRequest>,
) -> Result<(StatusCode, Json<RouteDetailResponse>), (StatusCode, Json<ErrorResponse>)> {
    if request.name.trim().is_empty() {
        return Err(bad_request("name must not be empty"));
    }
    validate_departure_time(&request.departure_time)?;
    let schedule_days = validate_schedule_days(&request.schedule_days)?;

    let path_codes = match &request.path {
        Some(path) => {
            if path.len() < 2 {
                return Err(bad_request(
                    "path must contain at least origin and destination",
                ));
            }
            if path.first() != Some(&request.origin_code) {
                return Err(bad_request("path must start at origin_code"));
            }
            if path.last() != Some(&request.destination_code) {
                return Err(bad_request("path must end at destination_code"));
            }
            path.clone()
        }
        None => vec![
            request.origin_code.clone(),
            request.destination_code.clone(),
        ],
    };

    // Resolve names against the local directory; unknown codes are rejected
    let mut path_stations = Vec::with_capacity(path_codes.len());
    for code in &path_codes {
        let station = stations::find(&state.pool, code)
            .await
            .map_err(internal_error)?
            .ok_or_else(|| bad_request(format!("Unknown station code: {}", code)))?;
        path_stations.push((station.code, station.name_long));
    }

    let origin_name = path_stations
        .first()
        .map(|(_, name)| name.clone())
        .unwrap_or_default();
    let destination_name = path_stations
        .last()
        .map(|(_, name)| name.clone())
        .unwrap_or_default();

    let new_route = routes::NewRoute {
        owner_id: request.owner_id,
        space_id: request.space_id,
        name: request.name,
        origin_code: request.origin_code,
        origin_name,
        destination_code: request.destination_code,
        destination_name,
        schedule_days,
        departure_time: request.departure_time,
        urgency: request.urgency.unwrap_or(Urgency::Normal),
        stations: path_stations,
    };

    let route = routes::create(&state.pool, &new_route)
        .await
        .map_err(internal_error)?;

    let monitor = state.monitor.clone();
    let created = route.clone();
    tokio::spawn(async move {
        if let Err(e) = monitor.check_route_now(created.id).await {
            warn!(route_id = created.id, error = %e, "Initial check failed");
        }
        monitor.refresh_follow_ups(&created).await;
    });

    let detail = build_detail(&state.pool, route)
        .await
        .map_err(internal_error)?;
    Ok((StatusCode::CREATED, Json(detail)))
}

/// Fetch one route with its path, status and cached disruptions
#[utoipa::path(
    get,
    path = "/api/routes/{id}",
    params(("id" = i64, Path, description = "Route id")),
    responses(
        (status = 200, description = "Route detail", body = RouteDetailResponse),
        (status = 404, description = "Route not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "routes"
)]
pub async fn get_route(
    State(state): State<RoutesState>,
    Path(id): Path<i64>,
) -> Result<Json<RouteDetailResponse>, (StatusCode, Json<ErrorResponse>)> {
    let route = routes::find(&state.pool, id)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| not_found("Route not found"))?;

    let detail = build_detail(&state.pool, route)
        .await
        .map_err(internal_error)?;
    Ok(Json(detail))
}

/// Update a route's name, schedule or urgency
///
/// Origin, destination and path are fixed at creation; delete and recreate
/// the route to change them.
#[utoipa::path(
    put,
    path = "/api/routes/{id}",
    request_body = UpdateRouteRequest,
    params(("id" = i64, Path, description = "Route id")),
    responses(
        (status = 200, description = "Updated route", body = RouteDetailResponse),
        (status = 400, description = "Invalid update", body = ErrorResponse),
        (status = 404, description = "Route not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "routes"
)]
pub async fn update_route(
    State(state): State<RoutesState>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateRouteRequest>,
) -> Result<Json<RouteDetailResponse>, (StatusCode, Json<ErrorResponse>)> {
    let existing = routes::find(&state.pool, id)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| not_found("Route not found"))?;

    if let Some(name) = &request.name {
        if name.trim().is_empty() {
            return Err(bad_request("name must not be empty"));
        }
    }

    let departure_time = match request.departure_time {
        Some(value) => {
            validate_departure_time(&value)?;
            value
        }
        None => existing.departure_time.clone(),
    };
    let schedule_days = match request.schedule_days {
        Some(days) => validate_schedule_days(&days)?,
        None => existing.days(),
    };

    let changes = routes::RouteChanges {
        name: request.name.unwrap_or_else(|| existing.name.clone()),
        schedule_days,
        departure_time,
        urgency: request.urgency.unwrap_or_else(|| existing.urgency()),
    };

    let updated = routes::update(&state.pool, id, &changes)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| not_found("Route not found"))?;

    // Pending timers may point at the old departure time or schedule
    state.monitor.refresh_follow_ups(&updated).await;

    let detail = build_detail(&state.pool, updated)
        .await
        .map_err(internal_error)?;
    Ok(Json(detail))
}

/// Delete a route, its cached disruptions, and any pending timers
#[utoipa::path(
    delete,
    path = "/api/routes/{id}",
    params(("id" = i64, Path, description = "Route id")),
    responses(
        (status = 204, description = "Route deleted"),
        (status = 404, description = "Route not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "routes"
)]
pub async fn delete_route(
    State(state): State<RoutesState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, (StatusCode, Json<ErrorResponse>)> {
    state.monitor.forget_route(id).await;

    let deleted = routes::delete(&state.pool, id)
        .await
        .map_err(internal_error)?;
    if !deleted {
        return Err(not_found("Route not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Acknowledge a route's changes, clearing the changed flag
#[utoipa::path(
    post,
    path = "/api/routes/{id}/viewed",
    params(("id" = i64, Path, description = "Route id")),
    responses(
        (status = 204, description = "Changes acknowledged"),
        (status = 404, description = "Route not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "routes"
)]
pub async fn mark_route_viewed(
    State(state): State<RoutesState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, (StatusCode, Json<ErrorResponse>)> {
    let cleared = status::mark_viewed(&state.pool, id)
        .await
        .map_err(internal_error)?;
    if !cleared {
        return Err(not_found("Route not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}
