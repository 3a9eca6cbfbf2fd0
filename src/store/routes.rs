//! Monitored route registry.

use crate::monitor::types::Urgency;
use chrono::Utc;
use sqlx::SqlitePool;

/// A monitored commute
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Route {
    pub id: i64,
    pub owner_id: String,
    pub space_id: Option<String>,
    pub name: String,
    pub origin_code: String,
    pub origin_name: String,
    pub destination_code: String,
    pub destination_name: String,
    /// JSON array of day numbers, 0 = Sunday
    pub schedule_days: String,
    /// Civil departure time, "HH:MM"
    pub departure_time: String,
    pub urgency: String,
    pub created_at: String,
}

impl Route {
    pub fn days(&self) -> Vec<u8> {
        serde_json::from_str(&self.schedule_days).unwrap_or_default()
    }

    pub fn urgency(&self) -> Urgency {
        Urgency::parse(&self.urgency)
    }

    pub fn runs_on(&self, weekday: u8) -> bool {
        self.days().contains(&weekday)
    }
}

/// One station on a route's path, already ordered by position
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RouteStation {
    pub station_code: String,
    pub station_name: String,
}

/// Input for route creation. `stations` is the full ordered path including
/// origin and destination.
#[derive(Debug, Clone)]
pub struct NewRoute {
    pub owner_id: String,
    pub space_id: Option<String>,
    pub name: String,
    pub origin_code: String,
    pub origin_name: String,
    pub destination_code: String,
    pub destination_name: String,
    pub schedule_days: Vec<u8>,
    pub departure_time: String,
    pub urgency: Urgency,
    pub stations: Vec<(String, String)>,
}

/// The fields a route update may touch. Origin, destination and path are
/// fixed at creation.
#[derive(Debug, Clone)]
pub struct RouteChanges {
    pub name: String,
    pub schedule_days: Vec<u8>,
    pub departure_time: String,
    pub urgency: Urgency,
}

/// Insert a route, its station path and a zeroed status row in one
/// transaction.
pub async fn create(pool: &SqlitePool, route: &NewRoute) -> Result<Route, sqlx::Error> {
    let schedule_days =
        serde_json::to_string(&route.schedule_days).unwrap_or_else(|_| "[]".to_string());
    let created_at = Utc::now().to_rfc3339();

    let mut tx = pool.begin().await?;

    let row = sqlx::query(
        r#"
        INSERT INTO routes (owner_id, space_id, name, origin_code, origin_name,
                            destination_code, destination_name, schedule_days,
                            departure_time, urgency, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(&route.owner_id)
    .bind(&route.space_id)
    .bind(&route.name)
    .bind(&route.origin_code)
    .bind(&route.origin_name)
    .bind(&route.destination_code)
    .bind(&route.destination_name)
    .bind(&schedule_days)
    .bind(&route.departure_time)
    .bind(route.urgency.as_str())
    .bind(&created_at)
    .fetch_one(&mut *tx)
    .await?;

    let id: i64 = sqlx::Row::get(&row, "id");

    for (position, (code, name)) in route.stations.iter().enumerate() {
        sqlx::query(
            "INSERT INTO route_stations (route_id, position, station_code, station_name) VALUES (?, ?, ?, ?)",
        )
        .bind(id)
        .bind(position as i64)
        .bind(code)
        .bind(name)
        .execute(&mut *tx)
        .await?;
    }

    sqlx::query("INSERT INTO route_status (route_id) VALUES (?)")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    find(pool, id).await?.ok_or(sqlx::Error::RowNotFound)
}

pub async fn find(pool: &SqlitePool, id: i64) -> Result<Option<Route>, sqlx::Error> {
    sqlx::query_as::<_, Route>("SELECT * FROM routes WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn list_all(pool: &SqlitePool) -> Result<Vec<Route>, sqlx::Error> {
    sqlx::query_as::<_, Route>("SELECT * FROM routes ORDER BY id")
        .fetch_all(pool)
        .await
}

pub async fn count(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM routes")
        .fetch_one(pool)
        .await
}

/// Apply the mutable fields. Returns the updated route, or `None` if the
/// route does not exist.
pub async fn update(
    pool: &SqlitePool,
    id: i64,
    changes: &RouteChanges,
) -> Result<Option<Route>, sqlx::Error> {
    let schedule_days =
        serde_json::to_string(&changes.schedule_days).unwrap_or_else(|_| "[]".to_string());

    let result = sqlx::query(
        "UPDATE routes SET name = ?, schedule_days = ?, departure_time = ?, urgency = ? WHERE id = ?",
    )
    .bind(&changes.name)
    .bind(&schedule_days)
    .bind(&changes.departure_time)
    .bind(changes.urgency.as_str())
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }

    find(pool, id).await
}

/// Delete a route and everything hanging off it. Returns false if the route
/// did not exist.
pub async fn delete(pool: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM disruptions WHERE route_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM route_status WHERE route_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM route_stations WHERE route_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    let result = sqlx::query("DELETE FROM routes WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(result.rows_affected() > 0)
}

pub async fn stations_for(pool: &SqlitePool, route_id: i64) -> Result<Vec<RouteStation>, sqlx::Error> {
    sqlx::query_as::<_, RouteStation>(
        "SELECT station_code, station_name FROM route_stations WHERE route_id = ? ORDER BY position",
    )
    .bind(route_id)
    .fetch_all(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{status, test_pool};

    fn commute(name: &str, days: Vec<u8>, urgency: Urgency) -> NewRoute {
        NewRoute {
            owner_id: "user-1".to_string(),
            space_id: None,
            name: name.to_string(),
            origin_code: "ASD".to_string(),
            origin_name: "Amsterdam Centraal".to_string(),
            destination_code: "UT".to_string(),
            destination_name: "Utrecht Centraal".to_string(),
            schedule_days: days,
            departure_time: "08:00".to_string(),
            urgency,
            stations: vec![
                ("ASD".to_string(), "Amsterdam Centraal".to_string()),
                ("ASA".to_string(), "Amsterdam Amstel".to_string()),
                ("UT".to_string(), "Utrecht Centraal".to_string()),
            ],
        }
    }

    #[tokio::test]
    async fn test_create_stores_path_and_status_row() {
        let pool = test_pool().await;

        let route = create(&pool, &commute("Werk", vec![1, 2, 3, 4, 5], Urgency::Important))
            .await
            .unwrap();

        assert_eq!(route.days(), vec![1, 2, 3, 4, 5]);
        assert_eq!(route.urgency(), Urgency::Important);
        assert!(route.runs_on(1));
        assert!(!route.runs_on(0));

        let path = stations_for(&pool, route.id).await.unwrap();
        let codes: Vec<&str> = path.iter().map(|s| s.station_code.as_str()).collect();
        assert_eq!(codes, vec!["ASD", "ASA", "UT"]);

        let status = status::find(&pool, route.id).await.unwrap().unwrap();
        assert!(status.last_checked_at.is_none());
        assert!(!status.has_active_disruptions);
        assert!(!status.changed_since_last_view);
    }

    #[tokio::test]
    async fn test_update_touches_only_mutable_fields() {
        let pool = test_pool().await;
        let route = create(&pool, &commute("Werk", vec![1], Urgency::Normal))
            .await
            .unwrap();

        let updated = update(
            &pool,
            route.id,
            &RouteChanges {
                name: "Werk (laat)".to_string(),
                schedule_days: vec![2, 4],
                departure_time: "09:30".to_string(),
                urgency: Urgency::Important,
            },
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(updated.name, "Werk (laat)");
        assert_eq!(updated.days(), vec![2, 4]);
        assert_eq!(updated.departure_time, "09:30");
        assert_eq!(updated.urgency(), Urgency::Important);
        assert_eq!(updated.origin_code, "ASD");

        let missing = update(
            &pool,
            9999,
            &RouteChanges {
                name: "x".to_string(),
                schedule_days: vec![0],
                departure_time: "07:00".to_string(),
                urgency: Urgency::Normal,
            },
        )
        .await
        .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_delete_removes_route_and_children() {
        let pool = test_pool().await;
        let route = create(&pool, &commute("Werk", vec![1], Urgency::Normal))
            .await
            .unwrap();

        assert!(delete(&pool, route.id).await.unwrap());
        assert!(find(&pool, route.id).await.unwrap().is_none());
        assert!(stations_for(&pool, route.id).await.unwrap().is_empty());
        assert!(status::find(&pool, route.id).await.unwrap().is_none());

        assert!(!delete(&pool, route.id).await.unwrap());
    }
}
