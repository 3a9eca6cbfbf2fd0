//! Cached disruption records per route.
//!
//! Rows are keyed by (route_id, disruption_id) and survive retirement; a
//! record that disappears from the provider's report is flipped inactive,
//! not deleted, so clients can still show what was disrupting a route.

use crate::monitor::types::{DisruptionRecord, DisruptionType};
use sqlx::{Sqlite, SqlitePool, Transaction};

/// A cached disruption row
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Disruption {
    pub id: i64,
    pub route_id: i64,
    /// Provider's external id
    pub disruption_id: String,
    pub disruption_type: String,
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
    /// JSON array of station codes
    pub affected_stations: String,
    pub is_active: bool,
    pub first_seen: String,
    pub last_seen: String,
}

impl Disruption {
    pub fn disruption_type(&self) -> DisruptionType {
        DisruptionType::parse(&self.disruption_type)
    }

    pub fn affected_station_list(&self) -> Vec<String> {
        serde_json::from_str(&self.affected_stations).unwrap_or_default()
    }
}

/// Slim projection used by the reconciliation pass
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CachedDisruption {
    pub id: i64,
    pub disruption_id: String,
    pub content_hash: String,
    pub is_active: bool,
}

pub async fn for_route(pool: &SqlitePool, route_id: i64) -> Result<Vec<Disruption>, sqlx::Error> {
    sqlx::query_as::<_, Disruption>(
        "SELECT * FROM disruptions WHERE route_id = ? ORDER BY is_active DESC, last_seen DESC",
    )
    .bind(route_id)
    .fetch_all(pool)
    .await
}

pub async fn cached_for_route(
    tx: &mut Transaction<'_, Sqlite>,
    route_id: i64,
) -> Result<Vec<CachedDisruption>, sqlx::Error> {
    sqlx::query_as::<_, CachedDisruption>(
        "SELECT id, disruption_id, content_hash, is_active FROM disruptions WHERE route_id = ?",
    )
    .bind(route_id)
    .fetch_all(&mut **tx)
    .await
}

pub async fn insert(
    tx: &mut Transaction<'_, Sqlite>,
    route_id: i64,
    record: &DisruptionRecord,
    content_hash: &str,
    now: &str,
) -> Result<(), sqlx::Error> {
    let affected = serde_json::to_string(&record.affected_stations)
        .unwrap_or_else(|_| "[]".to_string());

    sqlx::query(
        r#"
        INSERT INTO disruptions (route_id, disruption_id, disruption_type, title,
                                 description, period, advice, travel_time_label,
                                 travel_time_short_label, travel_time_min, travel_time_max,
                                 cause_label, impact_value, alternative_transport_label,
                                 affected_stations, content_hash, is_active, first_seen, last_seen)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?)
        "#,
    )
    .bind(route_id)
    .bind(&record.disruption_id)
    .bind(record.disruption_type.as_str())
    .bind(&record.title)
    .bind(&record.description)
    .bind(&record.period)
    .bind(&record.advice)
    .bind(&record.travel_time_label)
    .bind(&record.travel_time_short_label)
    .bind(record.travel_time_min)
    .bind(record.travel_time_max)
    .bind(&record.cause_label)
    .bind(record.impact_value)
    .bind(&record.alternative_transport_label)
    .bind(&affected)
    .bind(content_hash)
    .bind(now)
    .bind(now)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Overwrite a changed record in place, keeping its row id and first_seen.
pub async fn update(
    tx: &mut Transaction<'_, Sqlite>,
    row_id: i64,
    record: &DisruptionRecord,
    content_hash: &str,
    now: &str,
) -> Result<(), sqlx::Error> {
    let affected = serde_json::to_string(&record.affected_stations)
        .unwrap_or_else(|_| "[]".to_string());

    sqlx::query(
        r#"
        UPDATE disruptions SET
            disruption_type = ?,
            title = ?,
            description = ?,
            period = ?,
            advice = ?,
            travel_time_label = ?,
            travel_time_short_label = ?,
            travel_time_min = ?,
            travel_time_max = ?,
            cause_label = ?,
            impact_value = ?,
            alternative_transport_label = ?,
            affected_stations = ?,
            content_hash = ?,
            is_active = 1,
            last_seen = ?
        WHERE id = ?
        "#,
    )
    .bind(record.disruption_type.as_str())
    .bind(&record.title)
    .bind(&record.description)
    .bind(&record.period)
    .bind(&record.advice)
    .bind(&record.travel_time_label)
    .bind(&record.travel_time_short_label)
    .bind(record.travel_time_min)
    .bind(record.travel_time_max)
    .bind(&record.cause_label)
    .bind(record.impact_value)
    .bind(&record.alternative_transport_label)
    .bind(&affected)
    .bind(content_hash)
    .bind(now)
    .bind(row_id)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Refresh last_seen for an unchanged record.
pub async fn touch(
    tx: &mut Transaction<'_, Sqlite>,
    row_id: i64,
    now: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE disruptions SET last_seen = ?, is_active = 1 WHERE id = ?")
        .bind(now)
        .bind(row_id)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

/// Flip an active record inactive. The row and its last_seen stay.
pub async fn retire(tx: &mut Transaction<'_, Sqlite>, row_id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE disruptions SET is_active = 0 WHERE id = ?")
        .bind(row_id)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

pub async fn active_count(
    tx: &mut Transaction<'_, Sqlite>,
    route_id: i64,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM disruptions WHERE route_id = ? AND is_active = 1")
        .bind(route_id)
        .fetch_one(&mut **tx)
        .await
}
