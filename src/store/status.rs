//! Per-route check status.

use sqlx::{Sqlite, SqlitePool, Transaction};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RouteStatus {
    pub last_checked_at: Option<String>,
    pub has_active_disruptions: bool,
    pub changed_since_last_view: bool,
}

pub async fn find(pool: &SqlitePool, route_id: i64) -> Result<Option<RouteStatus>, sqlx::Error> {
    sqlx::query_as::<_, RouteStatus>("SELECT * FROM route_status WHERE route_id = ?")
        .bind(route_id)
        .fetch_optional(pool)
        .await
}

/// Record the outcome of a check. The changed flag only ever latches on
/// here; mark_viewed is the single place that clears it.
pub async fn apply_check(
    tx: &mut Transaction<'_, Sqlite>,
    route_id: i64,
    checked_at: &str,
    has_active: bool,
    changed: bool,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO route_status (route_id, last_checked_at, has_active_disruptions, changed_since_last_view)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(route_id) DO UPDATE SET
            last_checked_at = excluded.last_checked_at,
            has_active_disruptions = excluded.has_active_disruptions,
            changed_since_last_view = (changed_since_last_view OR excluded.changed_since_last_view)
        "#,
    )
    .bind(route_id)
    .bind(checked_at)
    .bind(has_active)
    .bind(changed)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Clear the changed flag. Returns false if the route has no status row.
pub async fn mark_viewed(pool: &SqlitePool, route_id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE route_status SET changed_since_last_view = 0 WHERE route_id = ?")
        .bind(route_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
