//! Station directory cache, bulk-refreshed from the transit provider.

use sqlx::{Sqlite, SqlitePool, Transaction};

/// A station row from the directory cache
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Station {
    pub code: String,
    pub uic_code: Option<String>,
    pub name_long: String,
    pub name_medium: Option<String>,
    pub name_short: Option<String>,
    /// JSON array of alternative names
    pub synonyms: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub country: Option<String>,
    pub updated_at: String,
}

impl Station {
    pub fn synonym_list(&self) -> Vec<String> {
        serde_json::from_str(&self.synonyms).unwrap_or_default()
    }
}

/// A station as prepared for upsert by the sync job
#[derive(Debug, Clone)]
pub struct NewStation {
    pub code: String,
    pub uic_code: Option<String>,
    pub name_long: String,
    pub name_medium: Option<String>,
    pub name_short: Option<String>,
    pub synonyms: Vec<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub country: Option<String>,
}

/// Upsert stations by code. Stations absent from the slice are left alone;
/// the directory is never pruned by a sync.
pub async fn upsert_bulk(
    tx: &mut Transaction<'_, Sqlite>,
    stations: &[NewStation],
    now: &str,
) -> Result<(), sqlx::Error> {
    for station in stations {
        let synonyms =
            serde_json::to_string(&station.synonyms).unwrap_or_else(|_| "[]".to_string());

        sqlx::query(
            r#"
            INSERT INTO stations (code, uic_code, name_long, name_medium, name_short, synonyms, lat, lng, country, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(code) DO UPDATE SET
                uic_code = excluded.uic_code,
                name_long = excluded.name_long,
                name_medium = excluded.name_medium,
                name_short = excluded.name_short,
                synonyms = excluded.synonyms,
                lat = excluded.lat,
                lng = excluded.lng,
                country = excluded.country,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&station.code)
        .bind(&station.uic_code)
        .bind(&station.name_long)
        .bind(&station.name_medium)
        .bind(&station.name_short)
        .bind(&synonyms)
        .bind(station.lat)
        .bind(station.lng)
        .bind(&station.country)
        .bind(now)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

/// Case-insensitive substring search over station names and codes.
pub async fn search(
    pool: &SqlitePool,
    query: Option<&str>,
    limit: i64,
) -> Result<Vec<Station>, sqlx::Error> {
    match query {
        Some(q) if !q.trim().is_empty() => {
            let pattern = format!("%{}%", q.trim());
            sqlx::query_as::<_, Station>(
                r#"
                SELECT * FROM stations
                WHERE name_long LIKE ? OR name_medium LIKE ? OR code LIKE ?
                ORDER BY name_long
                LIMIT ?
                "#,
            )
            .bind(&pattern)
            .bind(&pattern)
            .bind(&pattern)
            .bind(limit)
            .fetch_all(pool)
            .await
        }
        _ => {
            sqlx::query_as::<_, Station>("SELECT * FROM stations ORDER BY name_long LIMIT ?")
                .bind(limit)
                .fetch_all(pool)
                .await
        }
    }
}

pub async fn find(pool: &SqlitePool, code: &str) -> Result<Option<Station>, sqlx::Error> {
    sqlx::query_as::<_, Station>("SELECT * FROM stations WHERE code = ?")
        .bind(code)
        .fetch_optional(pool)
        .await
}

pub async fn count(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM stations")
        .fetch_one(pool)
        .await
}

/// Timestamp of the most recent sync, if any station has been stored.
pub async fn last_synced(pool: &SqlitePool) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar("SELECT MAX(updated_at) FROM stations")
        .fetch_one(pool)
        .await
}
