//! Typed repository functions over the SQLite pool.

pub mod disruptions;
pub mod routes;
pub mod stations;
pub mod status;

#[cfg(test)]
pub(crate) async fn test_pool() -> sqlx::SqlitePool {
    // A single connection keeps the in-memory database alive across acquires.
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    pool
}
