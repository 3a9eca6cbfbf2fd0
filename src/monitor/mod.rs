//! Background monitoring of commute routes.
//!
//! This module handles:
//! - Periodic refresh of the station directory from the transit provider
//! - Daily disruption sweeps at the configured wall-clock times
//! - One-shot follow-up checks in the run-up to each route's departure

pub mod checker;
pub mod schedule;
pub mod types;

pub use types::{
    CheckOutcome, DisruptionType, MonitorError, StatusUpdate, StatusUpdateSender, Urgency,
};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use sqlx::SqlitePool;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::providers::transit::TransitClient;
use crate::store::{routes, stations};

/// Scheduling knobs resolved from the configuration at startup
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub timezone: Tz,
    pub sweep_times: Vec<NaiveTime>,
    pub station_sync_interval: Duration,
}

/// Owns the background loops and the per-route scheduling state
pub struct Monitor {
    pool: SqlitePool,
    client: TransitClient,
    settings: MonitorSettings,
    /// One async mutex per route; checks for the same route serialise on it
    route_locks: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
    /// Pending follow-up timers per route, replaced wholesale on every sweep
    follow_ups: Mutex<HashMap<i64, Vec<JoinHandle<()>>>>,
    status_tx: StatusUpdateSender,
}

impl Monitor {
    pub fn new(pool: SqlitePool, client: TransitClient, settings: MonitorSettings) -> Self {
        // Capacity 16 - clients can re-read full status over HTTP anyway
        let (status_tx, _) = broadcast::channel(16);

        Self {
            pool,
            client,
            settings,
            route_locks: Mutex::new(HashMap::new()),
            follow_ups: Mutex::new(HashMap::new()),
            status_tx,
        }
    }

    /// Get the status update sender for passing to API handlers
    pub fn status_sender(&self) -> StatusUpdateSender {
        self.status_tx.clone()
    }

    /// Start the background loops
    pub async fn start(self: Arc<Self>) {
        info!("Starting route monitor");

        // Initial station sync on startup
        self.sync_stations_with_retry().await;

        // Spawn station sync loop
        let station_self = self.clone();
        let station_handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(station_self.settings.station_sync_interval);
            // Skip the first tick which fires immediately (we already synced above)
            interval.tick().await;

            loop {
                interval.tick().await;
                if let Err(e) = station_self.sync_stations().await {
                    error!(error = %e, "Station sync failed, waiting for next interval");
                }
            }
        });

        // Spawn sweep loop: a catch-up sweep right away, then sleep until
        // each configured wall-clock time
        let sweep_self = self.clone();
        let sweep_handle = tokio::spawn(async move {
            sweep_self.run_sweep().await;

            loop {
                let Some(next) = schedule::next_sweep_instant(
                    Utc::now(),
                    &sweep_self.settings.sweep_times,
                    sweep_self.settings.timezone,
                ) else {
                    warn!("No sweep times configured, sweep loop stopping");
                    return;
                };

                let wait = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);
                info!(next = %next, "Next disruption sweep scheduled");
                tokio::time::sleep(wait).await;

                sweep_self.run_sweep().await;
            }
        });

        // Wait for both loops (they run forever)
        let _ = tokio::join!(station_handle, sweep_handle);
    }

    /// Refresh the station directory from the provider. Upserts by station
    /// code; the directory is never pruned.
    async fn sync_stations(&self) -> Result<usize, MonitorError> {
        let reported = self.client.stations().await?;

        let mut records = Vec::with_capacity(reported.len());
        for station in reported {
            let Some(code) = station.code.clone() else {
                debug!("Skipping station without code");
                continue;
            };
            let name_long = station.display_name().unwrap_or(&code).to_string();

            records.push(stations::NewStation {
                code,
                uic_code: station.uic_code,
                name_long,
                name_medium: station.name_medium,
                name_short: station.name_short,
                synonyms: station.synonyms,
                lat: station.lat,
                lng: station.lng,
                country: station.country,
            });
        }

        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;
        stations::upsert_bulk(&mut tx, &records, &now).await?;
        tx.commit().await?;

        info!(count = records.len(), "Station directory synced");
        Ok(records.len())
    }

    /// Startup sync with retries; once the loops run, a failed sync just
    /// waits for the next interval tick.
    async fn sync_stations_with_retry(&self) {
        let max_retries = 5;
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.sync_stations().await {
                Ok(_) => break,
                Err(e) => {
                    if attempt >= max_retries {
                        error!(error = %e, attempts = attempt, "Failed to sync stations after max retries, skipping");
                        break;
                    }
                    let wait_secs = 30 * attempt;
                    error!(error = %e, attempt, wait_secs, "Failed to sync stations, retrying...");
                    tokio::time::sleep(Duration::from_secs(wait_secs as u64)).await;
                }
            }
        }
    }

    /// Check every route scheduled for today's weekday and (re)arm its
    /// follow-up timers. One route's failure never stops the sweep, and
    /// timers are armed even when the immediate check fails - they are the
    /// retry mechanism.
    async fn run_sweep(self: &Arc<Self>) {
        let now = Utc::now();
        let today = now.with_timezone(&self.settings.timezone).date_naive();
        let weekday = schedule::weekday_number(today);

        let all_routes = match routes::list_all(&self.pool).await {
            Ok(routes) => routes,
            Err(e) => {
                error!(error = %e, "Failed to load routes for sweep");
                return;
            }
        };

        let due: Vec<_> = all_routes
            .into_iter()
            .filter(|route| route.runs_on(weekday))
            .collect();
        info!(weekday, routes = due.len(), "Starting disruption sweep");

        for route in due {
            match self.check_route_now(route.id).await {
                Ok(CheckOutcome::Completed(stats)) => {
                    debug!(
                        route_id = route.id,
                        inserted = stats.inserted,
                        updated = stats.updated,
                        retired = stats.retired,
                        "Sweep check completed"
                    );
                }
                Ok(CheckOutcome::RouteGone) => continue,
                Err(e) => {
                    warn!(route_id = route.id, error = %e, "Check failed during sweep");
                }
            }

            self.schedule_follow_ups(&route, Utc::now()).await;
        }

        info!("Disruption sweep complete");
    }

    /// Run one serialised check for a route and broadcast the outcome.
    pub async fn check_route_now(&self, route_id: i64) -> Result<CheckOutcome, MonitorError> {
        let lock = self.route_lock(route_id).await;
        let _guard = lock.lock().await;

        let now = Utc::now();
        let outcome = checker::run_check(&self.pool, &self.client, route_id, now).await?;

        if let CheckOutcome::Completed(stats) = &outcome {
            info!(
                route_id,
                inserted = stats.inserted,
                updated = stats.updated,
                retired = stats.retired,
                active = stats.active,
                "Route check completed"
            );

            // Ignore send errors - they just mean no one is listening
            let _ = self.status_tx.send(StatusUpdate {
                route_id,
                has_active_disruptions: stats.active > 0,
                changed: stats.changed,
                timestamp: now.to_rfc3339(),
            });
        }

        Ok(outcome)
    }

    async fn route_lock(&self, route_id: i64) -> Arc<Mutex<()>> {
        let mut locks = self.route_locks.lock().await;
        locks
            .entry(route_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Arm one-shot follow-up timers for a route's departure today,
    /// replacing any timers still pending from an earlier sweep. A timer
    /// that fires for a deleted route is a no-op.
    pub async fn schedule_follow_ups(self: &Arc<Self>, route: &routes::Route, now: DateTime<Utc>) {
        let Some(departure_time) = schedule::parse_departure_time(&route.departure_time) else {
            warn!(
                route_id = route.id,
                departure_time = %route.departure_time,
                "Unparseable departure time, skipping follow-ups"
            );
            return;
        };

        let today = now.with_timezone(&self.settings.timezone).date_naive();
        let Some(departure) = schedule::civil_to_utc(today, departure_time, self.settings.timezone)
        else {
            warn!(route_id = route.id, "Departure time falls in a DST gap today, skipping follow-ups");
            return;
        };

        let delays = schedule::follow_up_delays(route.urgency(), departure, now);

        let mut follow_ups = self.follow_ups.lock().await;
        if let Some(old) = follow_ups.remove(&route.id) {
            for handle in old {
                handle.abort();
            }
        }

        if delays.is_empty() {
            debug!(route_id = route.id, "No follow-up checks to schedule");
            return;
        }

        debug!(
            route_id = route.id,
            count = delays.len(),
            urgency = route.urgency.as_str(),
            "Scheduling follow-up checks"
        );

        let mut handles = Vec::with_capacity(delays.len());
        for delay in delays {
            let monitor = self.clone();
            let route_id = route.id;
            handles.push(tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                match monitor.check_route_now(route_id).await {
                    Ok(CheckOutcome::Completed(_)) => {}
                    Ok(CheckOutcome::RouteGone) => {
                        debug!(route_id, "Follow-up fired for a deleted route");
                    }
                    Err(e) => {
                        warn!(route_id, error = %e, "Follow-up check failed");
                    }
                }
            }));
        }

        follow_ups.insert(route.id, handles);
    }

    /// Re-arm a route's timers after its schedule changed: armed for today
    /// when the route runs today, cancelled otherwise. The daily sweeps take
    /// over from tomorrow.
    pub async fn refresh_follow_ups(self: &Arc<Self>, route: &routes::Route) {
        let now = Utc::now();
        let today = now.with_timezone(&self.settings.timezone).date_naive();

        if route.runs_on(schedule::weekday_number(today)) {
            self.schedule_follow_ups(route, now).await;
        } else {
            self.cancel_follow_ups(route.id).await;
        }
    }

    /// Abort any pending follow-up timers for a route.
    pub async fn cancel_follow_ups(&self, route_id: i64) {
        let mut follow_ups = self.follow_ups.lock().await;
        if let Some(handles) = follow_ups.remove(&route_id) {
            for handle in handles {
                handle.abort();
            }
        }
    }

    /// Drop all scheduling state for a deleted route.
    pub async fn forget_route(&self, route_id: i64) {
        self.cancel_follow_ups(route_id).await;
        self.route_locks.lock().await.remove(&route_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransitConfig;
    use crate::store::test_pool;
    use chrono_tz::Europe::Amsterdam;

    fn test_monitor(pool: SqlitePool) -> Arc<Monitor> {
        let client = TransitClient::new(&TransitConfig {
            base_url: "http://localhost:9".to_string(),
            api_key: String::new(),
            timeout_secs: 1,
        })
        .unwrap();

        Arc::new(Monitor::new(
            pool,
            client,
            MonitorSettings {
                timezone: Amsterdam,
                sweep_times: Vec::new(),
                station_sync_interval: Duration::from_secs(3600),
            },
        ))
    }

    fn evening_route(id: i64, urgency: &str) -> routes::Route {
        routes::Route {
            id,
            owner_id: "user-1".to_string(),
            space_id: None,
            name: "Werk".to_string(),
            origin_code: "ASD".to_string(),
            origin_name: "Amsterdam Centraal".to_string(),
            destination_code: "UT".to_string(),
            destination_name: "Utrecht Centraal".to_string(),
            schedule_days: "[1]".to_string(),
            departure_time: "23:59".to_string(),
            urgency: urgency.to_string(),
            created_at: "2025-06-01T00:00:00+00:00".to_string(),
        }
    }

    #[tokio::test]
    async fn test_schedule_follow_ups_replaces_pending_timers() {
        let monitor = test_monitor(test_pool().await);
        let route = evening_route(1, "important");
        // Morning sweep time: 23:59 Amsterdam is hours away, all marks fit.
        let now: DateTime<Utc> = "2025-06-23T08:00:00Z".parse().unwrap();

        monitor.schedule_follow_ups(&route, now).await;
        {
            let follow_ups = monitor.follow_ups.lock().await;
            assert_eq!(follow_ups.get(&1).map(|h| h.len()), Some(17));
        }

        // A re-sweep must not double-book.
        monitor.schedule_follow_ups(&route, now).await;
        {
            let follow_ups = monitor.follow_ups.lock().await;
            assert_eq!(follow_ups.len(), 1);
            assert_eq!(follow_ups.get(&1).map(|h| h.len()), Some(17));
        }
    }

    #[tokio::test]
    async fn test_schedule_follow_ups_skips_bad_departure_time() {
        let monitor = test_monitor(test_pool().await);
        let mut route = evening_route(2, "normal");
        route.departure_time = "around nine".to_string();
        let now: DateTime<Utc> = "2025-06-23T08:00:00Z".parse().unwrap();

        monitor.schedule_follow_ups(&route, now).await;
        assert!(monitor.follow_ups.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_forget_route_cancels_timers() {
        let monitor = test_monitor(test_pool().await);
        let route = evening_route(3, "normal");
        let now: DateTime<Utc> = "2025-06-23T08:00:00Z".parse().unwrap();

        monitor.schedule_follow_ups(&route, now).await;
        assert!(!monitor.follow_ups.lock().await.is_empty());

        monitor.forget_route(3).await;
        assert!(monitor.follow_ups.lock().await.is_empty());
        assert!(monitor.route_locks.lock().await.is_empty());
    }
}
