//! Route disruption checking and cache reconciliation.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::monitor::types::{
    CheckOutcome, CheckStats, DisruptionRecord, DisruptionType, MonitorError,
};
use crate::providers::transit::{TransitClient, TransitDisruption};
use crate::store::{disruptions, routes, status};

/// Run a full check for one route: fetch the provider's journey report and
/// reconcile the cache against it. Provider failures abort before any write,
/// leaving cached records and status untouched.
pub async fn run_check(
    pool: &SqlitePool,
    client: &TransitClient,
    route_id: i64,
    now: DateTime<Utc>,
) -> Result<CheckOutcome, MonitorError> {
    let Some(route) = routes::find(pool, route_id).await? else {
        return Ok(CheckOutcome::RouteGone);
    };

    let reported = client
        .journey_disruptions(&route.origin_code, &route.destination_code)
        .await?;

    let path = routes::stations_for(pool, route_id).await?;
    let mut path_codes: HashSet<String> = path.into_iter().map(|s| s.station_code).collect();
    path_codes.insert(route.origin_code.clone());
    path_codes.insert(route.destination_code.clone());

    let records = to_records(reported, &path_codes);
    let stats = reconcile(pool, route_id, &records, now).await?;

    Ok(CheckOutcome::Completed(stats))
}

/// Normalise provider records, keeping the ones relevant to this route's
/// path. An empty affected-station list means journey-scoped; a non-empty
/// list must intersect the path.
fn to_records(
    reported: Vec<TransitDisruption>,
    path_codes: &HashSet<String>,
) -> Vec<DisruptionRecord> {
    let mut records = Vec::new();

    for disruption in reported {
        let Some(id) = disruption.id else {
            debug!("Skipping disruption without id");
            continue;
        };

        if !disruption.affected_stations.is_empty()
            && !disruption
                .affected_stations
                .iter()
                .any(|code| path_codes.contains(code))
        {
            debug!(disruption_id = %id, "Skipping disruption outside the route path");
            continue;
        }

        let travel_time = disruption.additional_travel_time;
        records.push(DisruptionRecord {
            disruption_id: id,
            disruption_type: disruption.disruption_type.unwrap_or(DisruptionType::Unknown),
            title: disruption.title.unwrap_or_default(),
            description: disruption.description,
            period: disruption.period,
            advice: disruption.advice,
            travel_time_label: travel_time.as_ref().and_then(|t| t.label.clone()),
            travel_time_short_label: travel_time.as_ref().and_then(|t| t.short_label.clone()),
            travel_time_min: travel_time.as_ref().and_then(|t| t.min),
            travel_time_max: travel_time.as_ref().and_then(|t| t.max),
            cause_label: disruption.cause_label,
            impact_value: disruption.impact_value,
            alternative_transport_label: disruption.alternative_transport_label,
            affected_stations: disruption.affected_stations,
        });
    }

    records
}

/// md5 over the mutable presentation fields. A field separator keeps
/// adjacent values from aliasing, and absent values hash distinctly from
/// empty strings.
pub(crate) fn content_fingerprint(record: &DisruptionRecord) -> String {
    let mut buf = String::new();

    let mut push_field = |value: Option<&str>| {
        match value {
            Some(v) => {
                buf.push('1');
                buf.push_str(v);
            }
            None => buf.push('0'),
        }
        buf.push('\x1f');
    };

    push_field(Some(&record.title));
    push_field(record.description.as_deref());
    push_field(record.period.as_deref());
    push_field(record.advice.as_deref());
    push_field(record.travel_time_label.as_deref());
    push_field(record.travel_time_short_label.as_deref());
    push_field(record.travel_time_min.map(|v| v.to_string()).as_deref());
    push_field(record.travel_time_max.map(|v| v.to_string()).as_deref());
    push_field(record.cause_label.as_deref());
    push_field(record.impact_value.map(|v| v.to_string()).as_deref());
    push_field(record.alternative_transport_label.as_deref());

    format!("{:x}", md5::compute(buf.as_bytes()))
}

/// Reconcile one provider report against the cache in a single transaction.
/// Order matters: upserts first, then retirement of stale records, then the
/// status row.
pub async fn reconcile(
    pool: &SqlitePool,
    route_id: i64,
    records: &[DisruptionRecord],
    now: DateTime<Utc>,
) -> Result<CheckStats, sqlx::Error> {
    let now_str = now.to_rfc3339();
    let mut tx = pool.begin().await?;

    let existing = disruptions::cached_for_route(&mut tx, route_id).await?;
    let by_id: HashMap<&str, &disruptions::CachedDisruption> = existing
        .iter()
        .map(|row| (row.disruption_id.as_str(), row))
        .collect();

    let mut stats = CheckStats::default();
    let mut seen: HashSet<&str> = HashSet::new();

    for record in records {
        let hash = content_fingerprint(record);
        seen.insert(record.disruption_id.as_str());

        match by_id.get(record.disruption_id.as_str()) {
            None => {
                disruptions::insert(&mut tx, route_id, record, &hash, &now_str).await?;
                stats.inserted += 1;
            }
            Some(row) if row.content_hash != hash => {
                disruptions::update(&mut tx, row.id, record, &hash, &now_str).await?;
                stats.updated += 1;
            }
            // Also covers a retired record returning unchanged: touch flips
            // it back active without raising the changed flag.
            Some(row) => {
                disruptions::touch(&mut tx, row.id, &now_str).await?;
                stats.refreshed += 1;
            }
        }
    }

    for row in existing
        .iter()
        .filter(|row| row.is_active && !seen.contains(row.disruption_id.as_str()))
    {
        disruptions::retire(&mut tx, row.id).await?;
        stats.retired += 1;
    }

    stats.changed = stats.inserted + stats.updated + stats.retired > 0;
    stats.active = disruptions::active_count(&mut tx, route_id).await?;

    status::apply_check(&mut tx, route_id, &now_str, stats.active > 0, stats.changed).await?;

    tx.commit().await?;

    Ok(stats)
}
