//! HTTP client for the transit provider.
//!
//! Two endpoints matter here: the station directory (bulk-synced into the
//! local cache) and the trip search, whose journey options carry the
//! disruption records the checker reconciles against.

pub mod error;
pub mod types;

use std::collections::HashSet;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::TransitConfig;

pub use error::TransitError;
pub use types::{TransitDisruption, TransitStation, TripOption};

use types::{StationsResponse, TripsResponse};

#[derive(Clone)]
pub struct TransitClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl TransitClient {
    pub fn new(config: &TransitConfig) -> Result<Self, TransitError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, context: &str) -> Result<T, TransitError> {
        let mut request = self.client.get(url);
        if !self.api_key.is_empty() {
            request = request.header("x-api-key", &self.api_key);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                "Transit API returned {} for {}: {}",
                status,
                context,
                log_excerpt(&body)
            );
            return Err(TransitError::ApiError(format!("HTTP error: {}", status)));
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            warn!(
                "Failed to parse transit response for {}: {} - body: {}",
                context,
                e,
                log_excerpt(&body)
            );
            TransitError::ParseError(e.to_string())
        })
    }

    /// Fetch the full station directory.
    pub async fn stations(&self) -> Result<Vec<TransitStation>, TransitError> {
        let url = format!("{}/stations", self.base_url);
        let response: StationsResponse = self.get_json(&url, "stations").await?;
        debug!(count = response.payload.len(), "Fetched station directory");
        Ok(response.payload)
    }

    /// Search journey options between two station codes.
    pub async fn search_trips(&self, from: &str, to: &str) -> Result<Vec<TripOption>, TransitError> {
        let url = format!(
            "{}/trips?fromStation={}&toStation={}",
            self.base_url,
            urlencoding::encode(from),
            urlencoding::encode(to)
        );
        let response: TripsResponse = self.get_json(&url, "trips").await?;
        Ok(response.trips)
    }

    /// Disruptions attached to any journey option between two stations,
    /// de-duplicated by provider id.
    ///
    /// Zero journey options is `NoJourney` so callers can tell a failed
    /// lookup apart from a clean all-clear report (options without
    /// disruptions).
    pub async fn journey_disruptions(
        &self,
        from: &str,
        to: &str,
    ) -> Result<Vec<TransitDisruption>, TransitError> {
        let trips = self.search_trips(from, to).await?;
        if trips.is_empty() {
            return Err(TransitError::NoJourney);
        }
        Ok(collect_disruptions(trips))
    }
}

/// First 500 characters of a response body for the warn logs. Cutting at a
/// byte index would panic inside a multibyte character.
fn log_excerpt(body: &str) -> &str {
    body.char_indices()
        .nth(500)
        .map_or(body, |(end, _)| &body[..end])
}

/// Flatten the per-option disruption lists into one, keeping the first
/// occurrence of each provider id. Records without an id are dropped here;
/// they cannot be cached or de-duplicated.
fn collect_disruptions(trips: Vec<TripOption>) -> Vec<TransitDisruption> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut disruptions = Vec::new();

    for trip in trips {
        for disruption in trip.disruptions {
            let Some(id) = disruption.id.clone() else {
                debug!("Skipping disruption without id");
                continue;
            };
            if seen.insert(id) {
                disruptions.push(disruption);
            }
        }
    }

    disruptions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trip_with_disruption_ids(ids: &[Option<&str>]) -> TripOption {
        let disruptions = ids
            .iter()
            .map(|id| {
                serde_json::from_value(serde_json::json!({
                    "id": id,
                    "title": "Engineering works"
                }))
                .unwrap()
            })
            .collect();

        TripOption {
            planned_duration_minutes: None,
            transfers: None,
            legs: Vec::new(),
            disruptions,
        }
    }

    #[test]
    fn test_collect_disruptions_dedupes_across_options() {
        let trips = vec![
            trip_with_disruption_ids(&[Some("a"), Some("b")]),
            trip_with_disruption_ids(&[Some("b"), Some("c")]),
        ];

        let collected = collect_disruptions(trips);
        let ids: Vec<&str> = collected.iter().filter_map(|d| d.id.as_deref()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_collect_disruptions_drops_records_without_id() {
        let trips = vec![trip_with_disruption_ids(&[None, Some("a")])];

        let collected = collect_disruptions(trips);
        assert_eq!(collected.len(), 1);
        assert_eq!(collected[0].id.as_deref(), Some("a"));
    }

    #[test]
    fn test_log_excerpt_short_body_passes_through() {
        assert_eq!(log_excerpt("storing op het spoor"), "storing op het spoor");
    }

    #[test]
    fn test_log_excerpt_cuts_on_char_boundary() {
        // 'é' straddles bytes 499..501, right where a byte cut would land.
        let body = format!("{}én of andere zeer lange storingstekst", "a".repeat(499));

        let excerpt = log_excerpt(&body);
        assert_eq!(excerpt.chars().count(), 500);
        assert!(excerpt.ends_with('é'));
    }
}
