//! Type definitions for the monitor module.

use crate::providers::transit::TransitError;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use utoipa::ToSchema;

/// How aggressively a route is re-checked ahead of departure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Normal,
    Important,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Normal => "normal",
            Urgency::Important => "important",
        }
    }

    /// Parse a stored value; unknown strings fall back to normal.
    pub fn parse(value: &str) -> Self {
        match value {
            "important" => Urgency::Important,
            _ => Urgency::Normal,
        }
    }
}

/// Disruption category as reported by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisruptionType {
    Maintenance,
    Disruption,
    Calamity,
    #[serde(other)]
    Unknown,
}

impl DisruptionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisruptionType::Maintenance => "MAINTENANCE",
            DisruptionType::Disruption => "DISRUPTION",
            DisruptionType::Calamity => "CALAMITY",
            DisruptionType::Unknown => "UNKNOWN",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "MAINTENANCE" => DisruptionType::Maintenance,
            "DISRUPTION" => DisruptionType::Disruption,
            "CALAMITY" => DisruptionType::Calamity,
            _ => DisruptionType::Unknown,
        }
    }
}

/// A provider disruption normalised for the cache, already filtered for
/// relevance to one route
#[derive(Debug, Clone, PartialEq)]
pub struct DisruptionRecord {
    pub disruption_id: String,
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
}

/// Per-check reconciliation counts
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckStats {
    pub inserted: usize,
    pub updated: usize,
    pub refreshed: usize,
    pub retired: usize,
    /// Active disruption count after reconciliation
    pub active: i64,
    /// Whether this check inserted, updated or retired anything
    pub changed: bool,
}

/// Result of a disruption check
#[derive(Debug, Clone, Copy)]
pub enum CheckOutcome {
    Completed(CheckStats),
    /// The route was deleted while the check was pending; nothing was written
    RouteGone,
}

/// Errors from the monitor's background work
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("transit provider error: {0}")]
    Provider(#[from] TransitError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Notification emitted after every completed check
#[derive(Debug, Clone, Serialize)]
pub struct StatusUpdate {
    pub route_id: i64,
    pub has_active_disruptions: bool,
    /// Whether this particular check changed the cache
    pub changed: bool,
    /// Timestamp when the check completed
    pub timestamp: String,
}

/// Sender for route status notifications
pub type StatusUpdateSender = broadcast::Sender<StatusUpdate>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urgency_round_trip() {
        assert_eq!(Urgency::parse(Urgency::Important.as_str()), Urgency::Important);
        assert_eq!(Urgency::parse(Urgency::Normal.as_str()), Urgency::Normal);
        assert_eq!(Urgency::parse("something-else"), Urgency::Normal);
    }

    #[test]
    fn test_disruption_type_parse() {
        assert_eq!(DisruptionType::parse("CALAMITY"), DisruptionType::Calamity);
        assert_eq!(DisruptionType::parse("wind"), DisruptionType::Unknown);
    }

    #[test]
    fn test_disruption_type_deserializes_unknown_values() {
        let parsed: DisruptionType = serde_json::from_str("\"POWER_OUTAGE\"").unwrap();
        assert_eq!(parsed, DisruptionType::Unknown);
    }

    #[test]
    fn test_monitor_error_display() {
        let err = MonitorError::Provider(TransitError::NoJourney);
        assert!(err.to_string().contains("transit provider error"));
    }
}
