//! Response structures for the transit provider API.

use crate::monitor::types::DisruptionType;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct StationsResponse {
    #[serde(default)]
    pub payload: Vec<TransitStation>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransitStation {
    pub code: Option<String>,
    #[serde(rename = "uicCode")]
    pub uic_code: Option<String>,
    #[serde(rename = "nameLong")]
    pub name_long: Option<String>,
    #[serde(rename = "nameMedium")]
    pub name_medium: Option<String>,
    #[serde(rename = "nameShort")]
    pub name_short: Option<String>,
    #[serde(default)]
    pub synonyms: Vec<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub country: Option<String>,
}

impl TransitStation {
    /// Best available display name
    pub fn display_name(&self) -> Option<&str> {
        self.name_long
            .as_deref()
            .or(self.name_medium.as_deref())
            .or(self.name_short.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TripsResponse {
    #[serde(default)]
    pub trips: Vec<TripOption>,
}

/// One journey option from the trip search
#[derive(Debug, Clone, Deserialize)]
pub struct TripOption {
    #[serde(rename = "plannedDurationInMinutes")]
    pub planned_duration_minutes: Option<i64>,
    pub transfers: Option<i64>,
    #[serde(default)]
    pub legs: Vec<TripLeg>,
    #[serde(default)]
    pub disruptions: Vec<TransitDisruption>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TripLeg {
    pub origin: Option<TripStop>,
    pub destination: Option<TripStop>,
    /// Intermediate stops between origin and destination of this leg
    #[serde(default)]
    pub stops: Vec<TripStop>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TripStop {
    pub code: Option<String>,
    pub name: Option<String>,
}

/// A station on a journey option's path, in travel order
#[derive(Debug, Clone, PartialEq)]
pub struct PathStop {
    pub code: String,
    pub name: String,
}

impl TripOption {
    /// Ordered station path across all legs. Transfer stations appear once
    /// (leg boundaries repeat them); stops without a code are skipped.
    pub fn station_path(&self) -> Vec<PathStop> {
        let mut path: Vec<PathStop> = Vec::new();

        for leg in &self.legs {
            let stops = leg
                .origin
                .iter()
                .chain(leg.stops.iter())
                .chain(leg.destination.iter());

            for stop in stops {
                let Some(code) = stop.code.as_deref() else {
                    continue;
                };
                if path.last().map_or(false, |prev| prev.code == code) {
                    continue;
                }
                path.push(PathStop {
                    code: code.to_string(),
                    name: stop.name.clone().unwrap_or_else(|| code.to_string()),
                });
            }
        }

        path
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransitDisruption {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub disruption_type: Option<DisruptionType>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub period: Option<String>,
    pub advice: Option<String>,
    #[serde(rename = "additionalTravelTime")]
    pub additional_travel_time: Option<AdditionalTravelTime>,
    #[serde(rename = "causeLabel")]
    pub cause_label: Option<String>,
    #[serde(rename = "impactValue")]
    pub impact_value: Option<i64>,
    #[serde(rename = "alternativeTransportLabel")]
    pub alternative_transport_label: Option<String>,
    /// Station codes the disruption applies to; empty means journey-wide
    #[serde(default, rename = "affectedStations")]
    pub affected_stations: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdditionalTravelTime {
    pub label: Option<String>,
    #[serde(rename = "shortLabel")]
    pub short_label: Option<String>,
    /// Extra travel time in minutes
    pub min: Option<i64>,
    pub max: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_stations_response() {
        let json = r#"{
            "payload": [
                {
                    "code": "ASD",
                    "uicCode": "8400058",
                    "nameLong": "Amsterdam Centraal",
                    "nameMedium": "Amsterdam C.",
                    "nameShort": "Adam C",
                    "synonyms": ["Amsterdam CS"],
                    "lat": 52.3791,
                    "lng": 4.9003,
                    "country": "NL"
                },
                { "code": "UT", "nameLong": "Utrecht Centraal" }
            ]
        }"#;

        let response: StationsResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.payload.len(), 2);
        assert_eq!(response.payload[0].code.as_deref(), Some("ASD"));
        assert_eq!(response.payload[0].synonyms, vec!["Amsterdam CS"]);
        assert!(response.payload[1].synonyms.is_empty());
        assert_eq!(response.payload[1].display_name(), Some("Utrecht Centraal"));
    }

    #[test]
    fn test_parse_trip_with_disruption() {
        let json = r#"{
            "trips": [
                {
                    "plannedDurationInMinutes": 38,
                    "transfers": 0,
                    "legs": [
                        {
                            "origin": { "code": "ASD", "name": "Amsterdam Centraal" },
                            "destination": { "code": "UT", "name": "Utrecht Centraal" },
                            "stops": [
                                { "code": "ASA", "name": "Amsterdam Amstel" }
                            ]
                        }
                    ],
                    "disruptions": [
                        {
                            "id": "span-7001",
                            "type": "MAINTENANCE",
                            "title": "Engineering works",
                            "period": "Mon 23 June until Fri 27 June",
                            "advice": "Travel via Hilversum",
                            "additionalTravelTime": {
                                "label": "Journey takes 15 minutes longer",
                                "shortLabel": "+15 min",
                                "min": 10,
                                "max": 15
                            },
                            "causeLabel": "engineering works",
                            "impactValue": 3,
                            "affectedStations": ["ASA", "UT"]
                        }
                    ]
                }
            ]
        }"#;

        let response: TripsResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.trips.len(), 1);

        let trip = &response.trips[0];
        assert_eq!(trip.planned_duration_minutes, Some(38));

        let disruption = &trip.disruptions[0];
        assert_eq!(disruption.id.as_deref(), Some("span-7001"));
        assert_eq!(disruption.disruption_type, Some(DisruptionType::Maintenance));
        assert_eq!(
            disruption.additional_travel_time.as_ref().unwrap().max,
            Some(15)
        );
        assert_eq!(disruption.affected_stations, vec!["ASA", "UT"]);
    }

    #[test]
    fn test_station_path_collapses_transfer_stations() {
        let json = r#"{
            "legs": [
                {
                    "origin": { "code": "ASD", "name": "Amsterdam Centraal" },
                    "destination": { "code": "UT", "name": "Utrecht Centraal" },
                    "stops": [{ "code": "ASA", "name": "Amsterdam Amstel" }]
                },
                {
                    "origin": { "code": "UT", "name": "Utrecht Centraal" },
                    "destination": { "code": "EHV", "name": "Eindhoven Centraal" },
                    "stops": [{ "name": "unnamed stop without code" }]
                }
            ]
        }"#;

        let trip: TripOption = serde_json::from_str(json).unwrap();
        let path = trip.station_path();
        let codes: Vec<&str> = path.iter().map(|s| s.code.as_str()).collect();
        assert_eq!(codes, vec!["ASD", "ASA", "UT", "EHV"]);
    }

    #[test]
    fn test_parse_empty_trips_response() {
        let response: TripsResponse = serde_json::from_str(r#"{"trips": []}"#).unwrap();
        assert!(response.trips.is_empty());
    }
}
