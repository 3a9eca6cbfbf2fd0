use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// IANA timezone all schedules are expressed in, e.g. "Europe/Amsterdam"
    pub timezone: String,
    /// Allowed CORS origins. Required unless cors_permissive is true.
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Explicitly allow all origins (development only). Defaults to false.
    #[serde(default)]
    pub cors_permissive: bool,
    /// Transit provider API configuration
    pub transit: TransitConfig,
    /// Monitoring schedule configuration
    #[serde(default)]
    pub monitor: MonitorConfig,
}

/// Configuration for the transit provider API
#[derive(Debug, Clone, Deserialize)]
pub struct TransitConfig {
    /// Base URL of the provider API
    pub base_url: String,
    /// API key sent as the x-api-key header. Empty leaves the header off.
    #[serde(default)]
    pub api_key: String,
    /// Request timeout in seconds (default: 20)
    #[serde(default = "TransitConfig::default_timeout_secs")]
    pub timeout_secs: u64,
}

impl TransitConfig {
    fn default_timeout_secs() -> u64 {
        20
    }
}

/// Configuration for the disruption monitor's schedules
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    /// Wall-clock times ("HH:MM", in `timezone`) of the daily sweeps
    #[serde(default = "MonitorConfig::default_sweep_times")]
    pub sweep_times: Vec<String>,
    /// Interval in hours between station directory syncs (default: 24)
    #[serde(default = "MonitorConfig::default_station_sync_interval_hours")]
    pub station_sync_interval_hours: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            sweep_times: Self::default_sweep_times(),
            station_sync_interval_hours: Self::default_station_sync_interval_hours(),
        }
    }
}

impl MonitorConfig {
    fn default_sweep_times() -> Vec<String> {
        vec!["05:00".to_string(), "06:00".to_string()]
    }
    fn default_station_sync_interval_hours() -> u64 {
        24
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::ReadError(e.to_string()))?;

        serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Parse the configured IANA timezone name.
    pub fn timezone(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse()
            .map_err(|_| ConfigError::InvalidTimezone(self.timezone.clone()))
    }

    /// Parse the configured sweep times as civil times of day.
    pub fn parsed_sweep_times(&self) -> Result<Vec<NaiveTime>, ConfigError> {
        self.monitor
            .sweep_times
            .iter()
            .map(|raw| {
                NaiveTime::parse_from_str(raw, "%H:%M")
                    .map_err(|_| ConfigError::InvalidSweepTime(raw.clone()))
            })
            .collect()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),
    #[error("Failed to parse config: {0}")]
    ParseError(String),
    #[error("Unknown timezone: {0}")]
    InvalidTimezone(String),
    #[error("Invalid sweep time (expected HH:MM): {0}")]
    InvalidSweepTime(String),
}
