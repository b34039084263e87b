//! Sync-side configuration: InfluxDB target, device tag and window settings.

use secrecy::SecretString;
use std::net::SocketAddr;

use crate::error::SyncError;

pub const DEFAULT_DEVICE_NAME: &str = "Fitbit";
pub const DEFAULT_BUCKET: &str = "fitbit";
pub const DEFAULT_TRAILING_DAYS: u32 = 1;

#[derive(Clone, Debug)]
pub struct SyncConfig {
    /// Base URL of the InfluxDB server, scheme included.
    pub influx_url: String,
    pub influx_bucket: String,
    pub influx_org: String,
    pub influx_token: SecretString,
    pub device_name: String,
    /// IANA name; the profile timezone is used when unset.
    pub timezone: Option<String>,
    pub trailing_days: u32,
    pub max_buffered_points: Option<usize>,
    pub metrics_address: Option<SocketAddr>,
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn parse_opt<T: std::str::FromStr>(key: &str, raw: Option<String>) -> Result<Option<T>, SyncError> {
    non_empty(raw)
        .map(|s| {
            s.parse::<T>()
                .map_err(|_| SyncError::Config(format!("{key} invalid: {s}")))
        })
        .transpose()
}

/// `host[:port]`, defaulting to plain HTTP when no scheme is given.
fn influx_url(host: &str, port: Option<&str>) -> String {
    let host = host.trim_end_matches('/');
    let base = if host.contains("://") {
        host.to_string()
    } else {
        format!("http://{host}")
    };
    match port {
        Some(port) => format!("{base}:{port}"),
        None => base,
    }
}

impl SyncConfig {
    pub fn from_env() -> Result<Self, SyncError> {
        Self::from_env_with(|k| std::env::var(k).ok())
    }

    /// Testable helper that reads configuration values using the provided
    /// function instead of the process environment.
    pub fn from_env_with<F>(mut get: F) -> Result<Self, SyncError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let host = non_empty(get("INFLUXDB_HOST"))
            .ok_or_else(|| SyncError::Config("INFLUXDB_HOST missing".into()))?;
        let port = non_empty(get("INFLUXDB_PORT"));
        let influx_token = non_empty(get("INFLUXDB_TOKEN"))
            .ok_or_else(|| SyncError::Config("INFLUXDB_TOKEN missing".into()))?;

        Ok(Self {
            influx_url: influx_url(&host, port.as_deref()),
            influx_bucket: non_empty(get("INFLUXDB_BUCKET"))
                .unwrap_or_else(|| DEFAULT_BUCKET.into()),
            influx_org: non_empty(get("INFLUXDB_ORGANIZATION")).unwrap_or_default(),
            influx_token: SecretString::new(influx_token.into()),
            device_name: non_empty(get("DEVICENAME"))
                .unwrap_or_else(|| DEFAULT_DEVICE_NAME.into()),
            timezone: non_empty(get("TIMEZONE")),
            trailing_days: parse_opt("AUTO_UPDATE_DATE_RANGE", get("AUTO_UPDATE_DATE_RANGE"))?
                .unwrap_or(DEFAULT_TRAILING_DAYS),
            max_buffered_points: parse_opt::<usize>(
                "MAX_BUFFERED_POINTS",
                get("MAX_BUFFERED_POINTS"),
            )?
            .filter(|n| *n > 0),
            metrics_address: parse_opt("METRICS_ADDRESS", get("METRICS_ADDRESS"))?,
        })
    }
}
