//! Metric extractors: one handler per [`Metric`], each turning a raw Fitbit
//! payload into canonical [`Point`]s.
//!
//! Raw JSON stops here. Handlers skip malformed entries one by one and return
//! an empty list when nothing usable is left.
//!
//! # Modules
//!
//! - [`intraday`]: heart rate and steps at second/minute resolution
//! - [`daily`]: HRV, breathing rate, skin temperature and SPO2
//! - [`sleep`]: sleep summaries and stage timelines
//! - [`activity`]: activity minutes, tracker totals, heart zones, activity log
//! - [`device`]: battery level and the account timezone

use chrono_tz::Tz;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::catalog::Metric;
use crate::point::Point;
use crate::window::DateWindow;

pub mod activity;
pub mod daily;
pub mod device;
pub mod intraday;
pub mod sleep;

/// Tag key carrying the configured device name.
pub const DEVICE_TAG: &str = "Device";

/// Everything an extractor needs besides the payload.
#[derive(Clone, Debug)]
pub struct ExtractContext<'a> {
    pub window: DateWindow,
    pub tz: Tz,
    pub device: &'a str,
}

pub fn extract(metric: Metric, raw: &Value, ctx: &ExtractContext<'_>) -> Vec<Point> {
    match metric {
        Metric::HeartRateIntraday => intraday::extract(raw, "heart", metric.label(), ctx),
        Metric::StepsIntraday => intraday::extract(raw, "steps", metric.label(), ctx),
        Metric::Hrv => daily::hrv(raw, ctx),
        Metric::BreathingRate => daily::breathing_rate(raw, ctx),
        Metric::SkinTemperature => daily::skin_temperature(raw, ctx),
        Metric::Spo2Intraday => daily::spo2_intraday(raw, ctx),
        Metric::Spo2Daily => daily::spo2_daily(raw, ctx),
        Metric::Sleep => sleep::extract(raw, ctx),
        Metric::ActivityMinutes(kind) => activity::minutes(raw, kind, ctx),
        Metric::TrackerTotal(kind) => activity::tracker_total(raw, kind, ctx),
        Metric::HeartZones => activity::heart_zones(raw, ctx),
        Metric::RecentActivities => activity::recent_activities(raw, ctx),
        Metric::Battery => device::battery(raw, ctx),
    }
}

/// Deserialize each element of `list` on its own, dropping the ones that do
/// not fit `T`. A lone object is treated as a one-element list.
pub(crate) fn typed_entries<T: DeserializeOwned>(list: Option<&Value>) -> Vec<T> {
    let items: Vec<&Value> = match list {
        Some(Value::Array(arr)) => arr.iter().collect(),
        Some(obj @ Value::Object(_)) => vec![obj],
        _ => Vec::new(),
    };
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<T>(item.clone()) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::debug!(error = %e, "skipping malformed entry");
                None
            }
        })
        .collect()
}

/// Numbers arrive as JSON numbers or numeric strings (`"1234"`).
/// `NaN` and infinities are not values.
pub(crate) fn as_f64(v: &Value) -> Option<f64> {
    let f = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    f.is_finite().then_some(f)
}

/// Integer view of a numeric value, truncating fractions.
pub(crate) fn as_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| as_f64(v).map(|f| f as i64)),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .ok()
            .or_else(|| as_f64(v).map(|f| f as i64)),
        _ => None,
    }
}
