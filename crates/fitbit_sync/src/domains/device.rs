use chrono_tz::Tz;
use serde::Deserialize;
use serde_json::Value;

use super::{ExtractContext, as_f64};
use crate::point::{Point, parse_local};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Device {
    last_sync_time: String,
    battery_level: Value,
}

/// Battery level of the first paired device, stamped at its last sync.
///
/// An empty device list yields no points.
pub fn battery(raw: &Value, ctx: &ExtractContext<'_>) -> Vec<Point> {
    let Some(first) = raw.as_array().and_then(|devices| devices.first()) else {
        return Vec::new();
    };
    let Ok(device) = serde_json::from_value::<Device>(first.clone()) else {
        return Vec::new();
    };
    parse_local(&ctx.tz, &device.last_sync_time)
        .zip(as_f64(&device.battery_level))
        .and_then(|(ts, level)| {
            Point::builder("DeviceBatteryLevel", ts)
                .field("value", level)
                .build()
        })
        .into_iter()
        .collect()
}

/// Account timezone from a `profile.json` payload.
pub fn profile_timezone(raw: &Value) -> Option<Tz> {
    raw.get("user")?
        .get("timezone")?
        .as_str()?
        .parse::<Tz>()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::FieldValue;
    use crate::window::DateWindow;
    use chrono::NaiveDate;
    use serde_json::json;

    fn ctx() -> ExtractContext<'static> {
        ExtractContext {
            window: DateWindow::single(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()),
            tz: chrono_tz::Europe::Berlin,
            device: "Charge6",
        }
    }

    #[test]
    fn first_device_battery() {
        let raw = json!([
            {
                "battery": "High",
                "batteryLevel": 87,
                "lastSyncTime": "2024-05-01T10:00:00.000",
                "deviceVersion": "Charge 6"
            },
            {"batteryLevel": 10, "lastSyncTime": "2024-04-01T10:00:00.000"}
        ]);
        let points = battery(&raw, &ctx());
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].measurement(), "DeviceBatteryLevel");
        assert!(points[0].tags().is_empty());
        assert_eq!(points[0].field("value"), Some(&FieldValue::Float(87.0)));
        assert_eq!(points[0].timestamp().to_rfc3339(), "2024-05-01T08:00:00+00:00");
    }

    #[test]
    fn empty_device_list_yields_nothing() {
        assert!(battery(&json!([]), &ctx()).is_empty());
        assert!(battery(&json!({"errors": []}), &ctx()).is_empty());
    }

    #[test]
    fn timezone_from_profile() {
        let raw = json!({"user": {"timezone": "Europe/Berlin", "displayName": "x"}});
        assert_eq!(profile_timezone(&raw), Some(chrono_tz::Europe::Berlin));
        assert_eq!(profile_timezone(&json!({"user": {"timezone": "Mars/Base"}})), None);
        assert_eq!(profile_timezone(&json!({})), None);
    }
}
