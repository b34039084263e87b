use chrono::NaiveTime;
use serde_json::Value;

use super::{DEVICE_TAG, ExtractContext, as_i64};
use crate::point::{Point, local_to_utc};

/// Intraday series for `resource` (`heart`, `steps`) on the window's start
/// date. Each dataset entry carries only a wall-clock time.
pub fn extract(
    raw: &Value,
    resource: &str,
    measurement: &str,
    ctx: &ExtractContext<'_>,
) -> Vec<Point> {
    let key = format!("activities-{resource}-intraday");
    let Some(dataset) = raw
        .get(&key)
        .and_then(|v| v.get("dataset"))
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    let date = ctx.window.start();
    dataset
        .iter()
        .filter_map(|entry| {
            let time = NaiveTime::parse_from_str(entry.get("time")?.as_str()?, "%H:%M:%S").ok()?;
            let value = as_i64(entry.get("value")?)?;
            Point::builder(measurement, local_to_utc(&ctx.tz, date.and_time(time)))
                .tag(DEVICE_TAG, ctx.device)
                .field("value", value)
                .build()
        })
        .collect()
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
            window: DateWindow::single(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()),
            tz: chrono_tz::Europe::Berlin,
            device: "Charge6",
        }
    }

    #[test]
    fn heart_dataset_becomes_points() {
        let raw = json!({
            "activities-heart": [{"dateTime": "2024-01-15", "value": {}}],
            "activities-heart-intraday": {
                "dataset": [
                    {"time": "00:00:05", "value": 61},
                    {"time": "00:00:10", "value": 63},
                    {"time": "bogus", "value": 70}
                ],
                "datasetInterval": 1,
                "datasetType": "second"
            }
        });
        let points = extract(&raw, "heart", "HeartRate_Intraday", &ctx());
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].measurement(), "HeartRate_Intraday");
        assert_eq!(points[0].timestamp().to_rfc3339(), "2024-01-14T23:00:05+00:00");
        assert_eq!(points[1].field("value"), Some(&FieldValue::Int(63)));
        assert_eq!(points[0].tags().get("Device").unwrap(), "Charge6");
    }

    #[test]
    fn missing_dataset_yields_nothing() {
        let raw = json!({"activities-steps": []});
        assert!(extract(&raw, "steps", "Steps_Intraday", &ctx()).is_empty());
        let raw = json!({"activities-steps-intraday": {"dataset": []}});
        assert!(extract(&raw, "steps", "Steps_Intraday", &ctx()).is_empty());
    }
}
