//! Activity data: tracker minute/total series, heart-rate zones and the
//! recent activity log.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use super::{DEVICE_TAG, ExtractContext, as_f64, as_i64, typed_entries};
use crate::catalog::{MinutesKind, TotalKind};
use crate::point::{Point, local_midnight, parse_date, parse_local};

/// Zone names in the order Fitbit reports them.
pub const HEART_ZONE_NAMES: [&str; 4] = ["Normal", "Fat Burn", "Cardio", "Peak"];

#[derive(Deserialize)]
struct TrackerEntry {
    #[serde(rename = "dateTime")]
    date_time: String,
    value: Value,
}

fn tracker_series(raw: &Value, resource: &str) -> Vec<TrackerEntry> {
    typed_entries(raw.get(format!("activities-tracker-{resource}").as_str()))
}

pub fn minutes(raw: &Value, kind: MinutesKind, ctx: &ExtractContext<'_>) -> Vec<Point> {
    tracker_series(raw, kind.resource())
        .into_iter()
        .filter_map(|entry| {
            let date = parse_date(&entry.date_time)?;
            Point::builder("Activity Minutes", local_midnight(&ctx.tz, date))
                .tag(DEVICE_TAG, ctx.device)
                .field(kind.resource(), as_i64(&entry.value)?)
                .build()
        })
        .collect()
}

pub fn tracker_total(raw: &Value, kind: TotalKind, ctx: &ExtractContext<'_>) -> Vec<Point> {
    tracker_series(raw, kind.resource())
        .into_iter()
        .filter_map(|entry| {
            let date = parse_date(&entry.date_time)?;
            Point::builder(kind.measurement(), local_midnight(&ctx.tz, date))
                .tag(DEVICE_TAG, ctx.device)
                .field("value", as_f64(&entry.value)?)
                .build()
        })
        .collect()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HeartDay {
    date_time: String,
    value: HeartDayValue,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HeartDayValue {
    #[serde(default)]
    heart_rate_zones: Vec<HeartZone>,
    resting_heart_rate: Option<i64>,
}

#[derive(Deserialize)]
struct HeartZone {
    #[serde(default)]
    minutes: i64,
}

/// `HR zones` minutes per day, plus `RestingHR` on days that report one.
pub fn heart_zones(raw: &Value, ctx: &ExtractContext<'_>) -> Vec<Point> {
    let mut points = Vec::new();
    for day in typed_entries::<HeartDay>(raw.get("activities-heart")) {
        let Some(date) = parse_date(&day.date_time) else {
            continue;
        };
        let ts = local_midnight(&ctx.tz, date);

        if day.value.heart_rate_zones.len() >= HEART_ZONE_NAMES.len() {
            let zones = HEART_ZONE_NAMES
                .iter()
                .zip(&day.value.heart_rate_zones)
                .fold(
                    Point::builder("HR zones", ts).tag(DEVICE_TAG, ctx.device),
                    |b, (name, zone)| b.field(*name, zone.minutes),
                );
            points.extend(zones.build());
        }

        points.extend(
            Point::builder("RestingHR", ts)
                .tag(DEVICE_TAG, ctx.device)
                .field_opt("value", day.value.resting_heart_rate)
                .build(),
        );
    }
    points
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActivityRecord {
    activity_name: String,
    start_time: String,
    active_duration: Option<Value>,
    average_heart_rate: Option<Value>,
    calories: Option<Value>,
    duration: Option<Value>,
    distance: Option<Value>,
    steps: Option<Value>,
}

/// Activity log timestamps normally carry an offset; bare ones are read as
/// account-local time.
fn activity_start(raw: &str, ctx: &ExtractContext<'_>) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .ok()
        .or_else(|| parse_local(&ctx.tz, raw.trim_end_matches('Z')))
}

/// `Activity Records`, tagged by activity name. Only the fields present on a
/// record are written.
pub fn recent_activities(raw: &Value, ctx: &ExtractContext<'_>) -> Vec<Point> {
    typed_entries::<ActivityRecord>(raw.get("activities"))
        .into_iter()
        .filter_map(|record| {
            let int = |v: &Option<Value>| v.as_ref().and_then(as_i64);
            Point::builder("Activity Records", activity_start(&record.start_time, ctx)?)
                .tag("ActivityName", record.activity_name.as_str())
                .field_opt("ActiveDuration", int(&record.active_duration))
                .field_opt("AverageHeartRate", int(&record.average_heart_rate))
                .field_opt("calories", int(&record.calories))
                .field_opt("duration", int(&record.duration))
                .field_opt("steps", int(&record.steps))
                .field_opt("distance", record.distance.as_ref().and_then(as_f64))
                .build()
        })
        .collect()
}
