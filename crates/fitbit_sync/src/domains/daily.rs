//! Daily health summaries: HRV, breathing rate, skin temperature and SPO2.
//!
//! Summaries are dated, not timed; points are stamped at local midnight.

use serde::Deserialize;
use serde_json::Value;

use super::{DEVICE_TAG, ExtractContext, typed_entries};
use crate::point::{Point, local_midnight, parse_date, parse_local};

#[derive(Deserialize)]
struct Daily<V> {
    #[serde(rename = "dateTime")]
    date_time: String,
    value: V,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HrvValue {
    daily_rmssd: f64,
    deep_rmssd: Option<f64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BreathingValue {
    breathing_rate: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SkinValue {
    nightly_relative: f64,
}

#[derive(Deserialize)]
struct Spo2Value {
    avg: f64,
    max: f64,
    min: f64,
}

#[derive(Deserialize)]
struct Spo2Day {
    minutes: Vec<Spo2Minute>,
}

#[derive(Deserialize)]
struct Spo2Minute {
    minute: String,
    value: f64,
}

fn daily_points<V: serde::de::DeserializeOwned>(
    list: Option<&Value>,
    measurement: &str,
    ctx: &ExtractContext<'_>,
    fields: impl Fn(crate::point::PointBuilder, V) -> crate::point::PointBuilder,
) -> Vec<Point> {
    typed_entries::<Daily<V>>(list)
        .into_iter()
        .filter_map(|entry| {
            let date = parse_date(&entry.date_time)?;
            let builder = Point::builder(measurement, local_midnight(&ctx.tz, date))
                .tag(DEVICE_TAG, ctx.device);
            fields(builder, entry.value).build()
        })
        .collect()
}

pub fn hrv(raw: &Value, ctx: &ExtractContext<'_>) -> Vec<Point> {
    daily_points::<HrvValue>(raw.get("hrv"), "HRV", ctx, |b, v| {
        b.field("dailyRmssd", v.daily_rmssd)
            .field_opt("deepRmssd", v.deep_rmssd)
    })
}

pub fn breathing_rate(raw: &Value, ctx: &ExtractContext<'_>) -> Vec<Point> {
    daily_points::<BreathingValue>(raw.get("br"), "BreathingRate", ctx, |b, v| {
        b.field("value", v.breathing_rate)
    })
}

pub fn skin_temperature(raw: &Value, ctx: &ExtractContext<'_>) -> Vec<Point> {
    daily_points::<SkinValue>(
        raw.get("tempSkin"),
        "Skin Temperature Variation",
        ctx,
        |b, v| b.field("RelativeValue", v.nightly_relative),
    )
}

/// Daily SPO2 aggregates. The endpoint answers with a bare list (or a bare
/// object for a single date).
pub fn spo2_daily(raw: &Value, ctx: &ExtractContext<'_>) -> Vec<Point> {
    daily_points::<Spo2Value>(Some(raw), "SPO2", ctx, |b, v| {
        b.field("avg", v.avg).field("max", v.max).field("min", v.min)
    })
}

/// Per-minute SPO2 readings, timestamped in local time.
pub fn spo2_intraday(raw: &Value, ctx: &ExtractContext<'_>) -> Vec<Point> {
    typed_entries::<Spo2Day>(Some(raw))
        .into_iter()
        .flat_map(|day| day.minutes)
        .filter_map(|m| {
            Point::builder("SPO2_Intraday", parse_local(&ctx.tz, &m.minute)?)
                .tag(DEVICE_TAG, ctx.device)
                .field("value", m.value)
                .build()
        })
        .collect()
}
