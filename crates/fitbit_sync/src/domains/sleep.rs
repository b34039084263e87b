//! Sleep logs: one `Sleep Summary` point per log plus a `Sleep Levels`
//! timeline.
//!
//! Logs come in two shapes. "Stages" logs report light/rem/deep minutes;
//! older "classic" logs only report asleep/restless/awake, which are folded
//! into the same fields (asleep as light, restless as REM, no deep sleep).

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

use super::{DEVICE_TAG, ExtractContext, typed_entries};
use crate::point::{Point, parse_local};

pub const SUMMARY_MEASUREMENT: &str = "Sleep Summary";
pub const LEVELS_MEASUREMENT: &str = "Sleep Levels";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SleepLog {
    start_time: String,
    end_time: String,
    is_main_sleep: bool,
    efficiency: i64,
    minutes_after_wakeup: i64,
    minutes_asleep: i64,
    minutes_to_fall_asleep: i64,
    time_in_bed: i64,
    minutes_awake: i64,
    levels: Levels,
}

#[derive(Deserialize)]
struct Levels {
    #[serde(default)]
    summary: HashMap<String, StageSummary>,
    #[serde(default)]
    data: Vec<Stage>,
}

#[derive(Deserialize)]
struct StageSummary {
    minutes: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Stage {
    date_time: String,
    level: String,
    seconds: i64,
}

/// Numeric depth for a stage name; `None` for names Fitbit has not documented.
pub fn level_value(level: &str) -> Option<i64> {
    match level {
        "wake" | "awake" => Some(3),
        "rem" | "restless" => Some(2),
        "light" | "asleep" => Some(1),
        "deep" => Some(0),
        _ => None,
    }
}

/// (light, rem, deep) minutes, falling back to the classic stage names.
fn stage_minutes(summary: &HashMap<String, StageSummary>) -> (i64, i64, i64) {
    let minutes = |name: &str| summary.get(name).map(|s| s.minutes);
    match (minutes("light"), minutes("rem"), minutes("deep")) {
        (Some(light), Some(rem), Some(deep)) => (light, rem, deep),
        _ => (
            minutes("asleep").unwrap_or_default(),
            minutes("restless").unwrap_or_default(),
            0,
        ),
    }
}

fn main_sleep_tag(is_main: bool) -> &'static str {
    if is_main { "True" } else { "False" }
}

pub fn extract(raw: &Value, ctx: &ExtractContext<'_>) -> Vec<Point> {
    let mut points = Vec::new();
    for log in typed_entries::<SleepLog>(raw.get("sleep")) {
        let main = main_sleep_tag(log.is_main_sleep);
        let tagged = |measurement: &str, ts| {
            Point::builder(measurement, ts)
                .tag(DEVICE_TAG, ctx.device)
                .tag("isMainSleep", main)
        };

        let Some(start) = parse_local(&ctx.tz, &log.start_time) else {
            tracing::debug!(start = %log.start_time, "sleep log with unreadable start time");
            continue;
        };
        let (light, rem, deep) = stage_minutes(&log.levels.summary);
        points.extend(
            tagged(SUMMARY_MEASUREMENT, start)
                .field("efficiency", log.efficiency)
                .field("minutesAfterWakeup", log.minutes_after_wakeup)
                .field("minutesAsleep", log.minutes_asleep)
                .field("minutesToFallAsleep", log.minutes_to_fall_asleep)
                .field("minutesInBed", log.time_in_bed)
                .field("minutesAwake", log.minutes_awake)
                .field("minutesLight", light)
                .field("minutesREM", rem)
                .field("minutesDeep", deep)
                .build(),
        );

        for stage in &log.levels.data {
            let (Some(ts), Some(level)) =
                (parse_local(&ctx.tz, &stage.date_time), level_value(&stage.level))
            else {
                continue;
            };
            points.extend(
                tagged(LEVELS_MEASUREMENT, ts)
                    .field("level", level)
                    .field("duration_seconds", stage.seconds)
                    .build(),
            );
        }

        // Closing marker so the timeline ends awake.
        if let Some(wake) = parse_local(&ctx.tz, &log.end_time) {
            points.extend(tagged(LEVELS_MEASUREMENT, wake).field("level", 3_i64).build());
        }
    }
    points
}
