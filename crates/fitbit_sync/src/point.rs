//! Canonical time-series point and local-time normalization.

use chrono::{DateTime, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Str(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Str(v)
    }
}

/// One measurement at a UTC instant. Built through [`PointBuilder`], which
/// refuses points without fields.
#[derive(Clone, Debug, PartialEq)]
pub struct Point {
    measurement: String,
    timestamp: DateTime<Utc>,
    tags: BTreeMap<String, String>,
    fields: BTreeMap<String, FieldValue>,
}

impl Point {
    pub fn builder(measurement: impl Into<String>, timestamp: DateTime<Utc>) -> PointBuilder {
        PointBuilder {
            measurement: measurement.into(),
            timestamp,
            tags: BTreeMap::new(),
            fields: BTreeMap::new(),
        }
    }

    pub fn measurement(&self) -> &str {
        &self.measurement
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    pub fn fields(&self) -> &BTreeMap<String, FieldValue> {
        &self.fields
    }

    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }
}

#[derive(Clone, Debug)]
pub struct PointBuilder {
    measurement: String,
    timestamp: DateTime<Utc>,
    tags: BTreeMap<String, String>,
    fields: BTreeMap<String, FieldValue>,
}

impl PointBuilder {
    /// Empty tag values are dropped; line protocol has no way to write them.
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        if !value.is_empty() {
            self.tags.insert(key.into(), value);
        }
        self
    }

    /// Non-finite floats are dropped.
    pub fn field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        let value = value.into();
        if !matches!(value, FieldValue::Float(f) if !f.is_finite()) {
            self.fields.insert(key.into(), value);
        }
        self
    }

    /// Add the field only when a value is present.
    pub fn field_opt<V: Into<FieldValue>>(self, key: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(v) => self.field(key, v),
            None => self,
        }
    }

    /// `None` when no field was set.
    pub fn build(self) -> Option<Point> {
        if self.fields.is_empty() {
            return None;
        }
        Some(Point {
            measurement: self.measurement,
            timestamp: self.timestamp,
            tags: self.tags,
            fields: self.fields,
        })
    }
}

/// Interpret a wall-clock time in `tz` and convert it to UTC.
///
/// Ambiguous times (clocks going back) resolve to the later, standard-time
/// instant. Times inside a spring-forward gap are moved past the gap.
pub fn local_to_utc(tz: &Tz, local: NaiveDateTime) -> DateTime<Utc> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(t) => t.with_timezone(&Utc),
        LocalResult::Ambiguous(_, standard) => standard.with_timezone(&Utc),
        LocalResult::None => tz
            .from_local_datetime(&(local + TimeDelta::hours(1)))
            .earliest()
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&local)),
    }
}

/// Local midnight of `date` in `tz`, as UTC.
pub fn local_midnight(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
    local_to_utc(tz, date.and_time(NaiveTime::MIN))
}

/// Parse a naive ISO-8601 timestamp (`2024-01-01T23:10:30.000`) as local time.
pub fn parse_local(tz: &Tz, raw: &str) -> Option<DateTime<Utc>> {
    raw.parse::<NaiveDateTime>()
        .ok()
        .map(|local| local_to_utc(tz, local))
}

/// Parse a calendar date (`2024-01-01`).
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}
