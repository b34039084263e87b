//! Time-series sink abstraction and the InfluxDB v2 implementation.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use secrecy::{ExposeSecret, SecretString};
use std::fmt::Write as _;
use std::time::Duration;

use crate::error::SinkError;
use crate::point::{FieldValue, Point};

/// Destination for flushed points. One `write` call per flush.
#[async_trait]
pub trait Sink: Send + Sync {
    async fn write(&self, points: &[Point]) -> Result<(), SinkError>;
}

const WRITE_TIMEOUT: Duration = Duration::from_secs(30);

/// Writes line protocol to the InfluxDB v2 `/api/v2/write` endpoint.
pub struct InfluxSink {
    write_url: String,
    org: String,
    bucket: String,
    token: SecretString,
    client: reqwest::Client,
}

impl InfluxSink {
    pub fn new(
        base_url: &str,
        org: impl Into<String>,
        bucket: impl Into<String>,
        token: SecretString,
    ) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder().timeout(WRITE_TIMEOUT).build()?;
        Ok(Self {
            write_url: format!("{}/api/v2/write", base_url.trim_end_matches('/')),
            org: org.into(),
            bucket: bucket.into(),
            token,
            client,
        })
    }
}

#[async_trait]
impl Sink for InfluxSink {
    async fn write(&self, points: &[Point]) -> Result<(), SinkError> {
        let body = to_line_protocol(points);
        let resp = self
            .client
            .post(&self.write_url)
            .query(&[
                ("org", self.org.as_str()),
                ("bucket", self.bucket.as_str()),
                ("precision", "ns"),
            ])
            .header(
                AUTHORIZATION,
                format!("Token {}", self.token.expose_secret()),
            )
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(body)
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            tracing::debug!(points = points.len(), "influx write accepted");
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(SinkError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

fn escape_measurement(s: &str) -> String {
    s.replace(',', "\\,").replace(' ', "\\ ")
}

fn escape_key(s: &str) -> String {
    s.replace(',', "\\,")
        .replace('=', "\\=")
        .replace(' ', "\\ ")
}

fn format_field(v: &FieldValue) -> String {
    match v {
        FieldValue::Int(i) => format!("{i}i"),
        FieldValue::Float(f) => format!("{f}"),
        FieldValue::Bool(b) => b.to_string(),
        FieldValue::Str(s) => format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
    }
}

/// Encode one point as a line-protocol line (without trailing newline).
pub fn line(point: &Point) -> String {
    let mut out = escape_measurement(point.measurement());
    for (k, v) in point.tags() {
        let _ = write!(out, ",{}={}", escape_key(k), escape_key(v));
    }
    out.push(' ');
    let fields: Vec<String> = point
        .fields()
        .iter()
        .map(|(k, v)| format!("{}={}", escape_key(k), format_field(v)))
        .collect();
    out.push_str(&fields.join(","));
    let nanos = point
        .timestamp()
        .timestamp_nanos_opt()
        .unwrap_or_else(|| point.timestamp().timestamp().saturating_mul(1_000_000_000));
    let _ = write!(out, " {nanos}");
    out
}

pub fn to_line_protocol(points: &[Point]) -> String {
    points.iter().map(line).collect::<Vec<_>>().join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn ts() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-01-01T00:00:01Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn escapes_names_and_types_fields() {
        let p = Point::builder("Skin Temperature Variation", ts())
            .tag("Device", "Charge 6")
            .field("RelativeValue", -0.5)
            .field("count", 3_i64)
            .field("note", "say \"hi\"")
            .field("ok", true)
            .build()
            .unwrap();
        assert_eq!(
            line(&p),
            "Skin\\ Temperature\\ Variation,Device=Charge\\ 6 \
             RelativeValue=-0.5,count=3i,note=\"say \\\"hi\\\"\",ok=true 1704067201000000000"
        );
    }

    #[test]
    fn field_keys_with_spaces_are_escaped() {
        let p = Point::builder("HR zones", ts())
            .field("Fat Burn", 12_i64)
            .build()
            .unwrap();
        assert_eq!(line(&p), "HR\\ zones Fat\\ Burn=12i 1704067201000000000");
    }

    #[test]
    fn far_future_timestamp_saturates() {
        let far = DateTime::parse_from_rfc3339("2400-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let p = Point::builder("a", far).field("v", 1_i64).build().unwrap();
        assert_eq!(line(&p), format!("a v=1i {}", i64::MAX));
    }

    #[test]
    fn batch_is_newline_separated() {
        let a = Point::builder("a", ts()).field("v", 1.5).build().unwrap();
        let b = Point::builder("b", ts()).field("v", 2.0).build().unwrap();
        let body = to_line_protocol(&[a, b]);
        assert_eq!(body.lines().count(), 2);
        assert!(body.starts_with("a v=1.5 "));
        assert!(body.contains("b v=2 "));
    }
}
