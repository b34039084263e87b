//! Shared test fakes: a scripted `FitbitApi` and in-memory sinks.
#![cfg(test)]

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use fitbit_client::{ApiErrorKind, FitbitApi, FitbitError, QueryParams};

use crate::error::SinkError;
use crate::point::Point;
use crate::sink::Sink;

/// Canned answer for one request.
#[derive(Clone, Debug)]
pub enum Reply {
    Json(Value),
    /// Retries exhausted.
    Absent,
    /// Non-retryable status, e.g. 403.
    Fatal(u16),
}

impl Reply {
    fn into_result(self) -> Result<Option<Value>, FitbitError> {
        match self {
            Reply::Json(v) => Ok(Some(v)),
            Reply::Absent => Ok(None),
            Reply::Fatal(status) => Err(FitbitError::Api {
                kind: ApiErrorKind::Unexpected,
                status,
                body: "scripted".into(),
            }),
        }
    }
}

/// `FitbitApi` answering from per-endpoint scripts.
///
/// Queued replies are consumed in order; once a queue runs dry (or for an
/// endpoint never scripted) the fallback reply is used.
pub struct ScriptedApi {
    scripts: HashMap<String, VecDeque<Reply>>,
    fallback: Reply,
    calls: Vec<(String, Vec<(String, String)>)>,
}

impl Default for ScriptedApi {
    fn default() -> Self {
        Self {
            scripts: HashMap::new(),
            fallback: Reply::Absent,
            calls: Vec::new(),
        }
    }
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, endpoint: &str, reply: Reply) -> Self {
        self.scripts
            .entry(endpoint.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    pub fn json(self, endpoint: &str, body: Value) -> Self {
        self.on(endpoint, Reply::Json(body))
    }

    pub fn fallback(mut self, reply: Reply) -> Self {
        self.fallback = reply;
        self
    }

    /// Endpoints requested so far, in order.
    pub fn endpoints(&self) -> Vec<&str> {
        self.calls.iter().map(|(e, _)| e.as_str()).collect()
    }

    pub fn calls(&self) -> &[(String, Vec<(String, String)>)] {
        &self.calls
    }
}

#[async_trait]
impl FitbitApi for ScriptedApi {
    async fn get_json(
        &mut self,
        endpoint: &str,
        params: &QueryParams<'_>,
    ) -> Result<Option<Value>, FitbitError> {
        self.calls.push((
            endpoint.to_string(),
            params
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        ));
        let reply = self
            .scripts
            .get_mut(endpoint)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| self.fallback.clone());
        reply.into_result()
    }
}

/// Sink that keeps every batch it was given.
#[derive(Default)]
pub struct RecordingSink {
    batches: Mutex<Vec<Vec<Point>>>,
}

impl RecordingSink {
    pub fn batches(&self) -> Vec<Vec<Point>> {
        self.batches.lock().unwrap().clone()
    }

    pub fn total_points(&self) -> usize {
        self.batches.lock().unwrap().iter().map(Vec::len).sum()
    }
}

#[async_trait]
impl Sink for RecordingSink {
    async fn write(&self, points: &[Point]) -> Result<(), SinkError> {
        self.batches.lock().unwrap().push(points.to_vec());
        Ok(())
    }
}

/// Sink that rejects every write.
#[derive(Default)]
pub struct FailingSink {
    attempts: AtomicUsize,
}

impl FailingSink {
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Sink for FailingSink {
    async fn write(&self, _points: &[Point]) -> Result<(), SinkError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(SinkError::Unavailable("database offline".into()))
    }
}

/// `n` distinct points, one second apart.
pub fn sample_points(n: usize) -> Vec<Point> {
    let base = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
        .unwrap()
        .with_timezone(&Utc);
    (0..n)
        .map(|i| {
            Point::builder("HeartRate_Intraday", base + TimeDelta::seconds(i as i64))
                .tag("Device", "Test")
                .field("value", 60 + i as i64)
                .build()
                .unwrap()
        })
        .collect()
}
