//! In-memory point buffer drained by periodic flushes.

use fitbit_client::observability::{
    POINTS_BUFFERED, POINTS_DROPPED_TOTAL, POINTS_WRITTEN_TOTAL, SINK_FAILURES_TOTAL,
};

use crate::error::SinkError;
use crate::point::Point;
use crate::sink::Sink;

/// Points waiting for the sink.
///
/// A failed flush keeps everything, so points survive sink outages. With a
/// cap set, the oldest points are dropped once it is exceeded.
#[derive(Debug, Default)]
pub struct PointBuffer {
    points: Vec<Point>,
    cap: Option<usize>,
}

impl PointBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cap(cap: Option<usize>) -> Self {
        Self {
            points: Vec::new(),
            cap,
        }
    }

    pub fn append(&mut self, points: impl IntoIterator<Item = Point>) {
        self.points.extend(points);
        let excess = self
            .cap
            .map_or(0, |cap| self.points.len().saturating_sub(cap));
        if excess > 0 {
            let cap = self.points.len() - excess;
            self.points.drain(..excess);
            metrics::counter!(POINTS_DROPPED_TOTAL).increment(excess as u64);
            tracing::warn!(dropped = excess, cap, "point buffer full, dropped oldest points");
        }
        self.publish_len();
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Send everything to `sink` in one write. Cleared only on success.
    ///
    /// Returns the number of points written; an empty buffer writes nothing.
    pub async fn flush<S: Sink + ?Sized>(&mut self, sink: &S) -> Result<usize, SinkError> {
        if self.points.is_empty() {
            return Ok(0);
        }
        match sink.write(&self.points).await {
            Ok(()) => {
                let written = self.points.len();
                self.points.clear();
                self.publish_len();
                metrics::counter!(POINTS_WRITTEN_TOTAL).increment(written as u64);
                tracing::info!(points = written, "flushed points to sink");
                Ok(written)
            }
            Err(e) => {
                metrics::counter!(SINK_FAILURES_TOTAL).increment(1);
                Err(e)
            }
        }
    }

    fn publish_len(&self) {
        metrics::gauge!(POINTS_BUFFERED).set(self.points.len() as f64);
    }
}
