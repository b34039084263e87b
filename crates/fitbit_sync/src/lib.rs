//! Fitbit to InfluxDB sync service.
//!
//! Fetches biometric data through [`fitbit_client`], normalizes it into
//! [`point::Point`]s and writes them in batches to a [`sink::Sink`].

pub mod buffer;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod domains;
pub mod error;
pub mod orchestrator;
pub mod point;
pub mod schedule;
pub mod sink;
pub mod window;

#[cfg(test)]
mod test_utils;

pub use buffer::PointBuffer;
pub use catalog::{Metric, MetricFamily, QuerySpan};
pub use config::SyncConfig;
pub use error::{SinkError, SyncError, SyncResult};
pub use orchestrator::{SyncOrchestrator, SyncSettings, resolve_timezone};
pub use point::{FieldValue, Point};
pub use sink::{InfluxSink, Sink};
pub use window::{DateWindow, partition};
