//! Sync orchestrator: drives fetch, extract, buffer and flush in either
//! incremental or backfill mode.
//!
//! Everything runs on one logical thread of control. The orchestrator owns
//! the API client, the sink and the buffer, so no state is shared.

use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{error, info, warn};

use fitbit_client::FitbitApi;
use fitbit_client::observability::FETCHES_TOTAL;

use crate::buffer::PointBuffer;
use crate::catalog::{Metric, MetricFamily, PROFILE_ENDPOINT, QuerySpan};
use crate::domains::{self, ExtractContext, device::profile_timezone};
use crate::error::{SyncError, SyncResult};
use crate::schedule::{POLL_INTERVAL, Schedule, Task};
use crate::sink::Sink;
use crate::window::{DateWindow, partition};

/// Trailing windows wider than this many dates risk the hourly rate limit.
const STARTUP_DATES_WARN: u64 = 3;

/// Families fetched once at incremental startup, after the per-date intraday
/// pass.
const STARTUP_ORDER: [MetricFamily; 6] = [
    MetricFamily::Daily30,
    MetricFamily::Sleep100,
    MetricFamily::Daily365,
    MetricFamily::Spo2Daily,
    MetricFamily::Battery,
    MetricFamily::RecentActivities,
];

/// Static settings for one run.
#[derive(Clone, Debug)]
pub struct SyncSettings {
    pub device: String,
    pub tz: Tz,
    /// Days before today covered by the incremental window.
    pub trailing_days: u32,
    pub buffer_cap: Option<usize>,
}

/// Resolve the account timezone: the configured IANA name when given,
/// otherwise the profile's `user.timezone`.
pub async fn resolve_timezone<A: FitbitApi + ?Sized>(
    api: &mut A,
    configured: Option<&str>,
) -> SyncResult<Tz> {
    if let Some(name) = configured {
        return name
            .parse::<Tz>()
            .map_err(|e| SyncError::Timezone(format!("{name}: {e}")));
    }
    let profile = api
        .get_json(PROFILE_ENDPOINT, &[])
        .await?
        .ok_or_else(|| SyncError::Timezone("profile request failed".into()))?;
    let tz = profile_timezone(&profile)
        .ok_or_else(|| SyncError::Timezone("profile has no usable user.timezone".into()))?;
    info!(timezone = %tz, "using account timezone from profile");
    Ok(tz)
}

pub struct SyncOrchestrator<A, S> {
    api: A,
    sink: S,
    buffer: PointBuffer,
    settings: SyncSettings,
}

impl<A: FitbitApi, S: Sink> SyncOrchestrator<A, S> {
    pub fn new(api: A, sink: S, settings: SyncSettings) -> Self {
        Self {
            api,
            sink,
            buffer: PointBuffer::with_cap(settings.buffer_cap),
            settings,
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn buffer(&self) -> &PointBuffer {
        &self.buffer
    }

    /// Today's date in the account timezone.
    pub fn local_today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.settings.tz).date_naive()
    }

    fn working_window(&self) -> DateWindow {
        DateWindow::trailing(self.local_today(), self.settings.trailing_days)
    }

    /// Fetch one metric for `window` and buffer its points.
    ///
    /// An exhausted retry budget or an empty extraction is logged and
    /// skipped. Only fatal API errors are returned.
    pub async fn fetch_metric(&mut self, metric: Metric, window: &DateWindow) -> SyncResult<usize> {
        let request = metric.request(window);
        let outcome = match self.api.get_json(&request.endpoint, &request.params).await {
            Ok(outcome) => outcome,
            Err(e) if e.is_fatal() => {
                error!(metric = %metric, range = %window, error = %e, "fatal API error");
                return Err(e.into());
            }
            Err(e) => {
                warn!(metric = %metric, range = %window, error = %e, "request failed");
                None
            }
        };

        let points = match outcome {
            Some(raw) => {
                let ctx = ExtractContext {
                    window: *window,
                    tz: self.settings.tz,
                    device: &self.settings.device,
                };
                domains::extract(metric, &raw, &ctx)
            }
            None => Vec::new(),
        };

        if points.is_empty() {
            metrics::counter!(FETCHES_TOTAL, "metric" => metric.label(), "outcome" => "failed")
                .increment(1);
            error!(metric = %metric, range = %window, "Recording failed");
            return Ok(0);
        }

        let count = points.len();
        self.buffer.append(points);
        metrics::counter!(FETCHES_TOTAL, "metric" => metric.label(), "outcome" => "recorded")
            .increment(1);
        info!(metric = %metric, range = %window, points = count, "Recorded");
        Ok(count)
    }

    /// Fetch every metric of `family` for `window`, in catalog order.
    pub async fn fetch_family(
        &mut self,
        family: MetricFamily,
        window: &DateWindow,
    ) -> SyncResult<usize> {
        let mut total = 0;
        for &metric in family.metrics() {
            total += self.fetch_metric(metric, window).await?;
        }
        Ok(total)
    }

    /// Flush the buffer, logging (not propagating) sink failures.
    pub async fn flush(&mut self) -> usize {
        match self.buffer.flush(&self.sink).await {
            Ok(written) => written,
            Err(e) => {
                error!(error = %e, pending = self.buffer.len(), "Unable to write points to sink");
                0
            }
        }
    }

    /// One-off catch-up over the trailing `window`.
    pub async fn startup_pass(&mut self, window: &DateWindow) -> SyncResult<()> {
        if window.day_count() > STARTUP_DATES_WARN {
            warn!(
                dates = window.day_count(),
                "incremental updates are not meant for more than {STARTUP_DATES_WARN} days \
                 at a time; consider lowering AUTO_UPDATE_DATE_RANGE to avoid rate limits"
            );
        }
        for date in window.dates() {
            self.fetch_family(MetricFamily::Intraday, &DateWindow::single(date))
                .await?;
        }
        for family in STARTUP_ORDER {
            self.fetch_family(family, window).await?;
        }
        Ok(())
    }

    async fn run_task(&mut self, task: Task, window: &DateWindow) -> SyncResult<()> {
        match task {
            Task::Flush => {
                self.flush().await;
            }
            Task::Fetch(MetricFamily::Intraday) => {
                self.fetch_family(MetricFamily::Intraday, &DateWindow::single(window.end()))
                    .await?;
            }
            Task::Fetch(family) => {
                self.fetch_family(family, window).await?;
            }
        }
        Ok(())
    }

    async fn incremental_loop(&mut self) -> SyncResult<()> {
        let mut window = self.working_window();
        info!(range = %window, "starting incremental sync");
        self.startup_pass(&window).await?;

        info!("Creating schedulers");
        let mut schedule = Schedule::new(Instant::now());
        loop {
            for task in schedule.due(Instant::now()) {
                self.run_task(task, &window).await?;
            }
            tokio::time::sleep(POLL_INTERVAL).await;

            let current = self.working_window();
            if current != window {
                info!(range = %current, "date changed, moving working window");
                window = current;
            }
        }
    }

    /// Poll every family on its cadence until `shutdown` fires or a fatal
    /// error occurs. A final flush runs either way.
    pub async fn run_incremental(&mut self, mut shutdown: watch::Receiver<bool>) -> SyncResult<()> {
        let result = tokio::select! {
            r = self.incremental_loop() => r,
            _ = shutdown_signal(&mut shutdown) => {
                info!("shutdown requested");
                Ok(())
            }
        };
        self.final_flush().await;
        result
    }

    async fn sweep(&mut self, range: DateWindow) -> SyncResult<()> {
        info!(range = %range, "starting bulk update");
        for family in MetricFamily::backfill_order() {
            match family.span() {
                QuerySpan::Snapshot => continue,
                QuerySpan::Latest | QuerySpan::Unbounded => {
                    self.fetch_family(family, &range).await?;
                    self.flush().await;
                }
                QuerySpan::Days { step_days, .. } => {
                    for window in partition(range, step_days) {
                        self.fetch_family(family, &window).await?;
                        self.flush().await;
                    }
                }
                QuerySpan::SingleDay => {
                    for date in range.dates() {
                        self.fetch_family(family, &DateWindow::single(date)).await?;
                        self.flush().await;
                    }
                }
            }
        }
        info!(range = %range, "Success: bulk update complete");
        Ok(())
    }

    /// Sweep `range` family by family, widest span first, flushing after
    /// every window.
    pub async fn run_backfill(
        &mut self,
        range: DateWindow,
        mut shutdown: watch::Receiver<bool>,
    ) -> SyncResult<()> {
        let result = tokio::select! {
            r = self.sweep(range) => r,
            _ = shutdown_signal(&mut shutdown) => {
                info!("shutdown requested, abandoning bulk update");
                Ok(())
            }
        };
        self.final_flush().await;
        result
    }

    async fn final_flush(&mut self) {
        let written = self.flush().await;
        if !self.buffer.is_empty() {
            warn!(pending = self.buffer.len(), "exiting with unwritten points");
        } else {
            info!(points = written, "final flush complete");
        }
    }
}

/// Resolves once the flag is set. A dropped sender never resolves.
async fn shutdown_signal(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FailingSink, RecordingSink, Reply, ScriptedApi};
    use serde_json::json;
    use std::time::Duration;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn settings() -> SyncSettings {
        SyncSettings {
            device: "Charge6".into(),
            tz: chrono_tz::UTC,
            trailing_days: 1,
            buffer_cap: None,
        }
    }

    fn idle_shutdown() -> (watch::Sender<bool>, watch::Receiver<bool>) {
        watch::channel(false)
    }

    fn hrv_body() -> serde_json::Value {
        json!({"hrv": [{"dateTime": "2024-01-02", "value": {"dailyRmssd": 40.0}}]})
    }

    #[tokio::test]
    async fn empty_battery_list_is_logged_and_skipped() {
        let api = ScriptedApi::new()
            .json("1/user/-/devices.json", json!([]))
            .json(
                "1/user/-/activities/list.json",
                json!({"activities": [{
                    "activityName": "Walk",
                    "startTime": "2024-01-02T07:30:00.000+00:00",
                    "steps": 1200
                }]}),
            );
        let mut orch = SyncOrchestrator::new(api, RecordingSink::default(), settings());
        let window = DateWindow::single(date("2024-01-02"));

        assert_eq!(orch.fetch_family(MetricFamily::Battery, &window).await.unwrap(), 0);
        assert_eq!(
            orch.fetch_family(MetricFamily::RecentActivities, &window)
                .await
                .unwrap(),
            1
        );
        assert_eq!(
            orch.api().endpoints(),
            vec!["1/user/-/devices.json", "1/user/-/activities/list.json"]
        );
        assert_eq!(orch.buffer().len(), 1);
    }

    #[tokio::test]
    async fn exhausted_retries_do_not_stop_the_family() {
        let api = ScriptedApi::new()
            .on("1/user/-/hrv/date/2024-01-01/2024-01-02.json", Reply::Absent)
            .json(
                "1/user/-/br/date/2024-01-01/2024-01-02.json",
                json!({"br": [{"dateTime": "2024-01-02", "value": {"breathingRate": 14.0}}]}),
            );
        let mut orch = SyncOrchestrator::new(api, RecordingSink::default(), settings());
        let window = DateWindow::new(date("2024-01-01"), date("2024-01-02")).unwrap();

        let recorded = orch.fetch_family(MetricFamily::Daily30, &window).await.unwrap();
        assert_eq!(recorded, 1);
        assert_eq!(orch.api().endpoints().len(), 4);
    }

    #[tokio::test]
    async fn fatal_status_ends_the_family() {
        let api = ScriptedApi::new()
            .on("1/user/-/hrv/date/2024-01-01/2024-01-02.json", Reply::Fatal(403));
        let mut orch = SyncOrchestrator::new(api, RecordingSink::default(), settings());
        let window = DateWindow::new(date("2024-01-01"), date("2024-01-02")).unwrap();

        let err = orch
            .fetch_family(MetricFamily::Daily30, &window)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Api(_)));
        assert_eq!(orch.api().endpoints().len(), 1);
    }

    #[tokio::test]
    async fn startup_pass_walks_every_date_then_families() {
        let mut orch =
            SyncOrchestrator::new(ScriptedApi::new(), RecordingSink::default(), settings());
        let window = DateWindow::new(date("2024-01-01"), date("2024-01-02")).unwrap();
        orch.startup_pass(&window).await.unwrap();

        let endpoints = orch.api().endpoints();
        assert_eq!(endpoints[0], "1/user/-/activities/heart/date/2024-01-01/1d/1sec.json");
        assert_eq!(endpoints[1], "1/user/-/activities/steps/date/2024-01-01/1d/1min.json");
        assert_eq!(endpoints[2], "1/user/-/activities/heart/date/2024-01-02/1d/1sec.json");
        assert_eq!(endpoints[4], "1/user/-/hrv/date/2024-01-01/2024-01-02.json");
        assert_eq!(endpoints.last().copied(), Some("1/user/-/activities/list.json"));
        // 4 intraday + 4 daily30 + 1 sleep + 8 daily365 + spo2 + battery + activities
        assert_eq!(endpoints.len(), 20);
    }

    #[tokio::test]
    async fn backfill_partitions_each_family_and_flushes_per_window() {
        let api = ScriptedApi::new().fallback(Reply::Json(hrv_body()));
        let mut orch = SyncOrchestrator::new(api, RecordingSink::default(), settings());
        let range = DateWindow::new(date("2024-01-01"), date("2024-03-01")).unwrap();
        let (_tx, rx) = idle_shutdown();

        orch.run_backfill(range, rx).await.unwrap();

        let endpoints = orch.api().endpoints();
        assert_eq!(endpoints[0], "1/user/-/activities/list.json");
        assert_eq!(
            orch.api().calls()[0].1[0],
            ("beforeDate".to_string(), "2024-03-01".to_string())
        );
        assert_eq!(endpoints[1], "1/user/-/spo2/date/2024-01-01/2024-03-01.json");
        // 61 dates: 3 windows of 28 days for the daily-30 family.
        let hrv: Vec<_> = endpoints
            .iter()
            .filter(|e| e.starts_with("1/user/-/hrv/"))
            .collect();
        assert_eq!(
            hrv,
            vec![
                &"1/user/-/hrv/date/2024-01-01/2024-01-29.json",
                &"1/user/-/hrv/date/2024-01-29/2024-02-26.json",
                &"1/user/-/hrv/date/2024-02-26/2024-03-01.json",
            ]
        );
        let intraday = endpoints
            .iter()
            .filter(|e| e.ends_with("/1d/1sec.json"))
            .count();
        assert_eq!(intraday, 61);
        assert!(!endpoints.contains(&"1/user/-/devices.json"));
        // Only the three HRV windows produce points; each is flushed on its own.
        assert_eq!(orch.sink().batches().len(), 3);
        assert!(orch.buffer().is_empty());
    }

    #[tokio::test]
    async fn sink_outage_keeps_points_until_exit() {
        let api = ScriptedApi::new().fallback(Reply::Json(hrv_body()));
        let mut orch = SyncOrchestrator::new(api, FailingSink::default(), settings());
        let range = DateWindow::new(date("2024-01-01"), date("2024-01-10")).unwrap();
        let (_tx, rx) = idle_shutdown();

        orch.run_backfill(range, rx).await.unwrap();
        assert_eq!(orch.buffer().len(), 1);
        assert!(orch.sink().attempts() >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn incremental_runs_scheduled_jobs_until_shutdown() {
        let api = ScriptedApi::new().fallback(Reply::Json(hrv_body()));
        let mut orch = SyncOrchestrator::new(api, RecordingSink::default(), settings());
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let result = orch.run_incremental(rx).await;
            (orch, result)
        });
        tokio::time::sleep(Duration::from_secs(200)).await;
        tx.send(true).unwrap();
        let (orch, result) = handle.await.unwrap();

        result.unwrap();
        let endpoints = orch.api().endpoints();
        // startup pass (20 calls) plus one scheduled intraday run at 3 minutes.
        assert_eq!(endpoints.len(), 22);
        assert!(endpoints[20].ends_with("/1d/1sec.json"));
        // The HRV point was flushed at the one-minute mark.
        assert_eq!(orch.sink().total_points(), 1);
        assert!(orch.buffer().is_empty());
    }

    #[tokio::test]
    async fn fatal_error_still_flushes_buffered_points() {
        let api = ScriptedApi::new()
            .json("1/user/-/activities/list.json", json!({"activities": [{
                "activityName": "Run",
                "startTime": "2024-01-02T07:30:00.000+00:00",
                "calories": 300
            }]}))
            .on("1/user/-/spo2/date/2024-01-01/2024-01-02.json", Reply::Fatal(400));
        let mut orch = SyncOrchestrator::new(api, RecordingSink::default(), settings());
        let range = DateWindow::new(date("2024-01-01"), date("2024-01-02")).unwrap();
        let (_tx, rx) = idle_shutdown();

        assert!(orch.run_backfill(range, rx).await.is_err());
        assert_eq!(orch.sink().total_points(), 1);
    }

    #[tokio::test]
    async fn timezone_from_setting_or_profile() {
        let mut api = ScriptedApi::new()
            .json(PROFILE_ENDPOINT, json!({"user": {"timezone": "America/Chicago"}}));
        let tz = resolve_timezone(&mut api, Some("Europe/Paris")).await.unwrap();
        assert_eq!(tz, chrono_tz::Europe::Paris);
        assert!(api.endpoints().is_empty());

        let tz = resolve_timezone(&mut api, None).await.unwrap();
        assert_eq!(tz, chrono_tz::America::Chicago);

        let err = resolve_timezone(&mut api, None).await.unwrap_err();
        assert!(matches!(err, SyncError::Timezone(_)));
        assert!(resolve_timezone(&mut api, Some("Nowhere/Land")).await.is_err());
    }
}
