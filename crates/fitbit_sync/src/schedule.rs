//! Fixed-cadence job table for incremental mode.

use std::time::Duration;
use tokio::time::Instant;

use crate::catalog::MetricFamily;

/// How often the incremental loop checks for due jobs.
pub const POLL_INTERVAL: Duration = Duration::from_secs(30);

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Task {
    Flush,
    Fetch(MetricFamily),
}

/// Registration order doubles as execution order when several jobs fall due
/// in the same tick.
pub const CADENCES: [(Task, Duration); 8] = [
    (Task::Flush, Duration::from_secs(MINUTE)),
    (Task::Fetch(MetricFamily::Intraday), Duration::from_secs(3 * MINUTE)),
    (Task::Fetch(MetricFamily::Battery), Duration::from_secs(20 * MINUTE)),
    (Task::Fetch(MetricFamily::RecentActivities), Duration::from_secs(HOUR)),
    (Task::Fetch(MetricFamily::Daily30), Duration::from_secs(3 * HOUR)),
    (Task::Fetch(MetricFamily::Sleep100), Duration::from_secs(4 * HOUR)),
    (Task::Fetch(MetricFamily::Daily365), Duration::from_secs(6 * HOUR)),
    (Task::Fetch(MetricFamily::Spo2Daily), Duration::from_secs(6 * HOUR)),
];

#[derive(Debug)]
struct Job {
    task: Task,
    period: Duration,
    next_run: Instant,
}

#[derive(Debug)]
pub struct Schedule {
    jobs: Vec<Job>,
}

impl Schedule {
    /// Every job first runs one full period after `start`.
    pub fn new(start: Instant) -> Self {
        Self::with_cadences(start, &CADENCES)
    }

    pub fn with_cadences(start: Instant, cadences: &[(Task, Duration)]) -> Self {
        let jobs = cadences
            .iter()
            .map(|&(task, period)| Job {
                task,
                period,
                next_run: start + period,
            })
            .collect();
        Self { jobs }
    }

    /// Tasks due at `now`, in registration order. Each returned job is
    /// rescheduled one period after `now`, so missed runs are not replayed.
    pub fn due(&mut self, now: Instant) -> Vec<Task> {
        self.jobs
            .iter_mut()
            .filter(|job| job.next_run <= now)
            .map(|job| {
                job.next_run = now + job.period;
                job.task
            })
            .collect()
    }

    /// Earliest pending run.
    pub fn next_due(&self) -> Option<Instant> {
        self.jobs.iter().map(|job| job.next_run).min()
    }
}
