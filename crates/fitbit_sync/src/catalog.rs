//! Metric catalog: which endpoints exist, how they are grouped into families,
//! and how wide a date window each family may query.

use std::fmt;

use crate::window::DateWindow;

/// How a family's endpoints accept dates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuerySpan {
    /// No date parameter; returns the current state.
    Snapshot,
    /// Latest records before the window's end date.
    Latest,
    /// One calendar date per request.
    SingleDay,
    /// Inclusive ranges of at most `max_days` dates, partitioned with `step_days`.
    Days { max_days: u32, step_days: u32 },
    /// Any range in one request.
    Unbounded,
}

impl QuerySpan {
    /// Ordering key for backfill: larger spans first.
    fn width(self) -> u32 {
        match self {
            QuerySpan::Latest | QuerySpan::Unbounded => u32::MAX,
            QuerySpan::Days { max_days, .. } => max_days,
            QuerySpan::SingleDay => 1,
            QuerySpan::Snapshot => 0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MetricFamily {
    RecentActivities,
    Spo2Daily,
    Daily365,
    Sleep100,
    Daily30,
    Intraday,
    Battery,
}

/// Static fetch-window entry for one family.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FetchWindow {
    pub family: MetricFamily,
    pub span: QuerySpan,
}

pub const FETCH_WINDOWS: [FetchWindow; 7] = [
    FetchWindow {
        family: MetricFamily::RecentActivities,
        span: QuerySpan::Latest,
    },
    FetchWindow {
        family: MetricFamily::Spo2Daily,
        span: QuerySpan::Unbounded,
    },
    FetchWindow {
        family: MetricFamily::Daily365,
        span: QuerySpan::Days {
            max_days: 365,
            step_days: 360,
        },
    },
    FetchWindow {
        family: MetricFamily::Sleep100,
        span: QuerySpan::Days {
            max_days: 100,
            step_days: 98,
        },
    },
    FetchWindow {
        family: MetricFamily::Daily30,
        span: QuerySpan::Days {
            max_days: 30,
            step_days: 28,
        },
    },
    FetchWindow {
        family: MetricFamily::Intraday,
        span: QuerySpan::SingleDay,
    },
    FetchWindow {
        family: MetricFamily::Battery,
        span: QuerySpan::Snapshot,
    },
];

impl MetricFamily {
    pub fn span(self) -> QuerySpan {
        FETCH_WINDOWS
            .iter()
            .find(|entry| entry.family == self)
            .map(|entry| entry.span)
            .unwrap_or(QuerySpan::SingleDay)
    }

    pub fn metrics(self) -> &'static [Metric] {
        use Metric::*;
        match self {
            MetricFamily::Intraday => &[HeartRateIntraday, StepsIntraday],
            MetricFamily::Daily30 => &[Hrv, BreathingRate, SkinTemperature, Spo2Intraday],
            MetricFamily::Sleep100 => &[Sleep],
            MetricFamily::Daily365 => &[
                ActivityMinutes(MinutesKind::Sedentary),
                ActivityMinutes(MinutesKind::LightlyActive),
                ActivityMinutes(MinutesKind::FairlyActive),
                ActivityMinutes(MinutesKind::VeryActive),
                TrackerTotal(TotalKind::Distance),
                TrackerTotal(TotalKind::Calories),
                TrackerTotal(TotalKind::Steps),
                HeartZones,
            ],
            MetricFamily::Spo2Daily => &[Spo2Daily],
            MetricFamily::Battery => &[Battery],
            MetricFamily::RecentActivities => &[RecentActivities],
        }
    }

    /// Families swept by a backfill, widest span first. Snapshot families
    /// carry no history and are skipped.
    pub fn backfill_order() -> Vec<MetricFamily> {
        let mut families: Vec<_> = FETCH_WINDOWS
            .iter()
            .filter(|entry| entry.span != QuerySpan::Snapshot)
            .map(|entry| entry.family)
            .collect();
        families.sort_by_key(|f| std::cmp::Reverse(f.span().width()));
        families
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MetricFamily::RecentActivities => "recent_activities",
            MetricFamily::Spo2Daily => "spo2_daily",
            MetricFamily::Daily365 => "daily_365",
            MetricFamily::Sleep100 => "sleep_100",
            MetricFamily::Daily30 => "daily_30",
            MetricFamily::Intraday => "intraday",
            MetricFamily::Battery => "battery",
        }
    }
}

impl fmt::Display for MetricFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MinutesKind {
    Sedentary,
    LightlyActive,
    FairlyActive,
    VeryActive,
}

impl MinutesKind {
    /// Resource name, also used as the field key.
    pub fn resource(self) -> &'static str {
        match self {
            MinutesKind::Sedentary => "minutesSedentary",
            MinutesKind::LightlyActive => "minutesLightlyActive",
            MinutesKind::FairlyActive => "minutesFairlyActive",
            MinutesKind::VeryActive => "minutesVeryActive",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TotalKind {
    Distance,
    Calories,
    Steps,
}

impl TotalKind {
    pub fn resource(self) -> &'static str {
        match self {
            TotalKind::Distance => "distance",
            TotalKind::Calories => "calories",
            TotalKind::Steps => "steps",
        }
    }

    pub fn measurement(self) -> &'static str {
        match self {
            TotalKind::Distance => "distance",
            TotalKind::Calories => "calories",
            TotalKind::Steps => "Total Steps",
        }
    }
}

/// One endpoint and its extractor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Metric {
    HeartRateIntraday,
    StepsIntraday,
    Hrv,
    BreathingRate,
    SkinTemperature,
    Spo2Intraday,
    Sleep,
    ActivityMinutes(MinutesKind),
    TrackerTotal(TotalKind),
    HeartZones,
    Spo2Daily,
    Battery,
    RecentActivities,
}

/// Number of activities requested from the activity log list.
pub const RECENT_ACTIVITY_LIMIT: u32 = 50;

/// A resolved API call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Request {
    pub endpoint: String,
    pub params: Vec<(&'static str, String)>,
}

impl Request {
    fn get(endpoint: String) -> Self {
        Self {
            endpoint,
            params: Vec::new(),
        }
    }
}

impl Metric {
    /// Human-readable label used in log lines.
    pub fn label(self) -> &'static str {
        match self {
            Metric::HeartRateIntraday => "HeartRate_Intraday",
            Metric::StepsIntraday => "Steps_Intraday",
            Metric::Hrv => "HRV",
            Metric::BreathingRate => "BreathingRate",
            Metric::SkinTemperature => "Skin Temperature Variation",
            Metric::Spo2Intraday => "SPO2_Intraday",
            Metric::Sleep => "Sleep",
            Metric::ActivityMinutes(kind) => kind.resource(),
            Metric::TrackerTotal(kind) => kind.measurement(),
            Metric::HeartZones => "RHR and HR zones",
            Metric::Spo2Daily => "SPO2",
            Metric::Battery => "DeviceBatteryLevel",
            Metric::RecentActivities => "Activity Records",
        }
    }

    /// Endpoint and query parameters for `window`.
    ///
    /// Single-day endpoints use the window's start date; `Latest` endpoints
    /// its end date.
    pub fn request(self, window: &DateWindow) -> Request {
        let (s, e) = (window.start(), window.end());
        match self {
            Metric::HeartRateIntraday => {
                Request::get(format!("1/user/-/activities/heart/date/{s}/1d/1sec.json"))
            }
            Metric::StepsIntraday => {
                Request::get(format!("1/user/-/activities/steps/date/{s}/1d/1min.json"))
            }
            Metric::Hrv => Request::get(format!("1/user/-/hrv/date/{s}/{e}.json")),
            Metric::BreathingRate => Request::get(format!("1/user/-/br/date/{s}/{e}.json")),
            Metric::SkinTemperature => {
                Request::get(format!("1/user/-/temp/skin/date/{s}/{e}.json"))
            }
            Metric::Spo2Intraday => Request::get(format!("1/user/-/spo2/date/{s}/{e}/all.json")),
            Metric::Sleep => Request::get(format!("1.2/user/-/sleep/date/{s}/{e}.json")),
            Metric::ActivityMinutes(kind) => Request::get(format!(
                "1/user/-/activities/tracker/{}/date/{s}/{e}.json",
                kind.resource()
            )),
            Metric::TrackerTotal(kind) => Request::get(format!(
                "1/user/-/activities/tracker/{}/date/{s}/{e}.json",
                kind.resource()
            )),
            Metric::HeartZones => {
                Request::get(format!("1/user/-/activities/heart/date/{s}/{e}.json"))
            }
            Metric::Spo2Daily => Request::get(format!("1/user/-/spo2/date/{s}/{e}.json")),
            Metric::Battery => Request::get("1/user/-/devices.json".to_string()),
            Metric::RecentActivities => Request {
                endpoint: "1/user/-/activities/list.json".to_string(),
                params: vec![
                    ("beforeDate", e.to_string()),
                    ("sort", "desc".to_string()),
                    ("limit", RECENT_ACTIVITY_LIMIT.to_string()),
                    ("offset", "0".to_string()),
                ],
            },
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Account profile endpoint, used to discover the timezone.
pub const PROFILE_ENDPOINT: &str = "1/user/-/profile.json";
