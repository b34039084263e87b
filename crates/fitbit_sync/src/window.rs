//! Calendar date windows and the partitioner that splits a long range into
//! endpoint-sized chunks.

use chrono::{Days, NaiveDate};
use std::fmt;

use crate::error::SyncError;

/// Inclusive pair of calendar dates, `start <= end`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DateWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, SyncError> {
        if start > end {
            return Err(SyncError::InvalidRange(format!(
                "start {start} is after end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn single(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    /// Window of `days_back` days ending at `end`, i.e. `days_back + 1` dates.
    pub fn trailing(end: NaiveDate, days_back: u32) -> Self {
        let start = end
            .checked_sub_days(Days::new(u64::from(days_back)))
            .unwrap_or(NaiveDate::MIN);
        Self { start, end }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of calendar dates covered, both ends included.
    pub fn day_count(&self) -> u64 {
        (self.end - self.start).num_days() as u64 + 1
    }

    pub fn is_single_day(&self) -> bool {
        self.start == self.end
    }

    /// Every date of the window, in order.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        let start = self.start;
        (0..self.day_count()).filter_map(move |i| start.checked_add_days(Days::new(i)))
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_single_day() {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{} to {}", self.start, self.end)
        }
    }
}

/// Split `full_range` into chunks stepping `span_days` dates at a time.
///
/// Chunk `i` is `(d[i*span], d[min((i+1)*span, n-1)])`, so neighbouring
/// chunks share their boundary date and each covers at most `span + 1` dates.
/// A zero span is treated as one day.
pub fn partition(full_range: DateWindow, span_days: u32) -> Partition {
    Partition {
        range: full_range,
        span: u64::from(span_days.max(1)),
        cursor: Some(0),
    }
}

/// Iterator returned by [`partition`].
#[derive(Clone, Debug)]
pub struct Partition {
    range: DateWindow,
    span: u64,
    cursor: Option<u64>,
}

impl Iterator for Partition {
    type Item = DateWindow;

    fn next(&mut self) -> Option<DateWindow> {
        let start_idx = self.cursor?;
        let last = self.range.day_count() - 1;
        let end_idx = (start_idx + self.span).min(last);
        self.cursor = (end_idx < last).then_some(end_idx);

        let start = self.range.start.checked_add_days(Days::new(start_idx))?;
        let end = self.range.start.checked_add_days(Days::new(end_idx))?;
        Some(DateWindow { start, end })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let Some(start_idx) = self.cursor else {
            return (0, Some(0));
        };
        let last = self.range.day_count() - 1;
        let remaining = if last == start_idx {
            1
        } else {
            (last - start_idx).div_ceil(self.span)
        };
        let remaining = remaining as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Partition {}
