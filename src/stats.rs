//! Progress statistics derived from the completion log
//!
//! Two different "streak" numbers are kept apart on purpose:
//! - `distinct_active_days`: how many calendar dates have any completion,
//!   with gaps allowed
//! - `daily_streak`: consecutive calendar days with a completion, broken by
//!   any missed day

use std::collections::BTreeSet;

use chrono::{Local, NaiveDate, TimeZone};

use crate::catalog::{Catalog, PROGRAM_DAYS};
use crate::db::CompletionRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayStatus {
    Completed,
    Rest,
    Open,
}

/// Training progress over the 30-day program
pub struct Progress {
    completed_days: BTreeSet<u8>,
    active_dates: BTreeSet<NaiveDate>,
    total_duration_secs: u64,
    sessions: usize,
}

impl Progress {
    /// Calendar dates are taken in the local timezone
    pub fn new(records: &[CompletionRecord]) -> Self {
        Self::with_timezone(records, &Local)
    }

    pub fn with_timezone<Tz: TimeZone>(records: &[CompletionRecord], tz: &Tz) -> Self {
        Self {
            completed_days: records.iter().map(|r| r.day_number).collect(),
            active_dates: records
                .iter()
                .map(|r| r.completed_at.with_timezone(tz).date_naive())
                .collect(),
            total_duration_secs: records.iter().map(|r| r.duration_secs).sum(),
            sessions: records.len(),
        }
    }

    /// Distinct day numbers with at least one record
    pub fn completed_days(&self) -> &BTreeSet<u8> {
        &self.completed_days
    }

    pub fn is_completed(&self, day: u8) -> bool {
        self.completed_days.contains(&day)
    }

    /// Share of the program completed, rounded to a whole percent
    pub fn percent_complete(&self) -> u8 {
        let done = self.completed_days.len() as f64;
        (done / PROGRAM_DAYS as f64 * 100.0).round().min(100.0) as u8
    }

    /// Calendar dates with any completion. Gaps don't reset this.
    pub fn distinct_active_days(&self) -> usize {
        self.active_dates.len()
    }

    /// Consecutive days with a completion, ending today. If nothing is
    /// logged today yet the streak ending yesterday still counts.
    pub fn daily_streak(&self, today: NaiveDate) -> usize {
        let mut day = if self.active_dates.contains(&today) {
            today
        } else {
            match today.pred_opt() {
                Some(yesterday) => yesterday,
                None => return 0,
            }
        };

        let mut streak = 0;
        while self.active_dates.contains(&day) {
            streak += 1;
            day = match day.pred_opt() {
                Some(prev) => prev,
                None => break,
            };
        }
        streak
    }

    /// Lowest program day not completed yet
    pub fn next_day(&self) -> Option<u8> {
        (1..=PROGRAM_DAYS).find(|d| !self.completed_days.contains(d))
    }

    pub fn total_duration_secs(&self) -> u64 {
        self.total_duration_secs
    }

    /// Number of records, repeats included
    pub fn sessions(&self) -> usize {
        self.sessions
    }

    pub fn day_status(&self, day: u8, catalog: &Catalog) -> DayStatus {
        if self.is_completed(day) {
            DayStatus::Completed
        } else if catalog.is_rest_day(day) {
            DayStatus::Rest
        } else {
            DayStatus::Open
        }
    }
}

/// Format seconds as "45s", "3m 20s" or "1h 5m"
pub fn format_duration(secs: u64) -> String {
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}
