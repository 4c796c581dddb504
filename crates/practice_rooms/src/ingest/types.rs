/// Types for reservation ingestion
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One stored reservation slot. A midnight-spanning booking produces two of these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationRecord {
    pub category: String,
    pub room_name: String,
    pub student_id: String,
    pub student_name: String,
    pub reservation_date: NaiveDate,
    pub reservation_time_slot: String,
    pub original_title: String,
    pub crawled_at: String,
}

/// Fields pulled out of a title like `123/Jane Doe/6.15/23-02`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTitle {
    pub student_id: String,
    pub student_name: String,
    pub month: u32,
    pub day: u32,
    pub start_hour: u8,
    pub end_hour: u8,
}

impl ParsedTitle {
    /// Resolves `month.day` against the given year.
    ///
    /// Returns `None` when the pair isn't a real date in that year (e.g. `2.30`).
    pub fn date_in_year(&self, year: i32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(year, self.month, self.day)
    }
}

/// A day-bounded `HH-HH` range. `end` may be 24 and `start` may be 0 when
/// produced by a midnight split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSlot {
    pub start: u8,
    pub end: u8,
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}-{:02}", self.start, self.end)
    }
}

/// The target date and the day before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetWindow {
    pub previous: NaiveDate,
    pub target: NaiveDate,
}

impl TargetWindow {
    /// Returns `None` only for the earliest representable date.
    pub fn ending_on(target: NaiveDate) -> Option<Self> {
        let previous = target.checked_sub_days(Days::new(1))?;
        Some(Self { previous, target })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date == self.previous || date == self.target
    }

    /// Both dates, earliest first.
    pub fn dates(&self) -> [NaiveDate; 2] {
        [self.previous, self.target]
    }
}

/// One `articles.push({...})` entry lifted out of a board page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawArticle {
    /// The text between the braces, untouched
    pub raw: String,
    pub title: Option<String>,
    /// Room label (`headCont`)
    pub head_cont: Option<String>,
}

/// Outcome of a completed ingestion run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub window: TargetWindow,
    pub records: Vec<ReservationRecord>,
    /// (date, category) pairs that were skipped: no mapping, fetch failure, or no data script
    pub skipped_pairs: usize,
    /// Titles dropped because they did not parse
    pub unparsed_titles: usize,
}

impl IngestReport {
    pub fn new(window: TargetWindow) -> Self {
        Self {
            window,
            records: Vec::new(),
            skipped_pairs: 0,
            unparsed_titles: 0,
        }
    }

    /// True when no pair was skipped and no title was dropped.
    pub fn is_clean(&self) -> bool {
        self.skipped_pairs == 0 && self.unparsed_titles == 0
    }
}
