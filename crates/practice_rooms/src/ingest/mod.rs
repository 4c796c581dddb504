/// Reservation ingestion: fetch board pages, pull out posts, and store parsed slots
mod client;
mod config;
mod error;
mod extract;
mod job;
mod split;
mod title;
mod types;

pub use client::{HttpPageFetcher, PageFetcher};
pub use config::{Category, SourceConfig};
pub use error::IngestError;
pub use job::RefreshQueue;
pub use types::ReservationRecord;

use client::SourceFetcher;
use config::CategoryScope;
use extract::extract_raw_records;
use split::split_reservation;
use title::parse_title;
use types::{IngestReport, RawArticle, TargetWindow};

use crate::db::ReservationDbManager;
use chrono::{Datelike, Local, NaiveDate, NaiveDateTime};
use dashmap::DashMap;
use rand::Rng;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{error, info, warn};

/// Upper bound on one ingestion run, enforced by the triggers.
pub const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Drives one ingestion run over a target window.
pub struct Ingestor {
    db: Arc<ReservationDbManager>,
    fetcher: SourceFetcher,
    /// Per-date locks; a run holds the locks for both dates of its window
    run_locks: DashMap<NaiveDate, Arc<Mutex<()>>>,
    run_timeout: Duration,
}

/// What one (date, category) pair produced.
struct PairOutcome {
    records: Vec<ReservationRecord>,
    unparsed_titles: usize,
}

impl Ingestor {
    pub fn new(
        db: Arc<ReservationDbManager>,
        sources: Arc<SourceConfig>,
        pages: Arc<dyn PageFetcher>,
    ) -> Self {
        Self {
            db,
            fetcher: SourceFetcher::new(sources, pages),
            run_locks: DashMap::new(),
            run_timeout: DEFAULT_RUN_TIMEOUT,
        }
    }

    pub fn with_run_timeout(mut self, run_timeout: Duration) -> Self {
        self.run_timeout = run_timeout;
        self
    }

    /// Runs [`Ingestor::ingest`] bounded by the run timeout.
    pub async fn ingest_bounded(
        &self,
        date: &str,
        category: &str,
    ) -> Result<IngestReport, IngestError> {
        match tokio::time::timeout(self.run_timeout, self.ingest(date, category)).await {
            Ok(result) => result,
            Err(_) => Err(IngestError::Timeout {
                after: self.run_timeout,
            }),
        }
    }

    /// Scrapes and stores reservations for `date` and the day before it.
    ///
    /// # Arguments
    /// * `date` - Target date, `YYYY-MM-DD`
    /// * `category` - A category name, or `all`
    ///
    /// # Returns
    /// * `Ok(IngestReport)` - Every record written, plus skip counts
    /// * `Err(IngestError::InvalidDate)` - Nothing was deleted or written
    /// * `Err(IngestError::Storage)` - The database failed mid-run
    pub async fn ingest(&self, date: &str, category: &str) -> Result<IngestReport, IngestError> {
        self.ingest_at(date, category, Local::now().naive_local())
            .await
    }

    /// [`Ingestor::ingest`] with an explicit run time, which sets both
    /// `crawled_at` and the year assumed for `month.day` titles.
    pub async fn ingest_at(
        &self,
        date: &str,
        category: &str,
        now: NaiveDateTime,
    ) -> Result<IngestReport, IngestError> {
        let invalid = || IngestError::InvalidDate {
            input: date.to_string(),
        };
        let target = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").map_err(|_| invalid())?;
        let window = TargetWindow::ending_on(target).ok_or_else(invalid)?;
        let scope = CategoryScope::parse(category);

        let run_id = generate_run_id();
        let start = Instant::now();
        let _guards = self.lock_window(&window).await;

        info!(
            run_id = %run_id,
            target = %window.target,
            previous = %window.previous,
            scope = ?scope,
            "Starting ingestion run"
        );

        let removed = self.db.delete_for_dates(&window.dates())?;
        info!(run_id = %run_id, removed, "Cleared existing reservations for window");

        let crawled_at = now.format("%Y-%m-%d %H:%M:%S").to_string();
        let mut report = IngestReport::new(window);

        for date in window.dates() {
            let day = date.weekday();

            let categories = match &scope {
                CategoryScope::All => Category::ALL.to_vec(),
                CategoryScope::One(c) => vec![*c],
                CategoryScope::Unknown(name) => {
                    info!(
                        run_id = %run_id,
                        category = %name,
                        day = %day,
                        "No URL mapping found for category, skipping"
                    );
                    report.skipped_pairs += 1;
                    continue;
                }
            };

            for category in categories {
                match self
                    .process_pair(category, day, &window, now.year(), &crawled_at)
                    .await
                {
                    Ok(outcome) => {
                        self.db.insert_reservations(&outcome.records)?;
                        info!(
                            run_id = %run_id,
                            category = %category,
                            date = %date,
                            stored = outcome.records.len(),
                            unparsed = outcome.unparsed_titles,
                            "Stored reservations for page"
                        );
                        report.unparsed_titles += outcome.unparsed_titles;
                        report.records.extend(outcome.records);
                    }
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => {
                        match &e {
                            IngestError::MissingSourceMapping { .. } => {
                                info!(run_id = %run_id, date = %date, "{}. Skipping.", e)
                            }
                            IngestError::StructuralAnomaly { .. } => warn!(
                                run_id = %run_id,
                                date = %date,
                                "{}. The board layout may have changed.",
                                e
                            ),
                            _ => warn!(run_id = %run_id, date = %date, error = %e, "Skipping page"),
                        }
                        report.skipped_pairs += 1;
                    }
                }
            }
        }

        info!(
            run_id = %run_id,
            records = report.records.len(),
            skipped_pairs = report.skipped_pairs,
            unparsed_titles = report.unparsed_titles,
            duration_ms = start.elapsed().as_millis() as u64,
            "Ingestion run finished"
        );

        Ok(report)
    }

    /// Fetch, extract, parse and split one board page.
    async fn process_pair(
        &self,
        category: Category,
        day: chrono::Weekday,
        window: &TargetWindow,
        year: i32,
        crawled_at: &str,
    ) -> Result<PairOutcome, IngestError> {
        let page = self.fetcher.fetch(category, day).await?;
        let raw_records = extract_raw_records(&page.body, &page.url)?;

        let mut outcome = PairOutcome {
            records: Vec::new(),
            unparsed_titles: 0,
        };

        for raw in &raw_records {
            let article = RawArticle::from_raw(raw);
            match records_for_article(&article, category, window, year, crawled_at) {
                Ok(records) => outcome.records.extend(records),
                Err(e) => {
                    warn!(category = %category, raw = %article.raw.trim(), "{}", e);
                    outcome.unparsed_titles += 1;
                }
            }
        }

        Ok(outcome)
    }

    /// Acquires the run locks for both window dates, earliest first.
    async fn lock_window(&self, window: &TargetWindow) -> WindowGuard<'_> {
        let mut window_guard = WindowGuard {
            run_locks: &self.run_locks,
            dates: window.dates(),
            guards: Vec::with_capacity(2),
        };
        for date in window.dates() {
            let lock = self
                .run_locks
                .entry(date)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone();
            window_guard.guards.push(lock.lock_owned().await);
        }
        window_guard
    }
}

/// Holds a run's window locks. Dropping it releases the locks and forgets
/// any date no other run is holding or waiting on.
struct WindowGuard<'a> {
    run_locks: &'a DashMap<NaiveDate, Arc<Mutex<()>>>,
    dates: [NaiveDate; 2],
    guards: Vec<OwnedMutexGuard<()>>,
}

impl Drop for WindowGuard<'_> {
    fn drop(&mut self) {
        self.guards.clear();
        for date in &self.dates {
            self.run_locks
                .remove_if(date, |_, lock| Arc::strong_count(lock) == 1);
        }
    }
}

/// Builds the stored slots for one article, or a parse mismatch.
fn records_for_article(
    article: &RawArticle,
    category: Category,
    window: &TargetWindow,
    year: i32,
    crawled_at: &str,
) -> Result<Vec<ReservationRecord>, IngestError> {
    let title = article.title.as_deref().unwrap_or_default();
    let parsed = parse_title(title)?;
    let date = parsed
        .date_in_year(year)
        .ok_or_else(|| IngestError::TitleParseMismatch {
            title: title.to_string(),
        })?;

    let room_name = article.room_name_or(category.as_str());

    Ok(split_reservation(&parsed, date, window)
        .into_iter()
        .map(|(slot_date, slot)| ReservationRecord {
            category: category.to_string(),
            room_name: room_name.to_string(),
            student_id: parsed.student_id.clone(),
            student_name: parsed.student_name.clone(),
            reservation_date: slot_date,
            reservation_time_slot: slot.to_string(),
            original_title: title.to_string(),
            crawled_at: crawled_at.to_string(),
        })
        .collect())
}

/// Generates a short random id for tying log lines and jobs together.
pub(crate) fn generate_run_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros();
    let random: u32 = rand::thread_rng().gen();
    format!("{:x}-{:08x}", timestamp & 0xFFFFFFFF, random)
}

/// Logs the outcome of a run the way every trigger reports it.
pub(crate) fn log_run_result(
    trigger: &str,
    date: &str,
    category: &str,
    result: &Result<IngestReport, IngestError>,
) {
    match result {
        Ok(report) if report.is_clean() => info!(
            trigger,
            date,
            category,
            records = report.records.len(),
            "Ingestion completed"
        ),
        Ok(report) => warn!(
            trigger,
            date,
            category,
            records = report.records.len(),
            skipped_pairs = report.skipped_pairs,
            unparsed_titles = report.unparsed_titles,
            "Ingestion completed with partial errors"
        ),
        Err(e) => error!(trigger, date, category, error = %e, "Ingestion failed"),
    }
}
