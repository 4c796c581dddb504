/// Database module for storing scraped reservation slots
use chrono::NaiveDate;
use rusqlite::{params, Connection, Result, Row};
use std::sync::{Mutex, MutexGuard};

use crate::ingest::ReservationRecord;

const SCHEMA_SQL: &str = include_str!("../../../../sql/init_reservations.sql");

const SELECT_COLUMNS: &str = "SELECT category, room_name, student_id, student_name, reservation_date,
        reservation_time_slot, original_title, crawled_at
 FROM reservations";

pub struct ReservationDbManager {
    db: Mutex<Connection>,
}

impl ReservationDbManager {
    /// Opens (or creates) the database file and initializes the schema
    pub fn new(db_path: &str) -> Result<Self> {
        Self::from_connection(Connection::open(db_path)?)
    }

    /// Opens a private in-memory database with the schema applied
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        // A panic while holding the lock can't leave a half-applied statement
        // behind, so a poisoned connection is still usable.
        self.db.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Deletes every reservation on any of the given dates, across all categories.
    ///
    /// Returns the number of rows removed.
    pub fn delete_for_dates(&self, dates: &[NaiveDate]) -> Result<usize> {
        let mut db = self.conn();
        let tx = db.transaction()?;
        let mut removed = 0;
        {
            let mut stmt = tx.prepare("DELETE FROM reservations WHERE reservation_date = ?1")?;
            for date in dates {
                removed += stmt.execute([date])?;
            }
        }
        tx.commit()?;
        Ok(removed)
    }

    /// Inserts a batch of reservation slots in one transaction
    pub fn insert_reservations(&self, records: &[ReservationRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut db = self.conn();
        let tx = db.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO reservations (
                    category, room_name, student_id, student_name, reservation_date,
                    reservation_time_slot, original_title, crawled_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;

            for r in records {
                stmt.execute(params![
                    r.category,
                    r.room_name,
                    r.student_id,
                    r.student_name,
                    r.reservation_date,
                    r.reservation_time_slot,
                    r.original_title,
                    r.crawled_at,
                ])?;
            }
        }
        tx.commit()
    }

    /// Gets the reservations on a date, ordered by room then time slot.
    ///
    /// `category` restricts the result to categories containing that substring.
    pub fn get_reservations(
        &self,
        date: NaiveDate,
        category: Option<&str>,
    ) -> Result<Vec<ReservationRecord>> {
        let db = self.conn();

        let records = match category {
            Some(filter) => {
                let mut stmt = db.prepare(&format!(
                    "{SELECT_COLUMNS}
                     WHERE reservation_date = ?1 AND instr(category, ?2) > 0
                     ORDER BY room_name, reservation_time_slot"
                ))?;
                let rows = stmt.query_map(params![date, filter], record_from_row)?;
                rows.collect::<Result<Vec<_>>>()?
            }
            None => {
                let mut stmt = db.prepare(&format!(
                    "{SELECT_COLUMNS}
                     WHERE reservation_date = ?1
                     ORDER BY room_name, reservation_time_slot"
                ))?;
                let rows = stmt.query_map([date], record_from_row)?;
                rows.collect::<Result<Vec<_>>>()?
            }
        };

        Ok(records)
    }

    /// Counts stored reservations on a date
    pub fn count_for_date(&self, date: NaiveDate) -> Result<usize> {
        let db = self.conn();
        let count: i64 = db.query_row(
            "SELECT COUNT(*) FROM reservations WHERE reservation_date = ?1",
            [date],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

fn record_from_row(row: &Row<'_>) -> Result<ReservationRecord> {
    Ok(ReservationRecord {
        category: row.get(0)?,
        room_name: row.get(1)?,
        student_id: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        student_name: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        reservation_date: row.get(4)?,
        reservation_time_slot: row.get(5)?,
        original_title: row.get(6)?,
        crawled_at: row.get(7)?,
    })
}
