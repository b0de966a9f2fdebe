use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use log::info;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::{
    connection::Database,
    helpers::{
        format_date, from_json, parse_date, parse_datetime, parse_optional_json, parse_status,
        to_json, to_u32,
    },
};
use crate::models::{AttendanceRecord, AttendanceUpdate, NewAttendanceRecord, NewPhoto};
use crate::store::AttendanceRecordStore;

const SELECT_COLUMNS: &str = "SELECT id, user_id, date, clock_in, clock_out, status,
        late_by_minutes, worked_minutes, created_at, updated_at
     FROM attendance";

fn row_to_record(row: &Row) -> Result<AttendanceRecord> {
    let date: String = row.get("date")?;
    let clock_in: String = row.get("clock_in")?;
    let clock_out: Option<String> = row.get("clock_out")?;
    let status: String = row.get("status")?;
    let worked_minutes: Option<i64> = row.get("worked_minutes")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(AttendanceRecord {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        date: parse_date(&date, "date")?,
        clock_in: from_json(&clock_in, "clock_in")?,
        clock_out: parse_optional_json(clock_out, "clock_out")?,
        status: parse_status(&status)?,
        late_by_minutes: to_u32(row.get("late_by_minutes")?, "late_by_minutes")?,
        worked_minutes: worked_minutes
            .map(|minutes| to_u32(minutes, "worked_minutes"))
            .transpose()?,
        created_at: parse_datetime(&created_at, "created_at")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

fn load_record(conn: &Connection, id: &str) -> Result<Option<AttendanceRecord>> {
    let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} WHERE id = ?1"))?;
    let mut rows = stmt.query(params![id])?;
    match rows.next()? {
        Some(row) => row_to_record(row).map(Some),
        None => Ok(None),
    }
}

impl Database {
    /// Inserts today's record. Refuses a second record for the same user and day.
    pub async fn insert_attendance(&self, record: NewAttendanceRecord) -> Result<AttendanceRecord> {
        self.execute(move |conn| {
            let date = format_date(record.date);

            // Checked inside the same DB task; the unique index backs it up.
            let existing: Option<String> = conn
                .query_row(
                    "SELECT id FROM attendance WHERE user_id = ?1 AND date = ?2",
                    params![record.user_id, date],
                    |row| row.get(0),
                )
                .optional()?;
            if existing.is_some() {
                bail!(
                    "attendance already recorded for {} on {}",
                    record.user_id,
                    date
                );
            }

            let id = Uuid::new_v4().to_string();
            let now = Utc::now().to_rfc3339();
            conn.execute(
                "INSERT INTO attendance (id, user_id, date, clock_in, clock_out, status, late_by_minutes, worked_minutes, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, NULL, ?5, ?6, NULL, ?7, ?7)",
                params![
                    id,
                    record.user_id,
                    date,
                    to_json(&record.clock_in, "clock_in")?,
                    record.status.as_str(),
                    record.late_by_minutes,
                    now,
                ],
            )
            .with_context(|| "failed to insert attendance")?;

            load_record(conn, &id)?.ok_or_else(|| anyhow!("attendance {id} not found after insert"))
        })
        .await
    }

    /// Sets the clock-out on an open record. The original clock-in is left as is.
    pub async fn close_attendance(&self, id: &str, update: AttendanceUpdate) -> Result<AttendanceRecord> {
        let id = id.to_string();
        self.execute(move |conn| {
            let changed = conn
                .execute(
                    "UPDATE attendance
                     SET clock_out = ?1,
                         status = ?2,
                         worked_minutes = ?3,
                         updated_at = ?4
                     WHERE id = ?5 AND clock_out IS NULL",
                    params![
                        to_json(&update.clock_out, "clock_out")?,
                        update.status.as_str(),
                        update.worked_minutes,
                        Utc::now().to_rfc3339(),
                        id,
                    ],
                )
                .with_context(|| "failed to update attendance")?;

            if changed == 0 {
                return match load_record(conn, &id)? {
                    Some(_) => Err(anyhow!("attendance {id} is already clocked out")),
                    None => Err(anyhow!("attendance {id} not found")),
                };
            }

            load_record(conn, &id)?.ok_or_else(|| anyhow!("attendance {id} not found after update"))
        })
        .await
    }

    pub async fn attendance_between(
        &self,
        user_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "{SELECT_COLUMNS}
                 WHERE user_id = ?1 AND date >= ?2 AND date <= ?3
                 ORDER BY date ASC"
            ))?;
            let mut rows = stmt.query(params![user_id, format_date(from), format_date(to)])?;

            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(row_to_record(row)?);
            }
            Ok(records)
        })
        .await
    }
}

#[async_trait]
impl AttendanceRecordStore for Database {
    async fn find_by_user_between(
        &self,
        user_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>> {
        self.attendance_between(user_id, from, to).await
    }

    async fn create(&self, record: NewAttendanceRecord) -> Result<AttendanceRecord> {
        let created = self.insert_attendance(record).await?;
        info!("Attendance {} created for {}", created.id, created.user_id);
        Ok(created)
    }

    async fn update(&self, id: &str, update: AttendanceUpdate) -> Result<AttendanceRecord> {
        self.close_attendance(id, update).await
    }

    async fn save_photo(&self, photo: NewPhoto) -> Result<String> {
        self.insert_photo(photo).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::models::{AttendanceStatus, ClockEvent, Coordinate, PositionReading, PositionSource};

    fn event(photo_ref: &str) -> ClockEvent {
        let now = Utc::now();
        ClockEvent {
            time: now,
            position: PositionReading {
                coords: Coordinate::new(17.966667, 102.6).expect("valid coordinate"),
                accuracy_meters: Some(5.0),
                source: PositionSource::Gps,
                captured_at: now,
            },
            address: "Lane Xang Avenue".into(),
            device_fingerprint: "geoclock/0.1.0-linux-x86_64-unknownxunknown-unknown".into(),
            photo_ref: photo_ref.into(),
            token_value: "emp-7:1:ab".into(),
            matched_location: Some("Head Office".into()),
        }
    }

    fn new_record(date: NaiveDate) -> NewAttendanceRecord {
        NewAttendanceRecord {
            user_id: "emp-7".into(),
            date,
            clock_in: event("photo-in"),
            status: AttendanceStatus::Late,
            late_by_minutes: 12,
        }
    }

    fn open_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(dir.path().join("geoclock.db")).expect("open db");
        (dir, db)
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).expect("valid date")
    }

    #[tokio::test]
    async fn create_then_read_back() {
        let (_dir, db) = open_db();
        let created = db.create(new_record(day(4))).await.expect("create");

        assert_eq!(created.status, AttendanceStatus::Late);
        assert_eq!(created.late_by_minutes, 12);
        assert_eq!(created.clock_in.address, "Lane Xang Avenue");
        assert!(created.clock_out.is_none());

        let found = db
            .find_by_user_between("emp-7", day(4), day(4))
            .await
            .expect("find");
        assert_eq!(found, vec![created]);
    }

    #[tokio::test]
    async fn second_record_same_day_is_rejected() {
        let (_dir, db) = open_db();
        db.create(new_record(day(4))).await.expect("first");
        let err = db.create(new_record(day(4))).await.expect_err("duplicate");
        assert!(err.to_string().contains("already recorded"));

        db.create(new_record(day(5))).await.expect("next day is fine");
    }

    #[tokio::test]
    async fn clock_out_sets_once_and_keeps_clock_in() {
        let (_dir, db) = open_db();
        let created = db.create(new_record(day(4))).await.expect("create");
        let mut clock_out = event("photo-out");
        clock_out.time = created.clock_in.time + Duration::hours(9);

        let closed = db
            .update(
                &created.id,
                AttendanceUpdate {
                    clock_out: clock_out.clone(),
                    status: AttendanceStatus::Completed,
                    worked_minutes: 540,
                },
            )
            .await
            .expect("close");

        assert_eq!(closed.clock_in, created.clock_in);
        assert_eq!(closed.clock_out, Some(clock_out.clone()));
        assert_eq!(closed.worked_minutes, Some(540));
        assert_eq!(closed.status, AttendanceStatus::Completed);

        let again = db
            .update(
                &created.id,
                AttendanceUpdate {
                    clock_out,
                    status: AttendanceStatus::Completed,
                    worked_minutes: 600,
                },
            )
            .await
            .expect_err("already closed");
        assert!(again.to_string().contains("already clocked out"));
    }

    #[tokio::test]
    async fn update_unknown_record_fails() {
        let (_dir, db) = open_db();
        let err = db
            .update(
                "missing",
                AttendanceUpdate {
                    clock_out: event("photo-out"),
                    status: AttendanceStatus::Completed,
                    worked_minutes: 1,
                },
            )
            .await
            .expect_err("no such record");
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn range_query_is_inclusive_and_ordered() {
        let (_dir, db) = open_db();
        for d in [6, 4, 5, 9] {
            db.create(new_record(day(d))).await.expect("create");
        }
        let mut other = new_record(day(5));
        other.user_id = "emp-8".into();
        db.create(other).await.expect("other user");

        let dates: Vec<NaiveDate> = db
            .find_by_user_between("emp-7", day(4), day(6))
            .await
            .expect("range")
            .into_iter()
            .map(|record| record.date)
            .collect();
        assert_eq!(dates, vec![day(4), day(5), day(6)]);
    }
}
