//! Daily attendance records: one row per user per date.

use rollcall_core::error::StoreError;
use rusqlite::{params, OptionalExtension};
use serde::Serialize;
use tokio_rusqlite::Connection;
use uuid::Uuid;

use crate::db::{map_store_err, now, Db};

#[derive(Debug, Clone, Serialize)]
pub struct Attendance {
    pub id: String,
    pub user_id: i64,
    pub date: String,
    pub check_in: Option<String>,
    pub check_out: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub distance_m: Option<f64>,
    pub activity_note: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Check-in payload: `time` is HH:MM:SS, `date` is YYYY-MM-DD.
#[derive(Debug, Clone)]
pub struct CheckIn {
    pub user_id: i64,
    pub date: String,
    pub time: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub distance_m: Option<f64>,
}

#[derive(Clone)]
pub struct AttendanceStore {
    conn: Connection,
}

impl AttendanceStore {
    pub fn new(db: &Db) -> Self {
        Self {
            conn: db.connection(),
        }
    }

    /// Upsert the day's row and stamp the check-in time. Re-checking in on
    /// the same date overwrites the previous check-in, never duplicates.
    pub async fn check_in(&self, entry: CheckIn) -> Result<Attendance, StoreError> {
        let id = Uuid::new_v4().to_string();
        let stamp = now();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO attendances
                        (id, user_id, date, check_in, latitude, longitude, distance_m,
                         created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
                     ON CONFLICT(user_id, date) DO UPDATE SET
                        check_in = excluded.check_in,
                        latitude = excluded.latitude,
                        longitude = excluded.longitude,
                        distance_m = excluded.distance_m,
                        updated_at = excluded.updated_at",
                    params![
                        id,
                        entry.user_id,
                        entry.date,
                        entry.time,
                        entry.latitude,
                        entry.longitude,
                        entry.distance_m,
                        stamp,
                    ],
                )?;
                let row = conn.query_row(
                    "SELECT * FROM attendances WHERE user_id = ?1 AND date = ?2",
                    params![entry.user_id, entry.date],
                    read_attendance,
                )?;
                Ok(row)
            })
            .await
            .map_err(map_store_err)
    }

    /// Stamp the check-out time on an existing day's row. `None` when the
    /// user never checked in on that date.
    pub async fn check_out(
        &self,
        user_id: i64,
        date: &str,
        time: &str,
        activity: Option<String>,
    ) -> Result<Option<Attendance>, StoreError> {
        let date = date.to_string();
        let time = time.to_string();
        let stamp = now();
        self.conn
            .call(move |conn| {
                let updated = conn.execute(
                    "UPDATE attendances
                     SET check_out = ?3,
                         activity_note = COALESCE(?4, activity_note),
                         updated_at = ?5
                     WHERE user_id = ?1 AND date = ?2",
                    params![user_id, date, time, activity, stamp],
                )?;
                if updated == 0 {
                    return Ok(None);
                }
                let row = conn
                    .query_row(
                        "SELECT * FROM attendances WHERE user_id = ?1 AND date = ?2",
                        params![user_id, date],
                        read_attendance,
                    )
                    .optional()?;
                Ok(row)
            })
            .await
            .map_err(map_store_err)
    }

    /// Newest-first listing, optionally filtered by user, capped at 200.
    pub async fn list(&self, user_id: Option<i64>) -> Result<Vec<Attendance>, StoreError> {
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT * FROM attendances
                     WHERE (?1 IS NULL OR user_id = ?1)
                     ORDER BY date DESC LIMIT 200",
                )?;
                let rows = stmt
                    .query_map([user_id], read_attendance)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(map_store_err)
    }
}

fn read_attendance(row: &rusqlite::Row<'_>) -> rusqlite::Result<Attendance> {
    Ok(Attendance {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        date: row.get("date")?,
        check_in: row.get("check_in")?,
        check_out: row.get("check_out")?,
        latitude: row.get("latitude")?,
        longitude: row.get("longitude")?,
        distance_m: row.get("distance_m")?,
        activity_note: row.get("activity_note")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
