//! Storage layer for kiddoz-enroll.
//!
//! This module provides `SQLite`-based persistence for enrollment records and
//! their capture payloads, and the [`SqliteSink`] the commit service writes
//! through.

pub mod migrations;
pub mod schema;
mod sink;

pub use sink::SqliteSink;

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::capture::{CapturePayload, CaptureSlot};
use crate::error::{Error, Result};
use crate::profile::ChildProfile;
use crate::record::{EnrollmentRecord, NewEnrollment, OperationalStatus, StoredEnrollment, StudentId};

const SELECT_RECORD: &str = r"
SELECT e.id, e.student_id, e.guardian_id, e.plan_id, e.plan_name, e.profile,
       e.temperature, e.mood, e.meal, e.attendance, e.created_at,
       f.digest, b.digest
FROM enrollments e
LEFT JOIN enrollment_captures f ON f.enrollment_id = e.id AND f.slot = 'face'
LEFT JOIN enrollment_captures b ON b.enrollment_id = e.id AND b.slot = 'body'
";

/// Storage engine for enrollments.
///
/// Provides persistent storage using `SQLite` with support for:
/// - Atomic insertion of a record and both capture payloads
/// - Replay detection on the draft token
/// - Lookup by student identifier and listing by guardian
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl Storage {
    /// Open or create a storage database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    /// Initializes the schema if this is a new database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::initialize_schema(&conn)?;

        info!("Database opened at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory storage instance.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `record` and both capture payloads in one transaction.
    ///
    /// If a record with the same draft token exists, nothing is written and
    /// the existing record is returned with `replayed` set.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails, including when the generated
    /// student identifier is already taken.
    pub fn insert_enrollment(&mut self, record: &NewEnrollment) -> Result<StoredEnrollment> {
        let profile = serde_json::to_string(&record.profile)?;
        let created_at = Utc::now();

        let tx = self.conn.transaction()?;
        let existing = tx
            .query_row(
                "SELECT id, student_id, created_at FROM enrollments WHERE draft_token = ?1",
                [record.draft_token.as_str()],
                |row| {
                    Ok(StoredEnrollment {
                        document_id: row.get(0)?,
                        student_id: parse_student_id(row, 1)?,
                        created_at: parse_timestamp(row, 2)?,
                        replayed: true,
                    })
                },
            )
            .optional()?;
        if let Some(existing) = existing {
            debug!(
                "Draft {} already stored as {}",
                record.draft_token, existing.student_id
            );
            return Ok(existing);
        }

        tx.execute(
            r"
            INSERT INTO enrollments (
                student_id, draft_token, guardian_id, plan_id, plan_name, child_name,
                profile, temperature, mood, meal, attendance, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ",
            params![
                record.student_id.as_str(),
                record.draft_token.as_str(),
                record.guardian_id,
                record.plan_id,
                record.plan_name,
                record.profile.name,
                profile,
                record.status.temperature,
                record.status.mood,
                record.status.meal,
                record.status.attendance,
                created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
            ],
        )?;

        let document_id = tx.last_insert_rowid();
        for (slot, payload) in [
            (CaptureSlot::Face, &record.face),
            (CaptureSlot::Body, &record.body),
        ] {
            tx.execute(
                r"
                INSERT INTO enrollment_captures (enrollment_id, slot, media_type, digest, data)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ",
                params![
                    document_id,
                    slot.as_str(),
                    payload.media_type(),
                    payload.digest(),
                    payload.bytes(),
                ],
            )?;
        }
        tx.commit()?;

        debug!(
            "Inserted enrollment {} with id {}",
            record.student_id, document_id
        );
        Ok(StoredEnrollment {
            document_id,
            student_id: record.student_id.clone(),
            created_at,
            replayed: false,
        })
    }

    /// Get an enrollment by student identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_by_student_id(&self, student_id: &str) -> Result<Option<EnrollmentRecord>> {
        let sql = format!("{SELECT_RECORD} WHERE e.student_id = ?1");
        let record = self
            .conn
            .query_row(&sql, [student_id], Self::row_to_record)
            .optional()?;
        Ok(record)
    }

    /// List enrollments, newest first, optionally only those owned by `guardian_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list(&self, guardian_id: Option<&str>, limit: usize) -> Result<Vec<EnrollmentRecord>> {
        let limit_i64 = i64::try_from(limit).unwrap_or(i64::MAX);
        let sql = format!(
            "{SELECT_RECORD} WHERE (?1 IS NULL OR e.guardian_id = ?1) \
             ORDER BY e.created_at DESC, e.id DESC LIMIT ?2"
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let records = stmt
            .query_map(params![guardian_id, limit_i64], Self::row_to_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(records)
    }

    /// Count stored enrollments.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM enrollments", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Load the stored capture for `slot` of a student.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails or the stored bytes
    /// are not a valid payload.
    pub fn capture(&self, student_id: &str, slot: CaptureSlot) -> Result<Option<CapturePayload>> {
        let row: Option<(String, Vec<u8>)> = self
            .conn
            .query_row(
                r"
                SELECT c.media_type, c.data
                FROM enrollment_captures c
                JOIN enrollments e ON e.id = c.enrollment_id
                WHERE e.student_id = ?1 AND c.slot = ?2
                ",
                params![student_id, slot.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        row.map(|(media_type, data)| CapturePayload::new(slot, data, media_type))
            .transpose()
            .map_err(Error::from)
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<EnrollmentRecord> {
        let profile: String = row.get(5)?;
        let profile: ChildProfile = serde_json::from_str(&profile)
            .map_err(|err| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(err)))?;

        Ok(EnrollmentRecord {
            document_id: row.get(0)?,
            student_id: parse_student_id(row, 1)?,
            guardian_id: row.get(2)?,
            plan_id: row.get(3)?,
            plan_name: row.get(4)?,
            profile,
            status: OperationalStatus {
                temperature: row.get(6)?,
                mood: row.get(7)?,
                meal: row.get(8)?,
                attendance: row.get(9)?,
            },
            created_at: parse_timestamp(row, 10)?,
            face_digest: row.get::<_, Option<String>>(11)?.unwrap_or_default(),
            body_digest: row.get::<_, Option<String>>(12)?.unwrap_or_default(),
        })
    }
}

fn parse_student_id(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<StudentId> {
    let raw: String = row.get(idx)?;
    StudentId::parse(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("malformed student id '{raw}'").into(),
        )
    })
}

fn parse_timestamp(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
}
