//! `SQLite` schema definitions for kiddoz-enroll.
//!
//! One row in `enrollments` per student, plus one row per capture slot in
//! `enrollment_captures`. Both are written in the same transaction.

/// SQL statement to create the enrollments table.
///
/// `student_id` is unique so a collision of the four random digits fails the
/// write instead of shadowing another child. `draft_token` is unique so a
/// replayed commit finds the original record.
pub const CREATE_ENROLLMENTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS enrollments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    student_id TEXT NOT NULL UNIQUE,
    draft_token TEXT NOT NULL UNIQUE,
    guardian_id TEXT NOT NULL,
    plan_id TEXT NOT NULL,
    plan_name TEXT NOT NULL,
    child_name TEXT NOT NULL,
    profile TEXT NOT NULL,
    temperature TEXT NOT NULL,
    mood TEXT NOT NULL,
    meal TEXT NOT NULL,
    attendance TEXT NOT NULL,
    created_at TEXT NOT NULL
)
";

/// SQL statement to create the capture payload table.
pub const CREATE_CAPTURES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS enrollment_captures (
    enrollment_id INTEGER NOT NULL REFERENCES enrollments(id) ON DELETE CASCADE,
    slot TEXT NOT NULL,
    media_type TEXT NOT NULL,
    digest TEXT NOT NULL,
    data BLOB NOT NULL,
    PRIMARY KEY (enrollment_id, slot)
)
";

/// SQL statement to create an index on `guardian_id` for per-user listings.
pub const CREATE_GUARDIAN_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_enrollments_guardian ON enrollments(guardian_id)
";

/// SQL statement to create an index on `created_at` for recent-first listings.
pub const CREATE_CREATED_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_enrollments_created ON enrollments(created_at DESC)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_ENROLLMENTS_TABLE,
    CREATE_CAPTURES_TABLE,
    CREATE_GUARDIAN_INDEX,
    CREATE_CREATED_INDEX,
    CREATE_METADATA_TABLE,
];
