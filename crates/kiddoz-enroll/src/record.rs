//! Persisted enrollment records.
//!
//! [`NewEnrollment`] is what the commit service hands to persistence;
//! [`EnrollmentRecord`] is what persistence hands back when read.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::capture::CapturePayload;
use crate::draft::DraftToken;
use crate::profile::ChildProfile;

/// Storage-assigned document identifier.
pub type DocumentId = i64;

/// Default prefix of generated student identifiers.
pub const DEFAULT_STUDENT_ID_PREFIX: &str = "K";

fn prefix_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Z]{1,4}$").unwrap_or_else(|err| panic!("prefix pattern: {err}"))
    })
}

/// Whether `prefix` can head a student identifier: 1-4 uppercase ASCII letters.
#[must_use]
pub fn is_valid_prefix(prefix: &str) -> bool {
    prefix_pattern().is_match(prefix)
}

fn student_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Z]{1,4}-[0-9]{4}$").unwrap_or_else(|err| panic!("student id pattern: {err}"))
    })
}

/// Human-facing student identifier such as `K-4821`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudentId(String);

impl StudentId {
    /// Parse an identifier of the form `<PREFIX>-####`.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        student_id_pattern()
            .is_match(value)
            .then(|| Self(value.to_string()))
    }

    /// The identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StudentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Generates `<PREFIX>-####` identifiers with four random digits.
///
/// Only 9,000 values exist per prefix; storage enforces uniqueness, so a
/// collision fails the commit and the user's retry draws a new number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentIdGenerator {
    prefix: String,
}

impl StudentIdGenerator {
    /// A generator for `prefix`.
    ///
    /// `prefix` must satisfy [`is_valid_prefix`], otherwise the generated ids
    /// fail [`StudentId::parse`] when read back. Config validation enforces
    /// this for configured prefixes.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        debug_assert!(
            is_valid_prefix(&prefix),
            "student id prefix must be 1-4 uppercase letters, got {prefix:?}"
        );
        Self { prefix }
    }

    /// Draw a new identifier.
    #[must_use]
    pub fn generate(&self) -> StudentId {
        let number: u16 = rand::thread_rng().gen_range(1000..=9999);
        StudentId(format!("{}-{number}", self.prefix))
    }
}

impl Default for StudentIdGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_STUDENT_ID_PREFIX)
    }
}

/// Day-to-day fields the dashboards update after enrollment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationalStatus {
    /// Last temperature reading, Fahrenheit.
    pub temperature: String,
    /// Last observed mood.
    pub mood: String,
    /// Meal check-in state.
    pub meal: String,
    /// Attendance state.
    pub attendance: String,
}

impl Default for OperationalStatus {
    fn default() -> Self {
        Self {
            temperature: "98.6".to_string(),
            mood: "Neutral".to_string(),
            meal: "Not checked in".to_string(),
            attendance: "Registered".to_string(),
        }
    }
}

/// Everything persistence needs to create one enrollment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEnrollment {
    /// Generated student identifier.
    pub student_id: StudentId,
    /// Idempotency key of the originating draft.
    pub draft_token: DraftToken,
    /// Owning user.
    pub guardian_id: String,
    /// Plan identifier.
    pub plan_id: String,
    /// Plan display name.
    pub plan_name: String,
    /// Child and guardian details.
    pub profile: ChildProfile,
    /// Initial operational fields.
    pub status: OperationalStatus,
    /// Face capture.
    pub face: CapturePayload,
    /// Body capture.
    pub body: CapturePayload,
}

/// Receipt for a persisted enrollment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEnrollment {
    /// Storage identifier.
    pub document_id: DocumentId,
    /// Student identifier as stored. For a replayed draft token this is the
    /// identifier of the original record, not the one just generated.
    pub student_id: StudentId,
    /// Storage-assigned creation time.
    pub created_at: DateTime<Utc>,
    /// True when the draft token was already stored and nothing new was written.
    pub replayed: bool,
}

/// A persisted enrollment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentRecord {
    /// Storage identifier.
    pub document_id: DocumentId,
    /// Student identifier.
    pub student_id: StudentId,
    /// Owning user.
    pub guardian_id: String,
    /// Plan identifier.
    pub plan_id: String,
    /// Plan display name.
    pub plan_name: String,
    /// Child and guardian details.
    pub profile: ChildProfile,
    /// Operational fields.
    pub status: OperationalStatus,
    /// Storage-assigned creation time.
    pub created_at: DateTime<Utc>,
    /// Digest of the face capture.
    pub face_digest: String,
    /// Digest of the body capture.
    pub body_digest: String,
}
