//! Error types for kiddoz-enroll.
//!
//! This module defines the crate-wide error type. Domain failures that the
//! workflow recovers from (capture and commit failures) have their own types
//! in [`crate::capture`] and [`crate::commit`] and convert into [`Error`].
//! Profile validation failures are not errors at all; they are returned as
//! [`crate::profile::ValidationResult::Invalid`].

use std::path::PathBuf;
use thiserror::Error;

use crate::capture::CaptureError;
use crate::commit::CommitError;

/// The main error type for kiddoz-enroll operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Workflow Errors ===
    /// A capture step failed; the workflow stays on the same step.
    #[error(transparent)]
    Capture(#[from] CaptureError),

    /// The commit failed; the workflow moved to `Failed` with the draft intact.
    #[error(transparent)]
    Commit(#[from] CommitError),

    /// No signed-in user is available; the commit is deferred.
    #[error("authentication required before the enrollment can be submitted")]
    AuthenticationRequired,

    /// The requested plan is not in the catalog.
    #[error("unknown plan '{id}'")]
    UnknownPlan {
        /// The identifier that was requested.
        id: String,
    },

    /// A trigger was sent that the current state does not accept.
    #[error("cannot {trigger} while in {state}")]
    InvalidTransition {
        /// Name of the current state.
        state: &'static str,
        /// Name of the rejected trigger.
        trigger: &'static str,
    },

    /// A commit is in flight; the workflow accepts no navigation until it resolves.
    #[error("an enrollment commit is already in flight")]
    CommitInFlight,

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for kiddoz-enroll operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create an unknown plan error.
    #[must_use]
    pub fn unknown_plan(id: impl Into<String>) -> Self {
        Self::UnknownPlan { id: id.into() }
    }

    /// Create an invalid transition error.
    #[must_use]
    pub fn invalid_transition(state: &'static str, trigger: &'static str) -> Self {
        Self::InvalidTransition { state, trigger }
    }

    /// Create a configuration validation error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }

    /// Whether the user can recover by retrying from the same step.
    ///
    /// Capture and commit failures leave the draft intact, and an
    /// authentication deferral resumes on its own.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Capture(_) | Self::Commit(_) | Self::AuthenticationRequired | Self::CommitInFlight
        )
    }

    /// Check if this error is a commit failure.
    #[must_use]
    pub fn is_commit_error(&self) -> bool {
        matches!(self, Self::Commit(_))
    }
}
