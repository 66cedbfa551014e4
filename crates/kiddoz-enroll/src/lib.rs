//! `kiddoz-enroll` - Enrollment workflow core for the KiddoZ childcare platform
//!
//! This library drives a guardian through choosing a care plan, filling in the
//! child's profile, capturing face and body scans, and submitting the result as
//! one student record. The [`EnrollmentWorkflow`] state machine owns the draft;
//! the [`CommitService`] turns a finished draft into a stored record.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod capture;
pub mod catalog;
pub mod cli;
pub mod commit;
pub mod config;
pub mod draft;
pub mod error;
pub mod identity;
pub mod logging;
pub mod notify;
pub mod profile;
pub mod record;
pub mod storage;
pub mod workflow;

#[cfg(test)]
mod testing;

pub use capture::{CaptureDevice, CapturePayload, CaptureSlot, CaptureStore, FileDevice};
pub use catalog::{Plan, PlanCatalog};
pub use commit::{CommitService, EnrollmentSink};
pub use config::Config;
pub use draft::EnrollmentDraft;
pub use error::{Error, Result};
pub use identity::{Identity, IdentitySource, Session};
pub use logging::init_logging;
pub use notify::{LogNotifier, NotificationKind, Notifier};
pub use profile::{ChildProfile, ProfileFields, ValidationResult};
pub use record::{EnrollmentRecord, StudentId};
pub use storage::{SqliteSink, Storage};
pub use workflow::{CommitOutcome, EnrollmentWorkflow, StepId, WorkflowState};
