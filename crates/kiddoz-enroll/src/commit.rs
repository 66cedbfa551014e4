//! Enrollment commit service.
//!
//! Turns a finished draft into exactly one persisted record. The service never
//! retries on its own: a retry is always the user triggering the commit again.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use crate::capture::CaptureSlot;
use crate::catalog::PlanCatalog;
use crate::draft::EnrollmentDraft;
use crate::identity::Identity;
use crate::record::{NewEnrollment, OperationalStatus, StoredEnrollment, StudentId, StudentIdGenerator};

/// Default bound on one persistence call.
pub const DEFAULT_COMMIT_TIMEOUT: Duration = Duration::from_secs(15);

/// Why a commit did not produce a record.
#[derive(Debug, Error)]
pub enum CommitError {
    /// The draft is missing data the record needs. Nothing was sent.
    #[error("enrollment is incomplete: missing {missing}")]
    IncompleteDraft {
        /// What is missing.
        missing: &'static str,
    },

    /// The persistence collaborator failed.
    #[error("failed to save enrollment via {sink}: {source}")]
    Persistence {
        /// Name of the sink.
        sink: &'static str,
        /// The underlying error.
        #[source]
        source: Box<crate::error::Error>,
    },

    /// The persistence collaborator did not answer in time. The record may or
    /// may not exist; a retry with the same draft token is safe.
    #[error("enrollment commit timed out after {after:?}")]
    Timeout {
        /// The bound that expired.
        after: Duration,
    },
}

/// Persistence collaborator.
///
/// Implementations must write the whole record or nothing, and must assign
/// the creation timestamp themselves.
#[async_trait::async_trait]
pub trait EnrollmentSink: Send + Sync {
    /// Name of this sink (for logging).
    fn name(&self) -> &'static str;

    /// Create one enrollment record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record could not be written.
    async fn create_enrollment(&self, record: &NewEnrollment) -> crate::Result<StoredEnrollment>;
}

/// Persists finished drafts.
#[derive(Clone)]
pub struct CommitService {
    sink: Arc<dyn EnrollmentSink>,
    catalog: PlanCatalog,
    ids: StudentIdGenerator,
    timeout: Duration,
}

impl std::fmt::Debug for CommitService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommitService")
            .field("sink", &self.sink.name())
            .field("ids", &self.ids)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl CommitService {
    /// A service writing to `sink`, falling back to `catalog`'s fallback plan.
    #[must_use]
    pub fn new(sink: Arc<dyn EnrollmentSink>, catalog: PlanCatalog) -> Self {
        Self {
            sink,
            catalog,
            ids: StudentIdGenerator::default(),
            timeout: DEFAULT_COMMIT_TIMEOUT,
        }
    }

    /// Bound each persistence call by `timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Use `ids` to generate student identifiers.
    #[must_use]
    pub fn with_id_generator(mut self, ids: StudentIdGenerator) -> Self {
        self.ids = ids;
        self
    }

    /// The configured timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Build the record for `draft`, owned by `owner`.
    ///
    /// A draft without a plan gets the catalog's fallback plan.
    ///
    /// # Errors
    ///
    /// Returns [`CommitError::IncompleteDraft`] if the profile or either
    /// capture is missing.
    pub fn prepare(
        &self,
        draft: &EnrollmentDraft,
        owner: &Identity,
    ) -> Result<NewEnrollment, CommitError> {
        let profile = draft
            .profile()
            .ok_or(CommitError::IncompleteDraft { missing: "profile" })?;
        let captures = draft.captures();
        let face = captures
            .payload(CaptureSlot::Face)
            .ok_or(CommitError::IncompleteDraft { missing: "face scan" })?;
        let body = captures
            .payload(CaptureSlot::Body)
            .ok_or(CommitError::IncompleteDraft { missing: "body scan" })?;

        let plan = match draft.plan() {
            Some(plan) => plan,
            None => {
                let fallback = self.catalog.fallback();
                warn!("Draft {} has no plan, using fallback '{}'", draft.token(), fallback.id);
                fallback
            }
        };

        Ok(NewEnrollment {
            student_id: self.ids.generate(),
            draft_token: draft.token().clone(),
            guardian_id: owner.uid.clone(),
            plan_id: plan.id.clone(),
            plan_name: plan.name.clone(),
            profile: profile.clone(),
            status: OperationalStatus::default(),
            face: face.clone(),
            body: body.clone(),
        })
    }

    /// Persist `draft` as one enrollment record.
    ///
    /// # Errors
    ///
    /// Returns a [`CommitError`] if the draft is incomplete, the sink fails,
    /// or the sink does not answer within the timeout.
    pub async fn commit(
        &self,
        draft: &EnrollmentDraft,
        owner: &Identity,
    ) -> Result<StudentId, CommitError> {
        let record = self.prepare(draft, owner)?;

        info!(
            "Committing enrollment {} for {} via {}",
            record.student_id,
            owner.uid,
            self.sink.name()
        );

        let stored = tokio::time::timeout(self.timeout, self.sink.create_enrollment(&record))
            .await
            .map_err(|_| CommitError::Timeout {
                after: self.timeout,
            })?
            .map_err(|source| CommitError::Persistence {
                sink: self.sink.name(),
                source: Box::new(source),
            })?;

        if stored.replayed {
            info!(
                "Draft {} was already stored as {}",
                record.draft_token, stored.student_id
            );
        } else {
            info!(
                "Enrollment {} stored as document {}",
                stored.student_id, stored.document_id
            );
        }
        Ok(stored.student_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CaptureSlot;
    use crate::record::StudentId;
    use crate::testing::{complete_draft, FailingSink, MemorySink, PendingSink};

    fn owner() -> Identity {
        Identity::new("parent-1")
    }

    #[tokio::test]
    async fn test_commit_creates_one_record() {
        let sink = Arc::new(MemorySink::default());
        let service = CommitService::new(sink.clone(), PlanCatalog::builtin());
        let draft = complete_draft(Some("growth"));

        let id = service.commit(&draft, &owner()).await.unwrap();

        assert!(StudentId::parse(id.as_str()).is_some());
        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].student_id, id);
        assert_eq!(records[0].plan_name, "Growth Scholar");
        assert_eq!(records[0].guardian_id, "parent-1");
        assert_eq!(records[0].status.attendance, "Registered");
        assert_eq!(records[0].draft_token, *draft.token());
    }

    #[tokio::test]
    async fn test_missing_plan_uses_fallback() {
        let sink = Arc::new(MemorySink::default());
        let service = CommitService::new(sink.clone(), PlanCatalog::builtin());

        service.commit(&complete_draft(None), &owner()).await.unwrap();

        let records = sink.records();
        assert_eq!(records[0].plan_id, "growth");
        assert_eq!(records[0].plan_name, "Growth Scholar");
    }

    #[tokio::test]
    async fn test_incomplete_draft_never_reaches_sink() {
        let sink = Arc::new(MemorySink::default());
        let service = CommitService::new(sink.clone(), PlanCatalog::builtin());

        let mut captures = complete_draft(None).captures().clone();
        captures.clear_capture(CaptureSlot::Body);
        let draft = complete_draft(None).with_captures(captures);

        let err = service.commit(&draft, &owner()).await.unwrap_err();
        assert!(matches!(err, CommitError::IncompleteDraft { missing: "body scan" }));
        assert_eq!(sink.calls(), 0);

        let err = service
            .commit(&EnrollmentDraft::new(), &owner())
            .await
            .unwrap_err();
        assert!(matches!(err, CommitError::IncompleteDraft { missing: "profile" }));
    }

    #[tokio::test]
    async fn test_sink_failure_is_persistence_error() {
        let service = CommitService::new(Arc::new(FailingSink), PlanCatalog::builtin());

        let err = service
            .commit(&complete_draft(None), &owner())
            .await
            .unwrap_err();

        assert!(matches!(err, CommitError::Persistence { sink: "failing", .. }));
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("network unreachable"));
    }

    #[tokio::test]
    async fn test_timeout() {
        let service = CommitService::new(Arc::new(PendingSink), PlanCatalog::builtin())
            .with_timeout(Duration::from_millis(20));

        let err = service
            .commit(&complete_draft(None), &owner())
            .await
            .unwrap_err();
        assert!(matches!(err, CommitError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_custom_prefix() {
        let sink = Arc::new(MemorySink::default());
        let service = CommitService::new(sink, PlanCatalog::builtin())
            .with_id_generator(StudentIdGenerator::new("KZ"));

        let id = service.commit(&complete_draft(None), &owner()).await.unwrap();
        assert!(id.as_str().starts_with("KZ-"));
    }

    #[test]
    fn test_service_debug_names_sink() {
        let service = CommitService::new(Arc::new(MemorySink::default()), PlanCatalog::builtin());
        let debug = format!("{service:?}");
        assert!(debug.contains("memory"));
    }
}
