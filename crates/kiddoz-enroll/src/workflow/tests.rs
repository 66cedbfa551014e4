use std::time::Duration;

use super::*;
use crate::capture::CaptureError;
use crate::commit::EnrollmentSink;
use crate::identity::Session;
use crate::profile::ProfileField;
use crate::testing::{
    complete_draft, noah_fields, payload, FailingSink, GatedSink, MemorySink, PendingSink,
    RecordingNotifier,
};

struct Harness {
    workflow: EnrollmentWorkflow,
    session: Arc<Session>,
    notifier: Arc<RecordingNotifier>,
}

fn harness(sink: Arc<dyn EnrollmentSink>, session: Session) -> Harness {
    let catalog = PlanCatalog::builtin();
    let session = Arc::new(session);
    let notifier = Arc::new(RecordingNotifier::default());
    let commit = CommitService::new(sink, catalog.clone()).with_timeout(Duration::from_secs(5));
    let workflow = EnrollmentWorkflow::new(catalog, commit, session.clone(), notifier.clone());
    Harness {
        workflow,
        session,
        notifier,
    }
}

fn signed_in(sink: Arc<dyn EnrollmentSink>) -> Harness {
    harness(
        sink,
        Session::signed_in_as(Identity::new("parent-1").with_display_name("Ana Smith")),
    )
}

fn capture(slot: CaptureSlot) -> WorkflowState {
    WorkflowState::BiometricCapture { slot }
}

/// Drive a workflow up to the body step with both captures stored.
fn ready_to_commit(workflow: &EnrollmentWorkflow, plan: &str) {
    workflow.select_plan(plan).unwrap();
    assert!(workflow.submit_profile(noah_fields()).unwrap().is_valid());
    workflow
        .commit_capture(CaptureSlot::Face, payload(CaptureSlot::Face, b"face"))
        .unwrap();
    workflow
        .commit_capture(CaptureSlot::Body, payload(CaptureSlot::Body, b"body"))
        .unwrap();
}

async fn wait_for_state(workflow: &EnrollmentWorkflow, reached: impl Fn(&WorkflowState) -> bool) {
    let mut rx = workflow.subscribe();
    tokio::time::timeout(
        Duration::from_secs(5),
        rx.wait_for(|progress| reached(&progress.state)),
    )
    .await
    .expect("state not reached in time")
    .unwrap();
}

struct StaticDevice(std::result::Result<CapturePayload, CaptureError>);

#[async_trait::async_trait]
impl CaptureDevice for StaticDevice {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn capture(
        &self,
        _slot: CaptureSlot,
    ) -> std::result::Result<CapturePayload, CaptureError> {
        self.0.clone()
    }
}

#[test]
fn test_starts_at_plan_selection() {
    let h = signed_in(Arc::new(MemorySink::default()));
    assert_eq!(h.workflow.state(), WorkflowState::PlanSelection);
    assert!(h.workflow.draft().plan().is_none());
    assert!(!h.workflow.can_complete());
}

#[test]
fn test_select_plan_moves_to_profile() {
    let h = signed_in(Arc::new(MemorySink::default()));
    h.workflow.select_plan("vip").unwrap();

    assert_eq!(h.workflow.state(), WorkflowState::ProfileEntry);
    assert_eq!(h.workflow.draft().plan().unwrap().name, "VIP Guardian");
}

#[test]
fn test_unknown_plan_changes_nothing() {
    let h = signed_in(Arc::new(MemorySink::default()));
    let before = h.workflow.progress();

    let err = h.workflow.select_plan("platinum").unwrap_err();
    assert!(matches!(err, Error::UnknownPlan { .. }));
    assert_eq!(h.workflow.progress(), before);
}

#[test]
fn test_invalid_profile_stays_on_form() {
    let h = signed_in(Arc::new(MemorySink::default()));
    h.workflow.select_plan("basic").unwrap();
    let before = h.workflow.draft();

    let mut fields = noah_fields();
    fields.age = "-1".to_string();
    let result = h.workflow.submit_profile(fields).unwrap();

    let errors = result.errors().unwrap();
    assert!(errors.contains(ProfileField::Age));
    assert_eq!(h.workflow.state(), WorkflowState::ProfileEntry);
    assert_eq!(h.workflow.draft(), before);
}

#[test]
fn test_valid_profile_moves_to_face_and_records_owner() {
    let h = signed_in(Arc::new(MemorySink::default()));
    h.workflow.select_plan("basic").unwrap();

    assert!(h.workflow.submit_profile(noah_fields()).unwrap().is_valid());

    assert_eq!(h.workflow.state(), capture(CaptureSlot::Face));
    let draft = h.workflow.draft();
    assert_eq!(draft.profile().unwrap().name, "Noah Smith");
    assert_eq!(draft.owner().unwrap().uid, "parent-1");
}

#[test]
fn test_submit_profile_outside_profile_step() {
    let h = signed_in(Arc::new(MemorySink::default()));
    let err = h.workflow.submit_profile(noah_fields()).unwrap_err();
    assert!(matches!(err, Error::InvalidTransition { .. }));
}

#[test]
fn test_profile_prefill_uses_display_name() {
    let h = signed_in(Arc::new(MemorySink::default()));
    assert_eq!(h.workflow.profile_prefill().guardian_name, "Ana Smith");

    let anonymous = harness(Arc::new(MemorySink::default()), Session::anonymous());
    assert_eq!(anonymous.workflow.profile_prefill().guardian_name, "");
}

#[test]
fn test_capture_sequence_and_retake() {
    let h = signed_in(Arc::new(MemorySink::default()));
    h.workflow.select_plan("basic").unwrap();
    h.workflow.submit_profile(noah_fields()).unwrap();

    assert!(h.workflow.begin_capture().unwrap());
    assert!(!h.workflow.begin_capture().unwrap());
    h.workflow
        .commit_capture(CaptureSlot::Face, payload(CaptureSlot::Face, b"first"))
        .unwrap();
    assert_eq!(h.workflow.state(), capture(CaptureSlot::Body));

    // Storing the face again from the body step is not allowed.
    let err = h
        .workflow
        .commit_capture(CaptureSlot::Face, payload(CaptureSlot::Face, b"x"))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidTransition { .. }));

    h.workflow.go_back().unwrap();
    h.workflow.clear_capture(CaptureSlot::Face).unwrap();
    assert!(!h.workflow.draft().captures().is_complete(CaptureSlot::Face));
    h.workflow
        .commit_capture(CaptureSlot::Face, payload(CaptureSlot::Face, b"second"))
        .unwrap();

    let draft = h.workflow.draft();
    assert_eq!(
        draft.captures().payload(CaptureSlot::Face).unwrap().bytes(),
        b"second"
    );
}

#[tokio::test]
async fn test_capture_from_device() {
    let h = signed_in(Arc::new(MemorySink::default()));
    h.workflow.select_plan("basic").unwrap();
    h.workflow.submit_profile(noah_fields()).unwrap();

    let device = StaticDevice(Ok(payload(CaptureSlot::Face, b"camera")));
    let slot = h.workflow.capture_from(&device).await.unwrap();

    assert_eq!(slot, CaptureSlot::Face);
    assert_eq!(h.workflow.state(), capture(CaptureSlot::Body));
}

#[tokio::test]
async fn test_capture_device_failure_keeps_step() {
    let h = signed_in(Arc::new(MemorySink::default()));
    h.workflow.select_plan("basic").unwrap();
    h.workflow.submit_profile(noah_fields()).unwrap();

    let device = StaticDevice(Err(CaptureError::PermissionDenied {
        slot: CaptureSlot::Face,
        message: "camera blocked".to_string(),
    }));
    let err = h.workflow.capture_from(&device).await.unwrap_err();

    assert!(matches!(err, Error::Capture(CaptureError::PermissionDenied { .. })));
    assert_eq!(h.workflow.state(), capture(CaptureSlot::Face));
    assert!(!h.workflow.draft().captures().is_complete(CaptureSlot::Face));
}

#[tokio::test]
async fn test_complete_with_missing_capture_is_disabled() {
    let sink = Arc::new(MemorySink::default());
    let h = signed_in(sink.clone());
    h.workflow.select_plan("basic").unwrap();
    h.workflow.submit_profile(noah_fields()).unwrap();
    h.workflow
        .commit_capture(CaptureSlot::Face, payload(CaptureSlot::Face, b"face"))
        .unwrap();

    assert!(!h.workflow.can_complete());
    let outcome = h.workflow.complete_enrollment().await.unwrap();

    assert_eq!(outcome, CommitOutcome::Disabled);
    assert_eq!(h.workflow.state(), capture(CaptureSlot::Body));
    assert!(!h.workflow.is_committing());
    assert_eq!(sink.calls(), 0);
}

#[tokio::test]
async fn test_complete_from_wrong_state() {
    let h = signed_in(Arc::new(MemorySink::default()));
    let err = h.workflow.complete_enrollment().await.unwrap_err();
    assert!(matches!(err, Error::InvalidTransition { .. }));
    assert!(!h.workflow.is_committing());
}

#[tokio::test]
async fn test_growth_scholar_enrollment() {
    let sink = Arc::new(MemorySink::default());
    let h = signed_in(sink.clone());
    ready_to_commit(&h.workflow, "growth");
    let token = h.workflow.draft().token().clone();
    assert!(h.workflow.can_complete());

    let outcome = h.workflow.complete_enrollment().await.unwrap();

    let CommitOutcome::Committed(student_id) = outcome else {
        panic!("expected a committed enrollment, got {outcome:?}");
    };
    assert!(StudentId::parse(student_id.as_str()).is_some());
    assert!(student_id.as_str().starts_with("K-"));

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].plan_name, "Growth Scholar");
    assert_eq!(records[0].guardian_id, "parent-1");
    assert_eq!(records[0].status.attendance, "Registered");
    assert_eq!(records[0].draft_token, token);

    assert_eq!(
        h.workflow.state(),
        WorkflowState::Success {
            student_id: student_id.clone()
        }
    );
    assert_ne!(h.workflow.draft().token(), &token);
    assert!(h.workflow.draft().profile().is_none());
    assert!(!h.workflow.is_committing());

    let messages = h.notifier.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].1, NotificationKind::Success);
    assert!(messages[0].0.contains(student_id.as_str()));
    assert!(messages[0].0.contains("Noah Smith"));
}

#[tokio::test]
async fn test_deep_link_without_plan_uses_fallback() {
    let sink = Arc::new(MemorySink::default());
    let h = signed_in(sink.clone());

    assert_eq!(
        h.workflow.enter_step(StepId::Face).unwrap(),
        WorkflowState::ProfileEntry
    );
    h.workflow.submit_profile(noah_fields()).unwrap();
    h.workflow
        .commit_capture(CaptureSlot::Face, payload(CaptureSlot::Face, b"face"))
        .unwrap();
    h.workflow
        .commit_capture(CaptureSlot::Body, payload(CaptureSlot::Body, b"body"))
        .unwrap();
    h.workflow.complete_enrollment().await.unwrap();

    assert_eq!(sink.records()[0].plan_name, "Growth Scholar");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_no_duplicate_commits_while_in_flight() {
    let sink = Arc::new(GatedSink::default());
    let h = signed_in(sink.clone());
    ready_to_commit(&h.workflow, "growth");

    let first = tokio::spawn({
        let workflow = h.workflow.clone();
        async move { workflow.complete_enrollment().await }
    });
    wait_for_state(&h.workflow, |state| *state == WorkflowState::Committing).await;

    assert!(!h.workflow.can_complete());
    for _ in 0..3 {
        let outcome = h.workflow.complete_enrollment().await.unwrap();
        assert_eq!(outcome, CommitOutcome::Disabled);
    }
    assert!(matches!(h.workflow.reset(), Err(Error::CommitInFlight)));

    sink.release();
    let outcome = first.await.unwrap().unwrap();
    assert!(matches!(outcome, CommitOutcome::Committed(_)));
    assert_eq!(sink.calls(), 1);
}

#[tokio::test]
async fn test_failure_keeps_draft_unchanged() {
    let h = signed_in(Arc::new(FailingSink));
    ready_to_commit(&h.workflow, "growth");
    let before = h.workflow.draft();

    let err = h.workflow.complete_enrollment().await.unwrap_err();

    assert!(err.is_commit_error());
    let WorkflowState::Failed { reason } = h.workflow.state() else {
        panic!("expected failure");
    };
    assert!(reason.contains("network unreachable"));
    assert_eq!(*h.workflow.draft(), *before);
    assert!(!h.workflow.is_committing());
    assert!(h.workflow.can_complete());
    assert_eq!(h.notifier.kinds(), vec![NotificationKind::Error]);

    h.workflow.acknowledge_failure().unwrap();
    assert_eq!(h.workflow.state(), capture(CaptureSlot::Body));
    assert_eq!(*h.workflow.draft(), *before);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_retry_after_failure() {
    let sink = Arc::new(GatedSink::failing());
    let h = signed_in(sink.clone());
    ready_to_commit(&h.workflow, "basic");
    let token = h.workflow.draft().token().clone();

    let attempt = tokio::spawn({
        let workflow = h.workflow.clone();
        async move { workflow.complete_enrollment().await }
    });
    wait_for_state(&h.workflow, |state| *state == WorkflowState::Committing).await;
    sink.release();
    assert!(attempt.await.unwrap().is_err());
    assert!(matches!(h.workflow.state(), WorkflowState::Failed { .. }));
    assert_eq!(h.workflow.draft().token(), &token);

    sink.succeed_from_now();
    let retry = tokio::spawn({
        let workflow = h.workflow.clone();
        async move { workflow.complete_enrollment().await }
    });
    wait_for_state(&h.workflow, |state| *state == WorkflowState::Committing).await;
    sink.release();

    let outcome = retry.await.unwrap().unwrap();
    assert!(matches!(outcome, CommitOutcome::Committed(_)));
    assert_eq!(sink.calls(), 2);
    assert_eq!(
        h.notifier.kinds(),
        vec![NotificationKind::Error, NotificationKind::Success]
    );
}

#[tokio::test]
async fn test_timeout_fails_the_commit() {
    let catalog = PlanCatalog::builtin();
    let commit = CommitService::new(Arc::new(PendingSink), catalog.clone())
        .with_timeout(Duration::from_millis(20));
    let workflow = EnrollmentWorkflow::new(
        catalog,
        commit,
        Arc::new(Session::signed_in_as(Identity::new("parent-1"))),
        Arc::new(RecordingNotifier::default()),
    );
    ready_to_commit(&workflow, "growth");

    let err = workflow.complete_enrollment().await.unwrap_err();

    assert!(matches!(
        err,
        Error::Commit(crate::commit::CommitError::Timeout { .. })
    ));
    let WorkflowState::Failed { reason } = workflow.state() else {
        panic!("expected failure");
    };
    assert!(reason.contains("timed out"));
    assert!(!workflow.is_committing());
}

#[tokio::test]
async fn test_commit_waits_for_sign_in() {
    let sink = Arc::new(MemorySink::default());
    let h = harness(sink.clone(), Session::anonymous());
    ready_to_commit(&h.workflow, "growth");

    let outcome = h.workflow.complete_enrollment().await.unwrap();
    assert_eq!(outcome, CommitOutcome::AuthenticationRequired);
    assert_eq!(h.workflow.state(), WorkflowState::AuthenticationRequired);
    assert!(h.workflow.is_committing());
    assert!(!h.workflow.can_complete());
    assert_eq!(
        h.workflow.complete_enrollment().await.unwrap(),
        CommitOutcome::Disabled
    );
    assert_eq!(sink.calls(), 0);

    h.session.sign_in(Identity::new("late-parent"));
    wait_for_state(&h.workflow, |state| {
        matches!(state, WorkflowState::Success { .. })
    })
    .await;

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].guardian_id, "late-parent");
    assert!(!h.workflow.is_committing());
}

#[tokio::test]
async fn test_reset_cancels_deferred_commit() {
    let sink = Arc::new(MemorySink::default());
    let h = harness(sink.clone(), Session::anonymous());
    ready_to_commit(&h.workflow, "growth");
    h.workflow.complete_enrollment().await.unwrap();

    h.workflow.reset().unwrap();
    assert_eq!(h.workflow.state(), WorkflowState::PlanSelection);
    assert!(!h.workflow.is_committing());

    h.session.sign_in(Identity::new("late-parent"));
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(sink.calls(), 0);
    assert_eq!(h.workflow.state(), WorkflowState::PlanSelection);
}

#[test]
fn test_go_back_chain() {
    let h = signed_in(Arc::new(MemorySink::default()));
    ready_to_commit(&h.workflow, "basic");

    assert_eq!(h.workflow.go_back().unwrap(), capture(CaptureSlot::Face));
    assert_eq!(h.workflow.go_back().unwrap(), WorkflowState::ProfileEntry);
    assert_eq!(h.workflow.go_back().unwrap(), WorkflowState::PlanSelection);
    assert!(matches!(
        h.workflow.go_back(),
        Err(Error::InvalidTransition { .. })
    ));
    assert!(h.workflow.draft().captures().is_fully_complete());
}

#[tokio::test]
async fn test_go_back_from_failure_returns_to_body() {
    let h = signed_in(Arc::new(FailingSink));
    ready_to_commit(&h.workflow, "growth");
    let before = h.workflow.draft();
    assert!(h.workflow.complete_enrollment().await.is_err());

    assert_eq!(h.workflow.go_back().unwrap(), capture(CaptureSlot::Body));
    assert_eq!(*h.workflow.draft(), *before);
    assert!(h.workflow.can_complete());
}

#[test]
fn test_acknowledge_outside_failure() {
    let h = signed_in(Arc::new(MemorySink::default()));
    assert!(matches!(
        h.workflow.acknowledge_failure(),
        Err(Error::InvalidTransition { .. })
    ));
}

#[test]
fn test_snapshot_and_rehydrate_resume_at_body() {
    let h = signed_in(Arc::new(MemorySink::default()));
    h.workflow.select_plan("vip").unwrap();
    h.workflow.submit_profile(noah_fields()).unwrap();
    h.workflow
        .commit_capture(CaptureSlot::Face, payload(CaptureSlot::Face, b"face"))
        .unwrap();

    let json = serde_json::to_string(&h.workflow.snapshot()).unwrap();
    let restored: NavigationState = serde_json::from_str(&json).unwrap();

    let other = signed_in(Arc::new(MemorySink::default()));
    let state = other
        .workflow
        .rehydrate(NavigationState {
            step: StepId::Face,
            ..restored.clone()
        })
        .unwrap();
    assert_eq!(state, capture(CaptureSlot::Body));

    let state = other.workflow.rehydrate(restored).unwrap();
    assert_eq!(state, capture(CaptureSlot::Body));
    assert_eq!(other.workflow.draft().plan().unwrap().id, "vip");
    assert!(other
        .workflow
        .draft()
        .captures()
        .is_complete(CaptureSlot::Face));
}

#[test]
fn test_rehydrate_complete_draft_at_body() {
    let h = signed_in(Arc::new(MemorySink::default()));
    let state = h
        .workflow
        .rehydrate(NavigationState {
            step: StepId::Body,
            draft: complete_draft(None),
        })
        .unwrap();

    assert_eq!(state, capture(CaptureSlot::Body));
    assert!(h.workflow.can_complete());
}

#[tokio::test]
async fn test_subscribers_see_transitions() {
    let h = signed_in(Arc::new(MemorySink::default()));
    let mut rx = h.workflow.subscribe();

    h.workflow.select_plan("growth").unwrap();

    assert!(rx.has_changed().unwrap());
    let progress = rx.borrow_and_update().clone();
    assert_eq!(progress.state, WorkflowState::ProfileEntry);
    assert_eq!(progress.draft.plan().unwrap().id, "growth");

    // A rejected trigger does not wake subscribers.
    let _ = h.workflow.select_plan("growth");
    assert!(!rx.has_changed().unwrap());
}

#[test]
fn test_reset_clears_draft() {
    let h = signed_in(Arc::new(MemorySink::default()));
    h.workflow
        .rehydrate(NavigationState {
            step: StepId::Plan,
            draft: EnrollmentDraft::new(),
        })
        .unwrap();
    h.workflow.select_plan("basic").unwrap();
    h.workflow.reset().unwrap();

    assert_eq!(h.workflow.state(), WorkflowState::PlanSelection);
    assert!(h.workflow.draft().plan().is_none());
}
