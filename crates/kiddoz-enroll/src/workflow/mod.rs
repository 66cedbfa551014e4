//! Enrollment workflow state machine.
//!
//! [`EnrollmentWorkflow`] is a cheap, cloneable handle. Its state and draft
//! live in a single watch channel and every trigger is one atomic
//! read-modify-write on it, so concurrent triggers serialize and observers
//! always see a state together with the draft it belongs to.
//!
//! ```text
//! PlanSelection -> ProfileEntry -> Capture(face) -> Capture(body)
//!                                                        |
//!                         AuthenticationRequired <- complete -> Committing
//!                                    |                            |
//!                                    +--- sign-in ---> Committing |
//!                                                                 v
//!                                                   Success | Failed -> Capture(body)
//! ```

mod state;
mod transitions;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crate::capture::{CaptureDevice, CapturePayload, CaptureSlot};
use crate::catalog::PlanCatalog;
use crate::commit::CommitService;
use crate::draft::EnrollmentDraft;
use crate::error::{Error, Result};
use crate::identity::{Identity, IdentitySource};
use crate::notify::{NotificationKind, Notifier};
use crate::profile::{validate, ProfileFields, ValidationResult};
use crate::record::StudentId;

pub use state::{NavigationState, Progress, StepId, WorkflowState};
pub use transitions::resolve_step;

/// Result of triggering [`EnrollmentWorkflow::complete_enrollment`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The record was stored.
    Committed(StudentId),
    /// Nobody is signed in; the commit resumes once someone is.
    AuthenticationRequired,
    /// The trigger was ignored: a commit is already in flight or the
    /// captures are incomplete.
    Disabled,
}

enum CommitStart {
    Incomplete,
    Defer,
    Commit(Arc<EnrollmentDraft>, Identity),
}

struct Shared {
    catalog: PlanCatalog,
    commit: CommitService,
    identity: Arc<dyn IdentitySource>,
    notifier: Arc<dyn Notifier>,
    progress: watch::Sender<Progress>,
    in_flight: AtomicBool,
    deferred: Mutex<Option<AbortHandle>>,
}

/// Drives one enrollment from plan selection to a stored record.
#[derive(Clone)]
pub struct EnrollmentWorkflow {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for EnrollmentWorkflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnrollmentWorkflow")
            .field("state", &self.state())
            .field("in_flight", &self.is_committing())
            .field("commit", &self.shared.commit)
            .finish_non_exhaustive()
    }
}

impl EnrollmentWorkflow {
    /// A workflow at plan selection with an empty draft.
    #[must_use]
    pub fn new(
        catalog: PlanCatalog,
        commit: CommitService,
        identity: Arc<dyn IdentitySource>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let (progress, _) = watch::channel(Progress::new(
            WorkflowState::PlanSelection,
            EnrollmentDraft::new(),
        ));
        Self {
            shared: Arc::new(Shared {
                catalog,
                commit,
                identity,
                notifier,
                progress,
                in_flight: AtomicBool::new(false),
                deferred: Mutex::new(None),
            }),
        }
    }

    /// The plan catalog in use.
    #[must_use]
    pub fn catalog(&self) -> &PlanCatalog {
        &self.shared.catalog
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> WorkflowState {
        self.shared.progress.borrow().state.clone()
    }

    /// Current draft.
    #[must_use]
    pub fn draft(&self) -> Arc<EnrollmentDraft> {
        Arc::clone(&self.shared.progress.borrow().draft)
    }

    /// Current state and draft, read together.
    #[must_use]
    pub fn progress(&self) -> Progress {
        self.shared.progress.borrow().clone()
    }

    /// Observe every transition.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Progress> {
        self.shared.progress.subscribe()
    }

    /// True while a commit is in flight or waiting for sign-in.
    #[must_use]
    pub fn is_committing(&self) -> bool {
        self.shared.in_flight.load(Ordering::SeqCst)
    }

    /// What a router should persist to restore this position later.
    #[must_use]
    pub fn snapshot(&self) -> NavigationState {
        let progress = self.progress();
        NavigationState {
            step: progress.state.step(),
            draft: (*progress.draft).clone(),
        }
    }

    /// Restore a position saved by [`snapshot`](Self::snapshot).
    ///
    /// The requested step is resolved against the restored draft, so a stale
    /// or forged step cannot skip ahead of the data.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CommitInFlight`] while a commit is pending.
    pub fn rehydrate(&self, navigation: NavigationState) -> Result<WorkflowState> {
        let catalog = &self.shared.catalog;
        self.transition("rehydrate", |progress| {
            ensure_idle(progress)?;
            let (state, draft) = resolve_step(navigation.draft, navigation.step, catalog);
            Ok((Some(Progress::new(state.clone(), draft)), state))
        })
    }

    /// Navigate directly to `step`, keeping the current draft.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CommitInFlight`] while a commit is pending.
    pub fn enter_step(&self, step: StepId) -> Result<WorkflowState> {
        let catalog = &self.shared.catalog;
        self.transition("enter step", |progress| {
            ensure_idle(progress)?;
            let (state, draft) = resolve_step((*progress.draft).clone(), step, catalog);
            Ok((Some(Progress::new(state.clone(), draft)), state))
        })
    }

    /// Choose a plan and move to the profile form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownPlan`] for an id not in the catalog and
    /// [`Error::InvalidTransition`] outside plan selection.
    pub fn select_plan(&self, plan_id: &str) -> Result<()> {
        let plan = self
            .shared
            .catalog
            .get(plan_id)
            .ok_or_else(|| Error::unknown_plan(plan_id))?
            .clone();

        self.transition("select plan", |progress| {
            ensure_idle(progress)?;
            match progress.state {
                WorkflowState::PlanSelection | WorkflowState::Success { .. } => {}
                ref other => return Err(Error::invalid_transition(other.name(), "select a plan")),
            }
            let draft = (*progress.draft).clone().with_plan(plan);
            Ok((Some(Progress::new(WorkflowState::ProfileEntry, draft)), ()))
        })
    }

    /// Initial values for the profile form.
    ///
    /// Returns the last submitted input; the guardian name defaults to the
    /// signed-in user's display name.
    #[must_use]
    pub fn profile_prefill(&self) -> ProfileFields {
        let mut fields = self.draft().fields().clone();
        if fields.guardian_name.trim().is_empty() {
            if let Some(name) = self
                .shared
                .identity
                .current_user()
                .and_then(|user| user.display_name)
            {
                fields.guardian_name = name;
            }
        }
        fields
    }

    /// Validate the profile form and, if valid, move on to capture.
    ///
    /// Invalid input leaves both state and draft untouched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] outside the profile step.
    pub fn submit_profile(&self, fields: ProfileFields) -> Result<ValidationResult> {
        let result = validate(&fields);
        let identity = &self.shared.identity;

        self.transition("submit profile", |progress| {
            ensure_idle(progress)?;
            if progress.state != WorkflowState::ProfileEntry {
                return Err(Error::invalid_transition(
                    progress.state.name(),
                    "submit the profile",
                ));
            }
            let ValidationResult::Valid(profile) = &result else {
                return Ok((None, result.clone()));
            };

            let mut draft = (*progress.draft).clone().with_profile(fields, profile.clone());
            if let Some(user) = identity.current_user() {
                draft = draft.with_owner(user);
            }
            let slot = draft.captures().resume_slot();
            Ok((
                Some(Progress::new(WorkflowState::BiometricCapture { slot }, draft)),
                result.clone(),
            ))
        })
    }

    /// Open the camera for the active slot.
    ///
    /// Returns `false` if a session was already open.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] outside a capture step.
    pub fn begin_capture(&self) -> Result<bool> {
        self.transition("begin capture", |progress| {
            let slot = active_slot(progress, "begin a capture")?;
            let mut captures = progress.draft.captures().clone();
            if !captures.begin_capture(slot) {
                return Ok((None, false));
            }
            let draft = (*progress.draft).clone().with_captures(captures);
            Ok((Some(Progress::new(progress.state.clone(), draft)), true))
        })
    }

    /// Store a capture for `slot`, replacing any earlier one.
    ///
    /// Committing the face moves on to the body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] unless `slot` is the active slot.
    pub fn commit_capture(&self, slot: CaptureSlot, payload: CapturePayload) -> Result<()> {
        self.transition("commit capture", |progress| {
            let active = active_slot(progress, "store a capture")?;
            if active != slot {
                return Err(Error::invalid_transition(
                    progress.state.name(),
                    "store a capture for another slot",
                ));
            }
            let mut captures = progress.draft.captures().clone();
            if captures.commit_capture(slot, payload).is_some() {
                debug!("Replaced earlier {} capture", slot.as_str());
            }
            let draft = (*progress.draft).clone().with_captures(captures);
            let next = WorkflowState::BiometricCapture {
                slot: CaptureSlot::Body,
            };
            Ok((Some(Progress::new(next, draft)), ()))
        })
    }

    /// Discard the capture for the active `slot` and reopen the camera.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] unless `slot` is the active slot.
    pub fn clear_capture(&self, slot: CaptureSlot) -> Result<()> {
        self.transition("clear capture", |progress| {
            let active = active_slot(progress, "retake a capture")?;
            if active != slot {
                return Err(Error::invalid_transition(
                    progress.state.name(),
                    "retake a capture for another slot",
                ));
            }
            let mut captures = progress.draft.captures().clone();
            captures.clear_capture(slot);
            let draft = (*progress.draft).clone().with_captures(captures);
            Ok((Some(Progress::new(progress.state.clone(), draft)), ()))
        })
    }

    /// Capture the active slot from `device` and store the result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Capture`] if the device fails, leaving the slot
    /// without a new payload, and [`Error::InvalidTransition`] if the
    /// workflow moved on while the device was working.
    pub async fn capture_from(&self, device: &dyn CaptureDevice) -> Result<CaptureSlot> {
        let slot = self
            .state()
            .capture_slot()
            .ok_or_else(|| Error::invalid_transition(self.state().name(), "capture"))?;

        self.begin_capture()?;
        debug!("Capturing {} from {}", slot.as_str(), device.name());
        let payload = device.capture(slot).await?;
        self.commit_capture(slot, payload)?;
        info!("Captured {} scan from {}", slot.as_str(), device.name());
        Ok(slot)
    }

    /// Step back one screen.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CommitInFlight`] while a commit is pending and
    /// [`Error::InvalidTransition`] where there is nothing to go back to.
    pub fn go_back(&self) -> Result<WorkflowState> {
        self.transition("go back", |progress| {
            ensure_idle(progress)?;
            let previous = transitions::previous(&progress.state)
                .ok_or_else(|| Error::invalid_transition(progress.state.name(), "go back"))?;
            Ok((
                Some(Progress::new(previous.clone(), Arc::clone(&progress.draft))),
                previous,
            ))
        })
    }

    /// Dismiss a failure and return to the body capture screen.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] unless the workflow has failed.
    pub fn acknowledge_failure(&self) -> Result<()> {
        self.transition("acknowledge failure", |progress| {
            if !matches!(progress.state, WorkflowState::Failed { .. }) {
                return Err(Error::invalid_transition(
                    progress.state.name(),
                    "acknowledge a failure",
                ));
            }
            let next = WorkflowState::BiometricCapture {
                slot: CaptureSlot::Body,
            };
            Ok((Some(Progress::new(next, Arc::clone(&progress.draft))), ()))
        })
    }

    /// Whether a submit control should be enabled right now.
    #[must_use]
    pub fn can_complete(&self) -> bool {
        if self.is_committing() {
            return false;
        }
        let progress = self.shared.progress.borrow();
        accepts_commit(&progress.state) && progress.draft.captures().is_fully_complete()
    }

    /// Submit the enrollment.
    ///
    /// At most one commit runs at a time; triggers while one is in flight,
    /// or before both captures exist, return [`CommitOutcome::Disabled`]
    /// without side effects. Without a signed-in user the workflow waits in
    /// [`WorkflowState::AuthenticationRequired`] and commits once someone
    /// signs in.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] outside the body step or a
    /// failure, and [`Error::Commit`] if the commit itself failed. In the
    /// latter case the workflow is in [`WorkflowState::Failed`] with the
    /// draft unchanged.
    pub async fn complete_enrollment(&self) -> Result<CommitOutcome> {
        if self
            .shared
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Commit already in flight, ignoring trigger");
            return Ok(CommitOutcome::Disabled);
        }

        let identity = &self.shared.identity;
        let start = self.transition("complete enrollment", |progress| {
            if !accepts_commit(&progress.state) {
                return Err(Error::invalid_transition(
                    progress.state.name(),
                    "complete the enrollment",
                ));
            }
            if !progress.draft.captures().is_fully_complete() {
                return Ok((None, CommitStart::Incomplete));
            }
            let draft = Arc::clone(&progress.draft);
            match identity.current_user() {
                Some(owner) => Ok((
                    Some(Progress::new(WorkflowState::Committing, Arc::clone(&draft))),
                    CommitStart::Commit(draft, owner),
                )),
                None => Ok((
                    Some(Progress::new(WorkflowState::AuthenticationRequired, draft)),
                    CommitStart::Defer,
                )),
            }
        });

        match start {
            Err(err) => {
                self.release();
                Err(err)
            }
            Ok(CommitStart::Incomplete) => {
                self.release();
                debug!("Captures incomplete, ignoring trigger");
                Ok(CommitOutcome::Disabled)
            }
            Ok(CommitStart::Defer) => {
                info!("Enrollment waiting for sign-in");
                self.defer_until_signed_in();
                Ok(CommitOutcome::AuthenticationRequired)
            }
            Ok(CommitStart::Commit(draft, owner)) => self.run_commit(&draft, &owner).await,
        }
    }

    /// Abandon the current enrollment and start over with an empty draft.
    ///
    /// Cancels a commit that is waiting for sign-in.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CommitInFlight`] while a commit is running.
    pub fn reset(&self) -> Result<()> {
        let was_deferred = self.transition("reset", |progress| {
            if progress.state == WorkflowState::Committing {
                return Err(Error::CommitInFlight);
            }
            let was_deferred = progress.state == WorkflowState::AuthenticationRequired;
            Ok((
                Some(Progress::new(
                    WorkflowState::PlanSelection,
                    EnrollmentDraft::new(),
                )),
                was_deferred,
            ))
        })?;

        if let Some(handle) = self.take_deferred() {
            handle.abort();
        }
        if was_deferred {
            info!("Cancelled enrollment waiting for sign-in");
            self.release();
        }
        Ok(())
    }

    /// Apply `f` to the current progress as one atomic step.
    ///
    /// `f` returns the next progress (or `None` to leave it untouched)
    /// together with a value for the caller.
    fn transition<T>(
        &self,
        trigger: &'static str,
        f: impl FnOnce(&Progress) -> Result<(Option<Progress>, T)>,
    ) -> Result<T> {
        let mut outcome = None;
        self.shared.progress.send_if_modified(|progress| match f(progress) {
            Ok((Some(next), value)) => {
                if next.state != progress.state {
                    debug!("{trigger}: {} -> {}", progress.state, next.state);
                }
                *progress = next;
                outcome = Some(Ok(value));
                true
            }
            Ok((None, value)) => {
                outcome = Some(Ok(value));
                false
            }
            Err(err) => {
                debug!("{trigger} rejected: {err}");
                outcome = Some(Err(err));
                false
            }
        });
        outcome.unwrap_or_else(|| Err(Error::internal(format!("{trigger} did not run"))))
    }

    async fn run_commit(&self, draft: &EnrollmentDraft, owner: &Identity) -> Result<CommitOutcome> {
        let result = self.shared.commit.commit(draft, owner).await;

        let outcome = match result {
            Ok(student_id) => {
                self.shared.progress.send_replace(Progress::new(
                    WorkflowState::Success {
                        student_id: student_id.clone(),
                    },
                    EnrollmentDraft::new(),
                ));
                let name = draft
                    .profile()
                    .map_or("Your child", |profile| profile.name.as_str());
                self.shared.notifier.notify(
                    &format!("Welcome to the family! {name} is enrolled as {student_id}"),
                    NotificationKind::Success,
                );
                Ok(CommitOutcome::Committed(student_id))
            }
            Err(err) => {
                warn!("Enrollment commit failed: {err}");
                self.shared.progress.send_modify(|progress| {
                    progress.state = WorkflowState::Failed {
                        reason: err.to_string(),
                    };
                });
                self.shared
                    .notifier
                    .notify(&format!("Enrollment failed: {err}"), NotificationKind::Error);
                Err(Error::Commit(err))
            }
        };

        self.release();
        outcome
    }

    fn defer_until_signed_in(&self) {
        let identity = Arc::clone(&self.shared.identity);
        let shared: Weak<Shared> = Arc::downgrade(&self.shared);

        let task = tokio::spawn(async move {
            let owner = identity.signed_in().await;
            let Some(shared) = shared.upgrade() else {
                return;
            };
            let workflow = EnrollmentWorkflow { shared };
            info!("{} signed in, resuming enrollment", owner.uid);

            let draft = workflow.transition("resume after sign-in", |progress| {
                if progress.state != WorkflowState::AuthenticationRequired {
                    return Err(Error::invalid_transition(
                        progress.state.name(),
                        "resume after sign-in",
                    ));
                }
                let draft = Arc::new((*progress.draft).clone().with_owner(owner.clone()));
                Ok((
                    Some(Progress::new(WorkflowState::Committing, Arc::clone(&draft))),
                    draft,
                ))
            });
            // A reset already released the commit slot.
            let Ok(draft) = draft else {
                return;
            };
            workflow.take_deferred();
            if let Err(err) = workflow.run_commit(&draft, &owner).await {
                debug!("Deferred commit ended with {err}");
            }
        });

        *self
            .shared
            .deferred
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(task.abort_handle());
    }

    fn take_deferred(&self) -> Option<AbortHandle> {
        self.shared
            .deferred
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn release(&self) {
        self.shared.in_flight.store(false, Ordering::SeqCst);
    }
}

fn accepts_commit(state: &WorkflowState) -> bool {
    matches!(
        state,
        WorkflowState::BiometricCapture {
            slot: CaptureSlot::Body
        } | WorkflowState::Failed { .. }
    )
}

fn ensure_idle(progress: &Progress) -> Result<()> {
    if progress.state.is_busy() {
        Err(Error::CommitInFlight)
    } else {
        Ok(())
    }
}

fn active_slot(progress: &Progress, trigger: &'static str) -> Result<CaptureSlot> {
    progress
        .state
        .capture_slot()
        .ok_or_else(|| Error::invalid_transition(progress.state.name(), trigger))
}

#[cfg(test)]
mod tests;
