//! Pure transition rules.
//!
//! Nothing here touches the workflow handle; these functions map a draft and
//! a requested step to the state that is actually valid for it.

use crate::capture::CaptureSlot;
use crate::catalog::PlanCatalog;
use crate::draft::EnrollmentDraft;

use super::state::{StepId, WorkflowState};

/// Give `draft` the catalog's fallback plan if it has none.
pub(crate) fn ensure_plan(draft: EnrollmentDraft, catalog: &PlanCatalog) -> EnrollmentDraft {
    if draft.plan().is_some() {
        draft
    } else {
        draft.with_plan(catalog.fallback().clone())
    }
}

/// Resolve a direct navigation to `requested` against `draft`.
///
/// Any step past plan selection auto-assigns the fallback plan. A capture
/// step without a validated profile lands on the profile form. Either capture
/// step with one resumes at the first slot still missing a payload, so a
/// stored face always lands on body; retaking the face is a `go_back` away.
#[must_use]
pub fn resolve_step(
    draft: EnrollmentDraft,
    requested: StepId,
    catalog: &PlanCatalog,
) -> (WorkflowState, EnrollmentDraft) {
    if requested == StepId::Plan {
        return (WorkflowState::PlanSelection, draft);
    }

    let draft = ensure_plan(draft, catalog);
    let state = match requested {
        StepId::Plan | StepId::Profile => WorkflowState::ProfileEntry,
        StepId::Face | StepId::Body if draft.profile().is_none() => WorkflowState::ProfileEntry,
        StepId::Face | StepId::Body => WorkflowState::BiometricCapture {
            slot: draft.captures().resume_slot(),
        },
    };
    (state, draft)
}

/// The state "back" leads to, if any.
pub(crate) fn previous(state: &WorkflowState) -> Option<WorkflowState> {
    match state {
        WorkflowState::ProfileEntry => Some(WorkflowState::PlanSelection),
        WorkflowState::BiometricCapture {
            slot: CaptureSlot::Face,
        } => Some(WorkflowState::ProfileEntry),
        WorkflowState::BiometricCapture {
            slot: CaptureSlot::Body,
        } => Some(WorkflowState::BiometricCapture {
            slot: CaptureSlot::Face,
        }),
        WorkflowState::Failed { .. } => Some(WorkflowState::BiometricCapture {
            slot: CaptureSlot::Body,
        }),
        WorkflowState::PlanSelection
        | WorkflowState::Committing
        | WorkflowState::AuthenticationRequired
        | WorkflowState::Success { .. } => None,
    }
}
