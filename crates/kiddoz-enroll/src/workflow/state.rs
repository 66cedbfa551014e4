//! Workflow states and the values exposed to the navigation boundary.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::capture::CaptureSlot;
use crate::draft::EnrollmentDraft;
use crate::record::StudentId;

/// Where the enrollment wizard currently is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WorkflowState {
    /// Choosing a care plan.
    PlanSelection,
    /// Filling in the child and guardian profile.
    ProfileEntry,
    /// Capturing one biometric slot.
    BiometricCapture {
        /// Active slot.
        slot: CaptureSlot,
    },
    /// The commit is in flight.
    Committing,
    /// The commit is waiting for a user to sign in.
    AuthenticationRequired,
    /// The last commit failed; the draft is intact.
    Failed {
        /// Error shown to the user.
        reason: String,
    },
    /// The enrollment was stored.
    Success {
        /// Identifier of the new student.
        student_id: StudentId,
    },
}

impl WorkflowState {
    /// Short name used in logs and transition errors.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::PlanSelection => "plan selection",
            Self::ProfileEntry => "profile entry",
            Self::BiometricCapture {
                slot: CaptureSlot::Face,
            } => "face capture",
            Self::BiometricCapture {
                slot: CaptureSlot::Body,
            } => "body capture",
            Self::Committing => "committing",
            Self::AuthenticationRequired => "authentication required",
            Self::Failed { .. } => "failed",
            Self::Success { .. } => "success",
        }
    }

    /// The wizard step a router should show for this state.
    ///
    /// Commit-related states all belong to the body step; a finished
    /// enrollment sends the user back to the start.
    #[must_use]
    pub fn step(&self) -> StepId {
        match self {
            Self::PlanSelection | Self::Success { .. } => StepId::Plan,
            Self::ProfileEntry => StepId::Profile,
            Self::BiometricCapture {
                slot: CaptureSlot::Face,
            } => StepId::Face,
            Self::BiometricCapture {
                slot: CaptureSlot::Body,
            }
            | Self::Committing
            | Self::AuthenticationRequired
            | Self::Failed { .. } => StepId::Body,
        }
    }

    /// True while a commit is in flight or deferred for sign-in.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Committing | Self::AuthenticationRequired)
    }

    /// The active capture slot, if capturing.
    #[must_use]
    pub fn capture_slot(&self) -> Option<CaptureSlot> {
        match self {
            Self::BiometricCapture { slot } => Some(*slot),
            _ => None,
        }
    }
}

impl std::fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A routable wizard step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepId {
    /// Plan selection.
    Plan,
    /// Profile form.
    Profile,
    /// Face capture.
    Face,
    /// Body capture and submission.
    Body,
}

impl StepId {
    /// URL path segment for this step.
    #[must_use]
    pub fn path(self) -> &'static str {
        match self {
            Self::Plan => "plan",
            Self::Profile => "student-info",
            Self::Face => "face",
            Self::Body => "body",
        }
    }

    /// Parse a URL path segment.
    #[must_use]
    pub fn from_path(segment: &str) -> Option<Self> {
        match segment.trim_matches('/') {
            "" | "plan" => Some(Self::Plan),
            "student-info" => Some(Self::Profile),
            "face" => Some(Self::Face),
            "body" => Some(Self::Body),
            _ => None,
        }
    }
}

impl std::fmt::Display for StepId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}

/// Current state together with the draft it applies to.
///
/// Both are replaced, never mutated, on every transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    /// Current state.
    pub state: WorkflowState,
    /// Current draft.
    pub draft: Arc<EnrollmentDraft>,
}

impl Progress {
    pub(crate) fn new(state: WorkflowState, draft: impl Into<Arc<EnrollmentDraft>>) -> Self {
        Self {
            state,
            draft: draft.into(),
        }
    }
}

/// What a router carries between page loads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationState {
    /// Step the user was on.
    pub step: StepId,
    /// Draft at that point.
    pub draft: EnrollmentDraft,
}
