//! The in-progress enrollment aggregate.
//!
//! A draft is an immutable value. Every change produces a new draft, so the
//! workflow can hand out snapshots freely and a failed commit can never leave
//! a half-modified draft behind.

use serde::{Deserialize, Serialize};

use crate::capture::CaptureStore;
use crate::catalog::Plan;
use crate::identity::Identity;
use crate::profile::{ChildProfile, ProfileFields};

/// Random per-draft key sent with the commit so a replayed submission is
/// recognised by storage instead of creating a second record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DraftToken(String);

impl DraftToken {
    /// Generate a fresh 128-bit token.
    #[must_use]
    pub fn generate() -> Self {
        let bytes: [u8; 16] = rand::random();
        Self(bytes.iter().map(|b| format!("{b:02x}")).collect())
    }

    /// Hex representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DraftToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Accumulated data of one enrollment in progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentDraft {
    token: DraftToken,
    #[serde(default)]
    plan: Option<Plan>,
    #[serde(default)]
    fields: ProfileFields,
    #[serde(default)]
    profile: Option<ChildProfile>,
    #[serde(default)]
    captures: CaptureStore,
    #[serde(default)]
    owner: Option<Identity>,
}

impl EnrollmentDraft {
    /// An empty draft with a fresh token.
    #[must_use]
    pub fn new() -> Self {
        Self {
            token: DraftToken::generate(),
            plan: None,
            fields: ProfileFields::default(),
            profile: None,
            captures: CaptureStore::new(),
            owner: None,
        }
    }

    /// Idempotency token of this draft.
    #[must_use]
    pub fn token(&self) -> &DraftToken {
        &self.token
    }

    /// Selected plan.
    #[must_use]
    pub fn plan(&self) -> Option<&Plan> {
        self.plan.as_ref()
    }

    /// Last profile form input.
    #[must_use]
    pub fn fields(&self) -> &ProfileFields {
        &self.fields
    }

    /// Validated profile, present once the profile step has been passed.
    #[must_use]
    pub fn profile(&self) -> Option<&ChildProfile> {
        self.profile.as_ref()
    }

    /// Face and body captures.
    #[must_use]
    pub fn captures(&self) -> &CaptureStore {
        &self.captures
    }

    /// User who owns the draft, once known.
    #[must_use]
    pub fn owner(&self) -> Option<&Identity> {
        self.owner.as_ref()
    }

    /// Replace the plan.
    #[must_use]
    pub fn with_plan(self, plan: Plan) -> Self {
        Self {
            plan: Some(plan),
            ..self
        }
    }

    /// Replace the form input and the profile validated from it.
    #[must_use]
    pub fn with_profile(self, fields: ProfileFields, profile: ChildProfile) -> Self {
        Self {
            fields,
            profile: Some(profile),
            ..self
        }
    }

    /// Replace the capture set.
    #[must_use]
    pub fn with_captures(self, captures: CaptureStore) -> Self {
        Self { captures, ..self }
    }

    /// Record the owning user.
    #[must_use]
    pub fn with_owner(self, owner: Identity) -> Self {
        Self {
            owner: Some(owner),
            ..self
        }
    }
}

impl Default for EnrollmentDraft {
    fn default() -> Self {
        Self::new()
    }
}
