//! Authentication collaborator.
//!
//! The workflow only needs two things from authentication: who is signed in
//! right now, and a way to wait until someone is.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::info;

/// A signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    /// Stable user identifier; becomes the record's guardian id.
    pub uid: String,
    /// Name shown in the UI, used to prefill the guardian name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl Identity {
    /// An identity with no display name.
    #[must_use]
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            display_name: None,
        }
    }

    /// Set the display name.
    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}

/// Source of the current user identity.
#[async_trait::async_trait]
pub trait IdentitySource: Send + Sync {
    /// The signed-in user, if any.
    fn current_user(&self) -> Option<Identity>;

    /// Resolve once a user is signed in.
    async fn signed_in(&self) -> Identity;
}

/// An in-process session whose user can change over time.
#[derive(Debug)]
pub struct Session {
    user: watch::Sender<Option<Identity>>,
}

impl Session {
    /// A session with nobody signed in.
    #[must_use]
    pub fn anonymous() -> Self {
        Self {
            user: watch::Sender::new(None),
        }
    }

    /// A session with `identity` already signed in.
    #[must_use]
    pub fn signed_in_as(identity: Identity) -> Self {
        Self {
            user: watch::Sender::new(Some(identity)),
        }
    }

    /// Sign `identity` in, waking anything waiting in [`IdentitySource::signed_in`].
    pub fn sign_in(&self, identity: Identity) {
        info!("User {} signed in", identity.uid);
        self.user.send_replace(Some(identity));
    }

    /// Sign the current user out.
    pub fn sign_out(&self) {
        if let Some(previous) = self.user.send_replace(None) {
            info!("User {} signed out", previous.uid);
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::anonymous()
    }
}

#[async_trait::async_trait]
impl IdentitySource for Session {
    fn current_user(&self) -> Option<Identity> {
        self.user.borrow().clone()
    }

    async fn signed_in(&self) -> Identity {
        let mut rx = self.user.subscribe();
        let user = rx
            .wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|user| user.clone());
        match user {
            Some(user) => user,
            // The sender lives in `self`, so the channel cannot close while we wait.
            None => std::future::pending().await,
        }
    }
}
