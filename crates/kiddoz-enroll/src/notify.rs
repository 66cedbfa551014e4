//! User-facing notification sink.
//!
//! Only terminal workflow outcomes are announced here. Validation and capture
//! problems are returned to the caller instead.

use tracing::{error, info};

/// Kind of message, which decides how it is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    /// The enrollment went through.
    Success,
    /// The enrollment failed and can be retried.
    Error,
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Sink for toast-style messages.
pub trait Notifier: Send + Sync {
    /// Deliver `message`.
    fn notify(&self, message: &str, kind: NotificationKind);
}

/// Writes notifications to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str, kind: NotificationKind) {
        match kind {
            NotificationKind::Success => info!(target: "kiddoz_enroll::notify", "{message}"),
            NotificationKind::Error => error!(target: "kiddoz_enroll::notify", "{message}"),
        }
    }
}
