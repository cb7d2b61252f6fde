//! User-facing notifications.
//!
//! Services never notify directly; the presentation adapter
//! ([`AddressBook`](crate::services::addresses::AddressBook)) inspects their
//! results and emits toasts through a [`Notifier`].

use std::sync::Arc;

/// Fire-and-forget sink for transient user notifications.
pub trait Notifier: Send + Sync {
    /// Report that an action succeeded.
    fn success(&self, message: &str);

    /// Report that an action failed.
    fn error(&self, message: &str);
}

impl<T: Notifier + ?Sized> Notifier for Arc<T> {
    fn success(&self, message: &str) {
        (**self).success(message);
    }

    fn error(&self, message: &str) {
        (**self).error(message);
    }
}

/// Notifier that records notifications as tracing events.
///
/// Useful for headless callers where there is no UI to toast to.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn success(&self, message: &str) {
        tracing::info!(notification = "success", "{message}");
    }

    fn error(&self, message: &str) {
        tracing::warn!(notification = "error", "{message}");
    }
}
