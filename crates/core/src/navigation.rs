//! Application navigation seam
//!
//! The client never routes anywhere itself. When a session cannot be
//! salvaged it tells the registered [`Navigator`] that the user has to
//! authenticate again and leaves the rest to the application.

use std::sync::{Arc, PoisonError, RwLock};

/// Receives the signal to send the user back to a re-authentication entry point
#[cfg_attr(any(test, feature = "tests"), mockall::automock)]
pub trait Navigator: Send + Sync {
    fn require_reauth(&self, reason: &str);
}

/// Navigator that ignores the signal
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn require_reauth(&self, reason: &str) {
        tracing::debug!(reason, "Re-authentication requested with no navigator attached");
    }
}

type ReauthCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Navigator backed by a replaceable callback
///
/// Useful when the component that knows how to show a login prompt is created
/// after the client: register the callback once it exists and clear it when it
/// goes away.
#[derive(Default)]
pub struct CallbackNavigator {
    callback: RwLock<Option<ReauthCallback>>,
}

impl CallbackNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Navigator with a callback already registered
    pub fn with_callback(callback: impl Fn(&str) + Send + Sync + 'static) -> Self {
        let navigator = Self::new();
        navigator.set_callback(callback);
        navigator
    }

    /// Set the re-authentication callback
    pub fn set_callback(&self, callback: impl Fn(&str) + Send + Sync + 'static) {
        *self.callback.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(callback));
    }

    /// Clear the re-authentication callback
    pub fn clear_callback(&self) {
        self.callback
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

impl Navigator for CallbackNavigator {
    fn require_reauth(&self, reason: &str) {
        // Clone out so the callback may itself replace or clear the registration
        let callback = self
            .callback
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        match callback {
            Some(callback) => callback(reason),
            None => tracing::warn!(reason, "Re-authentication requested but no callback is set"),
        }
    }
}
