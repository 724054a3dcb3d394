//! Session reset after an unrecoverable renewal failure

use super::store::CredentialStore;
use hostel_core::Navigator;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

/// Clears the session and asks the application to re-authenticate
///
/// Fires at most once per credential generation: repeated calls after the
/// same failure are no-ops until a new credential is installed.
pub struct SessionInvalidator {
    store: CredentialStore,
    navigator: Arc<dyn Navigator>,
    // generation + 1 of the last invalidated session, 0 = never
    invalidated: AtomicU64,
}

impl SessionInvalidator {
    pub fn new(store: CredentialStore, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            store,
            navigator,
            invalidated: AtomicU64::new(0),
        }
    }

    /// Returns `false` when this session was already invalidated
    ///
    /// The marker is keyed on the credential generation, which only `set`
    /// and `restore` advance. A later renewal failure with no credential
    /// installed in between (the user ignored the first prompt) is therefore
    /// silent: the store is already empty and the application was already
    /// told. The next login rearms it.
    pub async fn invalidate(&self, reason: &str) -> bool {
        let marker = self.store.generation() + 1;
        if self.invalidated.swap(marker, Ordering::AcqRel) == marker {
            return false;
        }

        warn!(reason, "Invalidating session");
        self.store.clear().await;
        self.navigator.require_reauth(reason);
        true
    }
}
