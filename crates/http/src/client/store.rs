//! In-memory holder of the current access credential

use arc_swap::ArcSwapOption;
use hostel_core::{CoreResult, Credential, DurableStorage};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Current access credential, mirrored to durable storage
///
/// Reads are lock-free and always see a complete credential. Writers are
/// serialized together with their storage call, so memory and storage never
/// disagree about the last mutation.
///
/// Two counters track change: `generation` counts installed credentials,
/// `epoch` counts every mutation including `clear`. A caller that captured
/// the epoch can use the `*_if_current` methods to apply a change only if
/// nothing else touched the store in between.
#[derive(Clone)]
pub struct CredentialStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    current: ArcSwapOption<Credential>,
    generation: AtomicU64,
    epoch: AtomicU64,
    writer: Mutex<()>,
    storage: Arc<dyn DurableStorage>,
}

impl CredentialStore {
    pub fn new(storage: Arc<dyn DurableStorage>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                current: ArcSwapOption::empty(),
                generation: AtomicU64::new(0),
                epoch: AtomicU64::new(0),
                writer: Mutex::new(()),
                storage,
            }),
        }
    }

    /// Current credential, if any
    pub fn get(&self) -> Option<Arc<Credential>> {
        self.inner.current.load_full()
    }

    /// Replace the credential and persist it
    ///
    /// Persistence failures are logged; the in-memory credential is still
    /// replaced so in-flight requests can proceed.
    pub async fn set(&self, credential: Credential) -> Arc<Credential> {
        let _writer = self.inner.writer.lock().await;
        self.install(credential).await
    }

    /// Like [`set`](Self::set), but only if the store has not changed since `epoch`
    pub async fn set_if_current(
        &self,
        epoch: u64,
        credential: Credential,
    ) -> Option<Arc<Credential>> {
        let _writer = self.inner.writer.lock().await;
        if self.epoch() != epoch {
            return None;
        }
        Some(self.install(credential).await)
    }

    /// Remove the credential from memory and storage
    pub async fn clear(&self) {
        let _writer = self.inner.writer.lock().await;
        self.remove().await;
    }

    /// Like [`clear`](Self::clear), but only if the store has not changed since `epoch`
    pub async fn clear_if_current(&self, epoch: u64) -> bool {
        let _writer = self.inner.writer.lock().await;
        if self.epoch() != epoch {
            return false;
        }
        self.remove().await;
        true
    }

    /// Load the persisted credential into memory, typically once at startup
    pub async fn restore(&self) -> CoreResult<Option<Arc<Credential>>> {
        let _writer = self.inner.writer.lock().await;
        let Some(credential) = self.inner.storage.load().await? else {
            return Ok(None);
        };

        let credential = Arc::new(credential);
        self.inner.current.store(Some(Arc::clone(&credential)));
        self.inner.generation.fetch_add(1, Ordering::AcqRel);
        self.inner.epoch.fetch_add(1, Ordering::AcqRel);
        debug!("Restored access credential from storage");
        Ok(Some(credential))
    }

    /// Number of times a credential has been installed
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::Acquire)
    }

    /// Number of mutations so far, `clear` included
    pub fn epoch(&self) -> u64 {
        self.inner.epoch.load(Ordering::Acquire)
    }

    // Callers hold the writer lock
    async fn install(&self, credential: Credential) -> Arc<Credential> {
        let credential = Arc::new(credential);
        self.inner.current.store(Some(Arc::clone(&credential)));
        self.inner.generation.fetch_add(1, Ordering::AcqRel);
        self.inner.epoch.fetch_add(1, Ordering::AcqRel);

        if let Err(e) = self.inner.storage.save(&credential).await {
            warn!("Failed to persist access credential: {e}");
        }
        credential
    }

    async fn remove(&self) {
        if self.inner.current.swap(None).is_some() {
            debug!("Cleared access credential");
        }
        self.inner.epoch.fetch_add(1, Ordering::AcqRel);

        if let Err(e) = self.inner.storage.erase().await {
            warn!("Failed to erase persisted credential: {e}");
        }
    }
}
