//! Durable storage for the session credential
//!
//! The client treats storage as a single key-value slot: `load` once at
//! startup, `save`/`erase` on every credential mutation.

use crate::{CoreError, CoreResult, Credential};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// File name used for the persisted session inside a state directory
pub const SESSION_FILE: &str = "session.json";

#[async_trait]
pub trait DurableStorage: Send + Sync {
    /// Read the persisted credential, if any
    async fn load(&self) -> CoreResult<Option<Credential>>;

    /// Persist the credential, replacing any previous value
    async fn save(&self, credential: &Credential) -> CoreResult<()>;

    /// Remove the persisted credential; erasing an empty slot is not an error
    async fn erase(&self) -> CoreResult<()>;
}

/// Process-local storage, lost on restart
#[derive(Debug, Default)]
pub struct MemoryStorage {
    slot: Mutex<Option<Credential>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-populated with a credential, as if left by a previous run
    pub fn with_credential(credential: Credential) -> Self {
        Self {
            slot: Mutex::new(Some(credential)),
        }
    }

    /// Current slot contents without going through the async interface
    pub fn peek(&self) -> Option<Credential> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl DurableStorage for MemoryStorage {
    async fn load(&self) -> CoreResult<Option<Credential>> {
        Ok(self.peek())
    }

    async fn save(&self, credential: &Credential) -> CoreResult<()> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(credential.clone());
        Ok(())
    }

    async fn erase(&self) -> CoreResult<()> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        Ok(())
    }
}

/// JSON file in a state directory
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    /// Store the session as `session.json` inside `state_dir`
    pub fn in_dir(state_dir: impl AsRef<Path>) -> Self {
        Self::new(state_dir.as_ref().join(SESSION_FILE))
    }

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DurableStorage for FileStorage {
    async fn load(&self) -> CoreResult<Option<Credential>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let credential = serde_json::from_str(&content).map_err(|e| {
            CoreError::serialization_error(format!(
                "Corrupt session file {}: {e}",
                self.path.display()
            ))
        })?;
        Ok(Some(credential))
    }

    async fn save(&self, credential: &Credential) -> CoreResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write-then-rename so a crash never leaves a half-written file behind
        let content = serde_json::to_vec_pretty(credential)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        tracing::debug!(path = %self.path.display(), "Persisted session credential");
        Ok(())
    }

    async fn erase(&self) -> CoreResult<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), "Erased session credential");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// Mock implementation for testing
#[cfg(any(test, feature = "tests"))]
pub mod mock {
    use super::*;
    use mockall::mock;

    mock! {
        pub DurableStorage {}

        #[async_trait]
        impl DurableStorage for DurableStorage {
            async fn load(&self) -> CoreResult<Option<Credential>>;
            async fn save(&self, credential: &Credential) -> CoreResult<()>;
            async fn erase(&self) -> CoreResult<()>;
        }
    }
}
