//! Blob storage interface and run result cleanup
//!
//! Large run results live outside the relational registry in an external
//! object store. The store is eventually consistent and has no transactional
//! coupling to the registry: deletion there is best-effort, and an orphaned
//! blob is an acceptable, recoverable cost.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::run::Run;
use crate::{Error, Result};

/// External object store holding run results
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Delete the blob behind `reference`
    async fn delete(&self, reference: &str) -> Result<()>;
}

/// In-memory blob store
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
        }
    }

    pub async fn put(&self, reference: impl Into<String>, data: Vec<u8>) {
        let mut blobs = self.blobs.write().await;
        blobs.insert(reference.into(), data);
    }

    pub async fn contains(&self, reference: &str) -> bool {
        let blobs = self.blobs.read().await;
        blobs.contains_key(reference)
    }
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn delete(&self, reference: &str) -> Result<()> {
        let mut blobs = self.blobs.write().await;
        if blobs.remove(reference).is_none() {
            return Err(Error::BlobStore(format!("blob {} not found", reference)));
        }
        Ok(())
    }
}

const DEFAULT_DELETE_TIMEOUT: Duration = Duration::from_secs(10);

/// Best-effort cleanup of run results in blob storage
pub struct BlobLifecycle {
    store: Arc<dyn BlobStore>,
    delete_timeout: Duration,
}

impl BlobLifecycle {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self {
            store,
            delete_timeout: DEFAULT_DELETE_TIMEOUT,
        }
    }

    pub fn with_delete_timeout(mut self, timeout: Duration) -> Self {
        self.delete_timeout = timeout;
        self
    }

    /// Delete the run's blob-stored result, if it has one
    ///
    /// Failure and timeout are logged and swallowed: the registry record is
    /// authoritative and its deletion must not be blocked by the store.
    /// Returns whether the deletion succeeded, for logging only.
    pub async fn cleanup(&self, run: &Run) -> bool {
        if !run.blob_storage_used {
            return true;
        }
        let Some(reference) = run.result.as_deref() else {
            return true;
        };

        match tokio::time::timeout(self.delete_timeout, self.store.delete(reference)).await {
            Ok(Ok(())) => {
                debug!(run_id = %run.id, reference, "deleted run result blob");
                true
            }
            Ok(Err(err)) => {
                warn!(
                    run_id = %run.id,
                    reference,
                    "failed to delete run result blob, leaving orphan: {}",
                    err
                );
                false
            }
            Err(_) => {
                warn!(
                    run_id = %run.id,
                    reference,
                    "timed out deleting run result blob, leaving orphan"
                );
                false
            }
        }
    }
}
