#![forbid(unsafe_code)]

use crate::StoreError;
use crate::blob::BlobStore;
use crate::config::CleanupPolicy;
use crate::store::blob_referenced_tx;
use rusqlite::Connection;
use std::collections::BTreeSet;

/// Blob removals collected while a transaction is open, split by policy.
#[derive(Debug, Default)]
pub(super) struct BlobCleanup {
    strict: Vec<String>,
    deferred: Vec<String>,
    protected: BTreeSet<String>,
}

impl BlobCleanup {
    /// Paths the committed state will still reference. Never removed.
    pub fn protect(&mut self, path: &str) {
        self.protected.insert(path.to_string());
    }

    pub fn schedule(&mut self, policy: CleanupPolicy, path: String) {
        if self.protected.contains(&path)
            || self.strict.contains(&path)
            || self.deferred.contains(&path)
        {
            return;
        }
        match policy {
            CleanupPolicy::Strict => self.strict.push(path),
            CleanupPolicy::BestEffort => self.deferred.push(path),
        }
    }

    /// Drops every scheduled path that a row still points at once the
    /// transaction's own edits are applied. Call after the last row change.
    pub fn release_referenced(&mut self, conn: &Connection) -> Result<(), StoreError> {
        for queue in [&mut self.strict, &mut self.deferred] {
            let mut kept = Vec::with_capacity(queue.len());
            for path in queue.drain(..) {
                if blob_referenced_tx(conn, &path)? {
                    tracing::debug!(path = %path, "blob still referenced, kept");
                } else {
                    kept.push(path);
                }
            }
            *queue = kept;
        }
        Ok(())
    }

    /// Must run inside the open transaction, right before commit. Every
    /// strict blob is checked first so a missing one aborts before anything
    /// is removed.
    pub fn run_strict<B: BlobStore>(&self, blobs: &B) -> Result<(), StoreError> {
        for path in &self.strict {
            if !blobs.exists(path)? {
                return Err(StoreError::blob(
                    path,
                    std::io::Error::new(std::io::ErrorKind::NotFound, "blob is missing"),
                ));
            }
        }
        for path in &self.strict {
            blobs.delete(path)?;
        }
        Ok(())
    }

    /// Runs after commit. Returns one message per failure; missing blobs are
    /// not failures.
    pub fn run_deferred<B: BlobStore>(&self, blobs: &B) -> Vec<String> {
        let mut failures = Vec::new();
        for path in &self.deferred {
            match blobs.delete(path) {
                Ok(()) => {}
                Err(err) if err.is_missing_blob() => {
                    tracing::debug!(path = %path, "blob already absent");
                }
                Err(err) => {
                    tracing::warn!(path = %path, error = %err, "best-effort blob cleanup failed");
                    failures.push(err.to_string());
                }
            }
        }
        failures
    }

    pub fn strict_count(&self) -> usize {
        self.strict.len()
    }
}
