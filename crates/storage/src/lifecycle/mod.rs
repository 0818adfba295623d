#![forbid(unsafe_code)]

mod cleanup;
mod create;
mod delete;
mod profile;
mod read;
mod reconcile;
mod update;

use crate::blob::{BlobStore, FsBlobStore};
use crate::config::ManagerConfig;
use crate::policy::{PolicyStore, PolicyTuple, SqlitePolicyStore};
use crate::requests::RequestContext;
use crate::store::{SqliteStore, insert_attachment_tx, insert_link_tx};
use crate::StoreError;
use cms_core::ids::ResourceUuid;
use cms_core::model::Action;
use cms_core::resource::AttachmentSpec;
use rusqlite::Connection;
use std::time::Duration;

/// Creates, mutates, reads and deletes owned resources across the relational
/// store, the blob store and the policy store.
///
/// Holds no shared mutable state. Concurrent workers each open their own
/// manager over the same files and rely on SQLite transaction isolation.
pub struct ResourceManager<B: BlobStore, P: PolicyStore> {
    store: SqliteStore,
    blobs: B,
    policies: P,
    config: ManagerConfig,
}

impl<B: BlobStore, P: PolicyStore> ResourceManager<B, P> {
    pub fn new(store: SqliteStore, blobs: B, policies: P, config: ManagerConfig) -> Self {
        Self {
            store,
            blobs,
            policies,
            config,
        }
    }

    pub fn store(&self) -> &SqliteStore {
        &self.store
    }

    /// Callers write blob bytes here before referencing them in a request.
    pub fn blobs(&self) -> &B {
        &self.blobs
    }

    pub fn policies(&self) -> &P {
        &self.policies
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Exact tuple check against the policy store.
    pub fn authorize(
        &self,
        ctx: &RequestContext,
        uuid: &ResourceUuid,
        action: Action,
    ) -> Result<bool, StoreError> {
        let tuple = PolicyTuple::new(ctx.subject, ctx.domain, uuid, action);
        Ok(self.policies.has_policy(&tuple)?)
    }
}

impl ResourceManager<FsBlobStore, SqlitePolicyStore> {
    /// Opens all three stores as described by `config`.
    pub fn open(config: ManagerConfig) -> Result<Self, StoreError> {
        config.validate()?;
        let store = SqliteStore::open_with_config(&config)?;
        let blobs = FsBlobStore::open(config.blob_root())?;
        let policies = SqlitePolicyStore::open(
            config.policy_path(),
            Duration::from_millis(config.busy_timeout_ms),
        )?;
        tracing::debug!(
            storage_dir = %config.storage_dir.display(),
            blob_root = %blobs.root().display(),
            "resource manager opened"
        );
        Ok(Self::new(store, blobs, policies, config))
    }
}

/// Inserts attachment rows first, then one link per attachment carrying the
/// caller's index.
fn insert_attachments_tx(
    conn: &Connection,
    resource_id: i64,
    specs: &[AttachmentSpec],
) -> Result<usize, StoreError> {
    let mut inserted = Vec::with_capacity(specs.len());
    for spec in specs {
        let attachment_id = insert_attachment_tx(conn, &spec.filename, &spec.filepath)?;
        inserted.push((attachment_id, spec.index));
    }
    for (attachment_id, index) in &inserted {
        insert_link_tx(conn, resource_id, *attachment_id, *index)?;
    }
    Ok(inserted.len())
}

fn ensure_blobs_present<'a, B: BlobStore>(
    blobs: &B,
    paths: impl IntoIterator<Item = &'a str>,
) -> Result<(), StoreError> {
    for path in paths {
        if !blobs.exists(path)? {
            return Err(StoreError::InvalidInput(
                "referenced blob has not been written",
            ));
        }
    }
    Ok(())
}
