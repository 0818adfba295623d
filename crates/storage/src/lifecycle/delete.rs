#![forbid(unsafe_code)]

use super::ResourceManager;
use super::cleanup::BlobCleanup;
use crate::StoreError;
use crate::blob::BlobStore;
use crate::policy::PolicyStore;
use crate::requests::RequestContext;
use crate::store::{delete_resource_tx, linked_attachments, resource_by_owner, unlink_attachment_tx};
use crate::types::DeleteOutcome;
use cms_core::ids::ResourceUuid;

impl<B: BlobStore, P: PolicyStore> ResourceManager<B, P> {
    /// Removes an owned resource, its attachments, their blobs and the
    /// registry entry, then revokes every tuple naming the resource.
    ///
    /// Under strict cleanup a missing blob aborts the whole delete.
    pub fn delete(
        &mut self,
        ctx: &RequestContext,
        uuid: &ResourceUuid,
    ) -> Result<DeleteOutcome, StoreError> {
        let policy = self.config.cleanup.delete;
        let tx = self.store.write_tx()?;
        let Some(row) = resource_by_owner(&tx, uuid, ctx.subject)? else {
            return Err(StoreError::NotFound);
        };
        let links = linked_attachments(&tx, row.id)?;

        let mut cleanup = BlobCleanup::default();
        for link in &links {
            unlink_attachment_tx(&tx, link)?;
            cleanup.schedule(policy, link.filepath.clone());
        }
        if let Some(primary) = &row.primary {
            cleanup.schedule(policy, primary.filepath.clone());
        }
        delete_resource_tx(&tx, row.id, uuid)?;

        cleanup.release_referenced(&tx)?;
        cleanup.run_strict(&self.blobs)?;
        tx.commit()?;
        tracing::info!(
            uuid = %uuid,
            subject = %ctx.subject,
            attachments = links.len(),
            strict_blobs = cleanup.strict_count(),
            "resource deleted"
        );

        let mut problems = cleanup.run_deferred(&self.blobs);
        match self.policies.remove_resource_policies(&uuid.to_string()) {
            Ok(revoked) => tracing::debug!(uuid = %uuid, revoked, "policy tuples revoked"),
            Err(err) => {
                tracing::warn!(uuid = %uuid, error = %err, "policy revocation failed");
                problems.push(format!("policy revocation failed: {err}"));
            }
        }
        if !problems.is_empty() {
            return Err(StoreError::PartialConsistency {
                uuid: *uuid,
                detail: problems.join("; "),
            });
        }
        Ok(DeleteOutcome { success: true })
    }
}
