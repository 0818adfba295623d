#![forbid(unsafe_code)]

use super::cleanup::BlobCleanup;
use super::{ResourceManager, ensure_blobs_present, insert_attachments_tx};
use crate::StoreError;
use crate::blob::BlobStore;
use crate::policy::PolicyStore;
use crate::requests::{RequestContext, UpdateResourceRequest};
use crate::store::{
    ResourceColumn, ResourcePatch, link_at_index_tx, now_ms, resource_by_owner,
    unlink_attachment_tx,
};
use cms_core::resource::{
    normalize_delete_indices, normalize_tags, normalize_title, validate_attachments,
};

impl<B: BlobStore, P: PolicyStore> ResourceManager<B, P> {
    /// Rewrites an owned resource and edits its attachment list.
    ///
    /// Deletions by index run before insertions, so a freed index can be
    /// reused in the same call. Policy tuples are not touched.
    pub fn update(
        &mut self,
        ctx: &RequestContext,
        request: UpdateResourceRequest,
    ) -> Result<bool, StoreError> {
        let UpdateResourceRequest {
            uuid,
            title,
            primary,
            body,
            tags,
            attachments,
            delete_indices,
        } = request;

        let title = normalize_title(&title).map_err(|err| StoreError::InvalidInput(err.message()))?;
        let tags = normalize_tags(&tags).map_err(|err| StoreError::InvalidInput(err.message()))?;
        validate_attachments(&attachments)
            .map_err(|err| StoreError::InvalidInput(err.message()))?;
        if let Some(primary) = &primary {
            primary
                .validate()
                .map_err(|err| StoreError::InvalidInput(err.message()))?;
        }
        let delete_indices = normalize_delete_indices(&delete_indices)
            .map_err(|err| StoreError::InvalidInput(err.message()))?;
        let tags_json = serde_json::to_string(&tags)?;

        ensure_blobs_present(
            &self.blobs,
            primary
                .iter()
                .map(|p| p.filepath.as_str())
                .chain(attachments.iter().map(|a| a.filepath.as_str())),
        )?;

        let tx = self.store.write_tx()?;
        let Some(current) = resource_by_owner(&tx, &uuid, ctx.subject)? else {
            return Err(StoreError::NotFound);
        };

        let updated_at_ms = now_ms().max(current.updated_at_ms);
        let mut patch = ResourcePatch::new()
            .set(ResourceColumn::Title, title)
            .set(ResourceColumn::Body, body)
            .set(ResourceColumn::TagsJson, tags_json)
            .set(ResourceColumn::UpdatedAtMs, updated_at_ms);

        let mut cleanup = BlobCleanup::default();
        for spec in &attachments {
            cleanup.protect(&spec.filepath);
        }
        match &primary {
            Some(next) => {
                cleanup.protect(&next.filepath);
                patch = patch
                    .set(ResourceColumn::PrimaryFilename, next.filename.clone())
                    .set(ResourceColumn::PrimaryFilepath, next.filepath.clone());
                if let Some(previous) = &current.primary {
                    if previous.filepath != next.filepath {
                        cleanup.schedule(
                            self.config.cleanup.update_primary,
                            previous.filepath.clone(),
                        );
                    }
                }
            }
            None => {
                if let Some(kept) = &current.primary {
                    cleanup.protect(&kept.filepath);
                }
            }
        }

        if patch.apply(&tx, current.id, ctx.subject)? == 0 {
            return Err(StoreError::NotFound);
        }

        let mut removed = 0usize;
        for index in delete_indices {
            let Some(link) = link_at_index_tx(&tx, current.id, index)? else {
                tracing::debug!(uuid = %uuid, index, "no attachment at index");
                continue;
            };
            unlink_attachment_tx(&tx, &link)?;
            cleanup.schedule(self.config.cleanup.update_attachments, link.filepath);
            removed += 1;
        }

        let added = insert_attachments_tx(&tx, current.id, &attachments)?;

        cleanup.release_referenced(&tx)?;
        cleanup.run_strict(&self.blobs)?;
        tx.commit()?;
        tracing::info!(
            uuid = %uuid,
            subject = %ctx.subject,
            added,
            removed,
            "resource updated"
        );

        let failures = cleanup.run_deferred(&self.blobs);
        if !failures.is_empty() {
            return Err(StoreError::PartialConsistency {
                uuid,
                detail: format!("blob cleanup failed: {}", failures.join("; ")),
            });
        }
        Ok(true)
    }
}
