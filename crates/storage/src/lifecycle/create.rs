#![forbid(unsafe_code)]

use super::{ResourceManager, ensure_blobs_present, insert_attachments_tx};
use crate::StoreError;
use crate::blob::BlobStore;
use crate::policy::{PolicyError, PolicyStore, PolicyTuple};
use crate::requests::{CreateResourceRequest, RequestContext};
use crate::store::{
    NewResourceRow, SqliteStore, delete_resource_tx, insert_resource_tx, linked_attachments, now_ms,
    object_type_id_tx, register_object_tx, unlink_attachment_tx,
};
use cms_core::ids::ResourceUuid;
use cms_core::model::ObjectKind;
use cms_core::resource::{normalize_tags, normalize_title, validate_attachments};

impl<B: BlobStore, P: PolicyStore> ResourceManager<B, P> {
    /// Records a new resource and grants its owner read/modify/delete.
    ///
    /// Rows (resource, attachments, links, registry entry) commit together.
    /// The owner grant follows the commit; if it fails the rows are removed
    /// again and `StoreError::PolicyGrant` is returned. If that removal fails
    /// too the result is `StoreError::PartialConsistency` and the grant is
    /// left to [`ResourceManager::reconcile`].
    pub fn create(
        &mut self,
        ctx: &RequestContext,
        request: CreateResourceRequest,
    ) -> Result<ResourceUuid, StoreError> {
        let CreateResourceRequest {
            title,
            primary,
            body,
            tags,
            attachments,
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
        let tags_json = serde_json::to_string(&tags)?;

        ensure_blobs_present(
            &self.blobs,
            primary
                .iter()
                .map(|p| p.filepath.as_str())
                .chain(attachments.iter().map(|a| a.filepath.as_str())),
        )?;

        let uuid = ResourceUuid::generate();
        let tx = self.store.write_tx()?;

        let resource_id = insert_resource_tx(
            &tx,
            &NewResourceRow {
                uuid: &uuid,
                owner: ctx.subject,
                domain: ctx.domain,
                title: &title,
                primary: primary.as_ref(),
                body: &body,
                tags_json: &tags_json,
                now_ms: now_ms(),
            },
        )?;
        let attached = insert_attachments_tx(&tx, resource_id, &attachments)?;

        let type_id = object_type_id_tx(&tx, ObjectKind::Article)?;
        register_object_tx(&tx, &uuid, type_id)?;

        tx.commit()?;
        tracing::info!(
            uuid = %uuid,
            subject = %ctx.subject,
            domain = %ctx.domain,
            attachments = attached,
            "resource created"
        );

        let grants = PolicyTuple::owner_grants(ctx.subject, ctx.domain, &uuid);
        if let Err(source) = self.policies.add_policies(&grants) {
            tracing::warn!(uuid = %uuid, error = %source, "owner grant failed, removing resource");
            return Err(self.compensate_create(resource_id, uuid, source));
        }

        Ok(uuid)
    }

    fn compensate_create(
        &mut self,
        resource_id: i64,
        uuid: ResourceUuid,
        source: PolicyError,
    ) -> StoreError {
        match purge_resource_rows(&mut self.store, resource_id, &uuid) {
            Ok(()) => StoreError::PolicyGrant { uuid, source },
            Err(err) => {
                tracing::error!(
                    uuid = %uuid,
                    error = %err,
                    "compensation failed, resource left without owner grants"
                );
                StoreError::PartialConsistency {
                    uuid,
                    detail: format!("owner grant failed ({source}); compensation failed ({err})"),
                }
            }
        }
    }
}

fn purge_resource_rows(
    store: &mut SqliteStore,
    resource_id: i64,
    uuid: &ResourceUuid,
) -> Result<(), StoreError> {
    let tx = store.write_tx()?;
    for link in linked_attachments(&tx, resource_id)? {
        unlink_attachment_tx(&tx, &link)?;
    }
    delete_resource_tx(&tx, resource_id, uuid)?;
    tx.commit()?;
    Ok(())
}
