#![forbid(unsafe_code)]

use super::ResourceManager;
use crate::StoreError;
use crate::blob::BlobStore;
use crate::policy::PolicyStore;
use crate::requests::RequestContext;
use crate::store::{
    LinkedAttachmentRow, ResourceRow, linked_attachments, linked_attachments_for_owner,
    resource_by_owner, resources_by_owner,
};
use crate::types::{Attachment, Resource};
use cms_core::ids::ResourceUuid;
use std::collections::BTreeMap;

impl<B: BlobStore, P: PolicyStore> ResourceManager<B, P> {
    /// A resource the caller does not own reads as missing.
    pub fn get(&self, ctx: &RequestContext, uuid: &ResourceUuid) -> Result<Resource, StoreError> {
        let conn = self.store.conn();
        let row = resource_by_owner(conn, uuid, ctx.subject)?.ok_or(StoreError::NotFound)?;
        let links = linked_attachments(conn, row.id)?;
        Ok(assemble(row, links))
    }

    /// Every resource the caller owns, oldest first.
    pub fn list(&self, ctx: &RequestContext) -> Result<Vec<Resource>, StoreError> {
        let conn = self.store.conn();
        let rows = resources_by_owner(conn, ctx.subject)?;
        let batched = rows.len() > self.config.list_fanout_limit;
        tracing::debug!(subject = %ctx.subject, count = rows.len(), batched, "listing resources");

        if !batched {
            return rows
                .into_iter()
                .map(|row| -> Result<Resource, StoreError> {
                    let links = linked_attachments(conn, row.id)?;
                    Ok(assemble(row, links))
                })
                .collect();
        }

        let mut grouped: BTreeMap<i64, Vec<LinkedAttachmentRow>> = BTreeMap::new();
        for link in linked_attachments_for_owner(conn, ctx.subject)? {
            grouped.entry(link.resource_id).or_default().push(link);
        }
        Ok(rows
            .into_iter()
            .map(|row| {
                let links = grouped.remove(&row.id).unwrap_or_default();
                assemble(row, links)
            })
            .collect())
    }
}

/// `links` must already be ordered by index.
fn assemble(row: ResourceRow, links: Vec<LinkedAttachmentRow>) -> Resource {
    Resource {
        uuid: row.uuid,
        owner: row.owner,
        domain: row.domain,
        title: row.title,
        primary: row.primary,
        body: row.body,
        tags: row.tags,
        attachments: links
            .into_iter()
            .map(|link| Attachment {
                id: link.attachment_id,
                index: link.index,
                filename: link.filename,
                filepath: link.filepath,
            })
            .collect(),
        created_at_ms: row.created_at_ms,
        updated_at_ms: row.updated_at_ms,
    }
}
