#![forbid(unsafe_code)]

use crate::StoreError;
use cms_core::ids::{DomainId, ResourceUuid, SubjectId};
use cms_core::resource::BlobRef;

#[derive(Clone, Debug)]
pub(crate) struct ResourceRow {
    pub id: i64,
    pub uuid: ResourceUuid,
    pub owner: SubjectId,
    pub domain: DomainId,
    pub title: String,
    pub primary: Option<BlobRef>,
    pub body: String,
    pub tags: Vec<String>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

pub(crate) const RESOURCE_COLUMNS: &str = "id, uuid, owner_subject, domain_id, title, primary_filename, primary_filepath, body, tags_json, created_at_ms, updated_at_ms";

pub(crate) type RawResource = (
    i64,
    String,
    i64,
    i64,
    String,
    Option<String>,
    Option<String>,
    String,
    String,
    i64,
    i64,
);

pub(crate) fn read_resource_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawResource> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
    ))
}

pub(crate) fn resource_row_from_raw(raw: RawResource) -> Result<ResourceRow, StoreError> {
    let (
        id,
        uuid,
        owner,
        domain,
        title,
        primary_filename,
        primary_filepath,
        body,
        tags_json,
        created_at_ms,
        updated_at_ms,
    ) = raw;

    let uuid =
        ResourceUuid::parse(&uuid).map_err(|_| StoreError::InvalidInput("invalid resource row"))?;
    let owner =
        SubjectId::try_new(owner).map_err(|_| StoreError::InvalidInput("invalid resource row"))?;
    let domain =
        DomainId::try_new(domain).map_err(|_| StoreError::InvalidInput("invalid resource row"))?;
    let primary = match (primary_filename, primary_filepath) {
        (Some(filename), Some(filepath)) => Some(BlobRef { filename, filepath }),
        _ => None,
    };
    let tags: Vec<String> = serde_json::from_str(&tags_json)?;

    Ok(ResourceRow {
        id,
        uuid,
        owner,
        domain,
        title,
        primary,
        body,
        tags,
        created_at_ms,
        updated_at_ms,
    })
}

/// An attachment joined with its link row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct LinkedAttachmentRow {
    pub resource_id: i64,
    pub attachment_id: i64,
    pub index: i64,
    pub filename: String,
    pub filepath: String,
}

pub(crate) const LINKED_ATTACHMENT_COLUMNS: &str =
    "l.resource_id, l.attachment_id, l.idx, a.filename, a.filepath";

pub(crate) fn read_linked_attachment(
    row: &rusqlite::Row<'_>,
) -> rusqlite::Result<LinkedAttachmentRow> {
    Ok(LinkedAttachmentRow {
        resource_id: row.get(0)?,
        attachment_id: row.get(1)?,
        index: row.get(2)?,
        filename: row.get(3)?,
        filepath: row.get(4)?,
    })
}
