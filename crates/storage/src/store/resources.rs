#![forbid(unsafe_code)]

use super::{
    LINKED_ATTACHMENT_COLUMNS, LinkedAttachmentRow, RESOURCE_COLUMNS, ResourceRow,
    read_linked_attachment, read_resource_raw, resource_row_from_raw,
};
use crate::StoreError;
use cms_core::ids::{DomainId, ResourceUuid, SubjectId};
use cms_core::model::ObjectKind;
use cms_core::resource::BlobRef;
use rusqlite::{Connection, ErrorCode, OptionalExtension, params};
use std::collections::BTreeSet;

pub(crate) struct NewResourceRow<'a> {
    pub uuid: &'a ResourceUuid,
    pub owner: SubjectId,
    pub domain: DomainId,
    pub title: &'a str,
    pub primary: Option<&'a BlobRef>,
    pub body: &'a str,
    pub tags_json: &'a str,
    pub now_ms: i64,
}

pub(crate) fn insert_resource_tx(
    conn: &Connection,
    row: &NewResourceRow<'_>,
) -> Result<i64, StoreError> {
    conn.execute(
        "INSERT INTO resources(uuid, owner_subject, domain_id, title, primary_filename, primary_filepath, body, tags_json, created_at_ms, updated_at_ms) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
        params![
            row.uuid.to_string(),
            row.owner.as_i64(),
            row.domain.as_i64(),
            row.title,
            row.primary.map(|p| p.filename.as_str()),
            row.primary.map(|p| p.filepath.as_str()),
            row.body,
            row.tags_json,
            row.now_ms,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn insert_attachment_tx(
    conn: &Connection,
    filename: &str,
    filepath: &str,
) -> Result<i64, StoreError> {
    conn.execute(
        "INSERT INTO attachments(filename, filepath) VALUES (?1, ?2)",
        params![filename, filepath],
    )?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn insert_link_tx(
    conn: &Connection,
    resource_id: i64,
    attachment_id: i64,
    index: i64,
) -> Result<(), StoreError> {
    let insert = conn.execute(
        "INSERT INTO resource_attachment_links(resource_id, attachment_id, idx) VALUES (?1, ?2, ?3)",
        params![resource_id, attachment_id, index],
    );
    match insert {
        Ok(_) => Ok(()),
        Err(err) if is_index_collision(&err) => Err(StoreError::InvalidInput(
            "attachment index already in use",
        )),
        Err(err) => Err(StoreError::Sql(err)),
    }
}

/// Only the `(resource_id, idx)` key; foreign-key and `attachment_id` failures
/// are not index collisions.
fn is_index_collision(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(code, message) => {
            code.code == ErrorCode::ConstraintViolation
                && message.as_deref().is_some_and(|value| {
                    value.contains("resource_attachment_links.resource_id")
                        && value.contains("resource_attachment_links.idx")
                })
        }
        _ => false,
    }
}

/// Whether any attachment row or resource primary still points at `filepath`.
pub(crate) fn blob_referenced_tx(conn: &Connection, filepath: &str) -> Result<bool, StoreError> {
    Ok(conn
        .query_row(
            "SELECT 1 FROM attachments WHERE filepath=?1 \
             UNION ALL SELECT 1 FROM resources WHERE primary_filepath=?1 \
             LIMIT 1",
            params![filepath],
            |_| Ok(()),
        )
        .optional()?
        .is_some())
}

pub(crate) fn object_type_id_tx(conn: &Connection, kind: ObjectKind) -> Result<i64, StoreError> {
    conn.query_row(
        "SELECT id FROM object_types WHERE value=?1",
        params![kind.as_str()],
        |row| row.get::<_, i64>(0),
    )
    .optional()?
    .ok_or(StoreError::MissingObjectType(kind.as_str()))
}

pub(crate) fn register_object_tx(
    conn: &Connection,
    uuid: &ResourceUuid,
    type_id: i64,
) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO objects(value, type_id) VALUES (?1, ?2)",
        params![uuid.to_string(), type_id],
    )?;
    Ok(())
}

pub(crate) fn registered_objects(conn: &Connection) -> Result<BTreeSet<String>, StoreError> {
    let mut stmt = conn.prepare("SELECT value FROM objects")?;
    let mut rows = stmt.query([])?;
    let mut out = BTreeSet::new();
    while let Some(row) = rows.next()? {
        out.insert(row.get::<_, String>(0)?);
    }
    Ok(out)
}

/// Existence and ownership are checked together: a foreign resource is a miss.
pub(crate) fn resource_by_owner(
    conn: &Connection,
    uuid: &ResourceUuid,
    owner: SubjectId,
) -> Result<Option<ResourceRow>, StoreError> {
    let raw = conn
        .query_row(
            &format!("SELECT {RESOURCE_COLUMNS} FROM resources WHERE uuid=?1 AND owner_subject=?2"),
            params![uuid.to_string(), owner.as_i64()],
            read_resource_raw,
        )
        .optional()?;
    raw.map(resource_row_from_raw).transpose()
}

pub(crate) fn resources_by_owner(
    conn: &Connection,
    owner: SubjectId,
) -> Result<Vec<ResourceRow>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RESOURCE_COLUMNS} FROM resources WHERE owner_subject=?1 ORDER BY created_at_ms ASC, id ASC"
    ))?;
    let mut rows = stmt.query(params![owner.as_i64()])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(resource_row_from_raw(read_resource_raw(row)?)?);
    }
    Ok(out)
}

pub(crate) fn all_resources(conn: &Connection) -> Result<Vec<ResourceRow>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RESOURCE_COLUMNS} FROM resources ORDER BY id ASC"
    ))?;
    let mut rows = stmt.query([])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(resource_row_from_raw(read_resource_raw(row)?)?);
    }
    Ok(out)
}

pub(crate) fn linked_attachments(
    conn: &Connection,
    resource_id: i64,
) -> Result<Vec<LinkedAttachmentRow>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {LINKED_ATTACHMENT_COLUMNS} \
         FROM resource_attachment_links l JOIN attachments a ON l.attachment_id = a.id \
         WHERE l.resource_id=?1 \
         ORDER BY l.idx ASC"
    ))?;
    let mut rows = stmt.query(params![resource_id])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(read_linked_attachment(row)?);
    }
    Ok(out)
}

/// Every link of every resource owned by `owner`, in one query.
pub(crate) fn linked_attachments_for_owner(
    conn: &Connection,
    owner: SubjectId,
) -> Result<Vec<LinkedAttachmentRow>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {LINKED_ATTACHMENT_COLUMNS} \
         FROM resource_attachment_links l \
         JOIN attachments a ON l.attachment_id = a.id \
         JOIN resources r ON l.resource_id = r.id \
         WHERE r.owner_subject=?1 \
         ORDER BY l.resource_id ASC, l.idx ASC"
    ))?;
    let mut rows = stmt.query(params![owner.as_i64()])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(read_linked_attachment(row)?);
    }
    Ok(out)
}

pub(crate) fn link_at_index_tx(
    conn: &Connection,
    resource_id: i64,
    index: i64,
) -> Result<Option<LinkedAttachmentRow>, StoreError> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {LINKED_ATTACHMENT_COLUMNS} \
                 FROM resource_attachment_links l JOIN attachments a ON l.attachment_id = a.id \
                 WHERE l.idx=?1 AND l.resource_id=?2"
            ),
            params![index, resource_id],
            read_linked_attachment,
        )
        .optional()?)
}

/// Removes the link row, then the attachment row it owned.
pub(crate) fn unlink_attachment_tx(
    conn: &Connection,
    link: &LinkedAttachmentRow,
) -> Result<(), StoreError> {
    let unlinked = conn.execute(
        "DELETE FROM resource_attachment_links WHERE resource_id=?1 AND attachment_id=?2",
        params![link.resource_id, link.attachment_id],
    )?;
    if unlinked != 1 {
        return Err(StoreError::NotFound);
    }
    let removed = conn.execute(
        "DELETE FROM attachments WHERE id=?1",
        params![link.attachment_id],
    )?;
    if removed != 1 {
        return Err(StoreError::NotFound);
    }
    Ok(())
}

/// Removes the registry entry and the resource row. Links must already be gone.
pub(crate) fn delete_resource_tx(
    conn: &Connection,
    resource_id: i64,
    uuid: &ResourceUuid,
) -> Result<(), StoreError> {
    conn.execute(
        "DELETE FROM objects WHERE value=?1",
        params![uuid.to_string()],
    )?;
    let removed = conn.execute("DELETE FROM resources WHERE id=?1", params![resource_id])?;
    if removed != 1 {
        return Err(StoreError::NotFound);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::schema::install_schema;

    fn schema_conn() -> Connection {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .expect("foreign keys");
        install_schema(&conn).expect("install schema");
        conn
    }

    fn resource(conn: &Connection) -> i64 {
        insert_resource_tx(
            conn,
            &NewResourceRow {
                uuid: &ResourceUuid::generate(),
                owner: SubjectId::try_new(1).expect("subject"),
                domain: DomainId::try_new(1).expect("domain"),
                title: "t",
                primary: None,
                body: "",
                tags_json: "[]",
                now_ms: 1,
            },
        )
        .expect("insert resource")
    }

    #[test]
    fn only_index_collisions_read_as_index_in_use() {
        let conn = schema_conn();
        let resource_id = resource(&conn);
        let first = insert_attachment_tx(&conn, "a.bin", "a.bin").expect("attachment");
        let second = insert_attachment_tx(&conn, "b.bin", "b.bin").expect("attachment");
        insert_link_tx(&conn, resource_id, first, 0).expect("link");

        match insert_link_tx(&conn, resource_id, second, 0) {
            Err(StoreError::InvalidInput(msg)) => assert_eq!(msg, "attachment index already in use"),
            other => panic!("expected index collision, got {other:?}"),
        }
        assert!(matches!(
            insert_link_tx(&conn, resource_id, first, 1),
            Err(StoreError::Sql(_))
        ));
        assert!(matches!(
            insert_link_tx(&conn, resource_id + 100, second, 0),
            Err(StoreError::Sql(_))
        ));
    }

    #[test]
    fn blob_references_cover_attachments_and_primaries() {
        let conn = schema_conn();
        let resource_id = resource(&conn);
        insert_attachment_tx(&conn, "a.bin", "shared/a.bin").expect("attachment");
        conn.execute(
            "UPDATE resources SET primary_filename='p.bin', primary_filepath='cover/p.bin' WHERE id=?1",
            params![resource_id],
        )
        .expect("set primary");

        assert!(blob_referenced_tx(&conn, "shared/a.bin").expect("lookup"));
        assert!(blob_referenced_tx(&conn, "cover/p.bin").expect("lookup"));
        assert!(!blob_referenced_tx(&conn, "gone.bin").expect("lookup"));
    }
}
