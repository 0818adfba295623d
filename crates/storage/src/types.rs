#![forbid(unsafe_code)]

use cms_core::ids::{DomainId, ResourceUuid, SubjectId};
use cms_core::resource::BlobRef;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Attachment {
    pub id: i64,
    pub index: i64,
    pub filename: String,
    pub filepath: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Resource {
    pub uuid: ResourceUuid,
    pub owner: SubjectId,
    pub domain: DomainId,
    pub title: String,
    pub primary: Option<BlobRef>,
    pub body: String,
    pub tags: Vec<String>,
    /// Ascending by `index`.
    pub attachments: Vec<Attachment>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Profile {
    pub subject: SubjectId,
    pub email: String,
    pub data: serde_json::Value,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct DeleteOutcome {
    pub success: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub scanned: usize,
    pub repaired_grants: usize,
    pub revoked_stale: usize,
}
