#![forbid(unsafe_code)]

use cms_core::ids::{DomainId, ResourceUuid, SubjectId};
use cms_core::resource::{AttachmentSpec, BlobRef};

/// Identity of the caller, resolved upstream by the auth middleware and
/// trusted as given.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RequestContext {
    pub subject: SubjectId,
    pub domain: DomainId,
}

impl RequestContext {
    pub fn new(subject: SubjectId, domain: DomainId) -> Self {
        Self { subject, domain }
    }
}

/// Blobs referenced here must already be written to the blob store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateResourceRequest {
    pub title: String,
    pub primary: Option<BlobRef>,
    pub body: String,
    pub tags: Vec<String>,
    pub attachments: Vec<AttachmentSpec>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpdateResourceRequest {
    pub uuid: ResourceUuid,
    pub title: String,
    /// Replaces the primary blob when set; the previous blob is cleaned up.
    pub primary: Option<BlobRef>,
    pub body: String,
    pub tags: Vec<String>,
    pub attachments: Vec<AttachmentSpec>,
    /// Link indices whose attachments are removed.
    pub delete_indices: Vec<i64>,
}
