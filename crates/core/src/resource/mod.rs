#![forbid(unsafe_code)]

mod attachments;
mod tags;
mod title;

pub use attachments::*;
pub use tags::*;
pub use title::*;

use attachments::validate_blob_fields;
use serde::{Deserialize, Serialize};

/// Filename and storage path of a stored blob.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobRef {
    pub filename: String,
    pub filepath: String,
}

impl BlobRef {
    pub fn try_new(
        filename: impl Into<String>,
        filepath: impl Into<String>,
    ) -> Result<Self, AttachmentError> {
        let filename = filename.into();
        let filepath = filepath.into();
        validate_blob_fields(&filename, &filepath)?;
        Ok(Self { filename, filepath })
    }

    pub fn validate(&self) -> Result<(), AttachmentError> {
        validate_blob_fields(&self.filename, &self.filepath)
    }
}
