#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

const MAX_FILENAME_LEN: usize = 255;
const MAX_FILEPATH_LEN: usize = 1024;
const MAX_ATTACHMENTS: usize = 256;

/// An attachment the caller has already written to blob storage and wants
/// linked to a resource at `index`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentSpec {
    pub index: i64,
    pub filename: String,
    pub filepath: String,
}

/// Indices must be non-negative and unique within one request. They need not
/// be contiguous. Two attachments of one request may not share a blob.
pub fn validate_attachments(specs: &[AttachmentSpec]) -> Result<(), AttachmentError> {
    if specs.len() > MAX_ATTACHMENTS {
        return Err(AttachmentError::TooMany);
    }
    let mut seen = BTreeSet::new();
    let mut paths = BTreeSet::new();
    for spec in specs {
        if spec.index < 0 {
            return Err(AttachmentError::NegativeIndex);
        }
        if !seen.insert(spec.index) {
            return Err(AttachmentError::DuplicateIndex);
        }
        validate_blob_fields(&spec.filename, &spec.filepath)?;
        if !paths.insert(spec.filepath.as_str()) {
            return Err(AttachmentError::DuplicateFilepath);
        }
    }
    Ok(())
}

/// Sorted, deduplicated link indices to remove.
pub fn normalize_delete_indices(indices: &[i64]) -> Result<Vec<i64>, AttachmentError> {
    let mut out = BTreeSet::new();
    for index in indices {
        if *index < 0 {
            return Err(AttachmentError::NegativeIndex);
        }
        out.insert(*index);
    }
    Ok(out.into_iter().collect())
}

pub(super) fn validate_blob_fields(filename: &str, filepath: &str) -> Result<(), AttachmentError> {
    if filename.trim().is_empty() {
        return Err(AttachmentError::EmptyFilename);
    }
    if filename.len() > MAX_FILENAME_LEN {
        return Err(AttachmentError::FilenameTooLong);
    }
    if filepath.trim().is_empty() {
        return Err(AttachmentError::EmptyFilepath);
    }
    if filepath.len() > MAX_FILEPATH_LEN {
        return Err(AttachmentError::FilepathTooLong);
    }
    if filename.chars().any(|c| c.is_control()) || filepath.chars().any(|c| c.is_control()) {
        return Err(AttachmentError::ContainsControl);
    }
    Ok(())
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttachmentError {
    TooMany,
    NegativeIndex,
    DuplicateIndex,
    DuplicateFilepath,
    EmptyFilename,
    FilenameTooLong,
    EmptyFilepath,
    FilepathTooLong,
    ContainsControl,
}

impl AttachmentError {
    pub fn message(&self) -> &'static str {
        match self {
            Self::TooMany => "too many attachments",
            Self::NegativeIndex => "attachment index must not be negative",
            Self::DuplicateIndex => "attachment index must be unique within a request",
            Self::DuplicateFilepath => "attachment filepath must be unique within a request",
            Self::EmptyFilename => "attachment filename must not be empty",
            Self::FilenameTooLong => "attachment filename is too long",
            Self::EmptyFilepath => "attachment filepath must not be empty",
            Self::FilepathTooLong => "attachment filepath is too long",
            Self::ContainsControl => "attachment filename or filepath contains control characters",
        }
    }
}
