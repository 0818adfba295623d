#![forbid(unsafe_code)]

use crate::policy::PolicyError;
use cms_core::ids::ResourceUuid;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("sqlite: {0}")]
    Sql(#[from] rusqlite::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    #[error("not found")]
    NotFound,
    #[error("object type '{0}' is not registered")]
    MissingObjectType(&'static str),
    #[error("blob {path}: {source}")]
    Blob {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("policy store: {0}")]
    Policy(#[from] PolicyError),
    #[error("owner grant failed for {uuid}, creation rolled back: {source}")]
    PolicyGrant {
        uuid: ResourceUuid,
        #[source]
        source: PolicyError,
    },
    #[error("committed with inconsistencies for {uuid}: {detail}")]
    PartialConsistency { uuid: ResourceUuid, detail: String },
    #[error("config: {0}")]
    Config(String),
}

/// Coarse classification handed to the HTTP layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing, or owned by someone else. The two are indistinguishable.
    NotFound,
    /// Rejected before any store was touched.
    Validation,
    /// A store failed; any open transaction was rolled back.
    StoreFailure,
    /// Relational state is committed but blobs or policies lag behind.
    PartialConsistency,
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound => ErrorKind::NotFound,
            Self::InvalidInput(_) | Self::Config(_) => ErrorKind::Validation,
            Self::PartialConsistency { .. } => ErrorKind::PartialConsistency,
            Self::Io(_)
            | Self::Sql(_)
            | Self::Json(_)
            | Self::MissingObjectType(_)
            | Self::Blob { .. }
            | Self::Policy(_)
            | Self::PolicyGrant { .. } => ErrorKind::StoreFailure,
        }
    }

    pub(crate) fn blob(path: &str, source: std::io::Error) -> Self {
        Self::Blob {
            path: path.to_string(),
            source,
        }
    }

    /// True when a blob operation failed only because the file was absent.
    pub fn is_missing_blob(&self) -> bool {
        matches!(self, Self::Blob { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}
