#![forbid(unsafe_code)]

mod sqlite;

pub use sqlite::SqlitePolicyStore;

use cms_core::ids::{DomainId, ResourceUuid, SubjectId};
use cms_core::model::Action;
use serde::{Deserialize, Serialize};

/// `(subject, domain, resource, action)` grant held by the authorization engine.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PolicyTuple {
    pub subject: String,
    pub domain: String,
    pub resource: String,
    pub action: Action,
}

impl PolicyTuple {
    pub fn new(subject: SubjectId, domain: DomainId, resource: &ResourceUuid, action: Action) -> Self {
        Self {
            subject: subject.to_string(),
            domain: domain.to_string(),
            resource: resource.to_string(),
            action,
        }
    }

    /// The read/modify/delete grants every resource owner holds.
    pub fn owner_grants(subject: SubjectId, domain: DomainId, resource: &ResourceUuid) -> Vec<Self> {
        Action::OWNER
            .iter()
            .map(|action| Self::new(subject, domain, resource, *action))
            .collect()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("sqlite: {0}")]
    Sql(#[from] rusqlite::Error),
    #[error("unknown action '{0}' in policy rule")]
    UnknownAction(String),
    #[error("policy store unavailable: {0}")]
    Unavailable(String),
}

/// Tuple-mutation API of the external authorization engine.
///
/// Batch mutations are atomic: after an error none of the batch is observable.
/// Reads always reflect the latest committed mutation.
pub trait PolicyStore {
    /// Adds the batch. Tuples already present are kept as they are.
    fn add_policies(&mut self, tuples: &[PolicyTuple]) -> Result<(), PolicyError>;

    /// Returns how many of the tuples were present and removed.
    fn remove_policies(&mut self, tuples: &[PolicyTuple]) -> Result<usize, PolicyError>;

    fn remove_resource_policies(&mut self, resource: &str) -> Result<usize, PolicyError>;

    fn has_policy(&self, tuple: &PolicyTuple) -> Result<bool, PolicyError>;

    fn resource_policies(&self, resource: &str) -> Result<Vec<PolicyTuple>, PolicyError>;

    /// Distinct resource identifiers that appear in at least one tuple.
    fn resources(&self) -> Result<Vec<String>, PolicyError>;
}
