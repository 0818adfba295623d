#![forbid(unsafe_code)]

mod blob;
mod config;
mod error;
mod lifecycle;
mod policy;
mod requests;
mod store;
mod types;

pub use blob::{BlobStore, FsBlobStore};
pub use config::{
    CleanupConfig, CleanupPolicy, ENV_BLOB_ROOT, ENV_LIST_FANOUT_LIMIT, ENV_STORAGE_DIR,
    ManagerConfig,
};
pub use error::{ErrorKind, StoreError};
pub use lifecycle::ResourceManager;
pub use policy::{PolicyError, PolicyStore, PolicyTuple, SqlitePolicyStore};
pub use requests::{CreateResourceRequest, RequestContext, UpdateResourceRequest};
pub use store::SqliteStore;
pub use types::{Attachment, DeleteOutcome, Profile, ReconcileReport, Resource};
