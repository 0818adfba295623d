#![forbid(unsafe_code)]
#![allow(dead_code)]

use cms_core::ids::{DomainId, ResourceUuid, SubjectId};
use cms_core::resource::{AttachmentSpec, BlobRef};
use cms_storage::{
    BlobStore, CreateResourceRequest, FsBlobStore, ManagerConfig, PolicyError, PolicyStore,
    PolicyTuple, RequestContext, ResourceManager, SqlitePolicyStore, SqliteStore,
    UpdateResourceRequest,
};
use rusqlite::Connection;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tempfile::TempDir;

pub type Manager = ResourceManager<FsBlobStore, SqlitePolicyStore>;

pub fn storage() -> (TempDir, ManagerConfig) {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = ManagerConfig::for_storage_dir(dir.path());
    (dir, config)
}

pub fn open(config: &ManagerConfig) -> Manager {
    ResourceManager::open(config.clone()).expect("open manager")
}

pub fn ctx(subject: i64, domain: i64) -> RequestContext {
    RequestContext::new(
        SubjectId::try_new(subject).expect("subject id"),
        DomainId::try_new(domain).expect("domain id"),
    )
}

pub fn raw_db(config: &ManagerConfig) -> Connection {
    let conn = Connection::open(config.database_path()).expect("open raw db");
    conn.busy_timeout(Duration::from_secs(5))
        .expect("busy timeout");
    conn
}

pub fn raw_policy_db(config: &ManagerConfig) -> Connection {
    let conn = Connection::open(config.policy_path()).expect("open raw policy db");
    conn.busy_timeout(Duration::from_secs(5))
        .expect("busy timeout");
    conn
}

pub fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(1) FROM {table}"), [], |row| {
        row.get(0)
    })
    .expect("count rows")
}

/// Row counts of every table a resource touches, in a fixed order:
/// resources, attachments, links, registry.
pub fn footprint(conn: &Connection) -> [i64; 4] {
    [
        count(conn, "resources"),
        count(conn, "attachments"),
        count(conn, "resource_attachment_links"),
        count(conn, "objects"),
    ]
}

pub fn write_blob<B: BlobStore>(blobs: &B, path: &str) {
    blobs.write(path, path.as_bytes()).expect("write blob");
}

pub fn blob_exists<B: BlobStore>(blobs: &B, path: &str) -> bool {
    blobs.exists(path).expect("blob exists")
}

/// Writes the blob and returns a spec pointing at it.
pub fn attachment<B: BlobStore>(blobs: &B, index: i64, path: &str) -> AttachmentSpec {
    write_blob(blobs, path);
    let filename = path.rsplit('/').next().unwrap_or(path).to_string();
    AttachmentSpec {
        index,
        filename,
        filepath: path.to_string(),
    }
}

pub fn primary<B: BlobStore>(blobs: &B, path: &str) -> BlobRef {
    write_blob(blobs, path);
    let filename = path.rsplit('/').next().unwrap_or(path).to_string();
    BlobRef::try_new(filename, path).expect("blob ref")
}

/// A request whose attachments live under `prefix/att-<index>.bin`.
pub fn article<B: BlobStore>(
    blobs: &B,
    prefix: &str,
    indices: &[i64],
    with_primary: bool,
) -> CreateResourceRequest {
    CreateResourceRequest {
        title: format!("Article {prefix}"),
        primary: with_primary.then(|| primary(blobs, &format!("{prefix}/primary.bin"))),
        body: format!("body of {prefix}"),
        tags: vec!["news".to_string()],
        attachments: indices
            .iter()
            .map(|index| attachment(blobs, *index, &format!("{prefix}/att-{index}.bin")))
            .collect(),
    }
}

/// An update that keeps title, body and tags as `article` made them.
pub fn edit(uuid: ResourceUuid, prefix: &str) -> UpdateResourceRequest {
    UpdateResourceRequest {
        uuid,
        title: format!("Article {prefix}"),
        primary: None,
        body: format!("body of {prefix}"),
        tags: vec!["news".to_string()],
        attachments: Vec::new(),
        delete_indices: Vec::new(),
    }
}

/// Switches injected policy-store failures on and off from the test body.
#[derive(Clone, Debug, Default)]
pub struct Faults {
    fail_grants: Arc<AtomicBool>,
    fail_revokes: Arc<AtomicBool>,
}

impl Faults {
    pub fn fail_grants(&self, on: bool) {
        self.fail_grants.store(on, Ordering::SeqCst);
    }

    pub fn fail_revokes(&self, on: bool) {
        self.fail_revokes.store(on, Ordering::SeqCst);
    }
}

pub struct FlakyPolicies {
    inner: SqlitePolicyStore,
    faults: Faults,
}

impl PolicyStore for FlakyPolicies {
    fn add_policies(&mut self, tuples: &[PolicyTuple]) -> Result<(), PolicyError> {
        if self.faults.fail_grants.load(Ordering::SeqCst) {
            return Err(PolicyError::Unavailable("injected grant failure".to_string()));
        }
        self.inner.add_policies(tuples)
    }

    fn remove_policies(&mut self, tuples: &[PolicyTuple]) -> Result<usize, PolicyError> {
        if self.faults.fail_revokes.load(Ordering::SeqCst) {
            return Err(PolicyError::Unavailable("injected revoke failure".to_string()));
        }
        self.inner.remove_policies(tuples)
    }

    fn remove_resource_policies(&mut self, resource: &str) -> Result<usize, PolicyError> {
        if self.faults.fail_revokes.load(Ordering::SeqCst) {
            return Err(PolicyError::Unavailable("injected revoke failure".to_string()));
        }
        self.inner.remove_resource_policies(resource)
    }

    fn has_policy(&self, tuple: &PolicyTuple) -> Result<bool, PolicyError> {
        self.inner.has_policy(tuple)
    }

    fn resource_policies(&self, resource: &str) -> Result<Vec<PolicyTuple>, PolicyError> {
        self.inner.resource_policies(resource)
    }

    fn resources(&self) -> Result<Vec<String>, PolicyError> {
        self.inner.resources()
    }
}

pub type FlakyManager = ResourceManager<FsBlobStore, FlakyPolicies>;

pub fn open_flaky(config: &ManagerConfig) -> (FlakyManager, Faults) {
    let store = SqliteStore::open_with_config(config).expect("open relational store");
    let blobs = FsBlobStore::open(config.blob_root()).expect("open blob store");
    let inner = SqlitePolicyStore::open(
        config.policy_path(),
        Duration::from_millis(config.busy_timeout_ms),
    )
    .expect("open policy store");
    let faults = Faults::default();
    let policies = FlakyPolicies {
        inner,
        faults: faults.clone(),
    };
    (
        ResourceManager::new(store, blobs, policies, config.clone()),
        faults,
    )
}
