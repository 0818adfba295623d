#![forbid(unsafe_code)]

use crate::StoreError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_STORAGE_DIR: &str = ".cms_storage";
const DEFAULT_DATABASE_FILE: &str = "cms.db";
const DEFAULT_POLICY_FILE: &str = "policies.db";
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_LIST_FANOUT_LIMIT: usize = 32;

pub const ENV_STORAGE_DIR: &str = "CMS_STORAGE_DIR";
pub const ENV_BLOB_ROOT: &str = "CMS_BLOB_ROOT";
pub const ENV_LIST_FANOUT_LIMIT: &str = "CMS_LIST_FANOUT_LIMIT";

/// How a call site treats blob removal.
///
/// `Strict` checks every blob exists, deletes them before the relational
/// commit, and rolls back on any failure (a missing file included).
/// `BestEffort` deletes after commit, treats a missing file as success, and
/// reports any other failure without undoing the commit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupPolicy {
    BestEffort,
    Strict,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CleanupConfig {
    /// Previous primary blob replaced by an update.
    pub update_primary: CleanupPolicy,
    /// Attachments removed by an update.
    pub update_attachments: CleanupPolicy,
    /// Everything referenced by a deleted resource.
    pub delete: CleanupPolicy,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            update_primary: CleanupPolicy::BestEffort,
            update_attachments: CleanupPolicy::Strict,
            delete: CleanupPolicy::Strict,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ManagerConfig {
    pub storage_dir: PathBuf,
    /// Defaults to `<storage_dir>/blobs`.
    pub blob_root: Option<PathBuf>,
    pub database_file: String,
    pub policy_file: String,
    pub busy_timeout_ms: u64,
    /// Above this many owned resources `list` fetches attachments with one
    /// joined query instead of one query per resource.
    pub list_fanout_limit: usize,
    pub log_filter: String,
    pub cleanup: CleanupConfig,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from(DEFAULT_STORAGE_DIR),
            blob_root: None,
            database_file: DEFAULT_DATABASE_FILE.to_string(),
            policy_file: DEFAULT_POLICY_FILE.to_string(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            list_fanout_limit: DEFAULT_LIST_FANOUT_LIMIT,
            log_filter: "info".to_string(),
            cleanup: CleanupConfig::default(),
        }
    }
}

impl ManagerConfig {
    pub fn for_storage_dir(storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage_dir: storage_dir.into(),
            ..Self::default()
        }
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, StoreError> {
        let config: Self =
            toml::from_str(raw).map_err(|err| StoreError::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads `path` when given (defaults otherwise), then applies `CMS_*`
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, StoreError> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|err| {
                    StoreError::Config(format!("read {}: {err}", path.display()))
                })?;
                Self::from_toml_str(&raw)?
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), StoreError> {
        if let Some(dir) = lookup(ENV_STORAGE_DIR).filter(|v| !v.trim().is_empty()) {
            self.storage_dir = PathBuf::from(dir);
        }
        if let Some(root) = lookup(ENV_BLOB_ROOT).filter(|v| !v.trim().is_empty()) {
            self.blob_root = Some(PathBuf::from(root));
        }
        if let Some(raw) = lookup(ENV_LIST_FANOUT_LIMIT) {
            self.list_fanout_limit = raw.trim().parse::<usize>().map_err(|_| {
                StoreError::Config(format!("{ENV_LIST_FANOUT_LIMIT} must be an integer"))
            })?;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        if self.storage_dir.as_os_str().is_empty() {
            return Err(StoreError::Config("storage_dir must not be empty".to_string()));
        }
        if !is_plain_file_name(&self.database_file) {
            return Err(StoreError::Config(
                "database_file must be a plain file name".to_string(),
            ));
        }
        if !is_plain_file_name(&self.policy_file) {
            return Err(StoreError::Config(
                "policy_file must be a plain file name".to_string(),
            ));
        }
        if self.database_file == self.policy_file {
            return Err(StoreError::Config(
                "database_file and policy_file must differ".to_string(),
            ));
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.storage_dir.join(&self.database_file)
    }

    pub fn policy_path(&self) -> PathBuf {
        self.storage_dir.join(&self.policy_file)
    }

    pub fn blob_root(&self) -> PathBuf {
        self.blob_root
            .clone()
            .unwrap_or_else(|| self.storage_dir.join("blobs"))
    }
}

fn is_plain_file_name(value: &str) -> bool {
    let trimmed = value.trim();
    !trimmed.is_empty() && !trimmed.contains(['/', '\\']) && trimmed != "." && trimmed != ".."
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_missing_keys() {
        let config = ManagerConfig::from_toml_str(
            r#"
            storage_dir = "/srv/cms"
            [cleanup]
            delete = "best_effort"
            "#,
        )
        .expect("parse config");
        assert_eq!(config.storage_dir, PathBuf::from("/srv/cms"));
        assert_eq!(config.database_file, "cms.db");
        assert_eq!(config.cleanup.delete, CleanupPolicy::BestEffort);
        assert_eq!(config.cleanup.update_attachments, CleanupPolicy::Strict);
        assert_eq!(config.blob_root(), PathBuf::from("/srv/cms/blobs"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = ManagerConfig::from_toml_str("storage = \"x\"").expect_err("unknown key");
        assert!(matches!(err, StoreError::Config(_)));
    }

    #[test]
    fn env_overrides_win() {
        let mut config = ManagerConfig::default();
        config
            .apply_overrides(|key| match key {
                ENV_STORAGE_DIR => Some("/tmp/cms-env".to_string()),
                ENV_LIST_FANOUT_LIMIT => Some(" 4 ".to_string()),
                _ => None,
            })
            .expect("overrides");
        assert_eq!(config.storage_dir, PathBuf::from("/tmp/cms-env"));
        assert_eq!(config.list_fanout_limit, 4);
        assert_eq!(config.blob_root(), PathBuf::from("/tmp/cms-env/blobs"));
    }

    #[test]
    fn database_and_policy_files_must_differ() {
        let err = ManagerConfig::from_toml_str(
            r#"
            database_file = "same.db"
            policy_file = "same.db"
            "#,
        )
        .expect_err("same file");
        assert!(matches!(err, StoreError::Config(_)));
    }
}
