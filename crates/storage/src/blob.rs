#![forbid(unsafe_code)]

use crate::StoreError;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

/// Byte storage for primary blobs and attachments, addressed by the relative
/// paths recorded in resource and attachment rows.
pub trait BlobStore {
    fn write(&self, path: &str, bytes: &[u8]) -> Result<(), StoreError>;

    /// Fails with a `NotFound` blob error when nothing is stored at `path`.
    fn delete(&self, path: &str) -> Result<(), StoreError>;

    fn exists(&self, path: &str) -> Result<bool, StoreError>;
}

/// Filesystem backend. Every path resolves under `root`.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, path: &str) -> Result<PathBuf, StoreError> {
        let relative = Path::new(path.trim());
        if relative.as_os_str().is_empty() {
            return Err(StoreError::InvalidInput("blob path must not be empty"));
        }
        for component in relative.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(StoreError::InvalidInput(
                        "blob path must be relative and stay under the blob root",
                    ));
                }
            }
        }
        Ok(self.root.join(relative))
    }
}

impl BlobStore for FsBlobStore {
    fn write(&self, path: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let target = self.resolve(path)?;
        let Some(parent) = target.parent() else {
            return Err(StoreError::InvalidInput("blob path has no parent directory"));
        };
        std::fs::create_dir_all(parent).map_err(|err| StoreError::blob(path, err))?;

        // Write to a sibling temp file and rename so readers never see a
        // half-written blob.
        let tmp = parent.join(format!(".tmp-{}", uuid::Uuid::new_v4().simple()));
        let written = std::fs::File::create(&tmp)
            .and_then(|mut file| {
                file.write_all(bytes)?;
                file.sync_all()
            })
            .and_then(|()| std::fs::rename(&tmp, &target));
        if let Err(err) = written {
            let _ = std::fs::remove_file(&tmp);
            return Err(StoreError::blob(path, err));
        }
        Ok(())
    }

    fn delete(&self, path: &str) -> Result<(), StoreError> {
        let target = self.resolve(path)?;
        std::fs::remove_file(&target).map_err(|err| StoreError::blob(path, err))
    }

    fn exists(&self, path: &str) -> Result<bool, StoreError> {
        let target = self.resolve(path)?;
        match std::fs::metadata(&target) {
            Ok(meta) => Ok(meta.is_file()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(StoreError::blob(path, err)),
        }
    }
}
