//! Artifact storage — the blob store's read/write contract.
//!
//! Only the contract lives here; the engine behind it is external. Writes
//! overwrite, so repeating a partially-completed ingestion is harmless.

use std::path::PathBuf;

use async_trait::async_trait;

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Store bytes under a key, replacing any previous object.
    async fn put(&self, key: &str, bytes: &[u8]) -> anyhow::Result<()>;

    /// Fetch an object, or None when the key does not exist.
    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>>;

    /// Cheap existence check without loading the object.
    async fn exists(&self, key: &str) -> anyhow::Result<bool>;
}

/// Key convention for stored release files.
pub fn object_key(project: &str, variant: &str, version: &str, filename: &str) -> String {
    format!("firmware/{project}/{variant}/{version}/{filename}")
}

/// Filesystem-backed artifact store rooted at a configured directory.
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

#[async_trait]
impl ArtifactStore for FsStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> anyhow::Result<()> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, key: &str) -> anyhow::Result<bool> {
        Ok(tokio::fs::try_exists(self.path_for(key)).await?)
    }
}
