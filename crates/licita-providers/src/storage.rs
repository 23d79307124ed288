//! Local filesystem object storage (spec C8 dependency). Attachments are
//! written under `root/<key>`, mirroring the storage key's `/`-separated
//! path segments as directories.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use licita_domain::error::{Error, Result};
use licita_domain::ports::storage::ObjectStorageProvider;

pub struct FilesystemStorageProvider {
    root: PathBuf,
}

impl FilesystemStorageProvider {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn resolve(&self, key: &str) -> Result<PathBuf> {
        if key.contains("..") {
            return Err(Error::invalid_argument(format!("storage key must not contain '..': {key}")));
        }
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl ObjectStorageProvider for FilesystemStorageProvider {
    async fn put(&self, key: &str, bytes: Vec<u8>, _content_type: &str) -> Result<String> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(&path).await?;
        file.write_all(&bytes).await?;
        Ok(format!("file://{}", path.display()))
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.resolve(key)?;
        tokio::fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::not_found(key)
            } else {
                Error::Io(e)
            }
        })
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let path = self.resolve(key)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.resolve(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_a_blob() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FilesystemStorageProvider::new(dir.path().to_path_buf());
        let url = storage.put("opportunities/o1/documents/d1", b"hello".to_vec(), "text/plain").await.unwrap();
        assert!(url.starts_with("file://"));
        assert!(storage.exists("opportunities/o1/documents/d1").await.unwrap());
        assert_eq!(storage.get("opportunities/o1/documents/d1").await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn rejects_path_traversal_keys() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FilesystemStorageProvider::new(dir.path().to_path_buf());
        assert!(storage.put("../escape", b"x".to_vec(), "text/plain").await.is_err());
    }

    #[tokio::test]
    async fn get_missing_key_returns_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FilesystemStorageProvider::new(dir.path().to_path_buf());
        assert!(matches!(storage.get("missing").await, Err(Error::NotFound { .. })));
    }
}
