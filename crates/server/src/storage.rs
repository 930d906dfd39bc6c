//! File system collaborator for attachment payloads: read, write, delete,
//! exists. Attachment rows reference files through `/attachment/<name>`
//! URLs; the store owns the mapping onto the upload directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

pub const URL_PREFIX: &str = "/attachment/";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("file `{0}` does not exist")]
    Missing(String),
    #[error("invalid file reference `{0}`")]
    InvalidReference(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait FileStore: Send + Sync {
    /// Persist `data` under a fresh name derived from `original_name`;
    /// returns the URL to store on the attachment row.
    async fn write(&self, original_name: &str, data: &[u8]) -> Result<String, StorageError>;
    async fn read(&self, url: &str) -> Result<Vec<u8>, StorageError>;
    async fn delete(&self, url: &str) -> Result<(), StorageError>;
    async fn exists(&self, url: &str) -> bool;
}

pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn resolve(&self, url: &str) -> Result<PathBuf, StorageError> {
        let name = url
            .strip_prefix(URL_PREFIX)
            .ok_or_else(|| StorageError::InvalidReference(url.to_string()))?;
        // Stored names are flat; anything that looks like traversal is a
        // corrupted reference, not a path to honor.
        if name.is_empty() || name.contains('/') || name.contains("..") {
            return Err(StorageError::InvalidReference(url.to_string()));
        }
        Ok(self.root.join(name))
    }
}

fn sanitize_name(original: &str) -> String {
    let base = Path::new(original)
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_') { ch } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn write(&self, original_name: &str, data: &[u8]) -> Result<String, StorageError> {
        let stored = format!("{}_{}", Uuid::new_v4().simple(), sanitize_name(original_name));
        tokio::fs::write(self.root.join(&stored), data).await?;
        Ok(format!("{URL_PREFIX}{stored}"))
    }

    async fn read(&self, url: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(url)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::Missing(url.to_string()))
            }
            Err(error) => Err(error.into()),
        }
    }

    async fn delete(&self, url: &str) -> Result<(), StorageError> {
        let path = self.resolve(url)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            // Already gone is good enough for cleanup.
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error.into()),
        }
    }

    async fn exists(&self, url: &str) -> bool {
        match self.resolve(url) {
            Ok(path) => tokio::fs::try_exists(&path).await.unwrap_or(false),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{FileStore, LocalFileStore, StorageError};

    fn store() -> (tempfile::TempDir, LocalFileStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LocalFileStore::new(dir.path().to_path_buf());
        (dir, store)
    }

    #[tokio::test]
    async fn write_read_delete_round_trip() {
        let (_dir, store) = store();

        let url = store.write("catalog.pdf", b"pdf-bytes").await.expect("write");
        assert!(url.starts_with("/attachment/"));
        assert!(url.ends_with("catalog.pdf"));
        assert!(store.exists(&url).await);
        assert_eq!(store.read(&url).await.expect("read"), b"pdf-bytes");

        store.delete(&url).await.expect("delete");
        assert!(!store.exists(&url).await);
        assert!(matches!(store.read(&url).await, Err(StorageError::Missing(_))));
    }

    #[tokio::test]
    async fn deleting_a_missing_file_is_not_an_error() {
        let (_dir, store) = store();
        store.delete("/attachment/never-written.bin").await.expect("delete is idempotent");
    }

    #[tokio::test]
    async fn hostile_names_are_flattened() {
        let (dir, store) = store();
        let url = store.write("../../etc/passwd", b"x").await.expect("write");
        assert!(store.exists(&url).await);
        // The stored file lives inside the root, under a sanitized name.
        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .expect("read dir")
            .map(|entry| entry.expect("entry").file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].ends_with("passwd"));
    }

    #[tokio::test]
    async fn traversal_references_are_rejected() {
        let (_dir, store) = store();
        assert!(matches!(
            store.read("/attachment/../secret").await,
            Err(StorageError::InvalidReference(_))
        ));
        assert!(!store.exists("/elsewhere/file").await);
    }
}
