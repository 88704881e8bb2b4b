//! JSON file persistence.
//!
//! Snapshots are written atomically: the document goes to a temp file next
//! to the target and is renamed over it, so a crash never leaves a torn file.

use std::io::ErrorKind;
use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// Errors reading or writing a snapshot file.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure.
    #[error("{action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file exists but does not hold the expected document.
    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// One JSON document on disk.
#[derive(Debug, Clone)]
pub struct JsonFile {
    path: PathBuf,
}

impl JsonFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read the document. A missing file is `Ok(None)`.
    pub async fn load<T: DeserializeOwned>(&self) -> Result<Option<T>, StoreError> {
        let content = match tokio::fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No snapshot file");
                return Ok(None);
            }
            Err(source) => return Err(self.io_error("read", source)),
        };

        serde_json::from_slice(&content)
            .map(Some)
            .map_err(|source| StoreError::Json {
                path: self.path.clone(),
                source,
            })
    }

    /// Write the document, creating the parent directory if needed.
    pub async fn save<T: Serialize + ?Sized>(&self, value: &T) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|source| StoreError::Io {
                        action: "create directory",
                        path: parent.to_path_buf(),
                        source,
                    })?;
            }
        }

        let content = serde_json::to_vec_pretty(value).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })?;

        let temp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, &content)
            .await
            .map_err(|source| StoreError::Io {
                action: "write",
                path: temp_path.clone(),
                source,
            })?;
        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|source| self.io_error("rename onto", source))?;

        debug!(path = %self.path.display(), bytes = content.len(), "Snapshot saved");
        Ok(())
    }

    fn io_error(&self, action: &'static str, source: std::io::Error) -> StoreError {
        StoreError::Io {
            action,
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let file = JsonFile::new(temp.path().join("nested/dir/state.json"));

        let mut doc = BTreeMap::new();
        doc.insert("api".to_string(), 3u32);
        file.save(&doc).await.unwrap();

        let loaded: BTreeMap<String, u32> = file.load().await.unwrap().unwrap();
        assert_eq!(loaded, doc);
        assert!(!temp.path().join("nested/dir/state.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_missing_file_is_none() {
        let temp = TempDir::new().unwrap();
        let file = JsonFile::new(temp.path().join("absent.json"));
        let loaded: Option<Vec<String>> = file.load().await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();

        let file = JsonFile::new(&path);
        let result: Result<Option<Vec<String>>, _> = file.load().await;
        assert!(matches!(result, Err(StoreError::Json { .. })));
    }
}
