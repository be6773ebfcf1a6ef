//! File-backed [KVStore]. Every key is a file directly under the root directory. Writes go to a
//! uniquely named temporary file in the same directory which is then renamed over the target, so
//! readers observe either the previous value or the new one.

use super::{KVError, KVStore};
use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Temporary files are hidden so that [FileKVStore::keys] never reports them.
const TMP_PREFIX: char = '.';

#[derive(Debug, Clone)]
pub struct FileKVStore {
    name: String,
    root: PathBuf,
}

impl FileKVStore {
    /// Opens the store rooted at `root`, creating the directory if it does not exist yet.
    pub async fn open(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)
            .await
            .map_err(|e| Error::Io(format!("Failed to create {}: {e}", root.display())))?;

        Ok(Self {
            name: name.into(),
            root,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }

    async fn write_atomic(&self, key: &str, value: &[u8]) -> Result<()> {
        let target = self.path_for(key)?;
        let tmp = self
            .root
            .join(format!("{TMP_PREFIX}{key}.{}.tmp", uuid::Uuid::new_v4()));

        let write = async {
            let mut file = fs::File::create(&tmp).await?;
            file.write_all(value).await?;
            file.sync_all().await?;
            fs::rename(&tmp, &target).await
        };

        if let Err(e) = write.await {
            // the rename never happened, so the target still holds the previous value
            if let Err(cleanup) = fs::remove_file(&tmp).await
                && cleanup.kind() != ErrorKind::NotFound
            {
                warn!(tmp = %tmp.display(), error = %cleanup, "Failed to remove temporary file");
            }
            return Err(Error::Io(format!("Failed to write {}: {e}", target.display())));
        }

        // make the rename itself durable, a failure here only weakens crash durability
        match fs::File::open(&self.root).await {
            Ok(dir) => {
                if let Err(e) = dir.sync_all().await {
                    debug!(root = %self.root.display(), error = %e, "Failed to sync store directory");
                }
            }
            Err(e) => debug!(root = %self.root.display(), error = %e, "Failed to open store directory"),
        }

        Ok(())
    }
}

/// Keys become file names, so only a conservative character set is accepted.
fn validate_key(key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && !key.starts_with(TMP_PREFIX)
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));

    if valid {
        Ok(())
    } else {
        Err(Error::InvalidKey(key.to_string()))
    }
}

#[async_trait]
impl KVStore for FileKVStore {
    async fn keys(&self) -> std::result::Result<Vec<String>, KVError> {
        let mut entries = fs::read_dir(&self.root).await?;
        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str()
                && validate_key(name).is_ok()
            {
                keys.push(name.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn delete(&self, key: &str) -> std::result::Result<(), KVError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Box::new(Error::from(e))),
        }
    }

    async fn put(&self, key: &str, value: Bytes) -> std::result::Result<(), KVError> {
        self.write_atomic(key, &value).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> std::result::Result<Option<Bytes>, KVError> {
        let path = self.path_for(key)?;
        match fs::read(&path).await {
            Ok(value) => Ok(Some(Bytes::from(value))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Box::new(Error::Io(format!(
                "Failed to read {}: {e}",
                path.display()
            )))),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_put_get_delete() {
        let tmp_dir = TempDir::new().unwrap();
        let store = FileKVStore::open("test", tmp_dir.path()).await.unwrap();

        assert!(store.get("harfanglab").await.unwrap().is_none());

        store
            .put("harfanglab", Bytes::from_static(b"first"))
            .await
            .unwrap();
        store
            .put("harfanglab", Bytes::from_static(b"second"))
            .await
            .unwrap();
        assert_eq!(
            store.get("harfanglab").await.unwrap(),
            Some(Bytes::from_static(b"second"))
        );

        store.delete("harfanglab").await.unwrap();
        assert!(store.get("harfanglab").await.unwrap().is_none());

        // deleting twice is fine
        store.delete("harfanglab").await.unwrap();
    }

    #[tokio::test]
    async fn test_values_survive_reopen() {
        let tmp_dir = TempDir::new().unwrap();
        {
            let store = FileKVStore::open("test", tmp_dir.path()).await.unwrap();
            store
                .put("google-reports.drive", Bytes::from_static(b"{}"))
                .await
                .unwrap();
        }

        let reopened = FileKVStore::open("test", tmp_dir.path()).await.unwrap();
        assert_eq!(
            reopened.get("google-reports.drive").await.unwrap(),
            Some(Bytes::from_static(b"{}"))
        );
    }

    #[tokio::test]
    async fn test_open_creates_missing_root() {
        let tmp_dir = TempDir::new().unwrap();
        let root = tmp_dir.path().join("nested").join("state");

        let store = FileKVStore::open("test", &root).await.unwrap();
        assert!(root.is_dir());
        assert_eq!(store.root(), root.as_path());
        assert_eq!(store.name(), "test");
    }

    #[tokio::test]
    async fn test_keys_skip_temporary_files() {
        let tmp_dir = TempDir::new().unwrap();
        let store = FileKVStore::open("test", tmp_dir.path()).await.unwrap();

        store.put("b", Bytes::from_static(b"1")).await.unwrap();
        store.put("a", Bytes::from_static(b"2")).await.unwrap();
        std::fs::write(tmp_dir.path().join(".a.leftover.tmp"), b"junk").unwrap();
        std::fs::create_dir(tmp_dir.path().join("subdir")).unwrap();

        assert_eq!(store.keys().await.unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_invalid_keys_rejected() {
        let tmp_dir = TempDir::new().unwrap();
        let store = FileKVStore::open("test", tmp_dir.path()).await.unwrap();

        for key in ["", "../escape", "a/b", ".hidden", "white space"] {
            assert!(
                store.put(key, Bytes::from_static(b"x")).await.is_err(),
                "key {key:?} should be rejected"
            );
            assert!(store.get(key).await.is_err());
        }
    }

    #[tokio::test]
    async fn test_concurrent_writers_on_distinct_keys() {
        let tmp_dir = TempDir::new().unwrap();
        let store = Arc::new(FileKVStore::open("test", tmp_dir.path()).await.unwrap());

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                for round in 0..10 {
                    store
                        .put(&format!("company-{i}"), Bytes::from(format!("{round}")))
                        .await
                        .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        for i in 0..8 {
            assert_eq!(
                store.get(&format!("company-{i}")).await.unwrap(),
                Some(Bytes::from_static(b"9"))
            );
        }
    }

    #[tokio::test]
    async fn test_reader_never_sees_torn_value() {
        let tmp_dir = TempDir::new().unwrap();
        let store = Arc::new(FileKVStore::open("test", tmp_dir.path()).await.unwrap());
        let small = Bytes::from(vec![b'a'; 16]);
        let large = Bytes::from(vec![b'b'; 64 * 1024]);
        store.put("key", small.clone()).await.unwrap();

        let writer = {
            let store = Arc::clone(&store);
            let (small, large) = (small.clone(), large.clone());
            tokio::spawn(async move {
                for i in 0..50 {
                    let value = if i % 2 == 0 { large.clone() } else { small.clone() };
                    store.put("key", value).await.unwrap();
                }
            })
        };

        for _ in 0..200 {
            let value = store.get("key").await.unwrap().unwrap();
            assert!(value == small || value == large, "torn read");
        }
        writer.await.unwrap();
    }
}
