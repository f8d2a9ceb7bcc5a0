//! Object store backed by a local directory.
//!
//! Every key maps to a file below the store root, so `bucket/db/x.bak` lives at
//! `<root>/bucket/db/x.bak`.

use super::{window_listing, ObjectStore, StoreError, StoreResult};
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    /// Open the store, creating the root directory when missing
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| {
            StoreError::Unavailable(format!("cannot open store at {}: {}", root.display(), e))
        })?;
        if !root.is_dir() {
            return Err(StoreError::Unavailable(format!(
                "store root {} is not a directory",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, key: &str) -> StoreResult<PathBuf> {
        let relative = Path::new(key);
        // Empty segments would be collapsed on disk and never list back
        let valid = !key.split('/').any(str::is_empty)
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(&self, key: &str, data: Bytes) -> StoreResult<()> {
        let path = self.object_path(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &data).await?;
        debug!(key = %key, bytes = data.len(), "Stored object");
        Ok(())
    }

    async fn list(
        &self,
        prefix: &str,
        offset: usize,
        limit: usize,
        recursive: bool,
    ) -> StoreResult<Vec<String>> {
        let dir_part = &prefix[..prefix.rfind('/').map(|i| i + 1).unwrap_or(0)];
        let scan_dir = self.root.join(dir_part);
        let root = self.root.clone();

        // Directory walks are blocking
        let mut keys = tokio::task::spawn_blocking(move || collect_keys(&root, &scan_dir))
            .await
            .map_err(|e| StoreError::Unavailable(format!("listing task failed: {}", e)))??;
        keys.sort();

        Ok(window_listing(keys, prefix, offset, limit, recursive))
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let path = self.object_path(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn collect_keys(root: &Path, scan_dir: &Path) -> StoreResult<Vec<String>> {
    if !scan_dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut keys = Vec::new();
    for entry in WalkDir::new(scan_dir).follow_links(false) {
        let entry = entry.map_err(|e| StoreError::Io(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let key = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        keys.push(key);
    }
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_roundtrip_on_disk() {
        let dir = TempDir::new().unwrap();
        let store = FsObjectStore::open(dir.path().join("objects")).unwrap();

        store.put("bucket/db/b.bak", Bytes::from_static(b"b")).await.unwrap();
        store.put("bucket/db/a.bak", Bytes::from_static(b"a")).await.unwrap();
        store.put("bucket/db/nested/c.bak", Bytes::from_static(b"c")).await.unwrap();
        store.put("bucket/notes/d.bak", Bytes::from_static(b"d")).await.unwrap();

        let on_disk = std::fs::read(store.root().join("bucket/db/a.bak")).unwrap();
        assert_eq!(on_disk, b"a");

        let flat = store.list("bucket/db/", 0, 100, false).await.unwrap();
        assert_eq!(flat, vec!["db/a.bak", "db/b.bak"]);

        let deep = store.list("bucket/db/", 0, 100, true).await.unwrap();
        assert_eq!(deep, vec!["db/a.bak", "db/b.bak", "db/nested/c.bak"]);

        store.delete("bucket/db/a.bak").await.unwrap();
        assert!(matches!(
            store.delete("bucket/db/a.bak").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_missing_prefix_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = FsObjectStore::open(dir.path()).unwrap();
        assert!(store.list("bucket/none/", 0, 10, true).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_escaping_keys() {
        let dir = TempDir::new().unwrap();
        let store = FsObjectStore::open(dir.path()).unwrap();

        for key in ["../outside", "/abs/key", "", "bucket/dir/", "bucket//db/a.bak"] {
            assert!(matches!(
                store.put(key, Bytes::new()).await,
                Err(StoreError::InvalidKey(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_leading_slash_prefix_fails_upload_instead_of_hiding_from_prune() {
        use crate::config::fixtures;
        use crate::executor::{BackupRunner, PruneRunner};
        use std::sync::Arc;

        let dir = TempDir::new().unwrap();
        let source = dir.path().join("a.txt");
        std::fs::write(&source, b"a").unwrap();

        let store: Arc<dyn ObjectStore> =
            Arc::new(FsObjectStore::open(dir.path().join("objects")).unwrap());
        let config = Arc::new(fixtures::config(
            vec![fixtures::job("slashed", source, "/db/", 1)],
            Path::new("reports"),
            &[],
        ));

        let backup = BackupRunner::new(Arc::clone(&config), Arc::clone(&store));
        for _ in 0..3 {
            let result = backup.run_all().await;
            assert_eq!(result.files_affected(), 0);
            assert_eq!(result.errors().len(), 1);
            assert!(result.errors()[0].contains("invalid object key"));
        }

        let pruned = PruneRunner::new(config, Arc::clone(&store)).run_all().await;
        assert_eq!(pruned.files_affected(), 0);
        assert!(store.list("bucket/", 0, 100, true).await.unwrap().is_empty());
    }

    #[test]
    fn test_open_fails_on_file_root() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(matches!(
            FsObjectStore::open(file.path()),
            Err(StoreError::Unavailable(_))
        ));
    }
}
