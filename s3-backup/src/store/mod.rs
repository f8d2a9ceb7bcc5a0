//! Object store capability consumed by the backup and prune phases.
//!
//! Keys carry the bucket as their first segment (`bucket/prefix/file.bak`).
//! Listings return keys relative to the bucket, so a listed key is deleted by
//! prepending `bucket/` again.

pub mod fs;
pub mod memory;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

pub use fs::FsObjectStore;
pub use memory::MemoryStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("invalid object key: {0}")]
    InvalidKey(String),

    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write an object, overwriting any previous content under the same key
    async fn put(&self, key: &str, data: Bytes) -> StoreResult<()>;

    /// List keys starting with `prefix`, sorted ascending, relative to the bucket.
    ///
    /// `offset`/`limit` select a window of the sorted listing. Without
    /// `recursive`, keys nested below the prefix's directory level are hidden.
    async fn list(
        &self,
        prefix: &str,
        offset: usize,
        limit: usize,
        recursive: bool,
    ) -> StoreResult<Vec<String>>;

    async fn delete(&self, key: &str) -> StoreResult<()>;
}

/// Shape a sorted listing of full keys into the window the caller asked for.
pub(crate) fn window_listing<I>(
    full_keys: I,
    prefix: &str,
    offset: usize,
    limit: usize,
    recursive: bool,
) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let dir_len = prefix.rfind('/').map(|i| i + 1).unwrap_or(0);

    full_keys
        .into_iter()
        .filter(|key| key.starts_with(prefix))
        .filter(|key| recursive || !key[dir_len..].contains('/'))
        .skip(offset)
        .take(limit)
        .map(|key| strip_bucket(&key).to_string())
        .collect()
}

fn strip_bucket(key: &str) -> &str {
    key.split_once('/').map(|(_, rest)| rest).unwrap_or(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(list: &[&str]) -> Vec<String> {
        list.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn test_window_strips_bucket_and_filters_prefix() {
        let all = keys(&[
            "bucket/db/a.bak",
            "bucket/db/b.bak",
            "bucket/notes/c.bak",
            "other/db/d.bak",
        ]);

        let listed = window_listing(all, "bucket/db/", 0, 100, true);
        assert_eq!(listed, vec!["db/a.bak", "db/b.bak"]);
    }

    #[test]
    fn test_window_non_recursive_hides_nested() {
        let all = keys(&["bucket/db/a.bak", "bucket/db/old/b.bak"]);

        assert_eq!(window_listing(all.clone(), "bucket/db/", 0, 100, false), vec!["db/a.bak"]);
        assert_eq!(window_listing(all, "bucket/db/", 0, 100, true).len(), 2);
    }

    #[test]
    fn test_window_offset_and_limit() {
        let all = keys(&["b/p1", "b/p2", "b/p3", "b/p4"]);
        assert_eq!(window_listing(all, "b/p", 1, 2, true), vec!["p2", "p3"]);
    }
}
