//! Object-storage transports.
//!
//! The object-store backend never talks to a cloud API directly; it goes
//! through the [`Bucket`] capability: get/put/delete/list by key. Built-in
//! transports:
//!
//! - [`InMemoryBucket`]: process-local, shared by name (`mem://`)
//! - [`DirBucket`]: one file per object in a flat directory (`file://`)
//!
//! Anything else (a real cloud bucket, a test double) can be plugged in by
//! constructing [`ObjectStore`](crate::ObjectStore) with its own
//! `Arc<dyn Bucket>`.

pub mod dir;
pub mod memory;

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;

use crate::error::{StoreError, StoreResult};
use crate::keys::BucketUrl;

pub use dir::DirBucket;
pub use memory::InMemoryBucket;

/// User metadata attached to an object (e.g. `author`).
pub type ObjectMetadata = BTreeMap<String, String>;

/// Errors from bucket transports.
#[derive(Debug, thiserror::Error)]
pub enum BucketError {
    /// The key does not exist in the bucket.
    #[error("no such key: {0}")]
    NoSuchKey(String),

    /// Any other transport failure.
    #[error("{0}")]
    Transport(String),

    /// Local I/O failure while moving bytes in or out of the transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for bucket operations.
pub type BucketResult<T> = Result<T, BucketError>;

/// An object as held by a bucket: its body and user metadata.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Bytes,
    pub metadata: ObjectMetadata,
}

/// Key/value object storage.
///
/// Implementations must satisfy these rules:
/// - `get` of an absent key fails with [`BucketError::NoSuchKey`], never with
///   a generic transport error.
/// - `delete` of an absent key succeeds.
/// - `list` returns full keys (prefix included) in lexicographic order.
/// - `put` replaces the whole object, body and metadata, atomically with
///   respect to readers.
pub trait Bucket: Send + Sync + fmt::Debug {
    /// Human-readable description of the transport, for diagnostics.
    fn describe(&self) -> String;

    /// Fetch an object with its metadata.
    fn get_object(&self, key: &str) -> BucketResult<StoredObject>;

    /// Store an object, replacing any previous one under the same key.
    fn put(&self, key: &str, body: Bytes, metadata: &ObjectMetadata) -> BucketResult<()>;

    /// Remove an object. Absent keys are not an error.
    fn delete(&self, key: &str) -> BucketResult<()>;

    /// List every key starting with `prefix`.
    fn list(&self, prefix: &str) -> BucketResult<Vec<String>>;

    /// Fetch only the body of an object.
    fn get(&self, key: &str) -> BucketResult<Bytes> {
        self.get_object(key).map(|obj| obj.body)
    }

    /// Fetch an object into a local file. The file is only created once the
    /// object has been fetched successfully.
    fn download(&self, key: &str, dest: &Path) -> BucketResult<()> {
        let body = self.get(key)?;
        fs::write(dest, &body)?;
        Ok(())
    }

    /// Store the contents of a local file under `key`.
    fn upload(&self, src: &Path, key: &str, metadata: &ObjectMetadata) -> BucketResult<()> {
        let body = fs::read(src)?;
        self.put(key, Bytes::from(body), metadata)
    }
}

/// Resolve the transport for a parsed bucket location.
pub fn connect(url: &BucketUrl) -> StoreResult<Arc<dyn Bucket>> {
    match url.scheme.as_str() {
        "mem" => Ok(InMemoryBucket::shared(&url.bucket)),
        "file" => Ok(Arc::new(DirBucket::new(&url.bucket))),
        other => Err(StoreError::Configuration(format!(
            "no built-in transport for scheme {other:?} (supported: mem, file)"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_known_schemes() {
        let mem = connect(&BucketUrl::parse("mem://bucket-mod-test/x").unwrap()).unwrap();
        assert!(mem.describe().contains("bucket-mod-test"));

        let dir = tempfile::tempdir().unwrap();
        let location = format!("file://{}", dir.path().display());
        let file = connect(&BucketUrl::parse(&location).unwrap()).unwrap();
        assert!(file.describe().contains("directory"));
    }

    #[test]
    fn connect_rejects_unknown_scheme() {
        let err = connect(&BucketUrl::parse("gs://bucket").unwrap()).unwrap_err();
        assert!(matches!(err, StoreError::Configuration(_)));
    }

    #[test]
    fn download_of_missing_key_leaves_no_file() {
        let bucket = InMemoryBucket::new("download-test");
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("absent");
        let err = bucket.download("nope", &dest).unwrap_err();
        assert!(matches!(err, BucketError::NoSuchKey(_)));
        assert!(!dest.exists());
    }

    #[test]
    fn upload_then_download() {
        let bucket = InMemoryBucket::new("upload-test");
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        fs::write(&src, b"payload").unwrap();

        let mut meta = ObjectMetadata::new();
        meta.insert("author".into(), "a@b".into());
        bucket.upload(&src, "k", &meta).unwrap();

        let dest = dir.path().join("dest");
        bucket.download("k", &dest).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"payload");
        assert_eq!(bucket.get_object("k").unwrap().metadata, meta);
    }
}
