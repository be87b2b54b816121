use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::warn;

use super::{Bucket, BucketError, BucketResult, ObjectMetadata, StoredObject};

/// Suffix of the JSON sidecar holding an object's key and user metadata.
const META_SUFFIX: &str = ".meta";

/// Domain tag mixed into object file names.
const NAME_DOMAIN: &[u8] = b"dreamer.dir-bucket.v1:";

#[derive(Debug, Serialize, Deserialize)]
struct Sidecar {
    key: String,
    #[serde(default)]
    metadata: ObjectMetadata,
}

/// A bucket backed by a flat directory.
///
/// Layout:
/// ```text
/// <root>/<blake3(key)>        object body
/// <root>/<blake3(key)>.meta   JSON {"key": ..., "metadata": {...}}
/// ```
///
/// File names are fixed-length digests, so keys of any length fit and
/// `db/prod` (a metadata record) can sit next to `db/prod/state` (a file).
/// The body is written before the sidecar and only sidecars are listed, so a
/// key shows up once its object is complete. Both are written to a temporary
/// file in the same directory and renamed into place.
#[derive(Debug, Clone)]
pub struct DirBucket {
    root: PathBuf,
}

impl DirBucket {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, key: &str) -> PathBuf {
        let mut hasher = blake3::Hasher::new();
        hasher.update(NAME_DOMAIN);
        hasher.update(key.as_bytes());
        self.root.join(hex::encode(hasher.finalize().as_bytes()))
    }

    fn meta_path(object: &Path) -> PathBuf {
        let mut name = object.as_os_str().to_owned();
        name.push(META_SUFFIX);
        PathBuf::from(name)
    }

    fn write_atomic(&self, dest: &Path, bytes: &[u8]) -> BucketResult<()> {
        let mut tmp = NamedTempFile::new_in(&self.root)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(dest).map_err(|e| BucketError::Io(e.error))?;
        Ok(())
    }

    fn read_sidecar(path: &Path) -> BucketResult<Option<Sidecar>> {
        match fs::read(path) {
            Ok(raw) => serde_json::from_slice(&raw)
                .map(Some)
                .map_err(|e| BucketError::Transport(format!("corrupt object sidecar: {e}"))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn remove_if_present(path: &Path) -> io::Result<()> {
        match fs::remove_file(path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

impl Bucket for DirBucket {
    fn describe(&self) -> String {
        format!("directory bucket at {}", self.root.display())
    }

    fn get_object(&self, key: &str) -> BucketResult<StoredObject> {
        let path = self.object_path(key);
        let body = match fs::read(&path) {
            Ok(body) => body,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(BucketError::NoSuchKey(key.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        let metadata = match Self::read_sidecar(&Self::meta_path(&path))? {
            Some(sidecar) if sidecar.key != key => {
                return Err(BucketError::Transport(format!(
                    "object name collision: {key} and {}",
                    sidecar.key
                )))
            }
            Some(sidecar) => sidecar.metadata,
            None => ObjectMetadata::new(),
        };
        Ok(StoredObject {
            body: Bytes::from(body),
            metadata,
        })
    }

    fn put(&self, key: &str, body: Bytes, metadata: &ObjectMetadata) -> BucketResult<()> {
        let path = self.object_path(key);
        fs::create_dir_all(&self.root)?;
        let sidecar = Sidecar {
            key: key.to_string(),
            metadata: metadata.clone(),
        };
        let meta = serde_json::to_vec(&sidecar)
            .map_err(|e| BucketError::Transport(format!("cannot encode metadata: {e}")))?;
        self.write_atomic(&path, &body)?;
        self.write_atomic(&Self::meta_path(&path), &meta)
    }

    fn delete(&self, key: &str) -> BucketResult<()> {
        let path = self.object_path(key);
        Self::remove_if_present(&Self::meta_path(&path))?;
        Self::remove_if_present(&path)?;
        Ok(())
    }

    fn list(&self, prefix: &str) -> BucketResult<Vec<String>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let is_sidecar = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(META_SUFFIX) && !n.starts_with('.'));
            if !is_sidecar {
                continue;
            }
            match Self::read_sidecar(&path) {
                Ok(Some(sidecar)) if sidecar.key.starts_with(prefix) => keys.push(sidecar.key),
                Ok(_) => {}
                Err(e) => warn!(file = %path.display(), error = %e, "skipping unreadable sidecar"),
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket() -> (tempfile::TempDir, DirBucket) {
        let dir = tempfile::tempdir().unwrap();
        let bucket = DirBucket::new(dir.path().join("bucket"));
        (dir, bucket)
    }

    fn author(name: &str) -> ObjectMetadata {
        let mut meta = ObjectMetadata::new();
        meta.insert("author".into(), name.into());
        meta
    }

    #[test]
    fn put_creates_root_and_roundtrips() {
        let (_dir, bucket) = bucket();
        assert!(!bucket.root().exists());
        bucket
            .put("db/prod/state", Bytes::from_static(b"{}"), &author("a@b"))
            .unwrap();
        assert!(bucket.root().is_dir());

        let obj = bucket.get_object("db/prod/state").unwrap();
        assert_eq!(obj.body, Bytes::from_static(b"{}"));
        assert_eq!(obj.metadata, author("a@b"));
    }

    #[test]
    fn record_and_file_keys_coexist() {
        let (_dir, bucket) = bucket();
        let none = ObjectMetadata::new();
        bucket.put("db/prod", Bytes::from_static(b"meta"), &none).unwrap();
        bucket.put("db/prod/prod", Bytes::from_static(b"file"), &none).unwrap();
        assert_eq!(bucket.get("db/prod").unwrap(), Bytes::from_static(b"meta"));
        assert_eq!(bucket.get("db/prod/prod").unwrap(), Bytes::from_static(b"file"));
    }

    #[test]
    fn missing_key_and_missing_root() {
        let (_dir, bucket) = bucket();
        assert!(matches!(bucket.get("x"), Err(BucketError::NoSuchKey(_))));
        assert!(bucket.list("").unwrap().is_empty());
        bucket.delete("x").unwrap();
    }

    #[test]
    fn list_skips_sidecars_and_foreign_files() {
        let (_dir, bucket) = bucket();
        let none = ObjectMetadata::new();
        bucket.put("db/prod", Bytes::new(), &none).unwrap();
        bucket.put("db/prod/a", Bytes::new(), &none).unwrap();
        bucket.put("web/dev", Bytes::new(), &none).unwrap();
        fs::write(bucket.root().join("README"), b"not an object").unwrap();
        fs::write(bucket.root().join("junk.meta"), b"not json").unwrap();

        assert_eq!(bucket.list("").unwrap(), vec!["db/prod", "db/prod/a", "web/dev"]);
        assert_eq!(bucket.list("db/").unwrap(), vec!["db/prod", "db/prod/a"]);
    }

    #[test]
    fn delete_removes_body_and_sidecar() {
        let (_dir, bucket) = bucket();
        bucket.put("k", Bytes::from_static(b"v"), &author("a@b")).unwrap();
        bucket.delete("k").unwrap();
        assert!(fs::read_dir(bucket.root()).unwrap().next().is_none());
    }

    #[test]
    fn long_keys_are_stored() {
        let (_dir, bucket) = bucket();
        let key = format!("{}/{}/{}", "m".repeat(200), "p".repeat(200), "f".repeat(200));
        bucket.put(&key, Bytes::from_static(b"v"), &author("a@b")).unwrap();
        assert_eq!(bucket.get(&key).unwrap(), Bytes::from_static(b"v"));
        assert_eq!(bucket.list("mmm").unwrap(), vec![key]);
    }

    #[test]
    fn body_without_sidecar_is_not_listed() {
        let (_dir, bucket) = bucket();
        bucket.put("db/prod/a", Bytes::from_static(b"v"), &author("a@b")).unwrap();
        fs::remove_file(DirBucket::meta_path(&bucket.object_path("db/prod/a"))).unwrap();
        assert!(bucket.list("").unwrap().is_empty());
        assert_eq!(bucket.get_object("db/prod/a").unwrap().metadata, ObjectMetadata::new());
    }
}
