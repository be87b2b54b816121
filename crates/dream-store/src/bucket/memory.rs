use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, OnceLock, RwLock};

use bytes::Bytes;

use super::{Bucket, BucketError, BucketResult, ObjectMetadata, StoredObject};

/// In-memory, `BTreeMap`-based bucket.
///
/// Intended for tests and single-process runs. Objects are held behind a
/// `RwLock`, so one bucket can be shared between several store instances
/// (each standing in for a separate process) through an `Arc`.
pub struct InMemoryBucket {
    name: String,
    objects: RwLock<BTreeMap<String, StoredObject>>,
}

fn registry() -> &'static Mutex<HashMap<String, Arc<InMemoryBucket>>> {
    static REGISTRY: OnceLock<Mutex<HashMap<String, Arc<InMemoryBucket>>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

fn poisoned(e: impl std::fmt::Display) -> BucketError {
    BucketError::Transport(format!("lock poisoned: {e}"))
}

impl InMemoryBucket {
    /// Create a new, empty, unregistered bucket.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            objects: RwLock::new(BTreeMap::new()),
        }
    }

    /// The process-wide bucket registered under `name`, created on first
    /// use. This is what `mem://<name>` locations resolve to.
    pub fn shared(name: &str) -> Arc<Self> {
        let mut buckets = registry().lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(
            buckets
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(Self::new(name))),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.objects.read().map(|m| m.len()).unwrap_or(0)
    }

    /// Returns `true` if the bucket is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.objects
            .read()
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl Bucket for InMemoryBucket {
    fn describe(&self) -> String {
        format!("in-memory bucket {:?}", self.name)
    }

    fn get_object(&self, key: &str) -> BucketResult<StoredObject> {
        let objects = self.objects.read().map_err(poisoned)?;
        objects
            .get(key)
            .cloned()
            .ok_or_else(|| BucketError::NoSuchKey(key.to_string()))
    }

    fn put(&self, key: &str, body: Bytes, metadata: &ObjectMetadata) -> BucketResult<()> {
        let mut objects = self.objects.write().map_err(poisoned)?;
        objects.insert(
            key.to_string(),
            StoredObject {
                body,
                metadata: metadata.clone(),
            },
        );
        Ok(())
    }

    fn delete(&self, key: &str) -> BucketResult<()> {
        let mut objects = self.objects.write().map_err(poisoned)?;
        objects.remove(key);
        Ok(())
    }

    fn list(&self, prefix: &str) -> BucketResult<Vec<String>> {
        let objects = self.objects.read().map_err(poisoned)?;
        Ok(objects
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }
}

impl std::fmt::Debug for InMemoryBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBucket")
            .field("name", &self.name)
            .field("object_count", &self.len())
            .finish()
    }
}
