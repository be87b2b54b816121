//! Object-store backend with optimistic concurrency.
//!
//! Reads and writes go through a private [`StagingCache`]; nothing reaches
//! the bucket until [`sync`](ProjectStore::sync). Each project carries a
//! [`MetadataRecord`] at `<prefix><module>/<project>` whose version is
//! remembered at `open` and compared again at `sync`. A mismatch means some
//! other run synced in between, and the sync fails without uploading
//! anything.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use dream_types::{validate_filename, validate_name, IdentityProvider, MetadataRecord, ProjectRef};
use tracing::{debug, info, warn};

use crate::bucket::{self, Bucket, BucketError, ObjectMetadata};
use crate::error::{StoreError, StoreResult};
use crate::keys::{BucketUrl, KeyShape, KeySpace};
use crate::options::StoreOptions;
use crate::staging::{StagedFile, StagingCache, StagingState};
use crate::traits::{BackendKind, ProjectStore, ScopeExit};

/// Object metadata key carrying the uploader's `user@host`.
pub const AUTHOR_METADATA_KEY: &str = "author";

pub struct ObjectStore {
    url: BucketUrl,
    keys: KeySpace,
    bucket: Arc<dyn Bucket>,
    identity: Arc<dyn IdentityProvider>,
    staging: StagingCache,
    current: Option<ProjectRef>,
    last_version: Option<u64>,
    deleted_current: bool,
}

impl ObjectStore {
    /// Build a store over an explicit transport. The staging directory is
    /// created immediately.
    pub fn new(url: BucketUrl, bucket: Arc<dyn Bucket>, options: &StoreOptions) -> StoreResult<Self> {
        let staging =
            StagingCache::create(options.staging_root.as_deref(), &options.staging_prefix)?;
        let keys = KeySpace::new(&url.prefix);
        debug!(url = %url, staging = %staging.root().display(), "opened object store");
        Ok(Self {
            url,
            keys,
            bucket,
            identity: Arc::clone(&options.identity),
            staging,
            current: None,
            last_version: None,
            deleted_current: false,
        })
    }

    /// Parse `location` and connect one of the built-in transports.
    pub fn connect(location: &str, options: &StoreOptions) -> StoreResult<Self> {
        let url = BucketUrl::parse(location)?;
        let bucket = bucket::connect(&url)?;
        Self::new(url, bucket, options)
    }

    pub fn url(&self) -> &BucketUrl {
        &self.url
    }

    /// Remote version remembered at `open` (or at the last successful sync).
    pub fn last_version(&self) -> Option<u64> {
        self.last_version
    }

    /// Fetch and decode the project's metadata record. `None` if the project
    /// has never been synced.
    pub fn remote_metadata(&self, at: &ProjectRef) -> StoreResult<Option<MetadataRecord>> {
        match self.bucket.get(&self.keys.project_key(at)) {
            Ok(raw) => Ok(Some(MetadataRecord::from_json(&raw)?)),
            Err(BucketError::NoSuchKey(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn remote_version(&self, at: &ProjectRef) -> StoreResult<Option<u64>> {
        Ok(self.remote_metadata(at)?.map(|record| record.version))
    }

    fn record_exists(&self, at: &ProjectRef) -> StoreResult<bool> {
        match self.bucket.get(&self.keys.project_key(at)) {
            Ok(_) => Ok(true),
            Err(BucketError::NoSuchKey(_)) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn require_staging(&self) -> StoreResult<()> {
        match self.staging.state() {
            StagingState::Removed => Err(StoreError::Configuration(
                "store has been released; its staging directory is gone".to_string(),
            )),
            _ => Ok(()),
        }
    }

    fn author_metadata(author: &str) -> ObjectMetadata {
        let mut meta = ObjectMetadata::new();
        meta.insert(AUTHOR_METADATA_KEY.to_string(), author.to_string());
        meta
    }

    /// Every listed key under the prefix, classified. Keys of any other shape
    /// are skipped.
    fn scan(&self, prefix: &str) -> StoreResult<Vec<(String, String, Option<String>)>> {
        let keys = self.bucket.list(prefix)?;
        Ok(keys
            .iter()
            .filter_map(|key| match self.keys.classify(key)? {
                KeyShape::Project { module, project } => {
                    Some((module.to_string(), project.to_string(), None))
                }
                KeyShape::File {
                    module,
                    project,
                    filename,
                } => Some((module.to_string(), project.to_string(), Some(filename.to_string()))),
            })
            .collect())
    }

    fn upload_dirty(&self, dirty: &[StagedFile], meta: &ObjectMetadata) -> StoreResult<()> {
        for staged in dirty {
            let path = self.staging.path_for(&staged.project, &staged.filename);
            let key = self.keys.file_key(&staged.project, &staged.filename);
            self.bucket.upload(&path, &key, meta)?;
            debug!(key = %key, "uploaded");
        }
        Ok(())
    }
}

impl ProjectStore for ObjectStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Object
    }

    fn current(&self) -> Option<&ProjectRef> {
        self.current.as_ref()
    }

    fn open(&mut self, module: &str, project: &str) -> StoreResult<()> {
        if let Some(open) = &self.current {
            return Err(StoreError::Configuration(format!(
                "project {open} is already open on this store"
            )));
        }
        let at = ProjectRef::new(module, project)?;
        let version = self.remote_version(&at)?;
        debug!(project = %at, ?version, "opened project");
        self.current = Some(at);
        self.last_version = version;
        self.deleted_current = false;
        Ok(())
    }

    fn close(&mut self) -> StoreResult<()> {
        self.sync()?;
        self.current = None;
        self.last_version = None;
        self.deleted_current = false;
        Ok(())
    }

    fn read_file(&self, at: &ProjectRef, filename: &str) -> StoreResult<PathBuf> {
        validate_filename(filename)?;
        self.require_staging()?;
        self.staging.ensure_project_dir(at)?;
        let path = self.staging.path_for(at, filename);
        if path.exists() {
            return Ok(path);
        }
        let key = self.keys.file_key(at, filename);
        match self.bucket.download(&key, &path) {
            Ok(()) => {
                debug!(key = %key, "downloaded");
                Ok(path)
            }
            Err(BucketError::NoSuchKey(_)) => {
                Err(StoreError::not_found(self.url.url_for_key(&key)))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn write_file(&mut self, at: &ProjectRef, filename: &str) -> StoreResult<PathBuf> {
        let path = match self.read_file(at, filename) {
            Ok(path) => path,
            Err(e) if e.is_not_found() => {
                let path = self.staging.path_for(at, filename);
                fs::File::create(&path)?;
                path
            }
            Err(e) => return Err(e),
        };
        self.staging.mark_dirty(at, filename);
        Ok(path)
    }

    fn list_modules(&self) -> StoreResult<Vec<String>> {
        let modules: BTreeSet<String> = self
            .scan(self.keys.prefix())?
            .into_iter()
            .map(|(module, _, _)| module)
            .collect();
        Ok(modules.into_iter().collect())
    }

    fn list_projects(&self, module: &str) -> StoreResult<Vec<String>> {
        validate_name(module)?;
        let projects: BTreeSet<String> = self
            .scan(&self.keys.module_prefix(module))?
            .into_iter()
            .filter(|(m, _, _)| m == module)
            .map(|(_, project, _)| project)
            .collect();
        Ok(projects.into_iter().collect())
    }

    fn list_files(&self, at: &ProjectRef) -> StoreResult<Vec<String>> {
        let mut files: Vec<String> = self
            .scan(&self.keys.files_prefix(at))?
            .into_iter()
            .filter_map(|(_, _, filename)| filename)
            .collect();
        files.sort();
        Ok(files)
    }

    fn delete_file(&mut self, at: &ProjectRef, filename: &str) -> StoreResult<()> {
        validate_filename(filename)?;
        let key = self.keys.file_key(at, filename);
        self.bucket.delete(&key)?;
        self.staging.forget_file(at, filename)?;
        debug!(key = %key, "deleted");
        Ok(())
    }

    fn delete_project(&mut self, at: &ProjectRef, recursive: bool) -> StoreResult<()> {
        let files = self.list_files(at)?;
        if files.is_empty() && !self.record_exists(at)? {
            warn!(project = %at, "project does not exist, nothing to delete");
            return Ok(());
        }
        if !recursive && !files.is_empty() {
            return Err(StoreError::ProjectNotEmpty {
                project: at.clone(),
            });
        }
        if self.current.as_ref() == Some(at) {
            self.deleted_current = true;
        }
        for filename in &files {
            self.bucket.delete(&self.keys.file_key(at, filename))?;
        }
        self.bucket.delete(&self.keys.project_key(at))?;
        self.staging.forget_project(at)?;
        info!(project = %at, files = files.len(), "deleted project");
        Ok(())
    }

    fn exists_module(&self, module: &str) -> StoreResult<bool> {
        validate_name(module)?;
        Ok(self
            .scan(&self.keys.module_prefix(module))?
            .iter()
            .any(|(m, _, _)| m == module))
    }

    fn exists_project(&self, at: &ProjectRef) -> StoreResult<bool> {
        Ok(self
            .scan(&self.keys.project_key(at))?
            .iter()
            .any(|(m, p, _)| m == at.module() && p == at.project()))
    }

    fn sync(&mut self) -> StoreResult<bool> {
        if self.deleted_current {
            if let Some(at) = self.current.clone() {
                if self.staging.dirty().any(|s| s.project == at) {
                    warn!(project = %at, "current project was deleted during this run, discarding staged writes");
                }
                self.staging.forget_project(&at)?;
            }
            return Ok(true);
        }
        if !self.staging.has_dirty() {
            return Ok(true);
        }
        let at = self.current.clone().ok_or_else(|| {
            StoreError::Configuration(
                "staged writes cannot be synced without an open project to version".to_string(),
            )
        })?;

        let found = self.remote_version(&at)?;
        if found != self.last_version {
            return Err(StoreError::ConcurrentModification {
                project: at,
                expected: self.last_version,
                found,
            });
        }

        let author = self.identity.whoami();
        let meta = Self::author_metadata(&author);
        let record = MetadataRecord::next(self.last_version, author)?;
        let dirty: Vec<StagedFile> = self.staging.dirty().cloned().collect();
        self.upload_dirty(&dirty, &meta)?;

        let mut record_meta = meta;
        record_meta.insert("content-type".to_string(), "application/json".to_string());
        self.bucket.put(
            &self.keys.project_key(&at),
            Bytes::from(record.to_json()?),
            &record_meta,
        )?;

        self.last_version = Some(record.version);
        self.staging.clear_dirty();
        info!(project = %at, version = record.version, files = dirty.len(), "synced");
        Ok(true)
    }

    fn base_url(&self) -> String {
        self.url.to_string()
    }

    fn url_for_file(&self, at: &ProjectRef, filename: &str) -> String {
        self.url.url_for_key(&self.keys.file_key(at, filename))
    }

    fn url_for_project(&self, at: &ProjectRef) -> String {
        self.url.url_for_key(&self.keys.files_prefix(at))
    }

    fn default_local_path(&self) -> StoreResult<PathBuf> {
        let at = self.current_project()?;
        self.require_staging()?;
        self.staging.ensure_project_dir(&at)
    }

    fn troubleshoot(&self) -> StoreResult<Vec<String>> {
        let mut lines = vec![
            format!("Using object store {}", self.base_url()),
            format!("Transport: {}", self.bucket.describe()),
        ];
        match self.bucket.list(self.keys.prefix()) {
            Ok(keys) => lines.push(format!(
                "Listing OK: {} object(s) under {:?}",
                keys.len(),
                self.keys.prefix()
            )),
            Err(e) => lines.push(format!("Listing failed: {e}")),
        }
        lines.push(format!("Staging directory: {}", self.staging.root().display()));
        lines.push(format!("Author identity: {}", self.identity.whoami()));
        Ok(lines)
    }

    fn staging_dir(&self) -> Option<&Path> {
        match self.staging.state() {
            StagingState::Removed => None,
            _ => Some(self.staging.root()),
        }
    }

    fn release(&mut self, exit: ScopeExit) -> StoreResult<()> {
        match exit {
            ScopeExit::Clean => self.staging.remove(),
            ScopeExit::Failed => {
                self.staging.preserve();
                Ok(())
            }
        }
    }
}

impl Drop for ObjectStore {
    fn drop(&mut self) {
        if self.staging.state() != StagingState::Active {
            return;
        }
        if self.staging.has_dirty() {
            self.staging.preserve();
            warn!(
                path = %self.staging.root().display(),
                "object store dropped with unsynced writes, staging directory kept"
            );
        } else if let Err(e) = self.staging.remove() {
            warn!(
                path = %self.staging.root().display(),
                error = %e,
                "failed to remove staging directory"
            );
        }
    }
}

impl std::fmt::Debug for ObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStore")
            .field("url", &self.url.to_string())
            .field("bucket", &self.bucket)
            .field("staging", &self.staging.root())
            .field("current", &self.current)
            .field("last_version", &self.last_version)
            .finish()
    }
}
