//! Per-process staging cache for the object-store backend.
//!
//! Remote files are mirrored into `<root>/<module>/<project>/<filename>` the
//! first time they are read or written. Files handed out for writing are
//! tracked as dirty; the dirty set is exactly what the next sync uploads.
//! The directory is only removed after a clean, successful run. On failure it
//! stays behind so an operator can recover the work by hand.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use dream_types::ProjectRef;
use tracing::debug;

use crate::error::StoreResult;

/// A file staged for upload.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct StagedFile {
    pub project: ProjectRef,
    pub filename: String,
}

/// What has become of the staging directory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StagingState {
    Active,
    Removed,
    Preserved,
}

#[derive(Debug)]
pub struct StagingCache {
    root: PathBuf,
    dirty: BTreeSet<StagedFile>,
    state: StagingState,
}

fn create_private_dir(path: &Path) -> std::io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(path)
}

impl StagingCache {
    /// Create a fresh, private staging directory named `<prefix>XXXXXX` under
    /// `parent`, or under the system temp directory when `parent` is `None`.
    pub fn create(parent: Option<&Path>, prefix: &str) -> StoreResult<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(prefix);
        let dir = match parent {
            Some(parent) => {
                create_private_dir(parent)?;
                builder.tempdir_in(parent)?
            }
            None => builder.tempdir()?,
        };
        let root = dir.keep();
        debug!(path = %root.display(), "created staging directory");
        Ok(Self {
            root,
            dirty: BTreeSet::new(),
            state: StagingState::Active,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn state(&self) -> StagingState {
        self.state
    }

    pub fn project_dir(&self, at: &ProjectRef) -> PathBuf {
        self.root.join(at.module()).join(at.project())
    }

    /// The project's staging directory, created if needed.
    pub fn ensure_project_dir(&self, at: &ProjectRef) -> StoreResult<PathBuf> {
        let dir = self.project_dir(at);
        create_private_dir(&dir)?;
        Ok(dir)
    }

    pub fn path_for(&self, at: &ProjectRef, filename: &str) -> PathBuf {
        self.project_dir(at).join(filename)
    }

    pub fn mark_dirty(&mut self, at: &ProjectRef, filename: &str) {
        self.dirty.insert(StagedFile {
            project: at.clone(),
            filename: filename.to_string(),
        });
    }

    pub fn is_dirty(&self, at: &ProjectRef, filename: &str) -> bool {
        self.dirty.iter().any(|s| &s.project == at && s.filename == filename)
    }

    pub fn has_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    pub fn dirty(&self) -> impl Iterator<Item = &StagedFile> {
        self.dirty.iter()
    }

    pub fn clear_dirty(&mut self) {
        self.dirty.clear();
    }

    /// Drop a single staged file and its dirty mark.
    pub fn forget_file(&mut self, at: &ProjectRef, filename: &str) -> StoreResult<()> {
        self.dirty
            .retain(|s| !(&s.project == at && s.filename == filename));
        let path = self.path_for(at, filename);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    /// Drop every staged file of a project and their dirty marks.
    pub fn forget_project(&mut self, at: &ProjectRef) -> StoreResult<()> {
        self.dirty.retain(|s| &s.project != at);
        let dir = self.project_dir(at);
        if dir.exists() {
            fs::remove_dir_all(dir)?;
        }
        Ok(())
    }

    /// Remove the whole staging directory.
    pub fn remove(&mut self) -> StoreResult<()> {
        if self.state == StagingState::Removed {
            return Ok(());
        }
        if self.root.exists() {
            fs::remove_dir_all(&self.root)?;
        }
        debug!(path = %self.root.display(), "removed staging directory");
        self.dirty.clear();
        self.state = StagingState::Removed;
        Ok(())
    }

    /// Keep the staging directory on disk for manual recovery.
    pub fn preserve(&mut self) {
        if self.state == StagingState::Active {
            self.state = StagingState::Preserved;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db_prod() -> ProjectRef {
        ProjectRef::new("db", "prod").unwrap()
    }

    fn staging() -> (tempfile::TempDir, StagingCache) {
        let parent = tempfile::tempdir().unwrap();
        let cache = StagingCache::create(Some(parent.path()), "dreamer-").unwrap();
        (parent, cache)
    }

    #[test]
    fn create_uses_prefix_under_parent() {
        let (parent, cache) = staging();
        assert!(cache.root().is_dir());
        assert!(cache.root().starts_with(parent.path()));
        let name = cache.root().file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("dreamer-"));
        assert_eq!(cache.state(), StagingState::Active);
    }

    #[cfg(unix)]
    #[test]
    fn project_dirs_are_private() {
        use std::os::unix::fs::PermissionsExt;

        let (_parent, cache) = staging();
        let dir = cache.ensure_project_dir(&db_prod()).unwrap();
        let mode = fs::metadata(dir).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o700);
    }

    #[test]
    fn dirty_tracking() {
        let (_parent, mut cache) = staging();
        let at = db_prod();
        assert!(!cache.has_dirty());
        cache.mark_dirty(&at, "a");
        cache.mark_dirty(&at, "a");
        cache.mark_dirty(&at, "b");
        assert_eq!(cache.dirty().count(), 2);
        assert!(cache.is_dirty(&at, "a"));
        cache.clear_dirty();
        assert!(!cache.has_dirty());
    }

    #[test]
    fn forget_file_and_project() {
        let (_parent, mut cache) = staging();
        let at = db_prod();
        let dir = cache.ensure_project_dir(&at).unwrap();
        fs::write(dir.join("a"), b"1").unwrap();
        fs::write(dir.join("b"), b"2").unwrap();
        cache.mark_dirty(&at, "a");
        cache.mark_dirty(&at, "b");

        cache.forget_file(&at, "a").unwrap();
        assert!(!dir.join("a").exists());
        assert!(!cache.is_dirty(&at, "a"));
        assert!(cache.is_dirty(&at, "b"));

        cache.forget_project(&at).unwrap();
        assert!(!dir.exists());
        assert!(!cache.has_dirty());
    }

    #[test]
    fn remove_and_preserve() {
        let (_parent, mut cache) = staging();
        cache.preserve();
        assert_eq!(cache.state(), StagingState::Preserved);
        assert!(cache.root().exists());

        let (_parent2, mut other) = staging();
        other.ensure_project_dir(&db_prod()).unwrap();
        other.remove().unwrap();
        assert_eq!(other.state(), StagingState::Removed);
        assert!(!other.root().exists());
        other.remove().unwrap();
        other.preserve();
        assert_eq!(other.state(), StagingState::Removed);
    }
}
