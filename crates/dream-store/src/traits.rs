//! The [`ProjectStore`] contract every backend implements.

use std::path::{Path, PathBuf};

use dream_types::ProjectRef;

use crate::error::{StoreError, StoreResult};

/// Which backend variant a store is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
    Local,
    Object,
}

/// How a scoped run ended, passed to [`ProjectStore::release`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScopeExit {
    /// The run and its final sync both succeeded.
    Clean,
    /// Something failed; keep whatever is needed for manual recovery.
    Failed,
}

/// Storage of named state files per `(module, project)`.
///
/// A store instance has at most one *current* project, set by
/// [`open`](ProjectStore::open) and cleared by [`close`](ProjectStore::close).
/// The `*_file` and `*_project` methods take an explicit [`ProjectRef`]; the
/// short forms ([`read`](ProjectStore::read), [`write`](ProjectStore::write),
/// ...) use the current project and fail with
/// [`StoreError::Configuration`] when none is open.
///
/// Invariants all implementations uphold:
/// - `read_file` never creates anything visible in the backend.
/// - `write_file` never fails with `NotFound`; a missing file starts empty.
/// - Listings are sorted lexicographically.
/// - Predicates (`exists_*`) and locators (`url_*`, `base_url`) never change
///   the current project.
pub trait ProjectStore {
    fn kind(&self) -> BackendKind;

    /// The current project, if one is open.
    fn current(&self) -> Option<&ProjectRef>;

    /// Make `(module, project)` the current project. Backends with remote
    /// versioning record the remote version seen at this moment.
    fn open(&mut self, module: &str, project: &str) -> StoreResult<()>;

    /// Sync pending writes, then clear the current project.
    fn close(&mut self) -> StoreResult<()>;

    /// Local path holding the current content of `filename`.
    fn read_file(&self, at: &ProjectRef, filename: &str) -> StoreResult<PathBuf>;

    /// Local, writable path for `filename`, created empty if it does not
    /// exist yet. The file is uploaded by the next [`sync`](ProjectStore::sync).
    fn write_file(&mut self, at: &ProjectRef, filename: &str) -> StoreResult<PathBuf>;

    fn list_modules(&self) -> StoreResult<Vec<String>>;

    fn list_projects(&self, module: &str) -> StoreResult<Vec<String>>;

    fn list_files(&self, at: &ProjectRef) -> StoreResult<Vec<String>>;

    fn delete_file(&mut self, at: &ProjectRef, filename: &str) -> StoreResult<()>;

    /// Delete a project. With `recursive` every file goes first, then the
    /// project itself. Deleting a project that does not exist only warns.
    fn delete_project(&mut self, at: &ProjectRef, recursive: bool) -> StoreResult<()>;

    fn exists_module(&self, module: &str) -> StoreResult<bool>;

    fn exists_project(&self, at: &ProjectRef) -> StoreResult<bool>;

    /// Flush pending writes to durable storage. Returns `true` on success;
    /// a call with nothing pending is a cheap no-op.
    fn sync(&mut self) -> StoreResult<bool>;

    /// Human-readable location of the store as a whole.
    fn base_url(&self) -> String;

    fn url_for_file(&self, at: &ProjectRef, filename: &str) -> String;

    fn url_for_project(&self, at: &ProjectRef) -> String;

    /// Local directory backing the current project.
    fn default_local_path(&self) -> StoreResult<PathBuf>;

    /// Diagnostic lines describing the backend and its health.
    fn troubleshoot(&self) -> StoreResult<Vec<String>>;

    /// Directory holding per-run working copies, if the backend has one.
    fn staging_dir(&self) -> Option<&Path>;

    /// Release run-scoped resources after the final sync.
    fn release(&mut self, exit: ScopeExit) -> StoreResult<()>;

    /// The current project, or a configuration error if none is open.
    fn current_project(&self) -> StoreResult<ProjectRef> {
        self.current().cloned().ok_or_else(|| {
            StoreError::Configuration(
                "no module and project given, and no project is open".to_string(),
            )
        })
    }

    /// Build a project reference, filling whichever half is missing from the
    /// current project.
    fn resolve(&self, module: Option<&str>, project: Option<&str>) -> StoreResult<ProjectRef> {
        let current = self.current();
        let module = module
            .or_else(|| current.map(ProjectRef::module))
            .ok_or_else(|| {
                StoreError::Configuration("no module given and no project is open".to_string())
            })?;
        let project = project
            .or_else(|| current.map(ProjectRef::project))
            .ok_or_else(|| {
                StoreError::Configuration("no project given and no project is open".to_string())
            })?;
        Ok(ProjectRef::new(module, project)?)
    }

    fn read(&self, filename: &str) -> StoreResult<PathBuf> {
        let at = self.current_project()?;
        self.read_file(&at, filename)
    }

    fn write(&mut self, filename: &str) -> StoreResult<PathBuf> {
        let at = self.current_project()?;
        self.write_file(&at, filename)
    }

    fn delete(&mut self, filename: &str) -> StoreResult<()> {
        let at = self.current_project()?;
        self.delete_file(&at, filename)
    }

    fn url_for(&self, filename: &str) -> StoreResult<String> {
        let at = self.current_project()?;
        Ok(self.url_for_file(&at, filename))
    }
}
