//! Local filesystem backend.
//!
//! Files live at `<base>/<module>/<project>/<filename>` and every operation
//! hits the disk immediately, so there is nothing to sync.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use dream_types::{validate_filename, validate_name, ProjectRef};
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::traits::{BackendKind, ProjectStore, ScopeExit};

#[derive(Debug)]
pub struct LocalStore {
    base: PathBuf,
    current: Option<ProjectRef>,
}

/// Names of the immediate children of `dir`, sorted. A missing directory
/// lists as empty.
fn child_names(dir: &Path, dirs_only: bool) -> StoreResult<Vec<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry?;
        if dirs_only && !entry.file_type()?.is_dir() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}

fn not_found_as(path: &Path, err: io::Error) -> StoreError {
    if err.kind() == io::ErrorKind::NotFound {
        StoreError::not_found(path.display().to_string())
    } else {
        err.into()
    }
}

impl LocalStore {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            current: None,
        }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn project_path(&self, at: &ProjectRef) -> PathBuf {
        self.base.join(at.module()).join(at.project())
    }

    pub fn file_path(&self, at: &ProjectRef, filename: &str) -> PathBuf {
        self.project_path(at).join(filename)
    }
}

impl ProjectStore for LocalStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
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
        self.current = Some(ProjectRef::new(module, project)?);
        Ok(())
    }

    fn close(&mut self) -> StoreResult<()> {
        self.current = None;
        Ok(())
    }

    fn read_file(&self, at: &ProjectRef, filename: &str) -> StoreResult<PathBuf> {
        validate_filename(filename)?;
        let path = self.file_path(at, filename);
        if !path.is_file() {
            return Err(StoreError::not_found(path.display().to_string()));
        }
        Ok(path)
    }

    fn write_file(&mut self, at: &ProjectRef, filename: &str) -> StoreResult<PathBuf> {
        validate_filename(filename)?;
        fs::create_dir_all(self.project_path(at))?;
        let path = self.file_path(at, filename);
        // Opening with create touches the file without truncating it.
        OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(path)
    }

    fn list_modules(&self) -> StoreResult<Vec<String>> {
        child_names(&self.base, true)
    }

    fn list_projects(&self, module: &str) -> StoreResult<Vec<String>> {
        validate_name(module)?;
        child_names(&self.base.join(module), true)
    }

    fn list_files(&self, at: &ProjectRef) -> StoreResult<Vec<String>> {
        child_names(&self.project_path(at), false)
    }

    fn delete_file(&mut self, at: &ProjectRef, filename: &str) -> StoreResult<()> {
        validate_filename(filename)?;
        let path = self.file_path(at, filename);
        fs::remove_file(&path).map_err(|e| not_found_as(&path, e))?;
        debug!(path = %path.display(), "deleted file");
        Ok(())
    }

    fn delete_project(&mut self, at: &ProjectRef, recursive: bool) -> StoreResult<()> {
        let dir = self.project_path(at);
        if !dir.is_dir() {
            warn!(project = %at, "project does not exist, nothing to delete");
            return Ok(());
        }
        if recursive {
            fs::remove_dir_all(&dir)?;
        } else {
            if fs::read_dir(&dir)?.next().is_some() {
                return Err(StoreError::ProjectNotEmpty {
                    project: at.clone(),
                });
            }
            fs::remove_dir(&dir)?;
        }
        info!(project = %at, recursive, "deleted project");
        Ok(())
    }

    fn exists_module(&self, module: &str) -> StoreResult<bool> {
        validate_name(module)?;
        Ok(self.base.join(module).is_dir())
    }

    fn exists_project(&self, at: &ProjectRef) -> StoreResult<bool> {
        Ok(self.project_path(at).is_dir())
    }

    fn sync(&mut self) -> StoreResult<bool> {
        Ok(true)
    }

    fn base_url(&self) -> String {
        self.base.display().to_string()
    }

    fn url_for_file(&self, at: &ProjectRef, filename: &str) -> String {
        self.file_path(at, filename).display().to_string()
    }

    fn url_for_project(&self, at: &ProjectRef) -> String {
        self.project_path(at).display().to_string()
    }

    fn default_local_path(&self) -> StoreResult<PathBuf> {
        let at = self.current_project()?;
        Ok(self.project_path(&at))
    }

    fn troubleshoot(&self) -> StoreResult<Vec<String>> {
        let mut lines = vec![format!("Using local base directory {}", self.base.display())];
        let meta = match fs::metadata(&self.base) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                lines.push("Base directory does not exist yet; it is created on first write".into());
                return Ok(lines);
            }
            Err(e) => return Err(e.into()),
        };
        if !meta.is_dir() {
            lines.push("Base path exists but is not a directory".into());
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            lines.push(format!("Base directory mode: {:o}", meta.mode() & 0o7777));
            lines.push(format!("Base directory owned by uid {}", meta.uid()));
        }
        if meta.permissions().readonly() {
            lines.push("Base directory is read-only".into());
        }
        Ok(lines)
    }

    fn staging_dir(&self) -> Option<&Path> {
        None
    }

    fn release(&mut self, _exit: ScopeExit) -> StoreResult<()> {
        Ok(())
    }
}
