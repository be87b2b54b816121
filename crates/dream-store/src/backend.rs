use std::path::{Path, PathBuf};

use dream_types::ProjectRef;

use crate::error::StoreResult;
use crate::keys::is_remote_location;
use crate::local::LocalStore;
use crate::object::ObjectStore;
use crate::options::StoreOptions;
use crate::traits::{BackendKind, ProjectStore, ScopeExit};

/// The backend selected for a base location.
#[derive(Debug)]
pub enum Backend {
    Local(LocalStore),
    Object(ObjectStore),
}

impl Backend {
    /// `scheme://...` selects the object-store backend; anything else is a
    /// local directory.
    pub fn from_location(location: &str, options: &StoreOptions) -> StoreResult<Self> {
        if is_remote_location(location) {
            Ok(Self::Object(ObjectStore::connect(location, options)?))
        } else {
            Ok(Self::Local(LocalStore::new(location)))
        }
    }
}

macro_rules! dispatch {
    ($self:expr, $store:ident => $call:expr) => {
        match $self {
            Backend::Local($store) => $call,
            Backend::Object($store) => $call,
        }
    };
}

impl ProjectStore for Backend {
    fn kind(&self) -> BackendKind {
        dispatch!(self, s => s.kind())
    }

    fn current(&self) -> Option<&ProjectRef> {
        dispatch!(self, s => s.current())
    }

    fn open(&mut self, module: &str, project: &str) -> StoreResult<()> {
        dispatch!(self, s => s.open(module, project))
    }

    fn close(&mut self) -> StoreResult<()> {
        dispatch!(self, s => s.close())
    }

    fn read_file(&self, at: &ProjectRef, filename: &str) -> StoreResult<PathBuf> {
        dispatch!(self, s => s.read_file(at, filename))
    }

    fn write_file(&mut self, at: &ProjectRef, filename: &str) -> StoreResult<PathBuf> {
        dispatch!(self, s => s.write_file(at, filename))
    }

    fn list_modules(&self) -> StoreResult<Vec<String>> {
        dispatch!(self, s => s.list_modules())
    }

    fn list_projects(&self, module: &str) -> StoreResult<Vec<String>> {
        dispatch!(self, s => s.list_projects(module))
    }

    fn list_files(&self, at: &ProjectRef) -> StoreResult<Vec<String>> {
        dispatch!(self, s => s.list_files(at))
    }

    fn delete_file(&mut self, at: &ProjectRef, filename: &str) -> StoreResult<()> {
        dispatch!(self, s => s.delete_file(at, filename))
    }

    fn delete_project(&mut self, at: &ProjectRef, recursive: bool) -> StoreResult<()> {
        dispatch!(self, s => s.delete_project(at, recursive))
    }

    fn exists_module(&self, module: &str) -> StoreResult<bool> {
        dispatch!(self, s => s.exists_module(module))
    }

    fn exists_project(&self, at: &ProjectRef) -> StoreResult<bool> {
        dispatch!(self, s => s.exists_project(at))
    }

    fn sync(&mut self) -> StoreResult<bool> {
        dispatch!(self, s => s.sync())
    }

    fn base_url(&self) -> String {
        dispatch!(self, s => s.base_url())
    }

    fn url_for_file(&self, at: &ProjectRef, filename: &str) -> String {
        dispatch!(self, s => s.url_for_file(at, filename))
    }

    fn url_for_project(&self, at: &ProjectRef) -> String {
        dispatch!(self, s => s.url_for_project(at))
    }

    fn default_local_path(&self) -> StoreResult<PathBuf> {
        dispatch!(self, s => s.default_local_path())
    }

    fn troubleshoot(&self) -> StoreResult<Vec<String>> {
        dispatch!(self, s => s.troubleshoot())
    }

    fn staging_dir(&self) -> Option<&Path> {
        dispatch!(self, s => s.staging_dir())
    }

    fn release(&mut self, exit: ScopeExit) -> StoreResult<()> {
        dispatch!(self, s => s.release(exit))
    }
}
