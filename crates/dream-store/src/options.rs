use std::path::PathBuf;
use std::sync::Arc;

use dream_types::{IdentityProvider, SystemIdentity};

/// Prefix of staging directory names.
pub const DEFAULT_STAGING_PREFIX: &str = "dreamer-";

/// Construction-time settings shared by all backends.
///
/// Only the object-store backend reads most of these; the local backend
/// ignores them.
#[derive(Clone, Debug)]
pub struct StoreOptions {
    /// Parent of the staging directory. `None` means the system temp
    /// directory.
    pub staging_root: Option<PathBuf>,
    /// Name prefix of the staging directory.
    pub staging_prefix: String,
    /// Author attached to uploads and metadata records.
    pub identity: Arc<dyn IdentityProvider>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            staging_root: None,
            staging_prefix: DEFAULT_STAGING_PREFIX.to_string(),
            identity: Arc::new(SystemIdentity),
        }
    }
}

impl StoreOptions {
    pub fn with_identity(mut self, identity: impl IdentityProvider + 'static) -> Self {
        self.identity = Arc::new(identity);
        self
    }

    pub fn with_staging_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.staging_root = Some(root.into());
        self
    }
}
