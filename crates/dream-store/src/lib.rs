//! Versioned project store for Dreamer state.
//!
//! State files are grouped by `(module, project)` and reached through the
//! [`ProjectStore`] contract. Two backends implement it:
//!
//! - [`LocalStore`]: a plain directory tree, every write immediately durable
//! - [`ObjectStore`]: a remote bucket behind a private staging directory,
//!   with optimistic concurrency on sync
//!
//! [`Backend::from_location`] picks one from a base location string, and
//! [`scoped`] wraps a run so that sync and cleanup happen on every exit path.
//!
//! # Sync protocol (object store)
//!
//! 1. `open` records the project's remote version (absent for a new project).
//! 2. `read` fetches into staging on first use; `write` does the same, starts
//!    an empty file if the object is missing, and marks it dirty.
//! 3. `sync` re-reads the remote version. If it moved, the sync fails with
//!    [`StoreError::ConcurrentModification`] and nothing is uploaded.
//!    Otherwise every dirty file is uploaded and the version bumped by one.
//!
//! ```no_run
//! use dream_store::{scoped, Backend, ProjectStore, StoreOptions, StoreResult};
//!
//! let mut store = Backend::from_location("mem://state/envs", &StoreOptions::default())?;
//! scoped(&mut store, |s| -> StoreResult<()> {
//!     s.open("db", "prod")?;
//!     let path = s.write("terraform.tfstate")?;
//!     std::fs::write(path, b"{}")?;
//!     Ok(())
//! })?;
//! # Ok::<(), dream_store::StoreError>(())
//! ```

pub mod backend;
pub mod bucket;
pub mod error;
pub mod keys;
pub mod local;
pub mod object;
pub mod options;
pub mod scope;
pub mod staging;
pub mod traits;

pub use backend::Backend;
pub use bucket::{Bucket, BucketError, DirBucket, InMemoryBucket, ObjectMetadata};
pub use error::{StoreError, StoreResult};
pub use keys::{is_remote_location, BucketUrl, KeySpace};
pub use local::LocalStore;
pub use object::ObjectStore;
pub use options::StoreOptions;
pub use scope::scoped;
pub use traits::{BackendKind, ProjectStore, ScopeExit};
