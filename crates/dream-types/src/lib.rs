//! Foundation types for the Dreamer state store.
//!
//! Every other Dreamer crate depends on `dream-types`. The types here carry no
//! I/O of their own; they describe *what* is stored, not *where*.
//!
//! # Key Types
//!
//! - [`ProjectRef`]: a validated `(module, project)` pair
//! - [`MetadataRecord`]: the per-project `{version, author}` record used for
//!   optimistic concurrency by remote backends
//! - [`IdentityProvider`]: source of the `user@host` author string attached
//!   to uploads
//!
//! Name rules live in [`names`].

pub mod error;
pub mod identity;
pub mod names;
pub mod project;

pub use error::TypeError;
pub use identity::{FixedIdentity, IdentityProvider, SystemIdentity};
pub use names::{validate_filename, validate_name};
pub use project::{MetadataRecord, ProjectRef};
