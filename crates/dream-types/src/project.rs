use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::names::validate_name;

/// A validated `(module, project)` pair.
///
/// Both halves are checked with [`validate_name`] on construction, so a
/// `ProjectRef` can always be used as a path segment pair or as the two
/// leading segments of a bucket key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProjectRef {
    module: String,
    project: String,
}

impl ProjectRef {
    /// Build a project reference, validating both names.
    pub fn new(module: impl Into<String>, project: impl Into<String>) -> Result<Self, TypeError> {
        let module = module.into();
        let project = project.into();
        validate_name(&module)?;
        validate_name(&project)?;
        Ok(Self { module, project })
    }

    /// The module name.
    pub fn module(&self) -> &str {
        &self.module
    }

    /// The project name.
    pub fn project(&self) -> &str {
        &self.project
    }
}

impl fmt::Display for ProjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.module, self.project)
    }
}

/// Per-project version record kept next to a project's files by remote
/// backends.
///
/// The record is the sole content of its key and is encoded as a JSON object
/// with exactly two fields:
///
/// ```json
/// {"version": 3, "author": "deploy@ci-runner-7"}
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetadataRecord {
    /// Number of successful syncs minus one. The first sync writes `0`.
    pub version: u64,
    /// `user@host` of whoever performed the sync.
    pub author: String,
}

impl MetadataRecord {
    pub fn new(version: u64, author: impl Into<String>) -> Self {
        Self {
            version,
            author: author.into(),
        }
    }

    /// The record that follows `previous`: version `0` when there is no
    /// previous record, otherwise one past it. A record already at
    /// `u64::MAX` has no successor.
    pub fn next(previous: Option<u64>, author: impl Into<String>) -> Result<Self, TypeError> {
        let version = match previous {
            None => 0,
            Some(v) => v.checked_add(1).ok_or_else(|| {
                TypeError::Serialization(format!("metadata version {v} cannot be incremented"))
            })?,
        };
        Ok(Self::new(version, author))
    }

    pub fn to_json(&self) -> Result<Vec<u8>, TypeError> {
        serde_json::to_vec(self).map_err(|e| TypeError::Serialization(e.to_string()))
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, TypeError> {
        serde_json::from_slice(bytes).map_err(|e| TypeError::Serialization(e.to_string()))
    }
}
