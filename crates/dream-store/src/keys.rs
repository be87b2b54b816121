//! Key and location addressing.
//!
//! Object keys for stored files are `<prefix><module>/<project>/<filename>`;
//! the metadata record of a project lives at `<prefix><module>/<project>`.
//! Because names can never contain `/`, a file key always has three segments
//! after the prefix and a metadata key exactly two, so the two keyspaces
//! cannot collide even when a file is named like its project.

use std::fmt;

use dream_types::ProjectRef;

use crate::error::{StoreError, StoreResult};

/// Returns `true` if `location` starts with a `scheme://` marker and should
/// therefore be served by an object-store backend.
pub fn is_remote_location(location: &str) -> bool {
    match location.split_once("://") {
        Some((scheme, _)) => {
            !scheme.is_empty()
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}

/// A parsed `scheme://bucket[/prefix]` location.
///
/// For the `file` scheme the whole remainder is the bucket root directory
/// and the prefix is always empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BucketUrl {
    pub scheme: String,
    pub bucket: String,
    pub prefix: String,
}

impl BucketUrl {
    pub fn parse(location: &str) -> StoreResult<Self> {
        let (scheme, rest) = location
            .split_once("://")
            .filter(|_| is_remote_location(location))
            .ok_or_else(|| {
                StoreError::Configuration(format!("not an object store location: {location}"))
            })?;

        let scheme = scheme.to_ascii_lowercase();
        let rest = rest.trim_end_matches('/');

        if scheme == "file" {
            if rest.is_empty() {
                return Err(StoreError::Configuration(format!(
                    "missing bucket directory in {location}"
                )));
            }
            return Ok(Self {
                scheme,
                bucket: rest.to_string(),
                prefix: String::new(),
            });
        }

        let (bucket, prefix) = match rest.split_once('/') {
            Some((bucket, prefix)) => (bucket, format!("{prefix}/")),
            None => (rest, String::new()),
        };
        if bucket.is_empty() {
            return Err(StoreError::Configuration(format!(
                "missing bucket name in {location}"
            )));
        }

        Ok(Self {
            scheme,
            bucket: bucket.to_string(),
            prefix,
        })
    }

    /// `scheme://bucket/` followed by `key`.
    pub fn url_for_key(&self, key: &str) -> String {
        format!("{}://{}/{}", self.scheme, self.bucket, key)
    }
}

impl fmt::Display for BucketUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}/{}", self.scheme, self.bucket, self.prefix)
    }
}

/// Shape of a key found in a bucket listing, after the prefix is stripped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyShape<'a> {
    /// A metadata record: `<module>/<project>`.
    Project { module: &'a str, project: &'a str },
    /// A stored file: `<module>/<project>/<filename>`.
    File {
        module: &'a str,
        project: &'a str,
        filename: &'a str,
    },
}

/// Maps project references and filenames to bucket keys under a fixed
/// prefix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeySpace {
    prefix: String,
}

impl KeySpace {
    /// Create a keyspace. A non-empty prefix is normalized to end in exactly
    /// one `/`.
    pub fn new(prefix: &str) -> Self {
        let trimmed = prefix.trim_end_matches('/');
        let prefix = if trimmed.is_empty() {
            String::new()
        } else {
            format!("{trimmed}/")
        };
        Self { prefix }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn file_key(&self, at: &ProjectRef, filename: &str) -> String {
        format!(
            "{}{}/{}/{}",
            self.prefix,
            at.module(),
            at.project(),
            filename
        )
    }

    /// Key of the project's metadata record.
    pub fn project_key(&self, at: &ProjectRef) -> String {
        format!("{}{}/{}", self.prefix, at.module(), at.project())
    }

    /// Listing prefix covering every file of the project.
    pub fn files_prefix(&self, at: &ProjectRef) -> String {
        format!("{}/", self.project_key(at))
    }

    /// Listing prefix covering every key of the module.
    pub fn module_prefix(&self, module: &str) -> String {
        format!("{}{}/", self.prefix, module)
    }

    /// Classify a full bucket key. Keys outside the prefix, and keys of any
    /// other shape, yield `None`.
    pub fn classify<'a>(&self, key: &'a str) -> Option<KeyShape<'a>> {
        let rest = key.strip_prefix(self.prefix.as_str())?;
        let mut parts = rest.splitn(3, '/');
        let module = parts.next().filter(|s| !s.is_empty())?;
        let project = parts.next().filter(|s| !s.is_empty())?;
        match parts.next() {
            None => Some(KeyShape::Project { module, project }),
            Some(filename) if !filename.is_empty() && !filename.contains('/') => {
                Some(KeyShape::File {
                    module,
                    project,
                    filename,
                })
            }
            Some(_) => None,
        }
    }
}
