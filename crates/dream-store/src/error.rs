use dream_types::{ProjectRef, TypeError};

use crate::bucket::BucketError;

fn describe_version(version: &Option<u64>) -> String {
    match version {
        Some(v) => format!("version {v}"),
        None => "no remote state".to_string(),
    }
}

/// Errors from project store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested file does not exist in the backend.
    #[error("file not found: {location}")]
    NotFound { location: String },

    /// The remote state changed between `open` and `sync`. Nothing was
    /// uploaded; the operator has to re-run against the new state.
    #[error(
        "remote state of {project} was modified during this run (opened at {}, found {})",
        describe_version(.expected),
        describe_version(.found)
    )]
    ConcurrentModification {
        project: ProjectRef,
        expected: Option<u64>,
        found: Option<u64>,
    },

    /// Caller misuse: missing default project, invalid name, unsupported
    /// location and the like.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Any other failure talking to the remote backend.
    #[error("transport error: {0}")]
    Transport(String),

    /// Non-recursive deletion of a project that still holds files.
    #[error("project {project} is not empty")]
    ProjectNotEmpty { project: ProjectRef },

    /// I/O error from the local filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A metadata record could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    pub fn not_found(location: impl Into<String>) -> Self {
        Self::NotFound {
            location: location.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<TypeError> for StoreError {
    fn from(err: TypeError) -> Self {
        match err {
            TypeError::InvalidName { .. } => Self::Configuration(err.to_string()),
            TypeError::Serialization(msg) => Self::Serialization(msg),
        }
    }
}

impl From<BucketError> for StoreError {
    fn from(err: BucketError) -> Self {
        match err {
            BucketError::NoSuchKey(key) => Self::NotFound { location: key },
            BucketError::Transport(msg) => Self::Transport(msg),
            BucketError::Io(e) => Self::Transport(e.to_string()),
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
