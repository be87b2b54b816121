use thiserror::Error;

/// Errors produced by type construction and decoding.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid {kind} name {name:?}: {reason}")]
    InvalidName {
        kind: &'static str,
        name: String,
        reason: String,
    },

    #[error("serialization error: {0}")]
    Serialization(String),
}
