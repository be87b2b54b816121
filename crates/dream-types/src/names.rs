//! Name validation for modules, projects and stored files.
//!
//! Names become path segments on disk and key segments in a bucket, so they
//! must be single flat components:
//! - Must be non-empty
//! - Must not contain `/` or `\`
//! - Must not contain NUL or any other control character
//! - Must not be `.` or `..`
//!
//! Leading dots are allowed (`.terraform.lock.hcl` is a perfectly good state
//! file name).

use crate::error::TypeError;

/// Characters that are forbidden anywhere in a name.
const FORBIDDEN_CHARS: &[char] = &['/', '\\'];

fn invalid(kind: &'static str, name: &str, reason: impl Into<String>) -> TypeError {
    TypeError::InvalidName {
        kind,
        name: name.to_string(),
        reason: reason.into(),
    }
}

fn validate(kind: &'static str, name: &str) -> Result<(), TypeError> {
    if name.is_empty() {
        return Err(invalid(kind, name, "must not be empty"));
    }

    for ch in FORBIDDEN_CHARS {
        if name.contains(*ch) {
            return Err(invalid(
                kind,
                name,
                format!("contains forbidden character: {ch:?}"),
            ));
        }
    }

    if let Some(ch) = name.chars().find(|c| c.is_control()) {
        return Err(invalid(
            kind,
            name,
            format!("contains control character: {ch:?}"),
        ));
    }

    if name == "." || name == ".." {
        return Err(invalid(kind, name, "must not be '.' or '..'"));
    }

    Ok(())
}

/// Validate a module or project name.
///
/// # Examples
///
/// ```
/// use dream_types::names::validate_name;
///
/// assert!(validate_name("db").is_ok());
/// assert!(validate_name("prod-eu-1").is_ok());
/// assert!(validate_name("").is_err());
/// assert!(validate_name("a/b").is_err());
/// ```
pub fn validate_name(name: &str) -> Result<(), TypeError> {
    validate("module/project", name)
}

/// Validate a stored file name. Same rules as module and project names.
pub fn validate_filename(name: &str) -> Result<(), TypeError> {
    validate("file", name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_simple_names() {
        assert!(validate_name("db").is_ok());
        assert!(validate_name("prod").is_ok());
        assert!(validate_name("my-env_2").is_ok());
        assert!(validate_name("v1.0").is_ok());
    }

    #[test]
    fn valid_state_filenames() {
        assert!(validate_filename("db.tfstate").is_ok());
        assert!(validate_filename("db.tfstate.backup").is_ok());
        assert!(validate_filename(".terraform.lock.hcl").is_ok());
        assert!(validate_filename("hosts").is_ok());
    }

    #[test]
    fn reject_empty_name() {
        assert!(validate_name("").is_err());
        assert!(validate_filename("").is_err());
    }

    #[test]
    fn reject_separators() {
        assert!(validate_name("a/b").is_err());
        assert!(validate_filename("nested/file").is_err());
        assert!(validate_filename("a\\b").is_err());
    }

    #[test]
    fn reject_dot_entries() {
        assert!(validate_name(".").is_err());
        assert!(validate_name("..").is_err());
        assert!(validate_filename("..").is_err());
    }

    #[test]
    fn reject_control_characters() {
        assert!(validate_name("has\nnewline").is_err());
        assert!(validate_filename("nul\0byte").is_err());
    }

    #[test]
    fn error_names_the_kind() {
        let err = validate_filename("a/b").unwrap_err();
        assert!(err.to_string().contains("file"));
        let err = validate_name("").unwrap_err();
        assert!(err.to_string().contains("module/project"));
    }
}
