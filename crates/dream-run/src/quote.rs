/// Quote `s` for safe use as a single POSIX shell word.
///
/// Strings made only of `[A-Za-z0-9_@%+=:,./-]` are returned unchanged, the
/// empty string becomes `''`, and anything else is wrapped in single quotes
/// with embedded single quotes spelled `'"'"'`.
pub fn quote(s: &str) -> String {
    if s.is_empty() {
        return "''".to_string();
    }
    let safe = s
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "_@%+=:,./-".contains(c));
    if safe {
        return s.to_string();
    }
    format!("'{}'", s.replace('\'', r#"'"'"'"#))
}

/// Quote each word and join them with spaces.
pub fn join_quoted<I, S>(words: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    words
        .into_iter()
        .map(|w| quote(w.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}
