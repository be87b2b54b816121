use std::fmt;

/// Source of the author identity recorded with every upload and every
/// metadata record.
///
/// Backends receive an identity provider at construction instead of looking
/// up the current user themselves, so tests can substitute a fixed author.
pub trait IdentityProvider: Send + Sync + fmt::Debug {
    /// The author string, conventionally `user@host`.
    fn whoami(&self) -> String;
}

/// Identity derived from the process environment.
///
/// The user comes from `USER`, `USERNAME` or `LOGNAME` (first one set). The
/// host is the first non-empty value of `HOSTNAME`, the kernel node name
/// (`/proc/sys/kernel/hostname`, what `uname -n` prints), `/etc/hostname`
/// and the output of `hostname`. Only when all of them fail do the parts fall
/// back to `unknown` and `localhost`; use [`FixedIdentity`] where that
/// matters.
#[derive(Clone, Debug, Default)]
pub struct SystemIdentity;

const FALLBACK_HOST: &str = "localhost";

fn first_nonempty<I>(candidates: I) -> Option<String>
where
    I: IntoIterator<Item = Option<String>>,
{
    candidates
        .into_iter()
        .flatten()
        .map(|h| h.trim().to_string())
        .find(|h| !h.is_empty())
}

impl SystemIdentity {
    fn user() -> String {
        ["USER", "USERNAME", "LOGNAME"]
            .iter()
            .find_map(|var| std::env::var(var).ok().filter(|v| !v.trim().is_empty()))
            .unwrap_or_else(|| "unknown".to_string())
    }

    fn host() -> String {
        // Tried in order; `hostname` only runs when every file is missing.
        let sources: [fn() -> Option<String>; 4] = [
            || std::env::var("HOSTNAME").ok(),
            || std::fs::read_to_string("/proc/sys/kernel/hostname").ok(),
            || std::fs::read_to_string("/etc/hostname").ok(),
            || {
                std::process::Command::new("hostname")
                    .output()
                    .ok()
                    .filter(|out| out.status.success())
                    .and_then(|out| String::from_utf8(out.stdout).ok())
            },
        ];
        first_nonempty(sources.iter().map(|source| source()))
            .unwrap_or_else(|| FALLBACK_HOST.to_string())
    }
}

impl IdentityProvider for SystemIdentity {
    fn whoami(&self) -> String {
        format!("{}@{}", Self::user(), Self::host())
    }
}

/// A constant identity, for tests and for CI runners that should sign their
/// syncs with a configured name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FixedIdentity(String);

impl FixedIdentity {
    pub fn new(author: impl Into<String>) -> Self {
        Self(author.into())
    }
}

impl IdentityProvider for FixedIdentity {
    fn whoami(&self) -> String {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_identity_is_constant() {
        let id = FixedIdentity::new("deploy@ci");
        assert_eq!(id.whoami(), "deploy@ci");
        assert_eq!(id.whoami(), id.whoami());
    }

    #[test]
    fn system_identity_has_user_and_host() {
        let who = SystemIdentity.whoami();
        let (user, host) = who.split_once('@').expect("user@host");
        assert!(!user.is_empty());
        assert!(!host.is_empty());
    }

    #[test]
    fn host_lookup_takes_first_nonempty_source() {
        let pick = |c: Vec<Option<&str>>| first_nonempty(c.into_iter().map(|v| v.map(String::from)));
        assert_eq!(pick(vec![None, Some("  \n"), Some("node-7\n"), Some("other")]), Some("node-7".into()));
        assert_eq!(pick(vec![Some("from-env"), Some("node-7")]), Some("from-env".into()));
        assert_eq!(pick(vec![None, Some("")]), None);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn system_host_is_the_kernel_node_name_without_env() {
        let node = std::fs::read_to_string("/proc/sys/kernel/hostname").unwrap();
        if std::env::var("HOSTNAME").is_err() && !node.trim().is_empty() {
            assert_eq!(SystemIdentity::host(), node.trim());
        }
    }

    #[test]
    fn providers_are_object_safe() {
        let providers: Vec<Box<dyn IdentityProvider>> =
            vec![Box::new(SystemIdentity), Box::new(FixedIdentity::new("a@b"))];
        assert_eq!(providers[1].whoami(), "a@b");
    }
}
