use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use dream_store::StoreOptions;
use dream_types::FixedIdentity;
use serde::{Deserialize, Serialize};

use crate::cli::Cli;

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "dream.toml";

pub const ENV_BASE_DIR: &str = "DREAMER_BASE_DIR";
pub const ENV_VAR_FILES: &str = "DREAMER_VAR_FILES";
pub const ENV_AUTHOR: &str = "DREAMER_AUTHOR";

/// Settings of the `dream` binary.
///
/// Sources are layered: defaults, then the TOML file, then `DREAMER_*`
/// environment variables, then command-line flags.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub store: StoreSection,
    pub terraform: TerraformSection,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    /// Local directory or `scheme://bucket/prefix`.
    pub base_dir: Option<String>,
    pub staging_dir: Option<PathBuf>,
    pub author: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerraformSection {
    pub var_files: Vec<PathBuf>,
    pub chdir: Option<PathBuf>,
}

impl CliConfig {
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        toml::from_str(content).context("Failed to parse TOML config")
    }

    pub fn from_toml_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config: {}", path.display()))?;
        tracing::debug!("Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Load an explicit config file, or `dream.toml` if one exists.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        match explicit {
            Some(path) => Self::from_toml_file(path),
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.is_file() {
                    Self::from_toml_file(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Overlay `DREAMER_*` variables taken from `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let set = |name: &str| lookup(name).filter(|v| !v.is_empty());

        if let Some(base) = set(ENV_BASE_DIR) {
            self.store.base_dir = Some(base);
        }
        if let Some(files) = set(ENV_VAR_FILES) {
            self.terraform.var_files = std::env::split_paths(&files).collect();
        }
        if let Some(author) = set(ENV_AUTHOR) {
            self.store.author = Some(author);
        }
    }

    pub fn apply_flags(&mut self, cli: &Cli) {
        if let Some(base) = &cli.base_dir {
            self.store.base_dir = Some(base.clone());
        }
        if let Some(dir) = &cli.staging_dir {
            self.store.staging_dir = Some(dir.clone());
        }
        if let Some(author) = &cli.author {
            self.store.author = Some(author.clone());
        }
    }

    /// Build the effective configuration for `cli` from all sources.
    pub fn resolve(cli: &Cli) -> anyhow::Result<Self> {
        let mut config = Self::load(cli.config.as_deref())?;
        config.apply_env(|name| std::env::var(name).ok());
        config.apply_flags(cli);
        Ok(config)
    }

    pub fn base_dir(&self) -> anyhow::Result<&str> {
        match self.store.base_dir.as_deref() {
            Some(base) if !base.trim().is_empty() => Ok(base),
            _ => bail!(
                "no base directory configured (set [store] base_dir, {ENV_BASE_DIR} or --base-dir)"
            ),
        }
    }

    pub fn store_options(&self) -> StoreOptions {
        let mut options = StoreOptions::default();
        if let Some(root) = &self.store.staging_dir {
            options = options.with_staging_root(root.clone());
        }
        if let Some(author) = &self.store.author {
            options = options.with_identity(FixedIdentity::new(author.clone()));
        }
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use dream_types::IdentityProvider;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn default_config_has_no_base() {
        let config = CliConfig::default();
        assert!(config.base_dir().is_err());
        assert!(config.terraform.var_files.is_empty());
    }

    #[test]
    fn parse_full_file() {
        let config = CliConfig::from_toml(
            r#"
            [store]
            base_dir = "file:///srv/state/envs"
            staging_dir = "/var/tmp"
            author = "ci@runner"

            [terraform]
            var_files = ["common.tfvars", "prod.tfvars"]
            chdir = "infra"
            "#,
        )
        .unwrap();
        assert_eq!(config.base_dir().unwrap(), "file:///srv/state/envs");
        assert_eq!(config.store.staging_dir, Some(PathBuf::from("/var/tmp")));
        assert_eq!(config.terraform.var_files.len(), 2);
        assert_eq!(config.terraform.chdir, Some(PathBuf::from("infra")));
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config = CliConfig::from_toml("[store]\nbase_dir = \"/srv/state\"\n").unwrap();
        assert_eq!(config.base_dir().unwrap(), "/srv/state");
        assert_eq!(config.terraform, TerraformSection::default());
    }

    #[test]
    fn malformed_file_is_an_error() {
        assert!(CliConfig::from_toml("[store\nbase_dir = 1").is_err());
    }

    #[test]
    fn load_reads_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[store]\nauthor = \"alice@laptop\"\n").unwrap();
        let config = CliConfig::load(Some(&path)).unwrap();
        assert_eq!(config.store.author.as_deref(), Some("alice@laptop"));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(CliConfig::load(Some(&dir.path().join("absent.toml"))).is_err());
    }

    #[test]
    fn environment_overrides_file() {
        let mut config = CliConfig::from_toml("[store]\nbase_dir = \"/from/file\"\n").unwrap();
        config.apply_env(env(&[
            (ENV_BASE_DIR, "mem://env"),
            (ENV_VAR_FILES, "a.tfvars:b.tfvars"),
            (ENV_AUTHOR, "bob@ci"),
        ]));
        assert_eq!(config.base_dir().unwrap(), "mem://env");
        assert_eq!(
            config.terraform.var_files,
            vec![PathBuf::from("a.tfvars"), PathBuf::from("b.tfvars")]
        );
        assert_eq!(config.store.author.as_deref(), Some("bob@ci"));
    }

    #[test]
    fn empty_environment_values_are_ignored() {
        let mut config = CliConfig::from_toml("[store]\nbase_dir = \"/from/file\"\n").unwrap();
        config.apply_env(env(&[(ENV_BASE_DIR, "")]));
        assert_eq!(config.base_dir().unwrap(), "/from/file");
    }

    #[test]
    fn flags_override_environment() {
        let mut config = CliConfig::default();
        config.apply_env(env(&[(ENV_BASE_DIR, "/from/env"), (ENV_AUTHOR, "env@host")]));
        let cli = Cli::try_parse_from([
            "dream", "-b", "/from/flag", "--staging-dir", "/scratch", "modules",
        ])
        .unwrap();
        config.apply_flags(&cli);
        assert_eq!(config.base_dir().unwrap(), "/from/flag");
        assert_eq!(config.store.staging_dir, Some(PathBuf::from("/scratch")));
        assert_eq!(config.store.author.as_deref(), Some("env@host"));
    }

    #[test]
    fn store_options_carry_author_and_staging() {
        let mut config = CliConfig::default();
        config.store.author = Some("carol@box".to_string());
        config.store.staging_dir = Some(PathBuf::from("/scratch"));
        let options = config.store_options();
        assert_eq!(options.identity.whoami(), "carol@box");
        assert_eq!(options.staging_root, Some(PathBuf::from("/scratch")));
    }
}
