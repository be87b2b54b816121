//! Immutable run configurations.
//!
//! A [`RunConfig`] is a list of arguments plus an ordered set of environment
//! variables, rendered into a single shell command line. Builders return a
//! new value and leave `self` untouched, so a base configuration can be
//! shared between steps.

use std::ops::BitOr;

use crate::error::{RunError, RunResult};
use crate::quote::quote;

/// Value of an environment variable in a run configuration.
///
/// A nested configuration renders as its arguments only. This is how
/// tool-specific argument strings such as `ANSIBLE_SSH_ARGS` are built up
/// step by step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EnvValue {
    Str(String),
    Nested(RunConfig),
}

impl EnvValue {
    fn render(&self) -> String {
        match self {
            Self::Str(s) => s.clone(),
            Self::Nested(cfg) => cfg.render_arguments(),
        }
    }
}

impl From<&str> for EnvValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for EnvValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<RunConfig> for EnvValue {
    fn from(cfg: RunConfig) -> Self {
        Self::Nested(cfg)
    }
}

/// Insertion-ordered environment. Re-setting a name keeps its position.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Environment(Vec<(String, EnvValue)>);

impl Environment {
    pub fn get(&self, name: &str) -> Option<&EnvValue> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &EnvValue)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v))
    }

    fn set(&mut self, name: String, value: EnvValue) {
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value)),
        }
    }

    /// Right-biased union: names from `other` overwrite ours in place, new
    /// names are appended.
    fn merged(&self, other: &Environment) -> Environment {
        let mut out = self.clone();
        for (name, value) in &other.0 {
            out.set(name.clone(), value.clone());
        }
        out
    }

    fn with_child_arguments(&self, name: &str, arguments: &[&str]) -> RunResult<Environment> {
        let child = match self.get(name) {
            None => return Err(RunError::MissingEnvironment(name.to_string())),
            Some(EnvValue::Str(_)) => return Err(RunError::NotNested(name.to_string())),
            Some(EnvValue::Nested(child)) => child.with_arguments(arguments),
        };
        let mut out = self.clone();
        out.set(name.to_string(), EnvValue::Nested(child));
        Ok(out)
    }

    /// `A='a' B='b c'`
    fn render(&self) -> String {
        self.0
            .iter()
            .map(|(name, value)| format!("{name}={}", quote(&value.render())))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn join_nonempty<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    parts
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunConfig {
    arguments: Vec<String>,
    environment: Environment,
}

impl RunConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn with_arguments<S: AsRef<str>>(&self, arguments: &[S]) -> Self {
        let mut out = self.clone();
        out.arguments
            .extend(arguments.iter().map(|a| a.as_ref().to_string()));
        out
    }

    pub fn with_environment(&self, name: impl Into<String>, value: impl Into<EnvValue>) -> Self {
        let mut out = self.clone();
        out.environment.set(name.into(), value.into());
        out
    }

    /// Append arguments to the nested configuration held in `name`.
    pub fn with_child_arguments(&self, name: &str, arguments: &[&str]) -> RunResult<Self> {
        Ok(Self {
            arguments: self.arguments.clone(),
            environment: self.environment.with_child_arguments(name, arguments)?,
        })
    }

    /// Arguments joined by spaces, as they appear on the command line.
    /// Arguments are inserted verbatim; quote them when building.
    pub fn render_arguments(&self) -> String {
        self.arguments.join(" ")
    }

    pub fn render_environment(&self) -> String {
        self.environment.render()
    }

    /// `[env] command [arguments] [suffix]`. Neither `command` nor `suffix`
    /// is parsed, so `command` may be `terraform plan` and `suffix` may be a
    /// redirection.
    pub fn cmdline(&self, command: &str, suffix: Option<&str>) -> String {
        join_nonempty([
            self.render_environment().as_str(),
            command,
            self.render_arguments().as_str(),
            suffix.unwrap_or_default(),
        ])
    }

    /// Union of two configurations: arguments concatenated, environment
    /// right-biased.
    pub fn merge(&self, other: &RunConfig) -> Self {
        Self {
            arguments: self.arguments.iter().chain(&other.arguments).cloned().collect(),
            environment: self.environment.merged(&other.environment),
        }
    }
}

impl BitOr for &RunConfig {
    type Output = RunConfig;

    fn bitor(self, rhs: Self) -> RunConfig {
        self.merge(rhs)
    }
}

/// Run configuration for the planner, whose global flags (such as `-chdir`)
/// must come before the subcommand:
///
/// ```text
/// [environment] <command> [global arguments] <subcommand> [arguments] [suffix]
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TerraformRunConfig {
    global_arguments: Vec<String>,
    arguments: Vec<String>,
    environment: Environment,
}

impl TerraformRunConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn global_arguments(&self) -> &[String] {
        &self.global_arguments
    }

    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn with_global_arguments<S: AsRef<str>>(&self, arguments: &[S]) -> Self {
        let mut out = self.clone();
        out.global_arguments
            .extend(arguments.iter().map(|a| a.as_ref().to_string()));
        out
    }

    pub fn with_arguments<S: AsRef<str>>(&self, arguments: &[S]) -> Self {
        let mut out = self.clone();
        out.arguments
            .extend(arguments.iter().map(|a| a.as_ref().to_string()));
        out
    }

    pub fn with_environment(&self, name: impl Into<String>, value: impl Into<EnvValue>) -> Self {
        let mut out = self.clone();
        out.environment.set(name.into(), value.into());
        out
    }

    pub fn with_child_arguments(&self, name: &str, arguments: &[&str]) -> RunResult<Self> {
        Ok(Self {
            global_arguments: self.global_arguments.clone(),
            arguments: self.arguments.clone(),
            environment: self.environment.with_child_arguments(name, arguments)?,
        })
    }

    pub fn cmdline(&self, command: &str, subcommand: &str, suffix: Option<&str>) -> String {
        join_nonempty([
            self.environment.render().as_str(),
            command,
            self.global_arguments.join(" ").as_str(),
            subcommand,
            self.arguments.join(" ").as_str(),
            suffix.unwrap_or_default(),
        ])
    }

    /// Merge a plain run configuration: its arguments go after ours, its
    /// environment wins. Global arguments are untouched.
    pub fn merge(&self, other: &RunConfig) -> Self {
        Self {
            global_arguments: self.global_arguments.clone(),
            arguments: self.arguments.iter().chain(&other.arguments).cloned().collect(),
            environment: self.environment.merged(&other.environment),
        }
    }

    /// Merge another planner configuration, global arguments included.
    pub fn merge_terraform(&self, other: &TerraformRunConfig) -> Self {
        Self {
            global_arguments: self
                .global_arguments
                .iter()
                .chain(&other.global_arguments)
                .cloned()
                .collect(),
            arguments: self.arguments.iter().chain(&other.arguments).cloned().collect(),
            environment: self.environment.merged(&other.environment),
        }
    }
}

impl<'a> BitOr<&'a RunConfig> for &TerraformRunConfig {
    type Output = TerraformRunConfig;

    fn bitor(self, rhs: &'a RunConfig) -> TerraformRunConfig {
        self.merge(rhs)
    }
}
