//! Planner step command lines.
//!
//! Each step takes its state and plan files from the project store as plain
//! paths; the caller decides which of them must exist already.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::config::TerraformRunConfig;
use crate::quote::quote;

pub const TERRAFORM: &str = "terraform";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    Plan,
    Apply,
    Output,
    Destroy,
}

impl Step {
    pub const ALL: [Step; 4] = [Step::Plan, Step::Apply, Step::Output, Step::Destroy];

    pub fn as_str(self) -> &'static str {
        match self {
            Step::Plan => "plan",
            Step::Apply => "apply",
            Step::Output => "output",
            Step::Destroy => "destroy",
        }
    }

    /// Whether the step rewrites the state file.
    pub fn writes_state(self) -> bool {
        matches!(self, Step::Plan | Step::Apply | Step::Destroy)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Step {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Step::ALL
            .into_iter()
            .find(|step| step.as_str() == s)
            .ok_or_else(|| format!("unknown step {s:?} (expected plan, apply, output or destroy)"))
    }
}

/// Store-backed files a step works on.
#[derive(Clone, Debug)]
pub struct StepFiles {
    pub state: PathBuf,
    pub plan: Option<PathBuf>,
}

/// State file name for a module, `<module>.tfstate`.
pub fn state_filename(module: &str) -> String {
    format!("{module}.tfstate")
}

/// Plan file name for a module, `<module>.tfplan`.
pub fn plan_filename(module: &str) -> String {
    format!("{module}.tfplan")
}

fn flag(name: &str, path: &Path) -> String {
    format!("-{name}={}", quote(&path.display().to_string()))
}

/// Base planner configuration: `-chdir` and variable files.
pub fn base_config(chdir: Option<&Path>, var_files: &[PathBuf]) -> TerraformRunConfig {
    let mut cfg = TerraformRunConfig::new();
    if let Some(dir) = chdir {
        cfg = cfg.with_global_arguments(&[flag("chdir", dir)]);
    }
    let vars: Vec<String> = var_files.iter().map(|f| flag("var-file", f)).collect();
    cfg.with_arguments(&vars)
}

/// Compose the command line of `step`.
///
/// `apply` and `output` accept neither variable files nor the general
/// environment, so they start from the global arguments of `base` only.
pub fn step_cmdline(step: Step, base: &TerraformRunConfig, files: &StepFiles) -> String {
    let bare = TerraformRunConfig::new().with_global_arguments(base.global_arguments());
    let cfg = match step {
        Step::Plan => {
            let mut args = vec![flag("state", &files.state)];
            if let Some(plan) = &files.plan {
                args.push(flag("out", plan));
            }
            base.with_arguments(&args)
        }
        Step::Apply => {
            let mut args = vec![flag("state-out", &files.state)];
            if let Some(plan) = &files.plan {
                args.push(quote(&plan.display().to_string()));
            }
            bare.with_arguments(&args)
        }
        Step::Output => bare.with_arguments(&[
            flag("state", &files.state),
            "-no-color".to_string(),
            "-json".to_string(),
        ]),
        Step::Destroy => base.with_arguments(&[flag("state", &files.state)]),
    };
    cfg.cmdline(TERRAFORM, step.as_str(), None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(plan: bool) -> StepFiles {
        StepFiles {
            state: PathBuf::from("/stage/db/prod/db.tfstate"),
            plan: plan.then(|| PathBuf::from("/stage/db/prod/db.tfplan")),
        }
    }

    fn base() -> TerraformRunConfig {
        base_config(Some(Path::new("infra/db")), &[PathBuf::from("prod.tfvars")])
    }

    #[test]
    fn step_names_round_trip() {
        for step in Step::ALL {
            assert_eq!(step.as_str().parse::<Step>().unwrap(), step);
        }
        assert!("init".parse::<Step>().is_err());
        assert!(!Step::Output.writes_state());
    }

    #[test]
    fn filenames() {
        assert_eq!(state_filename("db"), "db.tfstate");
        assert_eq!(plan_filename("db"), "db.tfplan");
    }

    #[test]
    fn plan_uses_vars_state_and_out() {
        assert_eq!(
            step_cmdline(Step::Plan, &base(), &files(true)),
            "terraform -chdir=infra/db plan -var-file=prod.tfvars \
             -state=/stage/db/prod/db.tfstate -out=/stage/db/prod/db.tfplan"
        );
    }

    #[test]
    fn apply_takes_only_state_out_and_plan() {
        assert_eq!(
            step_cmdline(Step::Apply, &base(), &files(true)),
            "terraform -chdir=infra/db apply -state-out=/stage/db/prod/db.tfstate /stage/db/prod/db.tfplan"
        );
    }

    #[test]
    fn output_is_json() {
        assert_eq!(
            step_cmdline(Step::Output, &base(), &files(false)),
            "terraform -chdir=infra/db output -state=/stage/db/prod/db.tfstate -no-color -json"
        );
    }

    #[test]
    fn destroy_keeps_var_files() {
        let line = step_cmdline(Step::Destroy, &base(), &files(false));
        assert!(line.contains("destroy -var-file=prod.tfvars -state="));
    }

    #[test]
    fn paths_with_spaces_are_quoted() {
        let cfg = base_config(Some(Path::new("my infra")), &[]);
        let files = StepFiles {
            state: PathBuf::from("/tmp/a b/s.tfstate"),
            plan: None,
        };
        assert_eq!(
            step_cmdline(Step::Destroy, &cfg, &files),
            "terraform -chdir='my infra' destroy -state='/tmp/a b/s.tfstate'"
        );
    }
}
