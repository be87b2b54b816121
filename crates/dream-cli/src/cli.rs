use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use dream_run::Step;

#[derive(Parser)]
#[command(
    name = "dream",
    about = "Dreamer: versioned project state for infrastructure runs",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true)]
    pub no_color: bool,

    /// Configuration file (default: ./dream.toml if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Base location: a directory, or scheme://bucket/prefix
    #[arg(short, long, global = true)]
    pub base_dir: Option<String>,

    /// Parent directory for the staging cache
    #[arg(long, global = true)]
    pub staging_dir: Option<PathBuf>,

    /// Author recorded with uploads (default: user@host)
    #[arg(long, global = true)]
    pub author: Option<String>,
}

#[derive(Subcommand)]
pub enum Command {
    /// List modules
    Modules(ModulesArgs),
    /// List projects of a module
    Projects(ProjectsArgs),
    /// List files of a project
    Files(ProjectArgs),
    /// Show where a module, project or file lives
    Url(UrlArgs),
    /// Print a stored file
    Cat(FileArgs),
    /// Store a file from a path or stdin
    Put(PutArgs),
    /// Copy every file of a project to a local directory
    Pull(PullArgs),
    /// Delete a project and all of its files
    Cleanup(CleanupArgs),
    /// Run a command with project files staged
    Exec(ExecArgs),
    /// Run a planner step against the project's state
    Tf(TfArgs),
    /// Diagnose the configured backend
    Troubleshoot(TroubleshootArgs),
}

#[derive(Args)]
pub struct ModulesArgs {}

#[derive(Args)]
pub struct ProjectsArgs {
    pub module: String,
}

#[derive(Args)]
pub struct ProjectArgs {
    pub module: String,
    pub project: String,
}

#[derive(Args)]
pub struct UrlArgs {
    pub module: String,
    pub project: Option<String>,
    pub file: Option<String>,
}

#[derive(Args)]
pub struct FileArgs {
    pub module: String,
    pub project: String,
    pub file: String,
}

#[derive(Args)]
pub struct PutArgs {
    pub module: String,
    pub project: String,
    pub file: String,
    /// Read content from this path instead of stdin
    #[arg(long)]
    pub from: Option<PathBuf>,
}

#[derive(Args)]
pub struct PullArgs {
    pub module: String,
    pub project: String,
    /// Destination (default: ./state-<module>-<project>)
    #[arg(long)]
    pub dest: Option<PathBuf>,
}

#[derive(Args)]
pub struct CleanupArgs {
    pub module: String,
    pub project: String,
    /// Do not ask for confirmation
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Args)]
pub struct ExecArgs {
    pub module: String,
    pub project: String,
    /// File to stage for reading (must exist)
    #[arg(long = "read", value_name = "FILE")]
    pub reads: Vec<String>,
    /// File to stage for writing (created if missing)
    #[arg(long = "write", value_name = "FILE")]
    pub writes: Vec<String>,
    #[arg(last = true, required = true)]
    pub command: Vec<String>,
}

#[derive(Args)]
pub struct TfArgs {
    pub module: String,
    pub project: String,
    pub step: Step,
    #[arg(long = "var-file", value_name = "FILE")]
    pub var_files: Vec<PathBuf>,
    #[arg(long)]
    pub chdir: Option<PathBuf>,
    /// Print the command line instead of running it
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args)]
pub struct TroubleshootArgs {}
