use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use colored::Colorize;
use dream_run::terraform::{self, plan_filename, state_filename};
use dream_run::{join_quoted, RunConfig, Step, StepFiles, TerraformRunConfig};
use dream_store::{scoped, Backend, ProjectStore};
use dream_types::ProjectRef;

use crate::cli::*;
use crate::config::CliConfig;

pub fn run_command(cli: Cli, config: &CliConfig) -> anyhow::Result<()> {
    let base = config.base_dir()?;
    let mut store = Backend::from_location(base, &config.store_options())
        .with_context(|| format!("Failed to open store at {base}"))?;

    match cli.command {
        Command::Modules(_) => cmd_modules(&store),
        Command::Projects(args) => cmd_projects(&store, args),
        Command::Files(args) => cmd_files(&store, args),
        Command::Url(args) => cmd_url(&store, args),
        Command::Cat(args) => cmd_cat(&store, args),
        Command::Put(args) => cmd_put(&mut store, args),
        Command::Pull(args) => cmd_pull(&store, args),
        Command::Cleanup(args) => cmd_cleanup(&mut store, args, &mut io::stdin().lock()),
        Command::Exec(args) => cmd_exec(&mut store, args),
        Command::Tf(args) => cmd_tf(&mut store, args, config),
        Command::Troubleshoot(_) => cmd_troubleshoot(&store),
    }
}

fn print_names(names: &[String], empty: &str) {
    if names.is_empty() {
        println!("{}", empty.dimmed());
    }
    for name in names {
        println!("{name}");
    }
}

fn cmd_modules(store: &Backend) -> anyhow::Result<()> {
    print_names(&store.list_modules()?, "No modules.");
    Ok(())
}

fn cmd_projects(store: &Backend, args: ProjectsArgs) -> anyhow::Result<()> {
    print_names(&store.list_projects(&args.module)?, "No projects.");
    Ok(())
}

fn cmd_files(store: &Backend, args: ProjectArgs) -> anyhow::Result<()> {
    let at = ProjectRef::new(args.module, args.project)?;
    print_names(&store.list_files(&at)?, "No files.");
    Ok(())
}

fn cmd_url(store: &Backend, args: UrlArgs) -> anyhow::Result<()> {
    match (args.project, args.file) {
        (None, _) => {
            for project in store.list_projects(&args.module)? {
                let at = ProjectRef::new(args.module.as_str(), project)?;
                println!("{}", store.url_for_project(&at));
            }
        }
        (Some(project), None) => {
            let at = ProjectRef::new(args.module, project)?;
            println!("{}", store.url_for_project(&at));
        }
        (Some(project), Some(file)) => {
            let at = ProjectRef::new(args.module, project)?;
            println!("{}", store.url_for_file(&at, &file));
        }
    }
    Ok(())
}

fn cmd_cat(store: &Backend, args: FileArgs) -> anyhow::Result<()> {
    let at = ProjectRef::new(args.module, args.project)?;
    let path = store.read_file(&at, &args.file)?;
    let content = fs::read(&path).with_context(|| format!("Failed to read {}", path.display()))?;
    io::stdout().lock().write_all(&content)?;
    Ok(())
}

fn cmd_put(store: &mut Backend, args: PutArgs) -> anyhow::Result<()> {
    scoped(store, |s| -> anyhow::Result<()> {
        s.open(&args.module, &args.project)?;
        let target = s.write(&args.file)?;
        match &args.from {
            Some(source) => {
                fs::copy(source, &target)
                    .with_context(|| format!("Failed to copy {}", source.display()))?;
            }
            None => {
                let mut out = fs::File::create(&target)?;
                io::copy(&mut io::stdin().lock(), &mut out)?;
            }
        }
        println!("{} Stored {}", "✓".green(), s.url_for(&args.file)?.bold());
        Ok(())
    })
}

fn default_pull_dest(module: &str, project: &str) -> PathBuf {
    PathBuf::from(format!("state-{module}-{project}"))
}

fn cmd_pull(store: &Backend, args: PullArgs) -> anyhow::Result<()> {
    let at = ProjectRef::new(args.module, args.project)?;
    let dest = args
        .dest
        .unwrap_or_else(|| default_pull_dest(at.module(), at.project()));
    let files = store.list_files(&at)?;
    if files.is_empty() {
        println!("{}", format!("No files in {at}.").dimmed());
        return Ok(());
    }

    fs::create_dir_all(&dest)
        .with_context(|| format!("Failed to create {}", dest.display()))?;
    for file in &files {
        let source = store.read_file(&at, file)?;
        fs::copy(&source, dest.join(file))
            .with_context(|| format!("Failed to copy {file} to {}", dest.display()))?;
        println!("  {} {}", "pulled:".green(), file);
    }
    println!("{} {} file(s) in {}", "✓".green(), files.len(), dest.display().to_string().bold());
    Ok(())
}

/// Ask a yes/no question on stdout; anything but `y`/`yes` declines.
fn confirm(prompt: &str, input: &mut impl BufRead) -> io::Result<bool> {
    print!("{prompt} [y/n] ");
    io::stdout().flush()?;
    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

fn cmd_cleanup(store: &mut Backend, args: CleanupArgs, input: &mut impl BufRead) -> anyhow::Result<()> {
    let at = ProjectRef::new(args.module, args.project)?;
    if !store.exists_project(&at)? {
        println!("{}", format!("Nothing to delete: {at} does not exist.").dimmed());
        return Ok(());
    }

    let files = store.list_files(&at)?;
    println!("Deleting {} ({} file(s)):", store.url_for_project(&at).bold(), files.len());
    for file in &files {
        println!("  {}", file.red());
    }
    if !args.yes && !confirm("Proceed?", input)? {
        println!("Aborted.");
        return Ok(());
    }

    store.delete_project(&at, true)?;
    println!("{} Deleted {}", "✓".green(), at.to_string().yellow());
    Ok(())
}

/// `DREAM_FILE_` followed by the file name upper-cased, with anything
/// outside `[A-Z0-9]` replaced by `_`.
fn file_variable(filename: &str) -> String {
    let name: String = filename
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    format!("DREAM_FILE_{name}")
}

fn exec_environment(at: &ProjectRef, state_dir: &Path, staged: &[(String, PathBuf)]) -> RunConfig {
    let mut cfg = RunConfig::new()
        .with_environment("DREAM_MODULE", at.module())
        .with_environment("DREAM_PROJECT", at.project())
        .with_environment("DREAM_STATE_DIR", state_dir.display().to_string());
    for (file, path) in staged {
        cfg = cfg.with_environment(file_variable(file), path.display().to_string());
    }
    cfg
}

fn cmd_exec(store: &mut Backend, args: ExecArgs) -> anyhow::Result<()> {
    scoped(store, |s| -> anyhow::Result<()> {
        s.open(&args.module, &args.project)?;
        let at = s.current_project()?;

        let mut staged = Vec::new();
        for file in &args.reads {
            staged.push((file.clone(), s.read(file)?));
        }
        for file in &args.writes {
            staged.push((file.clone(), s.write(file)?));
        }

        let state_dir = s.default_local_path()?;
        let cmdline = exec_environment(&at, &state_dir, &staged).cmdline(&join_quoted(&args.command), None);
        dream_run::run(&cmdline)?;
        Ok(())
    })
}

fn tf_base(args: &TfArgs, config: &CliConfig) -> TerraformRunConfig {
    let var_files = if args.var_files.is_empty() {
        &config.terraform.var_files
    } else {
        &args.var_files
    };
    let chdir = args.chdir.as_deref().or(config.terraform.chdir.as_deref());
    terraform::base_config(chdir, var_files)
}

fn uses_plan(step: Step) -> bool {
    matches!(step, Step::Plan | Step::Apply)
}

/// Stage the files `step` needs. Steps that rewrite the state open it for
/// writing; `apply` needs an existing plan and `output` an existing state.
fn stage_step_files<S: ProjectStore + ?Sized>(s: &mut S, step: Step, module: &str) -> anyhow::Result<StepFiles> {
    let state_name = state_filename(module);
    let state = if step.writes_state() { s.write(&state_name)? } else { s.read(&state_name)? };
    let plan = match step {
        Step::Plan => Some(s.write(&plan_filename(module))?),
        Step::Apply => Some(s.read(&plan_filename(module))?),
        Step::Output | Step::Destroy => None,
    };
    Ok(StepFiles { state, plan })
}

fn cmd_tf(store: &mut Backend, args: TfArgs, config: &CliConfig) -> anyhow::Result<()> {
    let base = tf_base(&args, config);

    if args.dry_run {
        let at = ProjectRef::new(args.module.as_str(), args.project.as_str())?;
        let files = StepFiles {
            state: PathBuf::from(store.url_for_file(&at, &state_filename(at.module()))),
            plan: uses_plan(args.step)
                .then(|| PathBuf::from(store.url_for_file(&at, &plan_filename(at.module())))),
        };
        println!("{}", terraform::step_cmdline(args.step, &base, &files));
        return Ok(());
    }

    scoped(store, |s| -> anyhow::Result<()> {
        s.open(&args.module, &args.project)?;
        let files = stage_step_files(s, args.step, &args.module)?;
        let cmdline = terraform::step_cmdline(args.step, &base, &files);
        dream_run::run(&cmdline)?;
        println!("{} {} {}", "✓".green(), args.step.to_string().bold(), s.current_project()?);
        Ok(())
    })
}

fn cmd_troubleshoot(store: &Backend) -> anyhow::Result<()> {
    println!("Base: {}", store.base_url().bold());
    let lines = store.troubleshoot()?;
    if lines.is_empty() {
        bail!("backend reported no diagnostics");
    }
    for line in lines {
        println!("  {line}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use dream_store::LocalStore;

    fn setup(base: &Path, argv: &[&str]) -> (Cli, CliConfig) {
        let base = base.display().to_string();
        let mut full = vec!["dream", "-b", base.as_str()];
        full.extend_from_slice(argv);
        let cli = Cli::try_parse_from(full).unwrap();
        let mut config = CliConfig::default();
        config.apply_flags(&cli);
        (cli, config)
    }

    fn run(base: &Path, argv: &[&str]) -> anyhow::Result<()> {
        let (cli, config) = setup(base, argv);
        run_command(cli, &config)
    }

    #[test]
    fn missing_base_dir_is_reported() {
        let cli = Cli::try_parse_from(["dream", "modules"]).unwrap();
        let err = run_command(cli, &CliConfig::default()).unwrap_err();
        assert!(err.to_string().contains("no base directory"));
    }

    #[test]
    fn put_then_pull_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("envs");
        let source = dir.path().join("hosts.ini");
        fs::write(&source, "[web]\n10.0.0.1\n").unwrap();

        run(&base, &["put", "db", "prod", "hosts", "--from", source.to_str().unwrap()]).unwrap();
        assert_eq!(fs::read_to_string(base.join("db/prod/hosts")).unwrap(), "[web]\n10.0.0.1\n");

        let dest = dir.path().join("pulled");
        run(&base, &["pull", "db", "prod", "--dest", dest.to_str().unwrap()]).unwrap();
        assert_eq!(fs::read_to_string(dest.join("hosts")).unwrap(), "[web]\n10.0.0.1\n");
    }

    #[test]
    fn put_with_missing_source_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent");
        assert!(run(dir.path(), &["put", "db", "prod", "f", "--from", missing.to_str().unwrap()]).is_err());
    }

    #[test]
    fn cat_of_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = run(dir.path(), &["cat", "db", "prod", "nope"]).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn invalid_names_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(run(dir.path(), &["files", "db", "../etc"]).is_err());
    }

    #[test]
    fn cleanup_asks_before_deleting() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("db/prod")).unwrap();
        fs::write(dir.path().join("db/prod/state"), "x").unwrap();
        let mut store = Backend::Local(LocalStore::new(dir.path()));
        let args = || CleanupArgs { module: "db".into(), project: "prod".into(), yes: false };

        cmd_cleanup(&mut store, args(), &mut io::Cursor::new("n\n")).unwrap();
        assert!(dir.path().join("db/prod/state").exists());

        cmd_cleanup(&mut store, args(), &mut io::Cursor::new("yes\n")).unwrap();
        assert!(!dir.path().join("db/prod").exists());
    }

    #[test]
    fn cleanup_of_absent_project_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        run(dir.path(), &["cleanup", "db", "ghost", "--yes"]).unwrap();
    }

    #[test]
    fn confirm_accepts_only_yes() {
        assert!(confirm("?", &mut io::Cursor::new("Y\n")).unwrap());
        assert!(confirm("?", &mut io::Cursor::new("yes")).unwrap());
        assert!(!confirm("?", &mut io::Cursor::new("\n")).unwrap());
        assert!(!confirm("?", &mut io::Cursor::new("nope\n")).unwrap());
    }

    #[test]
    fn file_variables_are_sanitized() {
        assert_eq!(file_variable("db.tfstate"), "DREAM_FILE_DB_TFSTATE");
        assert_eq!(file_variable("hosts-v2.ini"), "DREAM_FILE_HOSTS_V2_INI");
    }

    #[test]
    fn exec_environment_lists_project_and_files() {
        let at = ProjectRef::new("db", "prod").unwrap();
        let staged = vec![("out.json".to_string(), PathBuf::from("/s/db/prod/out.json"))];
        let line = exec_environment(&at, Path::new("/s/db/prod"), &staged).cmdline("true", None);
        assert_eq!(
            line,
            "DREAM_MODULE=db DREAM_PROJECT=prod DREAM_STATE_DIR=/s/db/prod \
             DREAM_FILE_OUT_JSON=/s/db/prod/out.json true"
        );
    }

    #[cfg(unix)]
    #[test]
    fn exec_writes_through_staged_file() {
        let dir = tempfile::tempdir().unwrap();
        run(
            dir.path(),
            &["exec", "db", "prod", "--write", "out.txt", "--", "sh", "-c", "echo \"$DREAM_PROJECT\" > \"$DREAM_FILE_OUT_TXT\""],
        )
        .unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("db/prod/out.txt")).unwrap(), "prod\n");
    }

    #[cfg(unix)]
    #[test]
    fn exec_failure_is_propagated() {
        let dir = tempfile::tempdir().unwrap();
        assert!(run(dir.path(), &["exec", "db", "prod", "--", "false"]).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn exec_read_of_missing_file_fails_before_running() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("ran");
        let touch = format!("touch {}", marker.display());
        assert!(run(dir.path(), &["exec", "db", "prod", "--read", "hosts", "--", "sh", "-c", touch.as_str()]).is_err());
        assert!(!marker.exists());
    }

    #[test]
    fn tf_flags_override_config() {
        let mut config = CliConfig::default();
        config.terraform.var_files = vec![PathBuf::from("from-config.tfvars")];
        config.terraform.chdir = Some(PathBuf::from("infra"));
        let args = |var_files: Vec<PathBuf>| TfArgs {
            module: "db".into(),
            project: "prod".into(),
            step: Step::Destroy,
            var_files,
            chdir: None,
            dry_run: true,
        };

        let base = tf_base(&args(vec![]), &config);
        assert_eq!(base.global_arguments(), ["-chdir=infra"]);
        assert_eq!(base.arguments(), ["-var-file=from-config.tfvars"]);

        let base = tf_base(&args(vec![PathBuf::from("cli.tfvars")]), &config);
        assert_eq!(base.arguments(), ["-var-file=cli.tfvars"]);
    }

    #[test]
    fn tf_output_needs_existing_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = LocalStore::new(dir.path());
        store.open("db", "prod").unwrap();
        let err = stage_step_files(&mut store, Step::Output, "db").unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn tf_plan_stages_state_and_plan() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = LocalStore::new(dir.path());
        store.open("db", "prod").unwrap();
        let files = stage_step_files(&mut store, Step::Plan, "db").unwrap();
        assert_eq!(files.state, dir.path().join("db/prod/db.tfstate"));
        assert_eq!(files.plan, Some(dir.path().join("db/prod/db.tfplan")));
        assert!(files.state.exists());
    }

    #[test]
    fn tf_dry_run_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        run(dir.path(), &["tf", "db", "prod", "plan", "--dry-run"]).unwrap();
        assert!(!dir.path().join("db").exists());
    }

    #[test]
    fn listings_and_troubleshoot_on_memory_store() {
        let base = "mem://commands-tests/envs";
        let cli = Cli::try_parse_from(["dream", "-b", base, "--author", "t@test", "modules"]).unwrap();
        let mut config = CliConfig::default();
        config.apply_flags(&cli);
        let stage = tempfile::tempdir().unwrap();
        config.store.staging_dir = Some(stage.path().to_path_buf());
        run_command(cli, &config).unwrap();

        let cli = Cli::try_parse_from(["dream", "troubleshoot"]).unwrap();
        run_command(cli, &config).unwrap();
    }
}
