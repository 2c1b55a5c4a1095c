//! `docker compose` wrapper
//!
//! Attaches the project's compose file and env files to a `docker compose`
//! invocation and adds per-subcommand default flags. Knows nothing about
//! the dependency graph.

mod discovery;

pub use discovery::{discover, ProjectFiles, COMPOSE_FILES};

use std::path::{Path, PathBuf};

use tokio::process::Command;

use crate::control::{exit_code, Invocation};
use crate::resolver::{ResolveError, Resolver};

const PS_FORMAT: &str = "table {{.Name}}\\t{{.State}}\\t{{.Status}}\\t{{.Ports}}";

/// Shell used by `exec` when only a service is given
const EXEC_SHELL: &str = "/bin/bash";

/// Default flags per subcommand. Each group is a flag and its value, if any.
const DEFAULT_ARGS: &[(&str, &[&[&str]])] = &[
    ("up", &[&["--remove-orphans"], &["--detach"]]),
    ("down", &[&["--remove-orphans"], &["--volumes"]]),
    ("exec", &[]),
    ("build", &[&["--no-cache"]]),
    ("logs", &[&["-f"], &["--tail=100"]]),
    ("ps", &[&["--format", PS_FORMAT]]),
    ("pull", &[&["--ignore-pull-failures"]]),
    ("restart", &[]),
    ("start", &[]),
    ("stop", &[]),
];

#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("Project directory not found: {}", .0.display())]
    NoProjectDir(PathBuf),

    #[error("No compose file found in {}", .0.display())]
    NoComposeFile(PathBuf),

    #[error("Multiple compose files found in {}: {names}", .dir.display())]
    AmbiguousComposeFile { dir: PathBuf, names: String },

    #[error("Path is not valid UTF-8: {}", .0.display())]
    NonUtf8Path(PathBuf),

    #[error("Invalid env file pattern: {0}")]
    Pattern(String),
}

/// Whether a subcommand has an entry in the defaults table
pub fn is_known(subcommand: &str) -> bool {
    DEFAULT_ARGS.iter().any(|(name, _)| *name == subcommand)
}

/// Default flag groups for a subcommand; unknown subcommands get none
pub fn default_args(subcommand: &str) -> &'static [&'static [&'static str]] {
    DEFAULT_ARGS
        .iter()
        .find(|(name, _)| *name == subcommand)
        .map(|(_, args)| *args)
        .unwrap_or(&[])
}

/// Overrides taken from the environment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WrapperEnv {
    /// `DOCKER_PG_FORMAT`: build progress style
    pub progress: Option<String>,
    /// `DOCKER_PS_FORMAT`: replaces the ps table format
    pub ps_format: Option<String>,
}

impl WrapperEnv {
    pub fn from_env() -> Self {
        let var = |key| std::env::var(key).ok().filter(|v| !v.is_empty());
        Self {
            progress: var("DOCKER_PG_FORMAT"),
            ps_format: var("DOCKER_PS_FORMAT"),
        }
    }
}

/// A fully assembled compose invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeCommand {
    pub invocation: Invocation,
    pub workdir: PathBuf,
}

impl ComposeCommand {
    pub async fn run(&self) -> std::io::Result<i32> {
        let status = Command::new(&self.invocation.program)
            .args(&self.invocation.args)
            .current_dir(&self.workdir)
            .status()
            .await?;
        Ok(exit_code(status))
    }
}

/// Directory of the selected project: the resolved `project` name, or
/// `cwd` when none is given
pub fn project_dir(
    resolver: &Resolver,
    project: Option<&str>,
    cwd: &Path,
) -> Result<PathBuf, ResolveError> {
    match project.map(str::trim).filter(|p| !p.is_empty()) {
        Some(name) => Ok(resolver.resolve(name)?.path),
        None => Ok(cwd.to_path_buf()),
    }
}

fn flag_name(arg: &str) -> Option<&str> {
    if !arg.starts_with('-') {
        return None;
    }
    Some(arg.split_once('=').map_or(arg, |(name, _)| name))
}

/// Defaults followed by the user's arguments. A default group is dropped
/// when the user passes the same flag, with or without a value.
pub fn merge_args(defaults: &[&[&str]], user: &[String]) -> Vec<String> {
    let user_flags: Vec<&str> = user.iter().filter_map(|a| flag_name(a)).collect();

    let mut merged: Vec<String> = defaults
        .iter()
        .filter(|group| {
            let name = group.first().and_then(|a| flag_name(a));
            !matches!(name, Some(n) if user_flags.contains(&n))
        })
        .flat_map(|group| group.iter().map(|a| a.to_string()))
        .collect();

    merged.extend(user.iter().cloned());
    merged
}

/// Assemble `docker compose --file .. [--env-file ..] <sub> <args>`
pub fn build_command(
    subcommand: &str,
    user: &[String],
    files: &ProjectFiles,
    env: &WrapperEnv,
    workdir: &Path,
) -> ComposeCommand {
    let mut args = vec![
        "compose".to_string(),
        "--file".to_string(),
        files.compose_file.display().to_string(),
    ];
    for env_file in &files.env_files {
        args.push("--env-file".into());
        args.push(env_file.display().to_string());
    }
    if subcommand == "build" {
        if let Some(progress) = &env.progress {
            args.push(format!("--progress={}", progress));
        }
    }
    args.push(subcommand.to_string());

    let ps_group: [&str; 2];
    let ps_groups: [&[&str]; 1];
    let defaults: &[&[&str]] = match env.ps_format.as_deref() {
        Some(format) if subcommand == "ps" => {
            ps_group = ["--format", format];
            ps_groups = [&ps_group[..]];
            &ps_groups
        }
        _ => default_args(subcommand),
    };

    args.extend(merge_args(defaults, user));
    if subcommand == "exec" && user.len() == 1 && flag_name(&user[0]).is_none() {
        args.push(EXEC_SHELL.to_string());
    }

    ComposeCommand {
        invocation: Invocation::new("docker", args),
        workdir: workdir.to_path_buf(),
    }
}
