mod commands;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use compose_systemd::control::{Escalation, LogOptions, Verb};
use compose_systemd::graph::{DependencyKind, DepsError};
use compose_systemd::{exit, Config, Overrides};

#[derive(Parser)]
#[command(name = "composectl")]
#[command(about = "Manage dependencies between compose services run by systemd")]
struct Cli {
    /// Root of the compose project tree
    #[arg(long, global = true, env = "COMPOSE_BASE")]
    project_root: Option<PathBuf>,

    /// Directory holding the template unit and dependency drop-ins
    #[arg(long, global = true, env = "COMPOSE_UNIT_DIR")]
    artifact_root: Option<PathBuf>,

    /// Don't run `systemctl daemon-reload` after changing dependencies
    #[arg(long, global = true)]
    no_reload: bool,

    /// Always run privileged commands through sudo
    #[arg(long, global = true, conflicts_with = "no_sudo")]
    sudo: bool,

    /// Never use sudo, even when not root
    #[arg(long, global = true)]
    no_sudo: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Edit and inspect dependencies between services
    #[command(subcommand)]
    Deps(DepsCommand),

    /// Run a systemctl verb on one or more services
    Control(ControlArgs),

    /// List compose instances and whether they are enabled
    List,
}

#[derive(Subcommand)]
enum DepsCommand {
    /// Make DEPENDENT depend on DEPENDENCY
    Add {
        dependent: String,
        dependency: String,
        /// hard (Requires=) or soft (Wants=)
        #[arg(default_value = "soft")]
        kind: DependencyKind,
    },

    /// Drop the dependency of DEPENDENT on DEPENDENCY.
    ///
    /// DEPENDENCY only has to be a valid name, not an existing project, so
    /// edges to deleted projects can be removed.
    Remove { dependent: String, dependency: String },

    /// Show direct dependencies
    List {
        dependent: String,
        #[arg(long)]
        json: bool,
    },

    /// Show transitive dependencies and report cycles
    Check {
        dependent: String,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct ControlArgs {
    #[arg(value_enum)]
    verb: Verb,

    /// Service names (e.g. "database", "genai-ollama")
    #[arg(required = true)]
    names: Vec<String>,

    /// logs: follow the journal
    #[arg(short, long)]
    follow: bool,

    /// logs: number of lines to show
    #[arg(short = 'n', long)]
    lines: Option<u32>,

    /// logs: show entries since this time
    #[arg(long)]
    since: Option<String>,

    /// logs: show entries until this time
    #[arg(long)]
    until: Option<String>,
}

impl ControlArgs {
    fn log_options(&self) -> LogOptions {
        LogOptions {
            follow: self.follow,
            lines: self.lines,
            since: self.since.clone(),
            until: self.until.clone(),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")
    ).init();

    let cli = Cli::parse();

    let escalation = if cli.sudo {
        Escalation::Always
    } else if cli.no_sudo {
        Escalation::Never
    } else {
        Escalation::Auto
    };

    let config = match Config::load(Overrides {
        project_root: cli.project_root,
        artifact_root: cli.artifact_root,
        escalation,
        reload: !cli.no_reload,
    })
    .await
    {
        Ok(c) => c,
        Err(e) => {
            eprintln!("composectl: {}", e);
            std::process::exit(exit::FAILURE);
        }
    };

    let result = match cli.command {
        Command::Deps(DepsCommand::Add { dependent, dependency, kind }) => {
            commands::add(&config, &dependent, &dependency, kind).await
        }
        Command::Deps(DepsCommand::Remove { dependent, dependency }) => {
            commands::remove(&config, &dependent, &dependency).await
        }
        Command::Deps(DepsCommand::List { dependent, json }) => {
            commands::list_deps(&config, &dependent, json).await
        }
        Command::Deps(DepsCommand::Check { dependent, json }) => {
            commands::check(&config, &dependent, json).await
        }
        Command::Control(args) => {
            commands::control(&config, args.verb, &args.names, &args.log_options()).await
        }
        Command::List => commands::list(&config).await,
    };

    let code = match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("composectl: {}", e);
            e.downcast_ref::<DepsError>()
                .map_or(exit::FAILURE, DepsError::exit_code)
        }
    };

    std::process::exit(code);
}
