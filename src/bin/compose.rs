//! compose - `docker compose` for projects under the compose root
//!
//! Finds the project's compose file and `.env*` files, adds default flags
//! for common subcommands and runs docker from the project directory.

use std::path::PathBuf;

use clap::Parser;
use compose_systemd::compose::{self, WrapperEnv};
use compose_systemd::{exit, Config, Overrides};

#[derive(Parser)]
#[command(name = "compose")]
#[command(about = "Run docker compose with project files and default flags")]
struct Args {
    /// Print the project directory and exit
    #[arg(long)]
    print_workdir: bool,

    /// Print the docker command without running it
    #[arg(long, short = 'n')]
    dry_run: bool,

    /// Project name (e.g. "genai-ollama"); defaults to the current directory
    #[arg(long, short = 'p', env = "COMPOSE_PROJECT")]
    project: Option<String>,

    /// Root of the compose project tree
    #[arg(long, env = "COMPOSE_BASE")]
    base: Option<PathBuf>,

    /// Subcommand and arguments passed to docker compose
    #[arg(
        trailing_var_arg = true,
        allow_hyphen_values = true,
        required_unless_present = "print_workdir"
    )]
    command: Vec<String>,
}

async fn run(args: Args) -> Result<i32, Box<dyn std::error::Error>> {
    let config = Config::load(Overrides {
        project_root: args.base,
        ..Default::default()
    })
    .await?;

    let cwd = std::env::current_dir()?;
    let dir = compose::project_dir(&config.resolver(), args.project.as_deref(), &cwd)?;

    if args.print_workdir {
        println!("{}", dir.display());
        return Ok(exit::SUCCESS);
    }

    let Some((subcommand, rest)) = args.command.split_first() else {
        return Err("no compose subcommand given".into());
    };
    if !compose::is_known(subcommand) {
        log::debug!("No defaults for '{}', passing through", subcommand);
    }

    let files = compose::discover(&dir)?;
    let command = compose::build_command(subcommand, rest, &files, &WrapperEnv::from_env(), &dir);

    eprintln!("# Working directory: {}", dir.display());
    if args.dry_run {
        println!("{}", command.invocation);
        return Ok(exit::SUCCESS);
    }
    eprintln!("# {}", command.invocation);

    Ok(command.run().await?)
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")
    ).init();

    let code = match run(Args::parse()).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("compose: {}", e);
            exit::FAILURE
        }
    };

    std::process::exit(code);
}
