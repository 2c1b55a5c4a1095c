//! Dependency subcommands

use serde::Serialize;

use compose_systemd::control::{Controller, HostInitSystem};
use compose_systemd::graph::{AddOutcome, CheckReport, DependencyKind};
use compose_systemd::{exit, Config, ServiceName};

type CmdResult = Result<i32, Box<dyn std::error::Error>>;

pub async fn add(
    config: &Config,
    dependent: &str,
    dependency: &str,
    kind: DependencyKind,
) -> CmdResult {
    let template = config.template_path();
    if !tokio::fs::try_exists(&template).await.unwrap_or(false) {
        log::warn!(
            "{} is not installed; dependencies take effect once it is",
            template.display()
        );
    }

    let outcome = config.manager().add(dependent, dependency, kind).await?;
    let (dependent, dependency) = (ServiceName::parse(dependent)?, ServiceName::parse(dependency)?);

    match outcome {
        AddOutcome::Added => {
            println!("{} now {} {}", dependent, kind.directive().to_lowercase(), dependency);
        }
        AddOutcome::Replaced { previous } => {
            println!("{} -> {}: {} changed to {}", dependent, dependency, previous, kind);
        }
        AddOutcome::Unchanged => {
            println!("{} already {} {}", dependent, kind.directive().to_lowercase(), dependency);
        }
    }

    if outcome.changed() {
        reload(config).await?;
    }
    Ok(exit::SUCCESS)
}

pub async fn remove(config: &Config, dependent: &str, dependency: &str) -> CmdResult {
    let removed = config.manager().remove(dependent, dependency).await?;
    let (dependent, dependency) = (ServiceName::parse(dependent)?, ServiceName::parse(dependency)?);

    if removed {
        println!("{} no longer depends on {}", dependent, dependency);
        reload(config).await?;
    } else {
        println!("{} does not depend on {}", dependent, dependency);
    }
    Ok(exit::SUCCESS)
}

pub async fn list(config: &Config, dependent: &str, json: bool) -> CmdResult {
    let deps = config.manager().list(dependent).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&deps)?);
        return Ok(exit::SUCCESS);
    }

    println!("Dependencies of {}:", deps.dependent);
    if deps.is_empty() {
        println!("  (none)");
    }
    for name in &deps.requires {
        println!("  Requires: {}", name);
    }
    for name in &deps.wants {
        println!("  Wants:    {}", name);
    }
    Ok(exit::SUCCESS)
}

#[derive(Serialize)]
struct ReverseEdge {
    service: ServiceName,
    kind: DependencyKind,
}

#[derive(Serialize)]
struct CheckOutput<'a> {
    #[serde(flatten)]
    report: &'a CheckReport,
    required_by: Vec<ReverseEdge>,
}

pub async fn check(config: &Config, dependent: &str, json: bool) -> CmdResult {
    let manager = config.manager();
    let report = manager.check(dependent).await?;
    let required_by: Vec<ReverseEdge> = manager
        .reverse(dependent)
        .await?
        .into_iter()
        .map(|(service, kind)| ReverseEdge { service, kind })
        .collect();

    let code = if report.has_cycles() { exit::CYCLE } else { exit::SUCCESS };

    if json {
        let output = CheckOutput {
            report: &report,
            required_by,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(code);
    }

    // Depth-first discovery order, so indentation forms the tree
    println!("{}", report.root);
    for reached in &report.reached {
        println!(
            "{}{} ({})",
            "  ".repeat(reached.depth),
            reached.service,
            reached.kind
        );
    }

    for cycle in &report.cycles {
        println!("{}", cycle);
    }

    if !required_by.is_empty() {
        println!();
        println!("Required by:");
        for edge in &required_by {
            println!("  {} ({})", edge.service, edge.kind);
        }
    }

    Ok(code)
}

/// Let systemd pick up changed drop-ins
async fn reload(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if !config.reload {
        log::debug!("Skipping daemon-reload");
        return Ok(());
    }
    Controller::new(config.resolver(), HostInitSystem)
        .with_escalation(config.escalation)
        .daemon_reload()
        .await?;
    Ok(())
}
