//! Batch service control

use compose_systemd::control::{Controller, HostInitSystem, LogOptions, Verb};
use compose_systemd::Config;

pub async fn control(
    config: &Config,
    verb: Verb,
    names: &[String],
    logs: &LogOptions,
) -> Result<i32, Box<dyn std::error::Error>> {
    let controller =
        Controller::new(config.resolver(), HostInitSystem).with_escalation(config.escalation);

    let report = controller.control(verb, names, logs).await;

    for outcome in &report.outcomes {
        if let Err(e) = &outcome.result {
            eprintln!("composectl: {}", e);
        }
    }

    let failed = report.failed() + report.unresolved();
    if failed > 0 && report.outcomes.len() > 1 {
        eprintln!(
            "composectl: {} of {} services failed ({} unresolved)",
            failed,
            report.outcomes.len(),
            report.unresolved()
        );
    }

    Ok(report.exit_code())
}
