//! List compose instances known to systemd

use compose_systemd::control::{Controller, HostInitSystem};
use compose_systemd::{exit, Config};

pub async fn list(config: &Config) -> Result<i32, Box<dyn std::error::Error>> {
    let controller =
        Controller::new(config.resolver(), HostInitSystem).with_escalation(config.escalation);

    println!("Compose services:");
    let units = controller.list_units().await;

    println!();
    println!("Enabled at boot:");
    let files = controller.list_unit_files().await;

    // Both listings run even if the first one fails
    let mut code = exit::SUCCESS;
    for result in [units, files] {
        if let Err(e) = result {
            eprintln!("composectl: {}", e);
            code = exit::FAILURE;
        }
    }
    Ok(code)
}
