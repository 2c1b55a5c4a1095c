//! Integration tests for batch control

use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};

use compose_systemd::control::{
    ControlError, Controller, Escalation, HostInitSystem, InitSystem, Invocation, LogOptions,
    Tools, Verb,
};
use compose_systemd::{exit, Resolver};

static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

fn unique_test_dir(projects: &[&str]) -> PathBuf {
    let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
    let dir = PathBuf::from(format!("/tmp/compose-control-test-{}-{}", std::process::id(), id));
    let _ = fs::remove_dir_all(&dir);
    for project in projects {
        fs::create_dir_all(dir.join(project)).unwrap();
    }
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// Answers every invocation with success and remembers it
#[derive(Default)]
struct Recorder {
    calls: RefCell<Vec<Invocation>>,
}

impl InitSystem for Recorder {
    async fn run(&self, invocation: &Invocation) -> std::io::Result<i32> {
        self.calls.borrow_mut().push(invocation.clone());
        Ok(0)
    }
}

#[tokio::test]
async fn test_batch_in_input_order() {
    let root = unique_test_dir(&["zeta", "alpha", "genai/ollama"]);
    let ctl = Controller::new(Resolver::new(&root), Recorder::default())
        .with_escalation(Escalation::Never);

    let report = ctl
        .control(
            Verb::Stop,
            &names(&["zeta", "genai-ollama", "alpha"]),
            &LogOptions::default(),
        )
        .await;
    assert!(report.succeeded());

    let calls = ctl.init().calls.borrow();
    let lines: Vec<String> = calls
        .iter()
        .map(|c| format!("{} {}", c.program, c.args.join(" ")))
        .collect();
    assert_eq!(
        lines,
        vec![
            "systemctl stop docker-compose@zeta.service",
            "systemctl stop docker-compose@genai-ollama.service",
            "systemctl stop docker-compose@alpha.service",
        ]
    );

    let _ = fs::remove_dir_all(&root);
}

#[tokio::test]
async fn test_batch_with_invalid_name() {
    let root = unique_test_dir(&["web"]);
    let ctl = Controller::new(Resolver::new(&root), Recorder::default())
        .with_escalation(Escalation::Never);

    let report = ctl
        .control(
            Verb::Restart,
            &names(&["bad/name", "web", "ghost"]),
            &LogOptions::default(),
        )
        .await;

    assert_eq!(report.unresolved(), 2);
    assert_eq!(report.failed(), 0);
    assert_eq!(report.exit_code(), exit::UNRESOLVED);
    assert_eq!(
        report.outcomes[1].unit.as_deref(),
        Some("docker-compose@web.service")
    );
    assert_eq!(ctl.init().calls.borrow().len(), 1);

    let _ = fs::remove_dir_all(&root);
}

#[tokio::test]
async fn test_host_init_exit_codes() {
    let root = unique_test_dir(&["ok", "broken"]);

    let passing = Controller::new(Resolver::new(&root), HostInitSystem)
        .with_escalation(Escalation::Never)
        .with_tools(Tools {
            systemctl: "true".into(),
            ..Tools::default()
        });
    let report = passing
        .control(Verb::Start, &names(&["ok", "broken"]), &LogOptions::default())
        .await;
    assert_eq!(report.exit_code(), exit::SUCCESS);

    let failing = Controller::new(Resolver::new(&root), HostInitSystem)
        .with_escalation(Escalation::Never)
        .with_tools(Tools {
            systemctl: "false".into(),
            ..Tools::default()
        });
    let report = failing
        .control(Verb::Start, &names(&["ok", "nope"]), &LogOptions::default())
        .await;
    assert!(matches!(
        report.outcomes[0].result,
        Err(ControlError::Failed { code: 1, .. })
    ));
    assert_eq!(report.exit_code(), exit::FAILURE | exit::UNRESOLVED);

    let _ = fs::remove_dir_all(&root);
}

#[tokio::test]
async fn test_missing_tool_is_spawn_error() {
    let root = unique_test_dir(&["web"]);
    let ctl = Controller::new(Resolver::new(&root), HostInitSystem)
        .with_escalation(Escalation::Never)
        .with_tools(Tools {
            systemctl: "/nonexistent/systemctl".into(),
            ..Tools::default()
        });

    let report = ctl
        .control(Verb::Enable, &names(&["web"]), &LogOptions::default())
        .await;
    assert!(matches!(
        report.outcomes[0].result,
        Err(ControlError::Spawn { .. })
    ));
    assert_eq!(report.exit_code(), exit::FAILURE);

    let _ = fs::remove_dir_all(&root);
}
