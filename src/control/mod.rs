//! Batch control of compose services through systemd
//!
//! Each logical name is resolved and then handed to exactly one external
//! invocation (`systemctl <verb> <unit>` or `journalctl -u <unit>`), one
//! after another in the order given. Ordering between services is left to
//! systemd, which reads the dependency drop-ins at daemon-reload.

mod init;

pub use init::{HostInitSystem, InitSystem, Invocation};
pub(crate) use init::exit_code;

use serde::Serialize;

use crate::exit;
use crate::resolver::{ResolveError, Resolver};

/// Matches every instance of the compose template
const INSTANCE_PATTERN: &str = "docker-compose@*.service";

/// Verbs accepted by `composectl control`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Verb {
    Start,
    Stop,
    Restart,
    Enable,
    Disable,
    Status,
    Logs,
    IsActive,
    IsEnabled,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
            Self::Enable => "enable",
            Self::Disable => "disable",
            Self::Status => "status",
            Self::Logs => "logs",
            Self::IsActive => "is-active",
            Self::IsEnabled => "is-enabled",
        }
    }

    /// Verbs that change system state need root
    pub fn needs_root(&self) -> bool {
        !matches!(
            self,
            Self::Status | Self::Logs | Self::IsActive | Self::IsEnabled
        )
    }
}

/// When to prefix privileged invocations with `sudo`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Escalation {
    /// Only when not already root
    #[default]
    Auto,
    Always,
    Never,
}

impl Escalation {
    fn applies(&self, needs_root: bool) -> bool {
        if !needs_root {
            return false;
        }
        match self {
            Self::Auto => !nix::unistd::geteuid().is_root(),
            Self::Always => true,
            Self::Never => false,
        }
    }
}

/// journalctl filters for the logs verb
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogOptions {
    pub follow: bool,
    pub lines: Option<u32>,
    pub since: Option<String>,
    pub until: Option<String>,
}

/// External programs the controller calls
#[derive(Debug, Clone)]
pub struct Tools {
    pub systemctl: String,
    pub journalctl: String,
    pub sudo: String,
}

impl Default for Tools {
    fn default() -> Self {
        Self {
            systemctl: "systemctl".into(),
            journalctl: "journalctl".into(),
            sudo: "sudo".into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("{verb} {service} failed with exit code {code}")]
    Failed {
        service: String,
        verb: &'static str,
        code: i32,
    },

    #[error("Failed to run {program} for {service}: {source}")]
    Spawn {
        service: String,
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result for one name of a batch
#[derive(Debug)]
pub struct ServiceOutcome {
    /// The name as given on the command line
    pub name: String,
    /// systemd unit, when the name resolved
    pub unit: Option<String>,
    pub result: Result<(), ControlError>,
}

/// Results of one batch, in input order
#[derive(Debug)]
pub struct BatchReport {
    pub verb: Verb,
    pub outcomes: Vec<ServiceOutcome>,
}

impl BatchReport {
    pub fn succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    pub fn unresolved(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.result, Err(ControlError::Resolve(_))))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.result, Err(ref e) if !matches!(e, ControlError::Resolve(_))))
            .count()
    }

    /// 0 only when every entry succeeded. Resolution and control failures
    /// set distinct bits.
    pub fn exit_code(&self) -> i32 {
        let mut code = exit::SUCCESS;
        if self.failed() > 0 {
            code |= exit::FAILURE;
        }
        if self.unresolved() > 0 {
            code |= exit::UNRESOLVED;
        }
        code
    }
}

/// Translates verbs over service names into init system invocations
#[derive(Debug, Clone)]
pub struct Controller<I> {
    resolver: Resolver,
    init: I,
    tools: Tools,
    escalation: Escalation,
}

impl<I: InitSystem> Controller<I> {
    pub fn new(resolver: Resolver, init: I) -> Self {
        Self {
            resolver,
            init,
            tools: Tools::default(),
            escalation: Escalation::default(),
        }
    }

    pub fn with_tools(mut self, tools: Tools) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_escalation(mut self, escalation: Escalation) -> Self {
        self.escalation = escalation;
        self
    }

    pub fn init(&self) -> &I {
        &self.init
    }

    /// The command line for one verb on one unit
    pub fn invocation(&self, verb: Verb, unit: &str, logs: &LogOptions) -> Invocation {
        let mut args = Vec::new();
        let program = match verb {
            Verb::Logs => {
                args.extend(["-u".to_string(), unit.to_string()]);
                if logs.follow {
                    args.push("-f".into());
                } else {
                    args.push("--no-pager".into());
                }
                if let Some(n) = logs.lines {
                    args.extend(["-n".to_string(), n.to_string()]);
                }
                if let Some(since) = &logs.since {
                    args.extend(["--since".to_string(), since.clone()]);
                }
                if let Some(until) = &logs.until {
                    args.extend(["--until".to_string(), until.clone()]);
                }
                self.tools.journalctl.clone()
            }
            _ => {
                args.push(verb.as_str().to_string());
                if verb == Verb::Status {
                    args.push("--no-pager".into());
                }
                args.push(unit.to_string());
                self.tools.systemctl.clone()
            }
        };

        self.escalate(verb.needs_root(), Invocation::new(program, args))
    }

    fn escalate(&self, needs_root: bool, invocation: Invocation) -> Invocation {
        if !self.escalation.applies(needs_root) {
            return invocation;
        }
        let mut args = vec![invocation.program];
        args.extend(invocation.args);
        Invocation::new(self.tools.sudo.clone(), args)
    }

    /// Run `verb` for each name in order. A name that fails to resolve or
    /// whose invocation fails does not stop the rest of the batch.
    pub async fn control(&self, verb: Verb, names: &[String], logs: &LogOptions) -> BatchReport {
        let mut outcomes = Vec::with_capacity(names.len());

        for raw in names {
            let resolved = match self.resolver.resolve(raw) {
                Ok(r) => r,
                Err(e) => {
                    log::warn!("{}", e);
                    outcomes.push(ServiceOutcome {
                        name: raw.clone(),
                        unit: None,
                        result: Err(e.into()),
                    });
                    continue;
                }
            };

            let unit = resolved.name.unit_name();
            let invocation = self.invocation(verb, &unit, logs);
            log::debug!("Running: {}", invocation);

            let result = match self.init.run(&invocation).await {
                Ok(0) => Ok(()),
                Ok(code) => Err(ControlError::Failed {
                    service: resolved.name.to_string(),
                    verb: verb.as_str(),
                    code,
                }),
                Err(source) => Err(ControlError::Spawn {
                    service: resolved.name.to_string(),
                    program: invocation.program.clone(),
                    source,
                }),
            };

            outcomes.push(ServiceOutcome {
                name: raw.clone(),
                unit: Some(unit),
                result,
            });
        }

        BatchReport { verb, outcomes }
    }

    /// `systemctl daemon-reload`, so new drop-ins take effect
    pub async fn daemon_reload(&self) -> Result<(), ControlError> {
        self.systemctl(&["daemon-reload"], "daemon-reload", true).await
    }

    /// Every loaded compose instance, active or not
    pub async fn list_units(&self) -> Result<(), ControlError> {
        let args = [
            "list-units",
            "--all",
            "--type=service",
            INSTANCE_PATTERN,
            "--no-pager",
            "--plain",
        ];
        self.systemctl(&args, "list-units", false).await
    }

    /// Enablement state of every installed compose instance
    pub async fn list_unit_files(&self) -> Result<(), ControlError> {
        let args = ["list-unit-files", INSTANCE_PATTERN, "--no-pager"];
        self.systemctl(&args, "list-unit-files", false).await
    }

    async fn systemctl(
        &self,
        args: &[&str],
        verb: &'static str,
        needs_root: bool,
    ) -> Result<(), ControlError> {
        let args = args.iter().map(|a| a.to_string()).collect();
        let invocation = self.escalate(
            needs_root,
            Invocation::new(self.tools.systemctl.clone(), args),
        );
        log::debug!("Running: {}", invocation);

        match self.init.run(&invocation).await {
            Ok(0) => Ok(()),
            Ok(code) => Err(ControlError::Failed {
                service: "systemd".into(),
                verb,
                code,
            }),
            Err(source) => Err(ControlError::Spawn {
                service: "systemd".into(),
                program: invocation.program,
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::fs;

    /// Records invocations and answers with canned exit codes per unit
    #[derive(Default)]
    struct FakeInit {
        calls: RefCell<Vec<Invocation>>,
        codes: HashMap<String, i32>,
    }

    impl InitSystem for FakeInit {
        async fn run(&self, invocation: &Invocation) -> std::io::Result<i32> {
            self.calls.borrow_mut().push(invocation.clone());
            let code = invocation
                .args
                .last()
                .and_then(|unit| self.codes.get(unit))
                .copied()
                .unwrap_or(0);
            Ok(code)
        }
    }

    fn project_root(names: &[&str]) -> tempfile::TempDir {
        let root = tempfile::tempdir().unwrap();
        for name in names {
            fs::create_dir_all(root.path().join(name)).unwrap();
        }
        root
    }

    fn controller(root: &tempfile::TempDir, init: FakeInit) -> Controller<FakeInit> {
        Controller::new(Resolver::new(root.path()), init).with_escalation(Escalation::Never)
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_needs_root() {
        assert!(Verb::Start.needs_root());
        assert!(Verb::Disable.needs_root());
        assert!(!Verb::Status.needs_root());
        assert!(!Verb::Logs.needs_root());
        assert!(!Verb::IsEnabled.needs_root());
    }

    #[test]
    fn test_systemctl_invocation() {
        let root = project_root(&[]);
        let ctl = controller(&root, FakeInit::default());

        let inv = ctl.invocation(Verb::Start, "docker-compose@db.service", &LogOptions::default());
        assert_eq!(inv.program, "systemctl");
        assert_eq!(inv.args, vec!["start", "docker-compose@db.service"]);

        let inv = ctl.invocation(Verb::Status, "docker-compose@db.service", &LogOptions::default());
        assert_eq!(inv.args, vec!["status", "--no-pager", "docker-compose@db.service"]);
    }

    #[test]
    fn test_logs_invocation() {
        let root = project_root(&[]);
        let ctl = controller(&root, FakeInit::default());
        let logs = LogOptions {
            follow: true,
            lines: Some(50),
            since: Some("1 hour ago".into()),
            until: None,
        };

        let inv = ctl.invocation(Verb::Logs, "docker-compose@db.service", &logs);
        assert_eq!(inv.program, "journalctl");
        assert_eq!(
            inv.args,
            vec!["-u", "docker-compose@db.service", "-f", "-n", "50", "--since", "1 hour ago"]
        );
    }

    #[test]
    fn test_escalation_always() {
        let root = project_root(&[]);
        let ctl = controller(&root, FakeInit::default()).with_escalation(Escalation::Always);

        let inv = ctl.invocation(Verb::Stop, "docker-compose@db.service", &LogOptions::default());
        assert_eq!(inv.program, "sudo");
        assert_eq!(inv.args, vec!["systemctl", "stop", "docker-compose@db.service"]);

        // Read-only verbs never escalate
        let inv = ctl.invocation(
            Verb::IsActive,
            "docker-compose@db.service",
            &LogOptions::default(),
        );
        assert_eq!(inv.program, "systemctl");
    }

    #[tokio::test]
    async fn test_batch_continues_past_unresolved() {
        let root = project_root(&["database", "genai/ollama"]);
        let ctl = controller(&root, FakeInit::default());

        let report = ctl
            .control(
                Verb::Start,
                &names(&["database", "missing", "genai-ollama"]),
                &LogOptions::default(),
            )
            .await;

        assert_eq!(report.outcomes.len(), 3);
        assert!(report.outcomes[0].result.is_ok());
        assert!(matches!(
            report.outcomes[1].result,
            Err(ControlError::Resolve(ResolveError::NotFound { .. }))
        ));
        assert!(report.outcomes[2].result.is_ok());
        assert_eq!(report.outcomes[1].unit, None);

        let calls = ctl.init().calls.borrow();
        let units: Vec<_> = calls.iter().map(|c| c.args.last().unwrap().as_str()).collect();
        assert_eq!(
            units,
            vec!["docker-compose@database.service", "docker-compose@genai-ollama.service"]
        );

        assert!(!report.succeeded());
        assert_eq!(report.exit_code(), exit::UNRESOLVED);
    }

    #[tokio::test]
    async fn test_batch_surfaces_exit_codes() {
        let root = project_root(&["web", "db"]);
        let mut init = FakeInit::default();
        init.codes.insert("docker-compose@web.service".into(), 3);
        let ctl = controller(&root, init);

        let report = ctl
            .control(Verb::Status, &names(&["web", "db"]), &LogOptions::default())
            .await;

        match &report.outcomes[0].result {
            Err(ControlError::Failed { service, code, .. }) => {
                assert_eq!(service, "web");
                assert_eq!(*code, 3);
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert!(report.outcomes[1].result.is_ok());
        assert_eq!(report.exit_code(), exit::FAILURE);
    }

    #[tokio::test]
    async fn test_batch_mixed_failures() {
        let root = project_root(&["web"]);
        let mut init = FakeInit::default();
        init.codes.insert("docker-compose@web.service".into(), 1);
        let ctl = controller(&root, init);

        let report = ctl
            .control(Verb::Restart, &names(&["web", "nope"]), &LogOptions::default())
            .await;
        assert_eq!(report.failed(), 1);
        assert_eq!(report.unresolved(), 1);
        assert_eq!(report.exit_code(), exit::FAILURE | exit::UNRESOLVED);
    }

    #[tokio::test]
    async fn test_all_succeed() {
        let root = project_root(&["a", "b"]);
        let ctl = controller(&root, FakeInit::default());

        let report = ctl
            .control(Verb::Enable, &names(&["a", "b"]), &LogOptions::default())
            .await;
        assert!(report.succeeded());
        assert_eq!(report.exit_code(), exit::SUCCESS);
    }

    #[tokio::test]
    async fn test_daemon_reload() {
        let root = project_root(&[]);
        let ctl = controller(&root, FakeInit::default());

        ctl.daemon_reload().await.unwrap();
        let calls = ctl.init().calls.borrow();
        assert_eq!(calls[0].program, "systemctl");
        assert_eq!(calls[0].args, vec!["daemon-reload"]);
    }

    #[tokio::test]
    async fn test_daemon_reload_escalates() {
        let root = project_root(&[]);
        let ctl = controller(&root, FakeInit::default()).with_escalation(Escalation::Always);

        ctl.daemon_reload().await.unwrap();
        let calls = ctl.init().calls.borrow();
        assert_eq!(calls[0].program, "sudo");
        assert_eq!(calls[0].args, vec!["systemctl", "daemon-reload"]);
    }

    #[tokio::test]
    async fn test_list_units() {
        let root = project_root(&[]);
        let ctl = controller(&root, FakeInit::default()).with_escalation(Escalation::Always);

        ctl.list_units().await.unwrap();
        ctl.list_unit_files().await.unwrap();

        let calls = ctl.init().calls.borrow();
        assert_eq!(calls.len(), 2);
        // Read-only, so never through sudo
        assert_eq!(calls[0].program, "systemctl");
        assert_eq!(
            calls[0].args,
            vec![
                "list-units",
                "--all",
                "--type=service",
                "docker-compose@*.service",
                "--no-pager",
                "--plain"
            ]
        );
        assert_eq!(calls[1].program, "systemctl");
        assert_eq!(
            calls[1].args,
            vec!["list-unit-files", "docker-compose@*.service", "--no-pager"]
        );
    }

    #[tokio::test]
    async fn test_list_units_failure() {
        let root = project_root(&[]);
        let mut init = FakeInit::default();
        init.codes.insert("--plain".into(), 1);
        let ctl = controller(&root, init);

        let err = ctl.list_units().await.unwrap_err();
        assert!(matches!(
            err,
            ControlError::Failed { verb: "list-units", code: 1, .. }
        ));
    }
}
