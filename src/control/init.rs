//! External init system invocations

use std::fmt;
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;

use tokio::process::Command;

/// A program and its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl fmt::Display for Invocation {
    /// Shell-quoted, copy-pasteable form
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let words =
            std::iter::once(self.program.as_str()).chain(self.args.iter().map(String::as_str));
        match shlex::try_join(words) {
            Ok(line) => f.write_str(&line),
            Err(_) => write!(f, "{} {}", self.program, self.args.join(" ")),
        }
    }
}

/// Something that can run init system commands and report their exit code
#[allow(async_fn_in_trait)]
pub trait InitSystem {
    async fn run(&self, invocation: &Invocation) -> std::io::Result<i32>;
}

/// Runs commands on the host, inheriting stdio so output reaches the user
#[derive(Debug, Clone, Copy, Default)]
pub struct HostInitSystem;

impl InitSystem for HostInitSystem {
    async fn run(&self, invocation: &Invocation) -> std::io::Result<i32> {
        let status = Command::new(&invocation.program)
            .args(&invocation.args)
            .status()
            .await?;
        Ok(exit_code(status))
    }
}

/// Exit code of a finished child. Killed by a signal: report it the way
/// shells do.
pub(crate) fn exit_code(status: ExitStatus) -> i32 {
    status
        .code()
        .or_else(|| status.signal().map(|sig| 128 + sig))
        .unwrap_or(1)
}
