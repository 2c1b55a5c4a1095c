//! compose-systemd - dependency management for compose projects under systemd
//!
//! Every compose project under the project root runs as an instance of the
//! `docker-compose@.service` template. This crate:
//! - Resolves logical service names to project directories and units
//! - Records inter-service dependencies as systemd drop-ins
//! - Walks the resulting graph and reports cycles
//! - Drives systemctl/journalctl over batches of services
//! - Wraps `docker compose` with per-project files and default flags
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │          composectl            │     compose     │
//! ├──────────────────────────────────────────────────┤
//! │  DependencyManager │ Controller │ build_command  │
//! ├──────────────────────────────────────────────────┤
//! │  RecordStore (drop-ins)  │  Resolver (names)     │
//! └──────────────────────────────────────────────────┘
//! ```

pub mod compose;
pub mod config;
pub mod control;
pub mod graph;
pub mod resolver;
pub mod units;

pub use config::{Config, Overrides};
pub use control::{Controller, Verb};
pub use graph::{DependencyKind, DependencyManager};
pub use resolver::{Resolver, ServiceName};

/// Process exit codes shared by the binaries
pub mod exit {
    pub const SUCCESS: i32 = 0;
    /// An operation or external command failed
    pub const FAILURE: i32 = 1;
    /// At least one name did not resolve; combines with `FAILURE`
    pub const UNRESOLVED: i32 = 2;
    /// `deps check` found a cycle
    pub const CYCLE: i32 = 4;
}
