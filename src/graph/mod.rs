//! Dependency graph between compose services
//!
//! Edges live in per-dependent records persisted as systemd drop-ins. The
//! graph is rebuilt from those records on every command; nothing outlives
//! the process.

mod engine;
mod store;

pub use engine::{AddOutcome, DependencyList, DependencyManager};
pub use store::RecordStore;

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::resolver::{ResolveError, ServiceName};
use crate::units::ParseError;

/// Strength of a dependency edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    /// `Requires=`: the dependent fails if the dependency fails
    Hard,
    /// `Wants=`: ordering preference only
    Soft,
}

impl DependencyKind {
    /// The systemd directive that expresses this strength
    pub fn directive(&self) -> &'static str {
        match self {
            Self::Hard => "Requires",
            Self::Soft => "Wants",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hard => "hard",
            Self::Soft => "soft",
        }
    }
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DependencyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hard" | "requires" => Ok(Self::Hard),
            "soft" | "wants" => Ok(Self::Soft),
            other => Err(format!(
                "unknown dependency type '{}' (expected hard or soft)",
                other
            )),
        }
    }
}

/// One directed edge: `dependent` needs `dependency` first
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyEdge {
    pub dependent: ServiceName,
    pub dependency: ServiceName,
    pub kind: DependencyKind,
}

/// Result of inserting an edge into a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Added,
    /// The pair existed with the other kind
    Changed { previous: DependencyKind },
    Unchanged,
}

/// All outgoing edges of one dependent, in insertion order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyRecord {
    dependent: ServiceName,
    edges: Vec<DependencyEdge>,
}

impl DependencyRecord {
    pub fn new(dependent: ServiceName) -> Self {
        Self {
            dependent,
            edges: Vec::new(),
        }
    }

    pub fn dependent(&self) -> &ServiceName {
        &self.dependent
    }

    pub fn edges(&self) -> &[DependencyEdge] {
        &self.edges
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn get(&self, dependency: &ServiceName) -> Option<&DependencyEdge> {
        self.edges.iter().find(|e| &e.dependency == dependency)
    }

    /// Insert an edge or replace the kind of an existing one.
    /// A replaced edge keeps its position.
    pub fn upsert(&mut self, dependency: ServiceName, kind: DependencyKind) -> Upsert {
        if let Some(edge) = self.edges.iter_mut().find(|e| e.dependency == dependency) {
            if edge.kind == kind {
                return Upsert::Unchanged;
            }
            let previous = edge.kind;
            edge.kind = kind;
            return Upsert::Changed { previous };
        }

        self.edges.push(DependencyEdge {
            dependent: self.dependent.clone(),
            dependency,
            kind,
        });
        Upsert::Added
    }

    /// Drop the edge to `dependency`; returns false if there was none
    pub fn remove(&mut self, dependency: &ServiceName) -> bool {
        let before = self.edges.len();
        self.edges.retain(|e| &e.dependency != dependency);
        self.edges.len() != before
    }

    /// Dependencies of one kind, in insertion order
    pub fn of_kind(&self, kind: DependencyKind) -> impl Iterator<Item = &ServiceName> {
        self.edges
            .iter()
            .filter(move |e| e.kind == kind)
            .map(|e| &e.dependency)
    }
}

/// A service reached while walking the graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reached {
    pub service: ServiceName,
    /// Kind of the edge it was first reached through
    pub kind: DependencyKind,
    /// The service whose edge reached it
    pub via: ServiceName,
    /// 1 for direct dependencies
    pub depth: usize,
}

/// A dependency cycle, as the path that closes it (first == last)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("Dependency cycle detected: {}", join_path(.nodes))]
pub struct CycleError {
    pub nodes: Vec<ServiceName>,
}

fn join_path(nodes: &[ServiceName]) -> String {
    nodes
        .iter()
        .map(ServiceName::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Transitive closure of one service
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    pub root: ServiceName,
    /// Reachable services in discovery (depth-first) order
    pub reached: Vec<Reached>,
    pub cycles: Vec<CycleError>,
}

impl CheckReport {
    pub fn has_cycles(&self) -> bool {
        !self.cycles.is_empty()
    }

    pub fn get(&self, service: &ServiceName) -> Option<&Reached> {
        self.reached.iter().find(|r| &r.service == service)
    }
}

/// In-memory union of all dependency records
#[derive(Debug, Default)]
pub struct DependencyGraph {
    records: BTreeMap<ServiceName, DependencyRecord>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record; empty records are not stored
    pub fn insert(&mut self, record: DependencyRecord) {
        if record.is_empty() {
            self.records.remove(record.dependent());
        } else {
            self.records.insert(record.dependent().clone(), record);
        }
    }

    pub fn record(&self, dependent: &ServiceName) -> Option<&DependencyRecord> {
        self.records.get(dependent)
    }

    /// Direct outgoing edges of a service
    pub fn dependencies(&self, dependent: &ServiceName) -> &[DependencyEdge] {
        self.records
            .get(dependent)
            .map(|r| r.edges())
            .unwrap_or_default()
    }

    /// Edges pointing at `dependency`, ordered by dependent name
    pub fn dependents_of(&self, dependency: &ServiceName) -> Vec<&DependencyEdge> {
        self.records
            .values()
            .filter_map(|r| r.get(dependency))
            .collect()
    }

    /// Depth-first transitive closure from `root`.
    ///
    /// A node already on the current path is never entered again; the edge
    /// that closes the loop is recorded as a cycle and the walk continues
    /// with the remaining edges. Finished nodes are not expanded twice.
    pub fn check(&self, root: &ServiceName) -> CheckReport {
        let mut walk = Walk {
            graph: self,
            path: Vec::new(),
            finished: HashSet::new(),
            reached: Vec::new(),
            cycles: Vec::new(),
        };
        walk.visit(root);

        CheckReport {
            root: root.clone(),
            reached: walk.reached,
            cycles: walk.cycles,
        }
    }
}

struct Walk<'a> {
    graph: &'a DependencyGraph,
    path: Vec<ServiceName>,
    finished: HashSet<ServiceName>,
    reached: Vec<Reached>,
    cycles: Vec<CycleError>,
}

impl Walk<'_> {
    fn visit(&mut self, node: &ServiceName) {
        let graph = self.graph;
        self.path.push(node.clone());

        for edge in graph.dependencies(node) {
            let dep = &edge.dependency;

            if let Some(start) = self.path.iter().position(|n| n == dep) {
                let mut nodes = self.path[start..].to_vec();
                nodes.push(dep.clone());
                log::debug!("Cycle through {} -> {}", node, dep);
                self.cycles.push(CycleError { nodes });
                continue;
            }

            if self.finished.contains(dep) {
                continue;
            }

            self.reached.push(Reached {
                service: dep.clone(),
                kind: edge.kind,
                via: node.clone(),
                depth: self.path.len(),
            });
            self.visit(dep);
        }

        self.path.pop();
        self.finished.insert(node.clone());
    }
}

/// Errors from dependency operations
#[derive(Debug, thiserror::Error)]
pub enum DepsError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("Service '{0}' cannot depend on itself")]
    SelfDependency(ServiceName),

    #[error("Failed to persist dependencies of '{name}': {source}")]
    Persistence {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed dependency drop-in for '{name}': {source}")]
    Parse {
        name: String,
        #[source]
        source: ParseError,
    },
}

impl DepsError {
    pub(crate) fn io(name: impl fmt::Display, source: std::io::Error) -> Self {
        Self::Persistence {
            name: name.to_string(),
            source,
        }
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Resolve(_) => crate::exit::UNRESOLVED,
            _ => crate::exit::FAILURE,
        }
    }
}
