//! Dependency operations
//!
//! Every operation validates names through the resolver, loads what it
//! needs from the record store, and writes back before returning.

use serde::Serialize;

use super::{CheckReport, DependencyKind, DepsError, RecordStore, Upsert};
use crate::resolver::{Resolver, ServiceName};

/// What `add` did to the record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    /// Existing edge switched kind
    Replaced { previous: DependencyKind },
    /// Identical edge already present; nothing written
    Unchanged,
}

impl AddOutcome {
    /// True if the drop-in on disk changed
    pub fn changed(&self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

/// Direct dependencies of one service, split by kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyList {
    pub dependent: ServiceName,
    pub requires: Vec<ServiceName>,
    pub wants: Vec<ServiceName>,
}

impl DependencyList {
    pub fn is_empty(&self) -> bool {
        self.requires.is_empty() && self.wants.is_empty()
    }

    pub fn len(&self) -> usize {
        self.requires.len() + self.wants.len()
    }
}

/// Dependency graph operations over a project root and an artifact root
#[derive(Debug, Clone)]
pub struct DependencyManager {
    resolver: Resolver,
    store: RecordStore,
}

impl DependencyManager {
    pub fn new(resolver: Resolver, store: RecordStore) -> Self {
        Self { resolver, store }
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Make `dependent` depend on `dependency`
    pub async fn add(
        &self,
        dependent: &str,
        dependency: &str,
        kind: DependencyKind,
    ) -> Result<AddOutcome, DepsError> {
        let dependent = self.resolver.resolve(dependent)?.name;
        let dependency = self.resolver.resolve(dependency)?.name;

        if dependent == dependency {
            return Err(DepsError::SelfDependency(dependent));
        }

        let mut record = self.store.load(&dependent).await?;
        let outcome = match record.upsert(dependency.clone(), kind) {
            Upsert::Added => AddOutcome::Added,
            Upsert::Changed { previous } => AddOutcome::Replaced { previous },
            Upsert::Unchanged => return Ok(AddOutcome::Unchanged),
        };

        self.store.save(&record).await?;
        log::info!("{} -> {} ({})", dependent, dependency, kind);
        Ok(outcome)
    }

    /// Drop the edge from `dependent` to `dependency`.
    ///
    /// Returns false when there was no such edge. The dependency only has
    /// to be a well-formed name so edges to deleted projects can be cleaned up.
    pub async fn remove(&self, dependent: &str, dependency: &str) -> Result<bool, DepsError> {
        let dependent = self.resolver.resolve(dependent)?.name;
        let dependency = ServiceName::parse(dependency)?;

        let mut record = self.store.load(&dependent).await?;
        if !record.remove(&dependency) {
            log::debug!("No edge {} -> {}", dependent, dependency);
            return Ok(false);
        }

        self.store.save(&record).await?;
        log::info!("{} -/-> {}", dependent, dependency);
        Ok(true)
    }

    /// Direct dependencies, in the order they were added
    pub async fn list(&self, dependent: &str) -> Result<DependencyList, DepsError> {
        let dependent = self.resolver.resolve(dependent)?.name;
        let record = self.store.load(&dependent).await?;

        Ok(DependencyList {
            requires: record.of_kind(DependencyKind::Hard).cloned().collect(),
            wants: record.of_kind(DependencyKind::Soft).cloned().collect(),
            dependent,
        })
    }

    /// Transitive dependencies, with any cycles found on the way
    pub async fn check(&self, dependent: &str) -> Result<CheckReport, DepsError> {
        let dependent = self.resolver.resolve(dependent)?.name;
        let graph = self.store.load_graph().await?;
        Ok(graph.check(&dependent))
    }

    /// Services that depend directly on `dependency`, with the edge kind
    pub async fn reverse(
        &self,
        dependency: &str,
    ) -> Result<Vec<(ServiceName, DependencyKind)>, DepsError> {
        let dependency = self.resolver.resolve(dependency)?.name;
        let graph = self.store.load_graph().await?;

        Ok(graph
            .dependents_of(&dependency)
            .into_iter()
            .map(|e| (e.dependent.clone(), e.kind))
            .collect())
    }
}
