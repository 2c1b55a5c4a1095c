//! Dependency record persistence
//!
//! One drop-in per dependent at
//! `<root>/docker-compose@<name>.service.d/dependencies.conf`.
//! Writes go through a temp file and a rename so systemd never reads a
//! half-written fragment. Two processes editing the same dependent at once
//! race; the last rename wins.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::{DependencyGraph, DependencyRecord, DepsError};
use crate::resolver::ServiceName;
use crate::units::{self, DROPIN_FILE};

const DROPIN_DIR_SUFFIX: &str = ".d";

/// Reads and writes dependency drop-ins under an artifact root
#[derive(Debug, Clone)]
pub struct RecordStore {
    root: PathBuf,
}

impl RecordStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Drop-in directory of a service's unit
    pub fn dropin_dir(&self, name: &ServiceName) -> PathBuf {
        self.root
            .join(format!("{}{}", name.unit_name(), DROPIN_DIR_SUFFIX))
    }

    /// Path of the managed dependency drop-in
    pub fn artifact_path(&self, name: &ServiceName) -> PathBuf {
        self.dropin_dir(name).join(DROPIN_FILE)
    }

    /// Load a record; a missing drop-in is an empty record
    pub async fn load(&self, name: &ServiceName) -> Result<DependencyRecord, DepsError> {
        let path = self.artifact_path(name);
        let mut record = DependencyRecord::new(name.clone());

        let content = match fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(record),
            Err(e) => return Err(DepsError::io(name, e)),
        };

        let edges = units::parse_dependencies(&content).map_err(|source| DepsError::Parse {
            name: name.to_string(),
            source,
        })?;

        for (kind, unit) in edges {
            match ServiceName::from_unit_name(&unit) {
                Some(dep) if &dep == name => {
                    log::warn!("Ignoring self-dependency in {}", path.display());
                }
                Some(dep) => {
                    record.upsert(dep, kind);
                }
                None => {
                    log::debug!("Ignoring non-compose unit {} in {}", unit, path.display());
                }
            }
        }

        Ok(record)
    }

    /// Persist a record. An empty record removes the drop-in instead.
    pub async fn save(&self, record: &DependencyRecord) -> Result<(), DepsError> {
        let name = record.dependent();

        if record.is_empty() {
            return self.delete(name).await;
        }

        let dir = self.dropin_dir(name);
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| DepsError::io(name, e))?;

        let entries: Vec<(_, String)> = record
            .edges()
            .iter()
            .map(|e| (e.kind, e.dependency.unit_name()))
            .collect();
        let content = units::render_dependencies(entries.iter().map(|(k, u)| (*k, u.as_str())));

        let path = self.artifact_path(name);
        let tmp = path.with_extension("conf.tmp");

        if let Err(e) = write_synced(&tmp, content.as_bytes()).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(DepsError::io(name, e));
        }
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(DepsError::io(name, e));
        }

        log::debug!("Wrote {}", path.display());
        Ok(())
    }

    async fn delete(&self, name: &ServiceName) -> Result<(), DepsError> {
        let path = self.artifact_path(name);

        match fs::remove_file(&path).await {
            Ok(()) => log::debug!("Removed {}", path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(DepsError::io(name, e)),
        }

        // Other drop-ins may share the directory; only remove it when empty
        if let Err(e) = fs::remove_dir(self.dropin_dir(name)).await {
            log::debug!("Keeping drop-in directory for {}: {}", name, e);
        }

        Ok(())
    }

    /// Every service that currently owns a dependency drop-in
    pub async fn dependents(&self) -> Result<Vec<ServiceName>, DepsError> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(e) => e,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(DepsError::io(self.root.display(), e)),
        };

        let mut names = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => return Err(DepsError::io(self.root.display(), e)),
            };

            let file_name = entry.file_name();
            let Some(dir_name) = file_name.to_str() else {
                continue;
            };
            let Some(unit) = dir_name.strip_suffix(DROPIN_DIR_SUFFIX) else {
                continue;
            };
            let Some(name) = ServiceName::from_unit_name(unit) else {
                continue;
            };

            let artifact = entry.path().join(DROPIN_FILE);
            match fs::metadata(&artifact).await {
                Ok(meta) if meta.is_file() => names.push(name),
                Ok(_) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(DepsError::io(&name, e)),
            }
        }

        names.sort();
        Ok(names)
    }

    /// Rebuild the whole graph from disk
    pub async fn load_graph(&self) -> Result<DependencyGraph, DepsError> {
        let mut graph = DependencyGraph::new();
        for name in self.dependents().await? {
            graph.insert(self.load(&name).await?);
        }
        Ok(graph)
    }
}

async fn write_synced(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(data).await?;
    file.sync_all().await
}
