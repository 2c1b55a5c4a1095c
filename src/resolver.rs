//! Service name resolution
//!
//! Maps a logical service name such as `genai-ollama` onto its compose
//! project directory (`<root>/genai/ollama`) and onto the systemd template
//! instance that runs it (`docker-compose@genai-ollama.service`).

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Serialize;

/// Template unit prefix for compose projects
pub const UNIT_PREFIX: &str = "docker-compose@";

/// Unit type suffix
pub const UNIT_SUFFIX: &str = ".service";

/// Separator between path segments in a logical name
pub const SEPARATOR: char = '-';

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("Invalid service name '{name}': {reason}")]
    Invalid { name: String, reason: &'static str },

    #[error("Service '{name}' not found: {} does not exist", .path.display())]
    NotFound { name: String, path: PathBuf },
}

impl ResolveError {
    /// The name as the caller spelled it
    pub fn name(&self) -> &str {
        match self {
            Self::Invalid { name, .. } | Self::NotFound { name, .. } => name,
        }
    }
}

/// A normalized logical service name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ServiceName(String);

impl ServiceName {
    /// Normalize and validate a name.
    ///
    /// Accepts bare names (`database`), unit-suffixed names (`database.service`)
    /// and full instance names (`docker-compose@database.service`).
    pub fn parse(raw: &str) -> Result<Self, ResolveError> {
        let invalid = |reason| ResolveError::Invalid {
            name: raw.to_string(),
            reason,
        };

        let trimmed = raw.trim();
        let name = trimmed.strip_suffix(UNIT_SUFFIX).unwrap_or(trimmed);
        let name = name.strip_prefix(UNIT_PREFIX).unwrap_or(name);

        if name.is_empty() {
            return Err(invalid("name is empty"));
        }
        if name
            .chars()
            .any(|c| c == '/' || c == '@' || c.is_whitespace())
        {
            return Err(invalid("name contains '/', '@' or whitespace"));
        }
        for segment in name.split(SEPARATOR) {
            match segment {
                "" => return Err(invalid("name has an empty segment")),
                "." | ".." => return Err(invalid("name has a relative path segment")),
                _ => {}
            }
        }

        Ok(Self(name.to_string()))
    }

    /// Recover a service name from a `docker-compose@<name>.service` unit.
    /// Returns None for units outside the compose template.
    pub fn from_unit_name(unit: &str) -> Option<Self> {
        let inner = unit.strip_prefix(UNIT_PREFIX)?.strip_suffix(UNIT_SUFFIX)?;
        Self::parse(inner).ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path segments, in order
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(SEPARATOR)
    }

    /// The systemd template instance for this service
    pub fn unit_name(&self) -> String {
        format!("{}{}{}", UNIT_PREFIX, self.0, UNIT_SUFFIX)
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ServiceName {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A name that passed resolution, with the directory it maps to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub name: ServiceName,
    pub path: PathBuf,
}

/// Resolves logical names against a project root
#[derive(Debug, Clone)]
pub struct Resolver {
    project_root: PathBuf,
}

impl Resolver {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
        }
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Directories a name may live in, most specific first.
    ///
    /// `genai-ollama` maps to `genai/ollama`; when that is missing the
    /// literal `genai-ollama` directory is tried so hyphenated project
    /// directories still resolve.
    pub fn candidates(&self, name: &ServiceName) -> Vec<PathBuf> {
        let nested = name
            .segments()
            .fold(self.project_root.clone(), |path, segment| path.join(segment));

        let mut candidates = vec![nested];
        if name.segments().nth(1).is_some() {
            candidates.push(self.project_root.join(name.as_str()));
        }
        candidates
    }

    /// Resolve a name to an existing project directory
    pub fn resolve(&self, raw: &str) -> Result<Resolved, ResolveError> {
        let name = ServiceName::parse(raw)?;
        let mut candidates = self.candidates(&name);

        if let Some(path) = candidates.iter().find(|p| p.is_dir()) {
            log::debug!("Resolved {} -> {}", name, path.display());
            return Ok(Resolved {
                name,
                path: path.clone(),
            });
        }

        Err(ResolveError::NotFound {
            name: raw.trim().to_string(),
            path: candidates.swap_remove(0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_parse_bare_name() {
        let name = ServiceName::parse("genai-ollama").unwrap();
        assert_eq!(name.as_str(), "genai-ollama");
        assert_eq!(name.segments().collect::<Vec<_>>(), vec!["genai", "ollama"]);
    }

    #[test]
    fn test_parse_strips_unit_decorations() {
        for raw in [
            "database",
            " database ",
            "database.service",
            "docker-compose@database.service",
            "docker-compose@database",
        ] {
            assert_eq!(ServiceName::parse(raw).unwrap().as_str(), "database", "{raw}");
        }
    }

    #[test]
    fn test_parse_rejects_invalid() {
        for raw in ["", "   ", ".service", "a--b", "-a", "a-", "a/b", "a b", "..-etc", "x@y"] {
            let err = ServiceName::parse(raw).unwrap_err();
            assert!(matches!(err, ResolveError::Invalid { .. }), "{raw}");
        }
    }

    #[test]
    fn test_unit_name() {
        let name = ServiceName::parse("genai-open-webui").unwrap();
        assert_eq!(name.unit_name(), "docker-compose@genai-open-webui.service");
        assert_eq!(ServiceName::from_unit_name(&name.unit_name()), Some(name));
    }

    #[test]
    fn test_from_unit_name_ignores_foreign_units() {
        assert_eq!(ServiceName::from_unit_name("network-online.target"), None);
        assert_eq!(ServiceName::from_unit_name("docker.service"), None);
    }

    #[test]
    fn test_candidates() {
        let resolver = Resolver::new("/srv/compose");
        let name = ServiceName::parse("genai-ollama").unwrap();
        assert_eq!(
            resolver.candidates(&name),
            vec![
                PathBuf::from("/srv/compose/genai/ollama"),
                PathBuf::from("/srv/compose/genai-ollama"),
            ]
        );

        let single = ServiceName::parse("database").unwrap();
        assert_eq!(
            resolver.candidates(&single),
            vec![PathBuf::from("/srv/compose/database")]
        );
    }

    #[test]
    fn test_resolve_nested() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("genai/ollama")).unwrap();

        let resolver = Resolver::new(root.path());
        let resolved = resolver.resolve("genai-ollama").unwrap();
        assert_eq!(resolved.path, root.path().join("genai/ollama"));
        assert_eq!(resolved.name.as_str(), "genai-ollama");
    }

    #[test]
    fn test_resolve_hyphenated_directory() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("open-webui")).unwrap();

        let resolver = Resolver::new(root.path());
        let resolved = resolver.resolve("open-webui").unwrap();
        assert_eq!(resolved.path, root.path().join("open-webui"));
    }

    #[test]
    fn test_resolve_missing() {
        let root = tempfile::tempdir().unwrap();
        let resolver = Resolver::new(root.path());

        let err = resolver.resolve("genai-missing").unwrap_err();
        assert_eq!(
            err,
            ResolveError::NotFound {
                name: "genai-missing".into(),
                path: root.path().join("genai/missing"),
            }
        );
        assert_eq!(err.name(), "genai-missing");
    }

    #[test]
    fn test_resolve_file_is_not_a_project() {
        let root = tempfile::tempdir().unwrap();
        fs::write(root.path().join("notes"), "not a project").unwrap();

        let resolver = Resolver::new(root.path());
        assert!(resolver.resolve("notes").is_err());
    }
}
