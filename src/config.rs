//! Runtime configuration
//!
//! Roots come from the command line (or its environment variables) first,
//! then from the `docker-compose.env` file installed next to the template
//! unit, then from built-in defaults.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::control::Escalation;
use crate::graph::{DependencyManager, RecordStore};
use crate::resolver::Resolver;

pub const DEFAULT_PROJECT_ROOT: &str = "/srv/compose";
pub const DEFAULT_ARTIFACT_ROOT: &str = "/etc/systemd/system";

/// Environment file read by the template unit
pub const ENV_FILE_NAME: &str = "docker-compose.env";

/// Key in the environment file that names the project root
pub const PROJECT_DIR_KEY: &str = "DOCKER_PROJ_DIR";

/// The template every compose instance is started from
pub const TEMPLATE_UNIT: &str = "docker-compose@.service";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}:{line}: invalid value", .path.display())]
    Parse { path: PathBuf, line: usize },
}

/// Values given explicitly by the user
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub project_root: Option<PathBuf>,
    pub artifact_root: Option<PathBuf>,
    pub escalation: Escalation,
    pub reload: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub project_root: PathBuf,
    pub artifact_root: PathBuf,
    pub escalation: Escalation,
    /// Run `systemctl daemon-reload` after changing drop-ins
    pub reload: bool,
}

impl Config {
    pub async fn load(overrides: Overrides) -> Result<Self, ConfigError> {
        let artifact_root = overrides
            .artifact_root
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ARTIFACT_ROOT));

        let project_root = match overrides.project_root {
            Some(root) => root,
            None => {
                let env_path = artifact_root.join(ENV_FILE_NAME);
                read_env_file(&env_path)
                    .await?
                    .and_then(|mut vars| vars.remove(PROJECT_DIR_KEY))
                    .filter(|dir| !dir.is_empty())
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_PROJECT_ROOT))
            }
        };

        log::debug!(
            "project root {}, artifact root {}",
            project_root.display(),
            artifact_root.display()
        );

        Ok(Self {
            project_root,
            artifact_root,
            escalation: overrides.escalation,
            reload: overrides.reload,
        })
    }

    pub fn resolver(&self) -> Resolver {
        Resolver::new(&self.project_root)
    }

    pub fn store(&self) -> RecordStore {
        RecordStore::new(&self.artifact_root)
    }

    pub fn manager(&self) -> DependencyManager {
        DependencyManager::new(self.resolver(), self.store())
    }

    pub fn template_path(&self) -> PathBuf {
        self.artifact_root.join(TEMPLATE_UNIT)
    }
}

/// Read an environment file; `None` if it does not exist
pub async fn read_env_file(path: &Path) -> Result<Option<HashMap<String, String>>, ConfigError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    parse_env_file(&content)
        .map(Some)
        .map_err(|line| ConfigError::Parse {
            path: path.to_path_buf(),
            line,
        })
}

/// Parse `KEY=value` lines with shell quoting. Returns the 1-based line
/// number of the first unparseable value.
pub fn parse_env_file(content: &str) -> Result<HashMap<String, String>, usize> {
    let mut vars = HashMap::new();

    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);

        let Some((key, value)) = line.split_once('=') else {
            log::debug!("Ignoring line {} without '='", idx + 1);
            continue;
        };

        let words = shlex::split(value.trim()).ok_or(idx + 1)?;
        vars.insert(key.trim().to_string(), words.join(" "));
    }

    Ok(vars)
}
