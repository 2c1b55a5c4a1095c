//! Compose file and env file discovery

use std::path::{Path, PathBuf};

use super::ComposeError;

/// Accepted compose file names; a project must contain exactly one
pub const COMPOSE_FILES: [&str; 4] = [
    "docker-compose.yml",
    "docker-compose.yaml",
    "compose.yml",
    "compose.yaml",
];

/// Configuration files attached to a compose invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectFiles {
    pub compose_file: PathBuf,
    /// Every `.env*` file, sorted by name
    pub env_files: Vec<PathBuf>,
}

/// Find the compose file and env files of a project directory
pub fn discover(dir: &Path) -> Result<ProjectFiles, ComposeError> {
    if !dir.is_dir() {
        return Err(ComposeError::NoProjectDir(dir.to_path_buf()));
    }

    let mut found: Vec<PathBuf> = COMPOSE_FILES
        .iter()
        .map(|name| dir.join(name))
        .filter(|path| path.is_file())
        .collect();

    let compose_file = match found.len() {
        0 => return Err(ComposeError::NoComposeFile(dir.to_path_buf())),
        1 => found.remove(0),
        _ => {
            let names = found
                .iter()
                .filter_map(|p| p.file_name().and_then(|n| n.to_str()))
                .collect::<Vec<_>>()
                .join(", ");
            return Err(ComposeError::AmbiguousComposeFile {
                dir: dir.to_path_buf(),
                names,
            });
        }
    };

    Ok(ProjectFiles {
        compose_file,
        env_files: env_files(dir)?,
    })
}

fn env_files(dir: &Path) -> Result<Vec<PathBuf>, ComposeError> {
    let dir_str = dir
        .to_str()
        .ok_or_else(|| ComposeError::NonUtf8Path(dir.to_path_buf()))?;
    let pattern = format!("{}/.env*", glob::Pattern::escape(dir_str));

    let paths = glob::glob(&pattern).map_err(|e| ComposeError::Pattern(e.to_string()))?;

    let mut files: Vec<PathBuf> = paths
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                log::warn!("Skipping unreadable env file: {}", e);
                None
            }
        })
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    Ok(files)
}
