//! `.anvil/` workspace directory: database location, artifact cache, and
//! the advisory lock serializing writers.

mod lock;

pub use lock::AnvilLock;

use std::path::{Path, PathBuf};

use crate::errors::WorkspaceError;

/// The per-project `.anvil/` directory.
///
/// Layout:
///   .anvil/history.db     the store (unless overridden)
///   .anvil/artifacts/     cached CI artifact downloads, named by remote id
///   .anvil/argos.lock     advisory writer lock
#[derive(Debug, Clone)]
pub struct AnvilWorkspace {
    root: PathBuf,
    anvil_dir: PathBuf,
}

impl AnvilWorkspace {
    /// Open (creating if needed) the workspace under `project_root`.
    pub fn open(project_root: &Path) -> Result<Self, WorkspaceError> {
        let anvil_dir = project_root.join(".anvil");
        std::fs::create_dir_all(&anvil_dir)?;
        std::fs::create_dir_all(anvil_dir.join("artifacts"))?;
        Ok(Self {
            root: project_root.to_path_buf(),
            anvil_dir,
        })
    }

    pub fn project_root(&self) -> &Path {
        &self.root
    }

    pub fn dir(&self) -> &Path {
        &self.anvil_dir
    }

    /// Default database path. Callers may override via config or env.
    pub fn default_db_path(&self) -> PathBuf {
        self.anvil_dir.join("history.db")
    }

    /// Cache path for a downloaded CI artifact, addressed by remote ids.
    pub fn artifact_cache_path(&self, run_id: u64, artifact_name: &str) -> PathBuf {
        let safe: String = artifact_name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.anvil_dir.join("artifacts").join(format!("{run_id}-{safe}"))
    }

    /// Acquire the workspace lock handle.
    pub fn lock(&self) -> Result<AnvilLock, WorkspaceError> {
        AnvilLock::new(&self.anvil_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_creates_layout() {
        let dir = tempfile::tempdir().unwrap();
        let ws = AnvilWorkspace::open(dir.path()).unwrap();
        assert!(ws.dir().is_dir());
        assert!(ws.dir().join("artifacts").is_dir());
        assert!(ws.default_db_path().ends_with(".anvil/history.db"));
    }

    #[test]
    fn artifact_paths_are_sanitized() {
        let dir = tempfile::tempdir().unwrap();
        let ws = AnvilWorkspace::open(dir.path()).unwrap();
        let p = ws.artifact_cache_path(42, "coverage report.xml");
        assert!(p.to_string_lossy().ends_with("42-coverage_report.xml"));
    }
}
