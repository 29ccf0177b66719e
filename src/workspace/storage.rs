//! Persistence collaborator interface.
//!
//! The playground only loads a project's files once and hands every change
//! back to the host application; how they are stored is up to the
//! implementation.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::error::{Result, SandboxError};
use crate::workspace::file::SourceFile;

/// Loads and saves the file collection of a project.
pub trait ProjectStorage: Send + Sync {
    /// Load every file of a project. Unknown projects load as empty.
    fn load(&self, project_id: &str) -> Result<Vec<SourceFile>>;

    /// Replace the stored collection of a project.
    fn save(&self, project_id: &str, files: &[SourceFile]) -> Result<()>;
}

/// Storage kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    projects: Mutex<HashMap<String, Vec<SourceFile>>>,
}

impl MemoryStorage {
    /// Create an empty storage.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProjectStorage for MemoryStorage {
    fn load(&self, project_id: &str) -> Result<Vec<SourceFile>> {
        let projects = self.projects.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(projects.get(project_id).cloned().unwrap_or_default())
    }

    fn save(&self, project_id: &str, files: &[SourceFile]) -> Result<()> {
        let mut projects = self.projects.lock().unwrap_or_else(PoisonError::into_inner);
        projects.insert(project_id.to_string(), files.to_vec());
        Ok(())
    }
}

/// One pretty-printed JSON document per project inside a root directory.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    root: PathBuf,
}

impl JsonFileStorage {
    /// Open a storage rooted at an existing, writable directory.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let attr = fs::metadata(&root)?;
        if !attr.is_dir() {
            return Err(SandboxError::Storage(format!(
                "{} is not a directory",
                root.display()
            )));
        }
        if attr.permissions().readonly() {
            return Err(SandboxError::Storage(format!(
                "{} is read-only",
                root.display()
            )));
        }
        Ok(Self {
            root: root.canonicalize()?,
        })
    }

    /// Root directory of the storage.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn project_path(&self, project_id: &str) -> Result<PathBuf> {
        let valid = !project_id.is_empty()
            && project_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(SandboxError::Storage(format!(
                "invalid project id: {project_id:?}"
            )));
        }
        Ok(self.root.join(format!("{project_id}.json")))
    }
}

impl ProjectStorage for JsonFileStorage {
    fn load(&self, project_id: &str) -> Result<Vec<SourceFile>> {
        let path = self.project_path(project_id)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(SandboxError::Io(e)),
        }
    }

    fn save(&self, project_id: &str, files: &[SourceFile]) -> Result<()> {
        let path = self.project_path(project_id)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(files)?)?;
        fs::rename(&tmp, &path)?;
        tracing::debug!(project = project_id, files = files.len(), "project saved");
        Ok(())
    }
}
