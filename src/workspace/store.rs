//! Ordered collection of a project's source files.
//!
//! # Invariant
//!
//! Whenever the store is non-empty, exactly one file has `is_entry == true`.
//! Every mutating operation preserves this; [`FileStore::from_files`]
//! repairs collections loaded from elsewhere.

use crate::workspace::file::{FileId, SourceFile};

/// In-memory file collection for one project.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileStore {
    files: Vec<SourceFile>,
}

impl FileStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-seeded with a single entry file.
    pub fn seeded(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            files: vec![SourceFile::entry(name, content)],
        }
    }

    /// Build a store from an externally loaded collection.
    ///
    /// With no entry file the first file is promoted; with several, the
    /// first one keeps the role.
    pub fn from_files(mut files: Vec<SourceFile>) -> Self {
        let entries = files.iter().filter(|f| f.is_entry).count();
        match entries {
            0 if !files.is_empty() => {
                tracing::warn!(file = %files[0].name, "no entry file in project, promoting first file");
                files[0].is_entry = true;
            }
            n if n > 1 => {
                tracing::warn!(entries = n, "multiple entry files in project, keeping the first");
                let mut seen = false;
                for file in files.iter_mut().filter(|f| f.is_entry) {
                    file.is_entry = !seen;
                    seen = true;
                }
            }
            _ => {}
        }
        Self { files }
    }

    /// All files in insertion order.
    pub fn files(&self) -> &[SourceFile] {
        &self.files
    }

    /// Number of files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check if the store holds no files.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Look up a file by id.
    pub fn get(&self, id: FileId) -> Option<&SourceFile> {
        self.files.iter().find(|f| f.id == id)
    }

    /// Check if a file with this id exists.
    pub fn contains(&self, id: FileId) -> bool {
        self.get(id).is_some()
    }

    /// First file in store order carrying this name.
    ///
    /// Names are not unique; later duplicates are shadowed.
    pub fn find_by_name(&self, name: &str) -> Option<&SourceFile> {
        self.files.iter().find(|f| f.name == name)
    }

    /// The entry file, if the store is non-empty.
    pub fn entry(&self) -> Option<&SourceFile> {
        self.files.iter().find(|f| f.is_entry)
    }

    /// Check if `id` names the entry file.
    pub fn is_entry(&self, id: FileId) -> bool {
        self.get(id).map(|f| f.is_entry).unwrap_or(false)
    }

    /// First file in store order.
    pub fn first(&self) -> Option<&SourceFile> {
        self.files.first()
    }

    /// Append a file.
    ///
    /// The first file added to an empty store becomes the entry; any later
    /// file is stored as non-entry regardless of its flag.
    pub fn push(&mut self, mut file: SourceFile) -> FileId {
        file.is_entry = self.files.is_empty();
        let id = file.id;
        self.files.push(file);
        id
    }

    /// Remove a file unless it is the entry file.
    ///
    /// Returns `true` if a file was removed. Removing the entry file or an
    /// unknown id leaves the store untouched.
    pub fn remove(&mut self, id: FileId) -> bool {
        match self.files.iter().position(|f| f.id == id) {
            Some(idx) if !self.files[idx].is_entry => {
                self.files.remove(idx);
                true
            }
            _ => false,
        }
    }

    /// Replace a file's content wholesale.
    ///
    /// Returns `false` if the id is unknown.
    pub fn update_content(&mut self, id: FileId, content: impl Into<String>) -> bool {
        match self.files.iter_mut().find(|f| f.id == id) {
            Some(file) => {
                file.content = content.into();
                true
            }
            None => false,
        }
    }

    /// Change a file's display name. The language stays as inferred at creation.
    pub fn rename(&mut self, id: FileId, name: impl Into<String>) -> bool {
        match self.files.iter_mut().find(|f| f.id == id) {
            Some(file) => {
                file.name = name.into();
                true
            }
            None => false,
        }
    }
}
