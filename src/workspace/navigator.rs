//! UI-facing file operations with an active-file pointer.

use std::fmt;

use crate::workspace::editor::EditorBinding;
use crate::workspace::file::{FileId, SourceFile};
use crate::workspace::store::FileStore;

type ChangeCallback = Box<dyn FnMut(&[SourceFile]) + Send>;

/// Selects, adds and deletes files of a [`FileStore`].
///
/// The active pointer never dangles: whenever the file it names disappears
/// or an unknown id is selected, it falls back to the first remaining file.
pub struct FileNavigator {
    store: FileStore,
    active: Option<FileId>,
    observers: Vec<ChangeCallback>,
}

impl fmt::Debug for FileNavigator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileNavigator")
            .field("store", &self.store)
            .field("active", &self.active)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl FileNavigator {
    /// Wrap a store; the entry file starts out active.
    pub fn new(store: FileStore) -> Self {
        let active = store.entry().or(store.first()).map(|f| f.id);
        Self {
            store,
            active,
            observers: Vec::new(),
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &FileStore {
        &self.store
    }

    /// All files in store order.
    pub fn files(&self) -> &[SourceFile] {
        self.store.files()
    }

    /// Register a callback invoked with the full collection after every
    /// successful mutation. This is where the host application persists.
    pub fn on_change<F>(&mut self, callback: F)
    where
        F: FnMut(&[SourceFile]) + Send + 'static,
    {
        self.observers.push(Box::new(callback));
    }

    /// Id of the active file.
    pub fn active_id(&self) -> Option<FileId> {
        self.active
    }

    /// The active file.
    pub fn active_file(&self) -> Option<&SourceFile> {
        self.active.and_then(|id| self.store.get(id))
    }

    /// Add a non-entry file with placeholder content and make it active.
    pub fn add_file(&mut self, name: impl Into<String>) -> FileId {
        let file = SourceFile::placeholder(name);
        tracing::debug!(name = %file.name, language = ?file.language, "adding file");
        let id = self.store.push(file);
        self.active = Some(id);
        self.notify();
        id
    }

    /// Delete a file. Deleting the entry file is a silent no-op.
    ///
    /// Returns `true` if a file was removed.
    pub fn delete_file(&mut self, id: FileId) -> bool {
        if self.store.is_entry(id) {
            tracing::debug!(%id, "ignoring delete of entry file");
            return false;
        }
        if !self.store.remove(id) {
            return false;
        }
        if self.active == Some(id) {
            self.active = self.store.first().map(|f| f.id);
        }
        self.notify();
        true
    }

    /// Point the active selection at `id`, or at the first file if `id` is gone.
    pub fn select_file(&mut self, id: FileId) {
        self.active = if self.store.contains(id) {
            Some(id)
        } else {
            self.store.first().map(|f| f.id)
        };
    }

    /// Replace a file's content wholesale.
    pub fn update_content(&mut self, id: FileId, content: impl Into<String>) -> bool {
        let changed = self.store.update_content(id, content);
        if changed {
            self.notify();
        }
        changed
    }

    /// Rename a file without re-deriving its language.
    pub fn rename_file(&mut self, id: FileId, name: impl Into<String>) -> bool {
        let changed = self.store.rename(id, name);
        if changed {
            self.notify();
        }
        changed
    }

    /// What the editing surface should display for the active file.
    pub fn editor_binding(&self) -> Option<EditorBinding> {
        self.active_file().map(EditorBinding::for_file)
    }

    fn notify(&mut self) {
        let files = self.store.files();
        for observer in self.observers.iter_mut() {
            observer(files);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn navigator() -> FileNavigator {
        FileNavigator::new(FileStore::seeded("index.html", "<h1>Hi</h1>"))
    }

    #[test]
    fn test_entry_starts_active() {
        let nav = navigator();
        assert_eq!(nav.active_file().unwrap().name, "index.html");
    }

    #[test]
    fn test_add_file_becomes_active() {
        let mut nav = navigator();
        let id = nav.add_file("style.css");
        assert_eq!(nav.active_id(), Some(id));
        let file = nav.active_file().unwrap();
        assert!(!file.is_entry);
        assert_eq!(file.content, "/* style.css */\n");
    }

    #[test]
    fn test_delete_active_falls_back_to_first() {
        let mut nav = navigator();
        let id = nav.add_file("app.js");
        nav.select_file(id);
        assert!(nav.delete_file(id));
        let active = nav.active_id().unwrap();
        assert_ne!(active, id);
        assert!(nav.store().contains(active));
    }

    #[test]
    fn test_delete_entry_is_silent_noop() {
        let mut nav = navigator();
        let entry = nav.store().entry().unwrap().id;
        let before = nav.files().to_vec();
        assert!(!nav.delete_file(entry));
        assert_eq!(nav.files(), before.as_slice());
    }

    #[test]
    fn test_select_unknown_falls_back() {
        let mut nav = navigator();
        nav.add_file("a.js");
        nav.select_file(FileId::new());
        assert_eq!(nav.active_id(), nav.store().first().map(|f| f.id));
    }

    #[test]
    fn test_observers_see_every_mutation() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut nav = navigator();
        nav.on_change(move |files| sink.lock().unwrap().push(files.len()));

        let id = nav.add_file("a.js");
        nav.update_content(id, "console.log(1)");
        nav.delete_file(id);
        nav.select_file(FileId::new());

        assert_eq!(*seen.lock().unwrap(), vec![2, 2, 1]);
    }
}
