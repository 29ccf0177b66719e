//! The playground: files, composition, the live preview and its layout.
//!
//! [`Playground`] implements the control flow between the components. Edits
//! and file-list changes re-compose and re-materialize the preview unless the
//! host is paused or nothing is mounted yet; an explicit [`Playground::run`]
//! always starts from a clean context.

use crate::bridge::log::LogEntry;
use crate::compose::{ComposedDocument, Composer};
use crate::error::Result;
use crate::layout::LayoutManager;
use crate::sandbox::host::{HostState, SandboxHost};
use crate::sandbox::runtime::{ExecutionReport, IsolatedRuntime, WasmRuntime};
use crate::workspace::{EditorBinding, FileId, FileNavigator, FileStore, ProjectStorage, SourceFile};

/// A multi-file project with a live, isolated preview.
#[derive(Debug)]
pub struct Playground<R: IsolatedRuntime = WasmRuntime> {
    navigator: FileNavigator,
    composer: Composer,
    host: SandboxHost<R>,
    layout: LayoutManager,
}

impl<R: IsolatedRuntime> Playground<R> {
    /// Create a playground over `store`, previewed by `host`.
    pub fn new(store: FileStore, host: SandboxHost<R>) -> Self {
        Self::with_composer(store, Composer::default(), host)
    }

    /// Create a playground with custom composition options.
    pub fn with_composer(store: FileStore, composer: Composer, host: SandboxHost<R>) -> Self {
        Self {
            navigator: FileNavigator::new(store),
            composer,
            host,
            layout: LayoutManager::default(),
        }
    }

    /// Load a project from storage.
    pub fn load(storage: &dyn ProjectStorage, project_id: &str, host: SandboxHost<R>) -> Result<Self> {
        let files = storage.load(project_id)?;
        tracing::debug!(project_id, files = files.len(), "project loaded");
        Ok(Self::new(FileStore::from_files(files), host))
    }

    /// Save the project's files to storage.
    pub fn save(&self, storage: &dyn ProjectStorage, project_id: &str) -> Result<()> {
        storage.save(project_id, self.navigator.files())
    }

    /// The files and the active selection.
    pub fn navigator(&self) -> &FileNavigator {
        &self.navigator
    }

    /// All files in store order.
    pub fn files(&self) -> &[SourceFile] {
        self.navigator.files()
    }

    /// Register a callback run with the full collection after every change.
    pub fn on_change<F>(&mut self, callback: F)
    where
        F: FnMut(&[SourceFile]) + Send + 'static,
    {
        self.navigator.on_change(callback);
    }

    /// What the editing surface should display.
    pub fn editor_binding(&self) -> Option<EditorBinding> {
        self.navigator.editor_binding()
    }

    /// The preview host.
    pub fn host(&self) -> &SandboxHost<R> {
        &self.host
    }

    /// Current host state.
    pub fn state(&self) -> HostState {
        self.host.state()
    }

    /// The pane layout.
    pub fn layout(&self) -> &LayoutManager {
        &self.layout
    }

    /// Mutable access to the pane layout, for pointer events.
    pub fn layout_mut(&mut self) -> &mut LayoutManager {
        &mut self.layout
    }

    /// Compose the current files.
    pub fn composed(&self) -> ComposedDocument {
        self.composer.compose_store(self.navigator.store())
    }

    /// First materialization, if the project has an entry file.
    pub fn mount(&mut self) -> Option<u64> {
        if self.navigator.store().entry().is_none() {
            tracing::debug!("nothing to mount: no entry file");
            return None;
        }
        let document = self.composed();
        Some(self.host.mount(&document))
    }

    /// Explicit run with a freshly composed document.
    pub fn run(&mut self) -> Option<u64> {
        let document = self.composed();
        self.host.run(&document)
    }

    /// Replace a file's content from the editor.
    pub fn edit(&mut self, id: FileId, content: impl Into<String>) -> bool {
        let changed = self.navigator.update_content(id, content);
        if changed {
            self.inputs_changed();
        }
        changed
    }

    /// Add a file and make it active.
    pub fn add_file(&mut self, name: impl Into<String>) -> FileId {
        let id = self.navigator.add_file(name);
        self.inputs_changed();
        id
    }

    /// Delete a file; the entry file is never removed.
    pub fn delete_file(&mut self, id: FileId) -> bool {
        let removed = self.navigator.delete_file(id);
        if removed {
            self.inputs_changed();
        }
        removed
    }

    /// Select the file shown in the editor.
    pub fn select_file(&mut self, id: FileId) {
        self.navigator.select_file(id);
    }

    /// Toggle automatic re-materialization and return whether it is paused.
    pub fn toggle_pause(&mut self) -> bool {
        self.host.toggle_pause()
    }

    /// Tear down the preview.
    pub fn destroy(&mut self) {
        self.host.destroy();
    }

    /// Wait for the current preview program to finish.
    pub async fn wait_for_exit(&self) -> Result<ExecutionReport> {
        self.host.wait_for_exit().await
    }

    /// Copy of the console log.
    pub fn console(&self) -> Vec<LogEntry> {
        self.host.console()
    }

    /// Empty the console log.
    pub fn clear_console(&self) {
        self.host.clear_console();
    }

    fn inputs_changed(&mut self) -> Option<u64> {
        // Composition is skipped whenever the host would not use it.
        if self.host.is_paused() || !self.host.is_materialized() {
            return None;
        }
        let document = self.composed();
        self.host.inputs_changed(&document)
    }
}
