//! The contract offered to the external text-editing widget.
//!
//! The widget is a black box: it receives a value and a language hint and
//! hands back edited text, which flows into
//! [`FileNavigator::update_content`](crate::workspace::FileNavigator::update_content).

use crate::workspace::file::{FileId, Language, SourceFile};

/// Snapshot of what the editor should display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorBinding {
    /// File the edits belong to.
    pub file_id: FileId,
    /// Current text.
    pub value: String,
    /// Language of the file.
    pub language: Language,
}

impl EditorBinding {
    /// Bind to a file.
    pub fn for_file(file: &SourceFile) -> Self {
        Self {
            file_id: file.id,
            value: file.content.clone(),
            language: file.language,
        }
    }

    /// Highlighting mode string for the widget.
    pub fn mode(&self) -> &'static str {
        self.language.editor_hint()
    }
}
