//! Source files and their languages.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier of a source file.
///
/// Minted once when the file is created and stable for the file's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(Uuid);

impl FileId {
    /// Mint a fresh random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for FileId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Language of a source file, inferred from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// `.js`, `.mjs`
    Script,
    /// `.html`, `.htm`
    Markup,
    /// `.css`
    Stylesheet,
    /// `.json`, and anything unrecognised
    Data,
    /// `.svg`
    Vector,
}

impl Language {
    /// Infer a language from a file name's extension.
    ///
    /// Unknown or missing extensions infer [`Language::Data`], which is
    /// never inlined into a composed document.
    pub fn infer(name: &str) -> Self {
        let ext = match name.rsplit_once('.') {
            Some((_, ext)) => ext.to_ascii_lowercase(),
            None => return Language::Data,
        };
        match ext.as_str() {
            "js" | "mjs" => Language::Script,
            "html" | "htm" => Language::Markup,
            "css" => Language::Stylesheet,
            "svg" => Language::Vector,
            _ => Language::Data,
        }
    }

    /// Hint passed to the editing surface.
    pub fn editor_hint(&self) -> &'static str {
        match self {
            Language::Script => "javascript",
            Language::Markup => "html",
            Language::Stylesheet => "css",
            Language::Data => "json",
            Language::Vector => "xml",
        }
    }

    /// Content a freshly added file starts with.
    pub fn placeholder(&self, name: &str) -> String {
        match self {
            Language::Script => format!("// {name}\n"),
            Language::Markup => format!("<!-- {name} -->\n"),
            Language::Stylesheet => format!("/* {name} */\n"),
            Language::Data => "{}\n".to_string(),
            Language::Vector => {
                "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"100\" height=\"100\"></svg>\n"
                    .to_string()
            }
        }
    }
}

/// One in-memory source file of a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceFile {
    /// Stable identifier.
    pub id: FileId,
    /// Display name including extension.
    pub name: String,
    /// Language inferred from `name` at creation.
    pub language: Language,
    /// Full current text.
    pub content: String,
    /// Whether this file is the composition root.
    pub is_entry: bool,
}

impl SourceFile {
    /// Create a non-entry file, inferring its language from `name`.
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: FileId::new(),
            language: Language::infer(&name),
            name,
            content: content.into(),
            is_entry: false,
        }
    }

    /// Create the entry file of a project.
    pub fn entry(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            is_entry: true,
            ..Self::new(name, content)
        }
    }

    /// Create a non-entry file holding the language placeholder.
    pub fn placeholder(name: impl Into<String>) -> Self {
        let name = name.into();
        let content = Language::infer(&name).placeholder(&name);
        Self::new(name, content)
    }
}
