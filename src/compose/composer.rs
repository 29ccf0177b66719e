//! Assembles a project's files into one executable document.
//!
//! Composition is a pure function of the files, the entry file and the
//! options: no I/O, no caching, byte-identical output for identical input.

use std::fmt;

use crate::bridge::bootstrap::bootstrap_script;
use crate::compose::markup::{
    after_open_tag, declares_function, escape_closing_tag, find_ci, rfind_ci,
};
use crate::workspace::file::{Language, SourceFile};
use crate::workspace::store::FileStore;

/// Creative-coding runtime referenced by script projects that use its
/// `setup`/`draw` lifecycle.
pub const DEFAULT_CREATIVE_RUNTIME_URL: &str =
    "https://cdn.jsdelivr.net/npm/p5@1.9.4/lib/p5.min.js";

/// Stylesheet applied to standalone script projects.
pub const DEFAULT_RESET_STYLESHEET: &str =
    "html, body { margin: 0; padding: 0; overflow: hidden; } canvas { display: block; }";

const VECTOR_LAYOUT_STYLESHEET: &str = "html, body { height: 100%; margin: 0; } \
body { display: flex; align-items: center; justify-content: center; }";

/// Knobs of the composer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeOptions {
    /// URL of the creative-coding runtime library.
    pub creative_runtime_url: String,
    /// Reset stylesheet for script projects.
    pub reset_stylesheet: String,
}

impl Default for ComposeOptions {
    fn default() -> Self {
        Self {
            creative_runtime_url: DEFAULT_CREATIVE_RUNTIME_URL.to_string(),
            reset_stylesheet: DEFAULT_RESET_STYLESHEET.to_string(),
        }
    }
}

/// A complete, self-contained document ready for materialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ComposedDocument(String);

impl ComposedDocument {
    /// Wrap an already composed document string.
    pub fn new(html: impl Into<String>) -> Self {
        Self(html.into())
    }

    /// The document text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the document text.
    pub fn into_string(self) -> String {
        self.0
    }

    /// Check if composition produced nothing to render.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for ComposedDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Builds composed documents.
#[derive(Debug, Clone, Default)]
pub struct Composer {
    options: ComposeOptions,
}

impl Composer {
    /// Create a composer with explicit options.
    pub fn new(options: ComposeOptions) -> Self {
        Self { options }
    }

    /// The composer's options.
    pub fn options(&self) -> &ComposeOptions {
        &self.options
    }

    /// Compose the store's entry file with the rest of its files.
    ///
    /// An empty store composes to an empty document.
    pub fn compose_store(&self, store: &FileStore) -> ComposedDocument {
        match store.entry() {
            Some(entry) => self.compose(store.files(), entry),
            None => ComposedDocument::default(),
        }
    }

    /// Compose `entry` with `files`, branching on the entry's language.
    ///
    /// Entry languages without a preview (stylesheets, data) compose to an
    /// empty document.
    pub fn compose(&self, files: &[SourceFile], entry: &SourceFile) -> ComposedDocument {
        let html = match entry.language {
            Language::Markup => self.compose_markup(files, entry),
            Language::Script => self.compose_script(entry),
            Language::Vector => compose_vector(entry),
            Language::Stylesheet | Language::Data => {
                tracing::debug!(entry = %entry.name, language = ?entry.language, "entry has no preview");
                String::new()
            }
        };
        ComposedDocument(html)
    }

    fn compose_markup(&self, files: &[SourceFile], entry: &SourceFile) -> String {
        let mut doc = if find_ci(&entry.content, "<html").is_some() {
            entry.content.clone()
        } else {
            format!(
                "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n</head>\n<body>\n{}\n</body>\n</html>\n",
                entry.content
            )
        };

        let styles: String = files
            .iter()
            .filter(|f| f.id != entry.id && f.language == Language::Stylesheet)
            .map(|f| format!("<style>\n{}\n</style>\n", escape_closing_tag(&f.content, "style")))
            .collect();
        if !styles.is_empty() {
            let at = find_ci(&doc, "</head>")
                .or_else(|| after_open_tag(&doc, "html"))
                .unwrap_or(0);
            doc.insert_str(at, &styles);
        }

        let scripts: String = files
            .iter()
            .filter(|f| f.id != entry.id && f.language == Language::Script)
            .map(|f| format!("<script>\n{}\n</script>\n", escape_closing_tag(&f.content, "script")))
            .collect();
        if !scripts.is_empty() {
            match rfind_ci(&doc, "</body>") {
                Some(at) => doc.insert_str(at, &scripts),
                None => doc.push_str(&scripts),
            }
        }

        let at = after_open_tag(&doc, "head")
            .or_else(|| after_open_tag(&doc, "html"))
            .unwrap_or(0);
        let bootstrap = if at == 0 {
            bootstrap_script()
        } else {
            format!("\n{}", bootstrap_script())
        };
        doc.insert_str(at, &bootstrap);
        doc
    }

    fn compose_script(&self, entry: &SourceFile) -> String {
        let source = &entry.content;
        let runtime = if needs_creative_runtime(source) {
            format!(
                "<script src=\"{}\"></script>\n",
                self.options.creative_runtime_url
            )
        } else {
            String::new()
        };

        format!(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n{bootstrap}<style>\n{reset}\n</style>\n{runtime}</head>\n<body>\n<script>\ntry {{\n{program}\n}} catch (err) {{\n{guard}}}\n</script>\n</body>\n</html>\n",
            bootstrap = bootstrap_script(),
            reset = self.options.reset_stylesheet,
            runtime = runtime,
            program = escape_closing_tag(source, "script"),
            guard = SCRIPT_ERROR_GUARD,
        )
    }
}

/// Reports an exception thrown by a standalone script and shows it in
/// place of the page content.
const SCRIPT_ERROR_GUARD: &str = r#"  var text = err && err.stack ? String(err.stack) : String(err);
  console.error(err && err.message ? err.message : String(err));
  if (typeof document !== "undefined" && document.body) {
    document.body.innerHTML = '<pre style="color:#b00020;white-space:pre-wrap;padding:1em;">' +
      text.replace(/&/g, "&amp;").replace(/</g, "&lt;") + "</pre>";
  }
"#;

fn compose_vector(entry: &SourceFile) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n{bootstrap}<style>\n{layout}\n</style>\n</head>\n<body>\n{svg}\n</body>\n</html>\n",
        bootstrap = bootstrap_script(),
        layout = VECTOR_LAYOUT_STYLESHEET,
        svg = entry.content,
    )
}

/// Whether a standalone script expects the creative-coding runtime.
pub fn needs_creative_runtime(source: &str) -> bool {
    declares_function(source, "setup")
        || declares_function(source, "draw")
        || source.contains("createCanvas(")
}

/// Compose with default options.
pub fn compose(files: &[SourceFile], entry: &SourceFile) -> ComposedDocument {
    Composer::default().compose(files, entry)
}
