//! Turns a composed document into a program for the script interpreter.
//!
//! Inline `<script>` blocks run in document order, each through an indirect
//! `eval` so declarations land in the shared global scope, the way separate
//! script elements share a page. A block that throws is reported through
//! `window.onerror` and the next block still runs. External scripts are never
//! fetched; their URLs are reported as skipped.

use crate::bridge::message::FRAME_PREFIX;
use crate::compose::markup::find_ci;

/// Host shim evaluated before any block of the document.
///
/// It provides the handful of page globals the bridge relies on; everything
/// else a browser would offer is absent.
const HOST_SHIM: &str = r#"(function (global) {
  global.window = global;
  global.self = global;
  global.parent = {
    postMessage: function (message) {
      print("__PREFIX__" + JSON.stringify(message));
    }
  };
  global.top = global.parent;
  if (typeof global.console === "undefined") {
    global.console = { log: function () {} };
  }
  ["error", "warn", "info"].forEach(function (kind) {
    if (typeof global.console[kind] !== "function") {
      global.console[kind] = function () {};
    }
  });
  global.document = {
    body: { innerHTML: "" },
    head: {},
    getElementById: function () { return null; },
    querySelector: function () { return null; }
  };
  function lineOf(err) {
    if (err && typeof err.lineNumber === "number") {
      return err.lineNumber;
    }
    var stack = err && err.stack ? String(err.stack) : "";
    var match = /^\s*at .*?:(\d+)(?::\d+)?\)?\s*$/m.exec(stack);
    return match ? Number(match[1]) : 0;
  }
  global.__runBlock = function (source) {
    try {
      (0, eval)(source);
    } catch (err) {
      if (typeof global.onerror !== "function") {
        throw err;
      }
      var message = err && err.message ? (err.name ? err.name + ": " : "") + err.message : String(err);
      global.onerror(message, "", lineOf(err), 0, err);
    }
  };
})(globalThis);
"#;

/// One inline script block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptBlock {
    /// Position among the document's inline blocks.
    pub index: usize,
    /// Block source.
    pub source: String,
}

/// What a composed document runs inside the interpreter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentProgram {
    /// Inline blocks in document order.
    pub blocks: Vec<ScriptBlock>,
    /// `src` URLs of external scripts that were not loaded.
    pub skipped_resources: Vec<String>,
}

impl DocumentProgram {
    /// Extract the script blocks of a document.
    pub fn from_document(html: &str) -> Self {
        let mut program = Self::default();
        let lower = html.to_ascii_lowercase();
        let mut from = 0;

        while let Some(rel) = lower[from..].find("<script") {
            let start = from + rel;
            let after_name = start + "<script".len();
            let boundary = lower.as_bytes().get(after_name).copied();
            if !matches!(boundary, Some(b'>') | Some(b' ' | b'\t' | b'\n' | b'\r' | b'/')) {
                from = after_name;
                continue;
            }
            let Some(open_end) = lower[after_name..].find('>').map(|i| after_name + i + 1) else {
                break;
            };
            let attrs = &html[after_name..open_end - 1];
            let Some(close) = find_ci(&html[open_end..], "</script").map(|i| open_end + i) else {
                break;
            };
            from = lower[close..]
                .find('>')
                .map(|i| close + i + 1)
                .unwrap_or(lower.len());

            if let Some(src) = attribute(attrs, "src") {
                program.skipped_resources.push(src);
                continue;
            }
            let index = program.blocks.len();
            program.blocks.push(ScriptBlock {
                index,
                source: html[open_end..close].to_string(),
            });
        }
        program
    }

    /// Check if the document runs no code at all.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// The interpreter source: the host shim followed by one guarded
    /// evaluation per block.
    pub fn to_source(&self) -> String {
        let mut source = HOST_SHIM.replace("__PREFIX__", &js_escape_char(FRAME_PREFIX));
        for block in &self.blocks {
            // A JSON string literal is a valid JavaScript string literal.
            let literal = serde_json::to_string(&block.source).unwrap_or_else(|_| "\"\"".to_string());
            source.push_str("__runBlock(");
            source.push_str(&literal);
            source.push_str(");\n");
        }
        source
    }
}

fn js_escape_char(c: char) -> String {
    format!("\\u{:04x}", c as u32)
}

/// Value of attribute `name` in a raw attribute list, quoted or bare.
fn attribute(attrs: &str, name: &str) -> Option<String> {
    let lower = attrs.to_ascii_lowercase();
    let mut from = 0;
    while let Some(rel) = lower[from..].find(name) {
        let start = from + rel;
        from = start + name.len();
        let preceded = start == 0 || lower.as_bytes()[start - 1].is_ascii_whitespace();
        let rest = lower[from..].trim_start();
        if !preceded || !rest.starts_with('=') {
            continue;
        }
        let value_start = attrs.len() - rest.len() + 1;
        let value = attrs[value_start..].trim_start();
        return Some(match value.chars().next() {
            Some(q @ ('"' | '\'')) => value[1..].split(q).next().unwrap_or("").to_string(),
            _ => value
                .split(|c: char| c.is_whitespace() || c == '>')
                .next()
                .unwrap_or("")
                .to_string(),
        });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::Composer;
    use crate::workspace::{FileStore, SourceFile};

    #[test]
    fn test_blocks_in_document_order() {
        let html = "<script>a()</script><p>x</p><SCRIPT type=\"module\">b()</SCRIPT>";
        let program = DocumentProgram::from_document(html);
        let sources: Vec<_> = program.blocks.iter().map(|b| b.source.as_str()).collect();
        assert_eq!(sources, vec!["a()", "b()"]);
        assert!(program.skipped_resources.is_empty());
    }

    #[test]
    fn test_external_scripts_skipped() {
        let html = "<script src=\"https://cdn.example/lib.js\"></script><script src=local.js></script><script>go()</script>";
        let program = DocumentProgram::from_document(html);
        assert_eq!(
            program.skipped_resources,
            vec!["https://cdn.example/lib.js".to_string(), "local.js".to_string()]
        );
        assert_eq!(program.blocks.len(), 1);
    }

    #[test]
    fn test_data_src_is_not_src() {
        let html = "<script data-src=\"x.js\">run()</script>";
        let program = DocumentProgram::from_document(html);
        assert!(program.skipped_resources.is_empty());
        assert_eq!(program.blocks[0].source, "run()");
    }

    #[test]
    fn test_scripted_tag_names_ignored() {
        let html = "<scripts>nope</scripts><script>yes()</script>";
        let program = DocumentProgram::from_document(html);
        assert_eq!(program.blocks.len(), 1);
        assert_eq!(program.blocks[0].source, "yes()");
    }

    #[test]
    fn test_composed_document_runs_bootstrap_first() {
        let mut store = FileStore::seeded("index.html", "<h1>Hi</h1>");
        store.push(SourceFile::new("app.js", "console.log('app')"));
        let doc = Composer::default().compose_store(&store);

        let program = DocumentProgram::from_document(doc.as_str());
        assert_eq!(program.blocks.len(), 2);
        assert!(program.blocks[0].source.contains("console-event"));
        assert!(program.blocks[1].source.contains("console.log('app')"));
    }

    /// Block sources as the interpreter will see them, decoded back from
    /// the generated `__runBlock` calls.
    fn embedded_blocks(source: &str) -> Vec<String> {
        source
            .lines()
            .filter_map(|line| line.strip_prefix("__runBlock(")?.strip_suffix(");"))
            .map(|literal| serde_json::from_str(literal).unwrap())
            .collect()
    }

    #[test]
    fn test_script_entry_program_layout() {
        let store = FileStore::seeded("main.js", "console.log(\"x\")");
        let doc = Composer::default().compose_store(&store);
        let program = DocumentProgram::from_document(doc.as_str());
        let source = program.to_source();

        // The shim runs before any block and defines the bridge sink.
        let shim_end = source.find("})(globalThis);").unwrap();
        let first_block = source.find("__runBlock(\"").unwrap();
        assert!(shim_end < first_block);
        assert!(source.contains("print(\"\\u001e\" + JSON.stringify(message))"));

        let blocks = embedded_blocks(&source);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].trim(), crate::bridge::bootstrap_source());
        assert!(blocks[1].contains("try {\nconsole.log(\"x\")\n} catch (err) {"));
        assert!(blocks[1].contains("console.error("));
    }

    #[test]
    fn test_markup_blocks_run_separately() {
        let mut store = FileStore::seeded("index.html", "<p>page</p>");
        store.push(SourceFile::new("a.js", "missing();"));
        store.push(SourceFile::new("b.js", "console.log('still running');"));
        let doc = Composer::default().compose_store(&store);
        let blocks = embedded_blocks(&DocumentProgram::from_document(doc.as_str()).to_source());

        // One guarded evaluation per element, so a throwing block does not
        // stop the next one.
        assert_eq!(blocks.len(), 3);
        assert!(blocks[0].contains("window.onerror"));
        assert_eq!(blocks[1].trim(), "missing();");
        assert_eq!(blocks[2].trim(), "console.log('still running');");
    }

    #[test]
    fn test_error_line_taken_from_stack() {
        let source = DocumentProgram::default().to_source();
        assert!(source.contains("global.onerror(message, \"\", lineOf(err), 0, err);"));
        assert!(source.contains("typeof err.lineNumber === \"number\""));
        assert!(source.contains("err.stack"));
    }

    #[test]
    fn test_source_embeds_blocks_as_literals() {
        let program = DocumentProgram::from_document("<script>console.log(\"a\\nb\")</script>");
        let source = program.to_source();
        assert!(source.contains("\\u001e"));
        assert!(source.contains(r#"__runBlock("console.log(\"a\\nb\")");"#));
    }
}
