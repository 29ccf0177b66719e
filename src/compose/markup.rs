//! Tag-level string surgery on markup documents.
//!
//! Matching is ASCII case-insensitive. Lowercasing ASCII never changes byte
//! lengths, so offsets found in a lowercased copy are valid in the original.

/// Byte offset of the first occurrence of `needle` (lowercase) in `haystack`.
pub fn find_ci(haystack: &str, needle: &str) -> Option<usize> {
    haystack.to_ascii_lowercase().find(needle)
}

/// Byte offset of the last occurrence of `needle` (lowercase) in `haystack`.
pub fn rfind_ci(haystack: &str, needle: &str) -> Option<usize> {
    haystack.to_ascii_lowercase().rfind(needle)
}

/// Offset just past the `>` of the first opening tag named `name`.
///
/// `<head>` and `<head lang="x">` match, `<header>` does not.
pub fn after_open_tag(doc: &str, name: &str) -> Option<usize> {
    let lower = doc.to_ascii_lowercase();
    let open = format!("<{name}");
    let mut from = 0;
    while let Some(rel) = lower[from..].find(&open) {
        let start = from + rel;
        let after_name = start + open.len();
        match lower.as_bytes().get(after_name) {
            Some(b'>') => return Some(after_name + 1),
            Some(c) if c.is_ascii_whitespace() || *c == b'/' => {
                return lower[after_name..].find('>').map(|gt| after_name + gt + 1);
            }
            _ => from = after_name,
        }
    }
    None
}

/// Insert `text` at byte offset `at`.
pub fn insert_at(doc: &mut String, at: usize, text: &str) {
    doc.insert_str(at, text);
}

/// Escape every closing `</name` sequence so inlined content cannot end
/// its enclosing element early.
pub fn escape_closing_tag(content: &str, name: &str) -> String {
    let needle = format!("</{name}");
    let lower = content.to_ascii_lowercase();
    let mut out = String::with_capacity(content.len());
    let mut last = 0;
    for (idx, _) in lower.match_indices(&needle) {
        out.push_str(&content[last..idx]);
        out.push_str("<\\/");
        last = idx + 2;
    }
    out.push_str(&content[last..]);
    out
}

/// Check if `source` declares `function <name>(`, allowing whitespace.
pub fn declares_function(source: &str, name: &str) -> bool {
    let mut rest = source;
    while let Some(idx) = rest.find("function") {
        let tail = rest[idx + "function".len()..].trim_start();
        if let Some(after) = tail.strip_prefix(name) {
            if after.trim_start().starts_with('(') {
                return true;
            }
        }
        rest = &rest[idx + "function".len()..];
    }
    false
}
