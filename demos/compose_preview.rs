//! Composes a small multi-file project and shows what the preview would run.
//!
//! Run with: cargo run --example compose_preview
//!
//! No interpreter is needed: this only exercises the file store, the
//! composer and program extraction.

use wasm_playground_rs::prelude::*;
use wasm_playground_rs::sandbox::document::DocumentProgram;
use wasm_playground_rs::workspace::FileNavigator;

fn main() {
    let mut navigator = FileNavigator::new(FileStore::seeded(
        "index.html",
        "<main>\n  <h1>Hello</h1>\n  <button id=\"go\">Go</button>\n</main>",
    ));
    navigator.on_change(|files| println!("project now has {} files", files.len()));

    let style = navigator.add_file("style.css");
    navigator.update_content(style, "h1 { color: rebeccapurple; }");
    let script = navigator.add_file("app.js");
    navigator.update_content(script, "console.log('ready', { clicks: 0 });");

    // The entry file cannot be removed.
    let entry = navigator.store().entry().map(|f| f.id);
    if let Some(entry) = entry {
        println!("delete entry -> {}", navigator.delete_file(entry));
    }

    if let Some(binding) = navigator.editor_binding() {
        println!("editing {} in {} mode", binding.file_id, binding.mode());
    }

    let composer = Composer::default();
    let doc = composer.compose_store(navigator.store());
    println!("\n=== Composed document ({} bytes) ===\n{}", doc.len(), doc);

    let program = DocumentProgram::from_document(doc.as_str());
    println!("=== Program: {} inline blocks ===", program.blocks.len());
    for block in &program.blocks {
        let first_line = block.source.trim().lines().next().unwrap_or("");
        println!("  [{}] {}", block.index, first_line);
    }

    // A standalone sketch pulls in the creative-coding runtime by reference.
    let sketch = FileStore::seeded(
        "sketch.js",
        "function setup() { createCanvas(200, 200); }\nfunction draw() { circle(100, 100, 50); }",
    );
    let program = DocumentProgram::from_document(composer.compose_store(&sketch).as_str());
    println!("\n=== Sketch ===");
    println!("skipped external scripts: {:?}", program.skipped_resources);
}
