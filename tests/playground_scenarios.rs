//! End-to-end playground scenarios, run against a scripted runtime.
//!
//! The scripted runtime stands in for the interpreter: it inspects the
//! program the host launched and replays the console traffic that program
//! would produce.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use wasm_playground_rs::layout::{DragAxis, Point, Rect};
use wasm_playground_rs::prelude::*;
use wasm_playground_rs::sandbox::document::DocumentProgram;
use wasm_playground_rs::sandbox::testing::{ScriptedRuntime, Step};
use wasm_playground_rs::workspace::{MemoryStorage, ProjectStorage};

/// Replays `console.log("...")` calls found in the program's last block.
fn echo_logs(program: &DocumentProgram) -> Vec<Step> {
    let Some(block) = program.blocks.last() else {
        return vec![Step::Exit(0)];
    };
    let mut steps = Vec::new();
    let mut rest = block.source.as_str();
    while let Some(at) = rest.find("console.log(\"") {
        let after = &rest[at + "console.log(\"".len()..];
        let Some(end) = after.find('"') else { break };
        steps.push(Step::console(LogKind::Log, vec![json!(&after[..end])]));
        rest = &after[end..];
    }
    steps.push(Step::Exit(0));
    steps
}

fn playground(store: FileStore, runtime: ScriptedRuntime) -> Playground<ScriptedRuntime> {
    let config = SandboxConfig::builder()
        .timeout(Duration::from_secs(5))
        .build();
    Playground::new(store, SandboxHost::new(runtime, config))
}

#[tokio::test]
async fn test_markup_entry_composes_full_document() {
    let playground = playground(FileStore::seeded("index.html", "<h1>Hi</h1>"), ScriptedRuntime::silent());
    let doc = playground.composed();
    let html = doc.as_str();

    let head = html.find("<head>").unwrap();
    let head_end = html.find("</head>").unwrap();
    let bootstrap = html.find("console-event").unwrap();
    assert!(head < bootstrap && bootstrap < head_end, "bootstrap belongs in the head");

    let body = html.find("<body>").unwrap();
    let body_end = html.find("</body>").unwrap();
    let heading = html.find("<h1>Hi</h1>").unwrap();
    assert!(body < heading && heading < body_end);
}

#[tokio::test]
async fn test_stylesheet_inlined_before_head_close() {
    let mut playground = playground(FileStore::seeded("index.html", "<h1>Hi</h1>"), ScriptedRuntime::silent());
    let before = playground.composed();

    let id = playground.add_file("style.css");
    assert!(playground.edit(id, "body{color:red}"));
    let doc = playground.composed();
    let html = doc.as_str();

    let style = html.find("<style>\nbody{color:red}\n</style>").unwrap();
    let head_end = html.find("</head>").unwrap();
    assert!(style < head_end);
    assert!(html.len() > before.len());
}

#[tokio::test]
async fn test_script_entry_logs_once() {
    let runtime = ScriptedRuntime::new(echo_logs);
    let mut playground = playground(FileStore::seeded("main.js", "console.log(\"x\")"), runtime);

    assert!(playground.mount().is_some());
    let report = playground.wait_for_exit().await.unwrap();
    assert!(report.is_success());

    let console = playground.console();
    assert_eq!(console.len(), 1);
    assert_eq!(console[0].kind, LogKind::Log);
    assert_eq!(console[0].payload, vec![json!("x")]);
}

#[tokio::test]
async fn test_entry_file_cannot_be_deleted() {
    let mut playground = playground(FileStore::seeded("index.html", "<p>x</p>"), ScriptedRuntime::silent());
    playground.add_file("app.js");
    let before = playground.files().to_vec();
    let entry = playground.navigator().store().entry().unwrap().id;

    assert!(!playground.delete_file(entry));
    assert_eq!(playground.files(), before.as_slice());
}

#[tokio::test]
async fn test_console_drag_clamps_height() {
    let mut playground = playground(FileStore::seeded("index.html", ""), ScriptedRuntime::silent());
    let layout = playground.layout_mut();
    let workspace = Rect::new(0.0, 0.0, 1200.0, 900.0);

    layout.pointer_down(DragAxis::Vertical);
    assert!(layout.overlay_visible());
    // 900 - 200 = 700 before clamping.
    layout.pointer_move(Point::new(600.0, 200.0), workspace);
    layout.pointer_up();

    assert_eq!(playground.layout().state().console_height_px, 500.0);
    assert!(!playground.layout().overlay_visible());
}

#[tokio::test]
async fn test_deleting_active_file_moves_selection() {
    let mut playground = playground(FileStore::seeded("index.html", "<p>x</p>"), ScriptedRuntime::silent());
    let doomed = playground.add_file("extra.js");
    playground.select_file(doomed);
    assert_eq!(playground.navigator().active_id(), Some(doomed));

    assert!(playground.delete_file(doomed));
    let active = playground.navigator().active_id().unwrap();
    assert_ne!(active, doomed);
    assert!(playground.navigator().store().contains(active));
}

#[tokio::test]
async fn test_console_keeps_call_order() {
    let runtime = ScriptedRuntime::new(|_| {
        vec![
            Step::console(LogKind::Warn, vec![json!("w")]),
            Step::console(LogKind::Log, vec![json!("l")]),
            Step::console(LogKind::Error, vec![json!("e")]),
            Step::console(LogKind::Info, vec![json!("i")]),
            Step::console(LogKind::Log, vec![json!({"n": 1})]),
        ]
    });
    let mut playground = playground(FileStore::seeded("main.js", "go()"), runtime);
    playground.mount();
    playground.wait_for_exit().await.unwrap();

    let kinds: Vec<_> = playground.console().iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![LogKind::Warn, LogKind::Log, LogKind::Error, LogKind::Info, LogKind::Log]
    );
    let seqs: Vec<_> = playground.console().iter().map(|e| e.seq).collect();
    assert!(seqs.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test]
async fn test_edits_rerun_until_paused() {
    let runtime = ScriptedRuntime::new(echo_logs);
    let mut playground = playground(FileStore::seeded("main.js", "console.log(\"one\")"), runtime.clone());
    let entry = playground.navigator().store().entry().unwrap().id;

    playground.mount();
    playground.wait_for_exit().await.unwrap();
    playground.edit(entry, "console.log(\"two\")");
    playground.wait_for_exit().await.unwrap();
    assert_eq!(runtime.launches(), 2);

    assert!(playground.toggle_pause());
    playground.edit(entry, "console.log(\"three\")");
    playground.add_file("notes.txt");
    assert_eq!(runtime.launches(), 2);
    assert_eq!(playground.state(), HostState::Paused);

    // Explicit runs still work while paused.
    playground.run();
    playground.wait_for_exit().await.unwrap();
    assert_eq!(runtime.launches(), 3);

    let texts: Vec<_> = playground.console().iter().map(LogEntry::text).collect();
    assert_eq!(texts, vec!["one", "two", "three"]);
}

#[tokio::test]
async fn test_edits_before_mount_do_not_materialize() {
    let runtime = ScriptedRuntime::silent();
    let mut playground = playground(FileStore::seeded("index.html", "<p>x</p>"), runtime.clone());
    playground.add_file("app.js");
    assert_eq!(runtime.launches(), 0);
    assert_eq!(playground.state(), HostState::Idle);
}

#[tokio::test]
async fn test_run_starts_from_clean_context() {
    let runtime = ScriptedRuntime::new(|_| vec![Step::Hang]);
    let mut playground = playground(FileStore::seeded("main.js", "for(;;){}"), runtime.clone());
    let first = playground.mount().unwrap();
    let second = playground.run().unwrap();
    assert!(second > first);
    assert_eq!(runtime.launches(), 2);
    playground.destroy();
    assert_eq!(playground.state(), HostState::Idle);
}

#[tokio::test]
async fn test_clear_console() {
    let runtime = ScriptedRuntime::new(echo_logs);
    let mut playground = playground(FileStore::seeded("main.js", "console.log(\"x\")"), runtime);
    playground.mount();
    playground.wait_for_exit().await.unwrap();
    assert_eq!(playground.console().len(), 1);

    playground.clear_console();
    assert!(playground.console().is_empty());
}

#[tokio::test]
async fn test_changes_are_observed_and_persisted() {
    let storage = MemoryStorage::new();
    let seen = Arc::new(Mutex::new(0usize));

    let mut playground = playground(FileStore::seeded("index.html", "<p>x</p>"), ScriptedRuntime::silent());
    let counter = Arc::clone(&seen);
    playground.on_change(move |files| *counter.lock().unwrap() = files.len());
    playground.add_file("style.css");
    assert_eq!(*seen.lock().unwrap(), 2);

    playground.save(&storage, "demo").unwrap();
    assert_eq!(storage.load("demo").unwrap().len(), 2);

    let host = SandboxHost::new(ScriptedRuntime::silent(), SandboxConfig::default());
    let restored = Playground::load(&storage, "demo", host).unwrap();
    assert_eq!(restored.files(), playground.files());
}
