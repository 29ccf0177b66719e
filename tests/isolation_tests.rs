//! Isolation tests against the real interpreter.
//!
//! These run composed documents in `assets/qjs.wasm` and check that the
//! preview program can neither reach the host nor outlive its limits, and
//! that each run starts from a clean slate.

use std::time::Duration;

use serde_json::json;
use wasm_playground_rs::prelude::*;

/// Helper to create a test sandbox config.
fn test_config() -> SandboxConfig {
    SandboxConfig::builder()
        .timeout(Duration::from_secs(5))
        .max_memory(32 * 1024 * 1024)
        .build()
}

fn script_playground(source: &str, config: SandboxConfig) -> Playground {
    let host = SandboxHost::wasm(config).unwrap();
    Playground::new(FileStore::seeded("main.js", source), host)
}

fn texts(playground: &Playground) -> Vec<String> {
    playground.console().iter().map(LogEntry::text).collect()
}

/// Test that console calls arrive in call order with their kinds.
#[tokio::test]
#[ignore = "requires qjs.wasm"]
async fn test_console_roundtrip() {
    let mut playground = script_playground(
        r#"console.log("x"); console.warn("careful", 2); console.error({ a: [1] });"#,
        test_config(),
    );
    playground.mount();
    let report = playground.wait_for_exit().await.unwrap();
    assert!(report.is_success(), "report: {report:?}");

    let console = playground.console();
    let kinds: Vec<_> = console.iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![LogKind::Log, LogKind::Warn, LogKind::Error]);
    assert_eq!(console[0].payload, vec![json!("x")]);
    assert_eq!(console[1].payload, vec![json!("careful"), json!(2)]);
    assert_eq!(console[2].payload, vec![json!({"a": [1]})]);
}

/// Test that non-serializable arguments are coerced instead of thrown.
#[tokio::test]
#[ignore = "requires qjs.wasm"]
async fn test_cyclic_argument_coerced() {
    let mut playground = script_playground(
        "var a = {}; a.self = a; console.log(a); console.log('after');",
        test_config(),
    );
    playground.mount();
    playground.wait_for_exit().await.unwrap();

    let console = playground.console();
    assert_eq!(console.len(), 2);
    assert_eq!(console[0].payload, vec![json!("[object Object]")]);
    assert_eq!(console[1].text(), "after");
}

/// Test that infinite loops are properly terminated.
#[tokio::test]
#[ignore = "requires qjs.wasm"]
async fn test_infinite_loop_timeout() {
    let config = SandboxConfig::builder()
        .timeout(Duration::from_millis(500))
        .max_memory(32 * 1024 * 1024)
        .build();
    let mut playground = script_playground("for (;;) {}", config);
    playground.mount();

    let report = playground.wait_for_exit().await.unwrap();
    assert_eq!(report.exit_code, None);
    assert!(report.failure.unwrap().contains("timed out"));
    assert_eq!(playground.console().last().unwrap().kind, LogKind::Error);
}

/// Test that a run destroys the previous context even if it never ends.
#[tokio::test]
#[ignore = "requires qjs.wasm"]
async fn test_run_replaces_runaway_program() {
    let mut playground = script_playground("for (;;) {}", test_config());
    let entry = playground.navigator().store().entry().unwrap().id;
    playground.mount();

    playground.toggle_pause();
    playground.edit(entry, "console.log('fresh')");
    playground.run();
    let report = playground.wait_for_exit().await.unwrap();
    assert!(report.is_success());
    assert_eq!(texts(&playground), vec!["fresh"]);
}

/// Test that globals do not survive from one run to the next.
#[tokio::test]
#[ignore = "requires qjs.wasm"]
async fn test_clean_slate_between_runs() {
    let mut playground = script_playground(
        "console.log(typeof globalThis.counter); globalThis.counter = 1;",
        test_config(),
    );
    playground.mount();
    playground.wait_for_exit().await.unwrap();
    playground.run();
    playground.wait_for_exit().await.unwrap();

    assert_eq!(texts(&playground), vec!["undefined", "undefined"]);
}

/// Test that host modules and navigation are unavailable.
#[tokio::test]
#[ignore = "requires qjs.wasm"]
async fn test_host_access_unavailable() {
    let mut playground = script_playground(
        r#"
console.log(typeof std, typeof os, typeof fetch, typeof XMLHttpRequest);
console.log(typeof window.location, window.top === window.parent);
"#,
        test_config(),
    );
    playground.mount();
    playground.wait_for_exit().await.unwrap();

    assert_eq!(
        texts(&playground),
        vec!["undefined undefined undefined undefined", "undefined true"]
    );
}

/// Test that an uncaught exception is reported and later scripts still run.
#[tokio::test]
#[ignore = "requires qjs.wasm"]
async fn test_uncaught_exception_reported() {
    let host = SandboxHost::wasm(test_config()).unwrap();
    let mut store = FileStore::seeded("index.html", "<p>page</p>");
    store.push(SourceFile::new("a.js", "missing();"));
    store.push(SourceFile::new("b.js", "console.log('still running');"));
    let mut playground = Playground::new(store, host);

    playground.mount();
    playground.wait_for_exit().await.unwrap();

    let console = playground.console();
    assert_eq!(console.len(), 2);
    assert_eq!(console[0].kind, LogKind::Error);
    assert!(console[0].text().contains("missing"));
    assert_eq!(console[1].text(), "still running");
}

/// Test that external scripts are reported instead of fetched.
#[tokio::test]
#[ignore = "requires qjs.wasm"]
async fn test_external_scripts_skipped() {
    let mut playground = script_playground(
        "function setup() {} function draw() {} console.log('sketch');",
        test_config(),
    );
    playground.mount();
    let report = playground.wait_for_exit().await.unwrap();

    assert_eq!(report.skipped_resources.len(), 1);
    assert!(report.skipped_resources[0].contains("p5"));
    assert_eq!(texts(&playground), vec!["sketch"]);
}

/// Test that memory exhaustion is contained.
#[tokio::test]
#[ignore = "requires qjs.wasm"]
async fn test_memory_exhaustion_protection() {
    let config = SandboxConfig::builder()
        .timeout(Duration::from_secs(10))
        .max_memory(16 * 1024 * 1024)
        .build();
    let mut playground = script_playground(
        "var chunks = []; for (;;) { chunks.push(new ArrayBuffer(1 << 20)); }",
        config,
    );
    playground.mount();

    let report = playground.wait_for_exit().await.unwrap();
    assert!(!report.is_success());
    assert_eq!(playground.console().last().unwrap().kind, LogKind::Error);
}

/// Test that fuel exhaustion ends the program.
#[tokio::test]
#[ignore = "requires qjs.wasm"]
async fn test_fuel_exhaustion() {
    let config = SandboxConfig::builder()
        .timeout(Duration::from_secs(10))
        .max_fuel(5_000_000)
        .build();
    let mut playground = script_playground("for (;;) {}", config);
    playground.mount();

    let report = playground.wait_for_exit().await.unwrap();
    assert!(report.failure.unwrap().contains("fuel"));
}
