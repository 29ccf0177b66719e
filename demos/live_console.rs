//! Runs a project in the isolated preview and prints its console.
//!
//! Run with: RUST_LOG=wasm_playground_rs=debug cargo run --example live_console
//!
//! Note: Requires qjs.wasm to be present in assets/

use std::time::Duration;
use tracing_subscriber::EnvFilter;
use wasm_playground_rs::prelude::*;

fn print_console(title: &str, playground: &Playground) {
    println!("\n=== {title} ===");
    for entry in playground.console() {
        println!(
            "{} [{:>5}] gen {} {}",
            entry.timestamp.format("%H:%M:%S%.3f"),
            entry.kind,
            entry.generation,
            entry.text()
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = SandboxConfig::builder()
        .timeout(Duration::from_secs(2))
        .max_memory(32 * 1024 * 1024) // 32MB
        .interpreter_path("assets/qjs.wasm")
        .build();

    let host = match SandboxHost::wasm(config) {
        Ok(host) => host,
        Err(e) => {
            eprintln!("Failed to create sandbox host: {}", e);
            eprintln!("Make sure qjs.wasm is present in the assets/ directory");
            return Err(e);
        }
    };

    let mut store = FileStore::seeded("index.html", "<h1>Counter</h1>");
    let script = store.push(SourceFile::new(
        "app.js",
        "var count = 0;\nfor (var i = 0; i < 3; i++) { count++; console.log('count', count); }\nconsole.warn('done');",
    ));
    let mut playground = Playground::new(store, host);

    playground.mount();
    let report = playground.wait_for_exit().await?;
    println!("first run: success={} in {:?}", report.is_success(), report.elapsed);
    print_console("First run", &playground);

    // Edits re-run the preview from a clean slate.
    playground.clear_console();
    playground.edit(script, "console.info(typeof count); undefinedFunction();");
    let report = playground.wait_for_exit().await?;
    println!("\nsecond run: failure={:?}", report.failure);
    print_console("After edit", &playground);

    // While paused, edits do not re-run; an explicit run still does.
    playground.clear_console();
    playground.toggle_pause();
    playground.edit(script, "for (;;) {}");
    println!("\npaused, state={:?}", playground.state());
    playground.run();
    let report = playground.wait_for_exit().await?;
    println!("runaway program: failure={:?}", report.failure);
    print_console("Runaway", &playground);

    Ok(())
}
