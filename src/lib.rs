//! # Wasm Playground
//!
//! A multi-file code playground whose live preview runs in an isolated
//! WebAssembly context.
//!
//! The files of a project are composed into one self-contained document,
//! which is materialized in a fresh QuickJS interpreter instance running in
//! Wasmtime. Console calls made by the previewed program travel back to the
//! host over a one-way message channel and land in an ordered console log.
//!
//! - **Clean slate**: every run gets a brand-new interpreter instance
//! - **Isolation**: no filesystem, network, environment or subprocess access
//! - **Resource limits**: memory, fuel and epoch-based timeouts
//! - **Typed bridge**: console events are tagged frames; anything else is ignored
//!
//! ## Example
//!
//! ```rust,ignore
//! use wasm_playground_rs::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let host = SandboxHost::wasm(SandboxConfig::default())?;
//!     let mut playground = Playground::new(FileStore::seeded("main.js", "console.log('x')"), host);
//!
//!     playground.mount();
//!     playground.wait_for_exit().await?;
//!
//!     let console = playground.console();
//!     assert_eq!(console[0].kind, LogKind::Log);
//!     assert_eq!(console[0].text(), "x");
//!     Ok(())
//! }
//! ```
//!
//! ## Layout
//!
//! - [`workspace`]: files, the active selection, editor and storage seams
//! - [`compose`]: the pure document composer
//! - [`bridge`]: console capture, wire format and the host-side log
//! - [`sandbox`]: isolated contexts and their lifecycle
//! - [`layout`]: resizable pane state

pub mod bridge;
pub mod compose;
pub mod error;
pub mod layout;
pub mod playground;
pub mod prelude;
pub mod sandbox;
pub mod workspace;

// Re-export main types at crate root for convenience
pub use error::{Result, SandboxError};
pub use playground::Playground;
pub use sandbox::cache::{ModuleCache, SharedEngine};
pub use sandbox::config::{SandboxConfig, SandboxConfigBuilder};
pub use sandbox::host::{HostState, SandboxHost};
pub use sandbox::runtime::{ExecutionReport, IsolatedRuntime, WasmRuntime};
