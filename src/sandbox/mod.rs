//! Isolated execution of composed documents.

pub mod cache;
pub mod config;
pub mod document;
pub mod host;
pub mod io;
pub mod limits;
pub mod runtime;
pub mod testing;

pub use config::{SandboxConfig, SandboxConfigBuilder};
pub use host::{HostState, SandboxHost};
pub use runtime::{ExecutionReport, IsolatedRuntime, Launch, WasmRuntime};
