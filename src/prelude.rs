//! Prelude module for convenient imports.

pub use crate::bridge::{LogEntry, LogKind};
pub use crate::compose::{ComposedDocument, Composer};
pub use crate::error::{Result, SandboxError};
pub use crate::layout::{DragAxis, LayoutManager, Point, Rect};
pub use crate::playground::Playground;
pub use crate::sandbox::{
    config::SandboxConfig,
    host::{HostState, SandboxHost},
    runtime::{ExecutionReport, WasmRuntime},
};
pub use crate::workspace::{FileId, FileStore, Language, SourceFile};
