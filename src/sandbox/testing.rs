//! A scripted runtime for exercising the host without an interpreter.
//!
//! [`ScriptedRuntime`] hands each launched program to a closure that decides
//! what the "program" does: which bridge frames it writes, what lands on
//! stderr, how it exits, or whether it keeps running until destroyed.
//!
//! ```
//! use wasm_playground_rs::sandbox::testing::{ScriptedRuntime, Step};
//! use wasm_playground_rs::bridge::LogKind;
//! use serde_json::json;
//!
//! let runtime = ScriptedRuntime::new(|_program| {
//!     vec![Step::console(LogKind::Log, vec![json!("hello")]), Step::Exit(0)]
//! });
//! assert_eq!(runtime.launches(), 0);
//! ```

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::io::AsyncWriteExt;

use crate::bridge::message::{ConsoleMessage, LogKind, FRAME_PREFIX};
use crate::error::{Result, SandboxError};
use crate::sandbox::document::DocumentProgram;
use crate::sandbox::runtime::{IsolatedRuntime, Launch};

/// One action of a scripted program.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Write a bridge frame carrying a console event.
    Console(ConsoleMessage),
    /// Write a bridge frame carrying an arbitrary posted message.
    Post(Value),
    /// Write a plain output line.
    Print(String),
    /// Write to stderr.
    Stderr(String),
    /// Pause before the next step.
    Sleep(Duration),
    /// Run until the context is destroyed.
    Hang,
    /// Exit with a code; later steps are not run.
    Exit(i32),
    /// Fail the run with an execution error.
    Fail(String),
}

impl Step {
    /// A console event step.
    pub fn console(kind: LogKind, payload: Vec<Value>) -> Self {
        Step::Console(ConsoleMessage::new(kind, payload))
    }
}

type Script = dyn Fn(&DocumentProgram) -> Vec<Step> + Send + Sync;

/// Runtime whose programs are scripted by a closure.
#[derive(Clone)]
pub struct ScriptedRuntime {
    script: Arc<Script>,
    launches: Arc<AtomicUsize>,
}

impl std::fmt::Debug for ScriptedRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedRuntime")
            .field("launches", &self.launches())
            .finish()
    }
}

impl ScriptedRuntime {
    /// Create a runtime running `script` for every launched program.
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(&DocumentProgram) -> Vec<Step> + Send + Sync + 'static,
    {
        Self {
            script: Arc::new(script),
            launches: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A runtime whose programs exit immediately with code 0.
    pub fn silent() -> Self {
        Self::new(|_| vec![Step::Exit(0)])
    }

    /// Number of programs launched so far.
    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }
}

impl IsolatedRuntime for ScriptedRuntime {
    fn execute(&self, launch: Launch) -> impl Future<Output = Result<i32>> + Send {
        self.launches.fetch_add(1, Ordering::SeqCst);
        let steps = (self.script)(&launch.program);

        async move {
            let Launch { io, kill, .. } = launch;
            let mut output = io.output;
            let mut stderr = io.stderr;

            for step in steps {
                if kill.is_triggered() {
                    return Err(SandboxError::Destroyed);
                }
                match step {
                    Step::Console(message) => {
                        output.write_all(format!("{}\n", message.to_frame()).as_bytes()).await?;
                    }
                    Step::Post(value) => {
                        output
                            .write_all(format!("{FRAME_PREFIX}{value}\n").as_bytes())
                            .await?;
                    }
                    Step::Print(line) => {
                        output.write_all(format!("{line}\n").as_bytes()).await?;
                    }
                    Step::Stderr(text) => stderr.write_all(text.as_bytes()).await?,
                    Step::Sleep(duration) => tokio::time::sleep(duration).await,
                    Step::Hang => loop {
                        if kill.is_triggered() {
                            return Err(SandboxError::Destroyed);
                        }
                        tokio::time::sleep(Duration::from_millis(1)).await;
                    },
                    Step::Exit(code) => return Ok(code),
                    Step::Fail(reason) => return Err(SandboxError::ExecutionFailed(reason)),
                }
            }
            Ok(0)
        }
    }
}
