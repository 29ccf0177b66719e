//! The sandbox host: owns the live isolated context and its lifecycle.
//!
//! ```text
//!            mount / run               destroy
//!   Idle ─────────────────► Materialized ───────► Idle
//!                            │      ▲
//!               toggle_pause │      │ toggle_pause
//!                            ▼      │
//!                            Paused ┘
//! ```
//!
//! Every materialization gets a fresh generation number and a brand-new
//! context; nothing is ever carried over from the previous one. Pausing only
//! stops automatic re-materialization on input changes, it never stops the
//! running program.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::bridge::log::{ConsoleLog, LogEntry};
use crate::bridge::message::LogKind;
use crate::bridge::receiver::{lock_log, BridgeSender, ConsoleReceiver, HostMessage, SharedLog};
use crate::compose::ComposedDocument;
use crate::error::{Result, SandboxError};
use crate::sandbox::config::SandboxConfig;
use crate::sandbox::document::DocumentProgram;
use crate::sandbox::io::{pump_output, ContextIo};
use crate::sandbox::limits::KillSwitch;
use crate::sandbox::runtime::{ExecutionReport, IsolatedRuntime, Launch, WasmRuntime};

/// Generation recorded while no context is live.
const NO_GENERATION: u64 = 0;

/// Observable state of a [`SandboxHost`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostState {
    /// No context exists.
    Idle,
    /// A context is live and input changes re-materialize it.
    Materialized,
    /// Input changes are ignored; the current context (if any) keeps running.
    Paused,
}

/// A running context. Dropping it destroys the context.
#[derive(Debug)]
struct LiveContext {
    generation: u64,
    kill: KillSwitch,
    task: JoinHandle<()>,
}

impl Drop for LiveContext {
    fn drop(&mut self) {
        self.kill.trigger();
        self.task.abort();
    }
}

/// Hosts one isolated context at a time and collects its console output.
///
/// Must be created inside a Tokio runtime.
pub struct SandboxHost<R: IsolatedRuntime = WasmRuntime> {
    runtime: Arc<R>,
    config: SandboxConfig,
    log: SharedLog,
    live: Option<LiveContext>,
    next_generation: u64,
    current: Arc<AtomicU64>,
    paused: bool,
    bridge: BridgeSender,
    exits: watch::Receiver<Option<ExecutionReport>>,
    receiver: JoinHandle<()>,
}

impl<R: IsolatedRuntime> std::fmt::Debug for SandboxHost<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SandboxHost")
            .field("state", &self.state())
            .field("generation", &self.generation())
            .field("console", &lock_log(&self.log).len())
            .finish()
    }
}

impl SandboxHost<WasmRuntime> {
    /// Create a host running programs in the WebAssembly interpreter.
    pub fn wasm(config: SandboxConfig) -> Result<Self> {
        let runtime = WasmRuntime::new(config.clone())?;
        Ok(Self::new(runtime, config))
    }
}

impl<R: IsolatedRuntime> SandboxHost<R> {
    /// Create an idle host on `runtime`.
    pub fn new(runtime: R, config: SandboxConfig) -> Self {
        let log: SharedLog = Arc::new(Mutex::new(ConsoleLog::with_capacity(config.console_capacity)));
        let current = Arc::new(AtomicU64::new(NO_GENERATION));
        let (bridge, receiver, exits) =
            ConsoleReceiver::channel(Arc::clone(&log), Arc::clone(&current), config.drop_stale_messages);
        let receiver = tokio::spawn(receiver.run());

        Self {
            runtime: Arc::new(runtime),
            config,
            log,
            live: None,
            next_generation: NO_GENERATION + 1,
            current,
            paused: false,
            bridge,
            exits,
            receiver,
        }
    }

    /// The host's configuration.
    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// The runtime programs run on.
    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    /// Current state.
    pub fn state(&self) -> HostState {
        match (&self.live, self.paused) {
            (_, true) => HostState::Paused,
            (Some(_), false) => HostState::Materialized,
            (None, false) => HostState::Idle,
        }
    }

    /// Check if automatic re-materialization is suspended.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Check if a context is live.
    pub fn is_materialized(&self) -> bool {
        self.live.is_some()
    }

    /// Generation of the live context, if any.
    pub fn generation(&self) -> Option<u64> {
        self.live.as_ref().map(|live| live.generation)
    }

    /// First materialization. Does nothing if a context is already live.
    pub fn mount(&mut self, document: &ComposedDocument) -> u64 {
        match self.generation() {
            Some(generation) => generation,
            None => self.materialize(document),
        }
    }

    /// Explicit run: replaces the live context with a fresh one.
    ///
    /// A paused host with no live context stays idle.
    pub fn run(&mut self, document: &ComposedDocument) -> Option<u64> {
        if self.paused && self.live.is_none() {
            tracing::debug!("run ignored while paused and idle");
            return None;
        }
        Some(self.materialize(document))
    }

    /// Automatic trigger after an input change; ignored while paused.
    pub fn inputs_changed(&mut self, document: &ComposedDocument) -> Option<u64> {
        if self.paused {
            tracing::trace!("input change ignored while paused");
            return None;
        }
        Some(self.materialize(document))
    }

    /// Flip the pause flag and return the new value.
    pub fn toggle_pause(&mut self) -> bool {
        self.set_paused(!self.paused);
        self.paused
    }

    /// Set the pause flag. Unpausing never re-runs by itself.
    pub fn set_paused(&mut self, paused: bool) {
        if self.paused != paused {
            tracing::debug!(paused, "pause toggled");
        }
        self.paused = paused;
    }

    /// Tear down the live context, if any.
    pub fn destroy(&mut self) {
        if let Some(live) = self.live.take() {
            tracing::debug!(generation = live.generation, "destroying context");
            self.current.store(NO_GENERATION, Ordering::Release);
        }
    }

    /// Wait until the live context's program has finished and all of its
    /// console output is in the log.
    pub async fn wait_for_exit(&self) -> Result<ExecutionReport> {
        let generation = self.generation().ok_or(SandboxError::Destroyed)?;
        let mut exits = self.exits.clone();
        let report = exits
            .wait_for(|report| report.as_ref().is_some_and(|r| r.generation == generation))
            .await
            .map_err(|_| SandboxError::Destroyed)?;
        report.clone().ok_or(SandboxError::Destroyed)
    }

    /// Copy of the console log in append order.
    pub fn console(&self) -> Vec<LogEntry> {
        lock_log(&self.log).snapshot()
    }

    /// The shared console log.
    pub fn log(&self) -> &SharedLog {
        &self.log
    }

    /// Empty the console log. The running program is not affected.
    pub fn clear_console(&self) {
        lock_log(&self.log).clear();
    }

    fn materialize(&mut self, document: &ComposedDocument) -> u64 {
        self.destroy();

        let generation = self.next_generation;
        self.next_generation += 1;
        self.current.store(generation, Ordering::Release);

        let program = DocumentProgram::from_document(document.as_str());
        if document.is_empty() {
            lock_log(&self.log).append(
                LogKind::Warn,
                vec![Value::String("nothing to run: the composed document is empty".to_string())],
                NO_GENERATION,
            );
        }
        if !program.skipped_resources.is_empty() {
            tracing::debug!(generation, skipped = ?program.skipped_resources, "external scripts not loaded");
        }

        let kill = KillSwitch::new();
        let (io, reader) = ContextIo::new(self.config.pipe_capacity, self.config.stderr_capacity);
        let stderr = io.stderr.clone();
        let skipped = program.skipped_resources.clone();
        let launch = Launch {
            generation,
            program,
            io,
            kill: kill.clone(),
        };

        let runtime = Arc::clone(&self.runtime);
        let bridge = self.bridge.clone();
        let task = tokio::spawn(async move {
            let started = Instant::now();
            let (outcome, stats) =
                tokio::join!(runtime.execute(launch), pump_output(reader, generation, bridge.clone()));
            let report = ExecutionReport::from_outcome(
                generation,
                outcome,
                stderr.to_string_lossy(),
                started.elapsed(),
                skipped,
            );
            tracing::debug!(
                generation,
                forwarded = stats.forwarded,
                success = report.is_success(),
                "context finished"
            );
            // The receiver sees the exit after every message of this run.
            let _ = bridge.send(HostMessage::Exited(report));
        });

        tracing::debug!(generation, "context materialized");
        self.live = Some(LiveContext {
            generation,
            kill,
            task,
        });
        generation
    }
}

impl<R: IsolatedRuntime> Drop for SandboxHost<R> {
    fn drop(&mut self) {
        self.destroy();
        self.receiver.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::testing::{ScriptedRuntime, Step};
    use serde_json::json;
    use std::time::Duration;

    fn document(body: &str) -> ComposedDocument {
        ComposedDocument::new(format!("<html><body><script>{body}</script></body></html>"))
    }

    fn host(runtime: ScriptedRuntime) -> SandboxHost<ScriptedRuntime> {
        SandboxHost::new(runtime, SandboxConfig::default())
    }

    #[tokio::test]
    async fn test_mount_materializes_once() {
        let runtime = ScriptedRuntime::silent();
        let mut host = host(runtime.clone());
        assert_eq!(host.state(), HostState::Idle);

        let first = host.mount(&document("a()"));
        assert_eq!(host.state(), HostState::Materialized);
        assert_eq!(host.mount(&document("b()")), first);
        host.wait_for_exit().await.unwrap();
        assert_eq!(runtime.launches(), 1);
    }

    #[tokio::test]
    async fn test_run_replaces_context() {
        let mut host = host(ScriptedRuntime::new(|_| vec![Step::Hang]));
        let first = host.mount(&document("a()"));
        let second = host.run(&document("a()")).unwrap();
        assert!(second > first);
        assert_eq!(host.generation(), Some(second));
    }

    #[tokio::test]
    async fn test_console_messages_reach_log_in_order() {
        let mut host = host(ScriptedRuntime::new(|_| {
            vec![
                Step::console(LogKind::Info, vec![json!("one")]),
                Step::Print("plain output".to_string()),
                Step::console(LogKind::Error, vec![json!("two")]),
                Step::Post(json!({"tag": "other"})),
                Step::console(LogKind::Log, vec![json!("three"), json!(3)]),
            ]
        }));
        host.mount(&document("x()"));
        let report = host.wait_for_exit().await.unwrap();
        assert!(report.is_success());

        let entries: Vec<_> = host.console().iter().map(|e| (e.kind, e.text())).collect();
        assert_eq!(
            entries,
            vec![
                (LogKind::Info, "one".to_string()),
                (LogKind::Error, "two".to_string()),
                (LogKind::Log, "three 3".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_pause_suppresses_input_changes_only() {
        let runtime = ScriptedRuntime::silent();
        let mut host = host(runtime.clone());
        host.mount(&document("a()"));
        assert!(host.toggle_pause());
        assert_eq!(host.state(), HostState::Paused);

        assert_eq!(host.inputs_changed(&document("b()")), None);
        assert!(host.run(&document("b()")).is_some());
        host.wait_for_exit().await.unwrap();
        assert_eq!(runtime.launches(), 2);

        // Unpausing does not re-run.
        assert!(!host.toggle_pause());
        assert_eq!(runtime.launches(), 2);
        assert!(host.inputs_changed(&document("c()")).is_some());
    }

    #[tokio::test]
    async fn test_paused_idle_run_stays_idle() {
        let mut host = host(ScriptedRuntime::silent());
        host.set_paused(true);
        assert_eq!(host.run(&document("a()")), None);
        assert!(!host.is_materialized());
    }

    #[tokio::test]
    async fn test_stale_messages_dropped() {
        let mut host = host(ScriptedRuntime::new(|program| {
            if program.blocks[0].source.contains("slow") {
                vec![
                    Step::Sleep(Duration::from_millis(50)),
                    Step::console(LogKind::Log, vec![json!("stale")]),
                ]
            } else {
                vec![Step::console(LogKind::Log, vec![json!("fresh")])]
            }
        }));
        host.mount(&document("slow()"));
        host.run(&document("fast()"));
        host.wait_for_exit().await.unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;

        let texts: Vec<_> = host.console().iter().map(LogEntry::text).collect();
        assert_eq!(texts, vec!["fresh".to_string()]);
    }

    #[tokio::test]
    async fn test_failure_becomes_error_entry() {
        let mut host = host(ScriptedRuntime::new(|_| {
            vec![
                Step::Stderr("ReferenceError: nope is not defined\n    at <eval>\n".to_string()),
                Step::Exit(1),
            ]
        }));
        host.mount(&document("nope()"));
        let report = host.wait_for_exit().await.unwrap();
        assert_eq!(report.exit_code, Some(1));

        let console = host.console();
        assert_eq!(console.len(), 1);
        assert_eq!(console[0].kind, LogKind::Error);
        assert_eq!(console[0].text(), "Uncaught ReferenceError: nope is not defined");
    }

    #[tokio::test]
    async fn test_empty_document_warns() {
        let mut host = host(ScriptedRuntime::silent());
        host.mount(&ComposedDocument::default());
        host.wait_for_exit().await.unwrap();

        let console = host.console();
        assert_eq!(console.len(), 1);
        assert_eq!(console[0].kind, LogKind::Warn);
        assert_eq!(console[0].generation, 0);
    }

    #[tokio::test]
    async fn test_destroy_returns_to_idle() {
        let mut host = host(ScriptedRuntime::new(|_| vec![Step::Hang]));
        host.mount(&document("loop()"));
        host.destroy();
        assert_eq!(host.state(), HostState::Idle);
        assert!(host.wait_for_exit().await.unwrap_err().is_destroyed());
    }

    #[tokio::test]
    async fn test_clear_console_keeps_program_running() {
        let mut host = host(ScriptedRuntime::new(|_| {
            vec![
                Step::console(LogKind::Log, vec![json!("before")]),
                Step::Sleep(Duration::from_millis(30)),
                Step::console(LogKind::Log, vec![json!("after")]),
            ]
        }));
        host.mount(&document("x()"));
        tokio::time::sleep(Duration::from_millis(10)).await;
        host.clear_console();
        host.wait_for_exit().await.unwrap();

        let texts: Vec<_> = host.console().iter().map(LogEntry::text).collect();
        assert_eq!(texts, vec!["after".to_string()]);
    }
}
