//! Execution of a composed document inside a fresh WebAssembly instance.
//!
//! Each materialization instantiates the script interpreter into a brand-new
//! [`Store`]: no memory, globals or WASI state survive from one run to the
//! next. The program sees no preopened directories, no environment and no
//! network; its stdout is the bridge channel to the host.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::DuplexStream;
use wasmtime::{Engine, Linker, Module, Store, Trap};
use wasmtime_wasi::pipe::AsyncWriteStream;
use wasmtime_wasi::preview1;
use wasmtime_wasi::{AsyncStdoutStream, I32Exit, WasiCtxBuilder};

use crate::error::{parse_script_exception, Result, SandboxError};
use crate::sandbox::cache::SharedEngine;
use crate::sandbox::config::SandboxConfig;
use crate::sandbox::document::DocumentProgram;
use crate::sandbox::io::{CapturedOutput, ContextIo};
use crate::sandbox::limits::{ContextData, Interrupt, KillSwitch, StoreLimitsExt};

/// Everything a runtime needs to run one materialization.
#[derive(Debug)]
pub struct Launch {
    /// Generation of the context being created.
    pub generation: u64,
    /// The program extracted from the composed document.
    pub program: DocumentProgram,
    /// Output sinks; dropping them closes the bridge for this context.
    pub io: ContextIo,
    /// Triggered when the host destroys the context.
    pub kill: KillSwitch,
}

/// An execution backend for isolated contexts.
///
/// `execute` runs the program to completion (or interruption) and returns
/// its exit code. It must release `launch.io` when the program is done so
/// the host sees the end of the output stream.
pub trait IsolatedRuntime: Send + Sync + 'static {
    /// Run one program.
    fn execute(&self, launch: Launch) -> impl Future<Output = Result<i32>> + Send;
}

/// Outcome of one materialization, as seen by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionReport {
    /// Generation of the context.
    pub generation: u64,
    /// Exit code, if the program exited on its own.
    pub exit_code: Option<i32>,
    /// Captured interpreter stderr.
    pub stderr: String,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
    /// External resources the document referenced but that were not loaded.
    pub skipped_resources: Vec<String>,
    /// Why the run is considered failed, if it is.
    pub failure: Option<String>,
}

impl ExecutionReport {
    /// Report of a program that exited on its own.
    pub fn finished(generation: u64, exit_code: i32, elapsed: Duration) -> Self {
        Self {
            generation,
            exit_code: Some(exit_code),
            stderr: String::new(),
            elapsed,
            skipped_resources: Vec::new(),
            failure: None,
        }
        .with_exit_failure()
    }

    /// Build a report from what a runtime returned.
    pub fn from_outcome(
        generation: u64,
        outcome: Result<i32>,
        stderr: String,
        elapsed: Duration,
        skipped_resources: Vec<String>,
    ) -> Self {
        let (exit_code, failure) = match outcome {
            Ok(code) => (Some(code), None),
            Err(e) => (None, Some(e.to_string())),
        };
        Self {
            generation,
            exit_code,
            stderr,
            elapsed,
            skipped_resources,
            failure,
        }
        .with_exit_failure()
    }

    fn with_exit_failure(mut self) -> Self {
        if self.failure.is_none() {
            if let Some(code) = self.exit_code.filter(|c| *c != 0) {
                self.failure = Some(match parse_script_exception(&self.stderr) {
                    Some(exception) => format!("Uncaught {exception}"),
                    None => format!("program exited with code {code}"),
                });
            }
        }
        self
    }

    /// Check if the program ran to a clean exit.
    pub fn is_success(&self) -> bool {
        self.failure.is_none() && self.exit_code == Some(0)
    }
}

/// Runs programs in the QuickJS-style WASI interpreter.
#[derive(Debug, Clone)]
pub struct WasmRuntime {
    config: SandboxConfig,
    engine: SharedEngine,
    module: Module,
}

impl WasmRuntime {
    /// Create a runtime, compiling (or reusing) the interpreter module.
    pub fn new(config: SandboxConfig) -> Result<Self> {
        let engine = SharedEngine::new(config.max_fuel.is_some())?;
        Self::with_engine(config, engine)
    }

    /// Create a runtime on an existing engine, sharing its module cache.
    pub fn with_engine(config: SandboxConfig, engine: SharedEngine) -> Result<Self> {
        if config.interpreter_args.is_empty() {
            return Err(SandboxError::Config(
                "interpreter_args must name at least the program".to_string(),
            ));
        }
        // A metering engine starts every store with zero fuel, and a plain
        // engine rejects `set_fuel`.
        if engine.fuel_enabled() != config.max_fuel.is_some() {
            return Err(SandboxError::Config(format!(
                "engine fuel metering is {} but max_fuel is {}",
                if engine.fuel_enabled() { "enabled" } else { "disabled" },
                if config.max_fuel.is_some() { "set" } else { "unset" },
            )));
        }
        let module = engine.module(&config.interpreter_path)?;
        Ok(Self {
            config,
            engine,
            module,
        })
    }

    /// The runtime's configuration.
    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// The engine programs run on.
    pub fn engine(&self) -> &SharedEngine {
        &self.engine
    }

    /// Synchronous execution (runs in blocking task).
    fn execute_sync(
        engine: &Engine,
        module: &Module,
        argv: &[String],
        output: DuplexStream,
        stderr: CapturedOutput,
        config: &SandboxConfig,
        kill: KillSwitch,
    ) -> Result<i32> {
        let budget = config.pipe_capacity.max(1);
        let wasi_ctx = WasiCtxBuilder::new()
            .args(argv)
            .stdout(AsyncStdoutStream::new(AsyncWriteStream::new(budget, output)))
            .stderr(AsyncStdoutStream::new(AsyncWriteStream::new(budget, stderr)))
            // No preopened directories, no environment, no sockets.
            .build_p1();

        let mut store = Store::new(engine, ContextData::new(config.max_memory, wasi_ctx));
        store.configure_limits(kill, config.timeout);

        if let Some(fuel) = config.max_fuel {
            store.set_fuel(fuel).map_err(|e| {
                SandboxError::RuntimeInit(anyhow::anyhow!("failed to set fuel: {}", e))
            })?;
        }

        let mut linker = Linker::new(engine);
        preview1::add_to_linker_sync(&mut linker, |data: &mut ContextData| &mut data.wasi)
            .map_err(|e| SandboxError::RuntimeInit(anyhow::anyhow!("failed to link WASI: {}", e)))?;

        let instance = linker.instantiate(&mut store, module).map_err(|e| {
            if store.data().limiter.limit_exceeded() {
                return SandboxError::MemoryLimitExceeded(
                    "memory limit exceeded during instantiation".to_string(),
                );
            }
            SandboxError::ModuleLoad(anyhow::anyhow!("failed to instantiate: {}", e))
        })?;

        let start = instance
            .get_typed_func::<(), ()>(&mut store, "_start")
            .map_err(|e| {
                SandboxError::ModuleLoad(anyhow::anyhow!("failed to get _start function: {}", e))
            })?;

        let outcome = start.call(&mut store, ());
        // The interpreter may turn a refused allocation into a script-level
        // exception and still exit normally.
        if store.data().limiter.limit_exceeded() {
            return Err(SandboxError::MemoryLimitExceeded(format!(
                "memory limit exceeded during execution (peak {} bytes)",
                store.data().limiter.peak_memory()
            )));
        }
        match outcome {
            Ok(()) => Ok(0),
            Err(e) => {
                if let Some(interrupt) = e.downcast_ref::<Interrupt>() {
                    return Err(match interrupt {
                        Interrupt::Destroyed => SandboxError::Destroyed,
                        Interrupt::TimedOut => SandboxError::Timeout(config.timeout),
                    });
                }
                if let Some(Trap::OutOfFuel) = e.downcast_ref::<Trap>() {
                    let remaining = store.get_fuel().ok();
                    return Err(SandboxError::OutOfFuel {
                        consumed: config.max_fuel.zip(remaining).map(|(max, left)| max.saturating_sub(left)),
                    });
                }
                if let Some(exit) = e.downcast_ref::<I32Exit>() {
                    return Ok(exit.0);
                }
                Err(SandboxError::ExecutionFailed(e.to_string()))
            }
        }
    }
}

impl IsolatedRuntime for WasmRuntime {
    fn execute(&self, launch: Launch) -> impl Future<Output = Result<i32>> + Send {
        let engine = self.engine.clone();
        let module = self.module.clone();
        let config = self.config.clone();

        async move {
            let Launch {
                generation,
                program,
                io,
                kill,
            } = launch;

            let mut argv = config.interpreter_args.clone();
            argv.push(program.to_source());

            // Drive epoch interruption until the blocking run returns, even
            // if this future is dropped first: a destroyed context only sees
            // its kill switch on the next tick.
            let running = Arc::new(AtomicBool::new(true));
            let ticker_engine = engine.clone();
            let ticker_running = Arc::clone(&running);
            let tick = config.epoch_tick_interval;
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(tick);
                while ticker_running.load(Ordering::Acquire) {
                    interval.tick().await;
                    ticker_engine.increment_epoch();
                }
            });

            let backstop = config.timeout + Duration::from_secs(1);
            let exec_kill = kill.clone();
            let mut exec_handle = tokio::task::spawn_blocking(move || {
                let result = Self::execute_sync(
                    engine.engine(),
                    &module,
                    &argv,
                    io.output,
                    io.stderr,
                    &config,
                    exec_kill,
                );
                running.store(false, Ordering::Release);
                result
            });

            let result = tokio::select! {
                joined = &mut exec_handle => match joined {
                    Ok(inner) => inner,
                    Err(e) => Err(SandboxError::ExecutionFailed(format!("task panicked: {}", e))),
                },
                _ = tokio::time::sleep(backstop) => {
                    tracing::warn!(generation, "program ignored its deadline, destroying context");
                    kill.trigger();
                    Err(SandboxError::Timeout(backstop))
                }
            };
            tracing::debug!(generation, ok = result.is_ok(), "program finished");
            result
        }
    }
}
