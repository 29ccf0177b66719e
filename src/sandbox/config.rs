//! Sandbox configuration with builder pattern.

use std::path::PathBuf;
use std::time::Duration;

use crate::bridge::log::DEFAULT_CONSOLE_CAPACITY;

/// Configuration for the isolated preview contexts.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Maximum wall-clock time a program may run.
    pub timeout: Duration,
    /// Maximum linear memory in bytes.
    pub max_memory: u64,
    /// Maximum fuel (instruction count limit).
    pub max_fuel: Option<u64>,
    /// Path to the script interpreter wasm file.
    pub interpreter_path: PathBuf,
    /// Interpreter argv; the program source is appended as the last argument.
    pub interpreter_args: Vec<String>,
    /// Epoch interruption interval; also bounds how fast a destroyed
    /// context stops.
    pub epoch_tick_interval: Duration,
    /// Console entries kept before the oldest are evicted.
    pub console_capacity: usize,
    /// Buffer size of the context's output pipe in bytes.
    pub pipe_capacity: usize,
    /// Bytes of interpreter stderr kept per run.
    pub stderr_capacity: usize,
    /// Drop console events from contexts that have been replaced.
    pub drop_stale_messages: bool,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_memory: 64 * 1024 * 1024, // 64MB
            max_fuel: None,
            interpreter_path: PathBuf::from("assets/qjs.wasm"),
            interpreter_args: vec!["qjs".to_string(), "-e".to_string()],
            epoch_tick_interval: Duration::from_millis(10),
            console_capacity: DEFAULT_CONSOLE_CAPACITY,
            pipe_capacity: 64 * 1024,
            stderr_capacity: 64 * 1024,
            drop_stale_messages: true,
        }
    }
}

impl SandboxConfig {
    /// Create a new builder for SandboxConfig.
    pub fn builder() -> SandboxConfigBuilder {
        SandboxConfigBuilder::default()
    }
}

/// Builder for creating SandboxConfig instances.
#[derive(Debug, Clone, Default)]
pub struct SandboxConfigBuilder {
    timeout: Option<Duration>,
    max_memory: Option<u64>,
    max_fuel: Option<u64>,
    interpreter_path: Option<PathBuf>,
    interpreter_args: Option<Vec<String>>,
    epoch_tick_interval: Option<Duration>,
    console_capacity: Option<usize>,
    pipe_capacity: Option<usize>,
    stderr_capacity: Option<usize>,
    drop_stale_messages: Option<bool>,
}

impl SandboxConfigBuilder {
    /// Set the maximum execution timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the maximum memory limit in bytes.
    pub fn max_memory(mut self, bytes: u64) -> Self {
        self.max_memory = Some(bytes);
        self
    }

    /// Set the maximum fuel (instruction count).
    pub fn max_fuel(mut self, fuel: u64) -> Self {
        self.max_fuel = Some(fuel);
        self
    }

    /// Set the path to the script interpreter wasm.
    pub fn interpreter_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.interpreter_path = Some(path.into());
        self
    }

    /// Set the interpreter argv preceding the program source.
    pub fn interpreter_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.interpreter_args = Some(args.into_iter().map(Into::into).collect());
        self
    }

    /// Set the epoch tick interval for timeout checking.
    pub fn epoch_tick_interval(mut self, interval: Duration) -> Self {
        self.epoch_tick_interval = Some(interval);
        self
    }

    /// Set how many console entries are kept.
    pub fn console_capacity(mut self, entries: usize) -> Self {
        self.console_capacity = Some(entries);
        self
    }

    /// Set the output pipe buffer size in bytes.
    pub fn pipe_capacity(mut self, bytes: usize) -> Self {
        self.pipe_capacity = Some(bytes);
        self
    }

    /// Set how many bytes of stderr are kept per run.
    pub fn stderr_capacity(mut self, bytes: usize) -> Self {
        self.stderr_capacity = Some(bytes);
        self
    }

    /// Choose whether events of replaced contexts are dropped.
    pub fn drop_stale_messages(mut self, drop: bool) -> Self {
        self.drop_stale_messages = Some(drop);
        self
    }

    /// Build the SandboxConfig.
    pub fn build(self) -> SandboxConfig {
        let default = SandboxConfig::default();
        SandboxConfig {
            timeout: self.timeout.unwrap_or(default.timeout),
            max_memory: self.max_memory.unwrap_or(default.max_memory),
            max_fuel: self.max_fuel.or(default.max_fuel),
            interpreter_path: self.interpreter_path.unwrap_or(default.interpreter_path),
            interpreter_args: self.interpreter_args.unwrap_or(default.interpreter_args),
            epoch_tick_interval: self
                .epoch_tick_interval
                .unwrap_or(default.epoch_tick_interval),
            console_capacity: self.console_capacity.unwrap_or(default.console_capacity),
            pipe_capacity: self.pipe_capacity.unwrap_or(default.pipe_capacity),
            stderr_capacity: self.stderr_capacity.unwrap_or(default.stderr_capacity),
            drop_stale_messages: self
                .drop_stale_messages
                .unwrap_or(default.drop_stale_messages),
        }
    }
}
