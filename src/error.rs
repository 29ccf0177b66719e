//! Error types for the playground.

use thiserror::Error;

/// Errors that can occur while composing, materializing or persisting a project.
#[derive(Error, Debug)]
pub enum SandboxError {
    /// The program exceeded the configured wall-clock budget.
    #[error("execution timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The program exceeded memory limits.
    #[error("memory limit exceeded: {0}")]
    MemoryLimitExceeded(String),

    /// Failed to initialize the Wasm runtime.
    #[error("failed to initialize runtime: {0}")]
    RuntimeInit(#[source] anyhow::Error),

    /// Failed to load or instantiate the script interpreter module.
    #[error("failed to load script interpreter: {0}")]
    ModuleLoad(#[source] anyhow::Error),

    /// The program could not be run to completion.
    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    /// An exception escaped every handler and reached the interpreter.
    #[error("{name}: {message}")]
    ScriptException {
        /// Constructor name of the thrown value (e.g. "TypeError").
        name: String,
        /// The exception message.
        message: String,
        /// The interpreter's stack listing, if it printed one.
        stack: Option<String>,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// The interpreter wasm file was not found.
    #[error("script interpreter wasm not found at: {0}")]
    InterpreterNotFound(String),

    /// Execution ran out of fuel (instruction limit).
    #[error("execution ran out of fuel after {consumed:?} instructions")]
    OutOfFuel {
        /// Number of instructions consumed before running out.
        consumed: Option<u64>,
    },

    /// The isolated context was destroyed before the program finished.
    #[error("isolated context destroyed")]
    Destroyed,

    /// The storage collaborator failed.
    #[error("storage error: {0}")]
    Storage(String),
}

impl SandboxError {
    /// Check if this error represents a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, SandboxError::Timeout(_))
    }

    /// Check if this error represents a memory limit exceeded.
    pub fn is_memory_limit(&self) -> bool {
        matches!(self, SandboxError::MemoryLimitExceeded(_))
    }

    /// Check if this error represents an uncaught script exception.
    pub fn is_script_exception(&self) -> bool {
        matches!(self, SandboxError::ScriptException { .. })
    }

    /// Check if this error represents an out-of-fuel condition.
    pub fn is_out_of_fuel(&self) -> bool {
        matches!(self, SandboxError::OutOfFuel { .. })
    }

    /// Check if the context was torn down under the program.
    pub fn is_destroyed(&self) -> bool {
        matches!(self, SandboxError::Destroyed)
    }
}

/// Result type alias for playground operations.
pub type Result<T> = std::result::Result<T, SandboxError>;

/// Parse an uncaught exception from the interpreter's stderr.
///
/// The interpreter prints the exception as `Name: message` followed by
/// indented `at …` frames. Anything before the exception line is ignored.
pub fn parse_script_exception(stderr: &str) -> Option<SandboxError> {
    if stderr.trim().is_empty() {
        return None;
    }

    let lines: Vec<&str> = stderr.lines().collect();
    let (idx, line) = lines
        .iter()
        .enumerate()
        .find(|(_, line)| looks_like_exception(line))?;

    let (name, message) = match line.find(':') {
        Some(colon) => (
            line[..colon].trim().to_string(),
            line[colon + 1..].trim().to_string(),
        ),
        None => (line.trim().to_string(), String::new()),
    };

    let frames: Vec<&str> = lines[idx + 1..]
        .iter()
        .take_while(|l| l.trim_start().starts_with("at "))
        .copied()
        .collect();
    let stack = if frames.is_empty() {
        None
    } else {
        Some(frames.join("\n"))
    };

    Some(SandboxError::ScriptException {
        name,
        message,
        stack,
    })
}

/// Check if a line looks like a thrown error header.
fn looks_like_exception(line: &str) -> bool {
    const STANDALONE: [&str; 2] = ["InternalError", "AggregateError"];

    if !line
        .chars()
        .next()
        .map(|c| c.is_ascii_uppercase())
        .unwrap_or(false)
    {
        return false;
    }

    let name = line.split(':').next().unwrap_or("").trim();
    if name.is_empty() || name.contains(' ') {
        return false;
    }

    name.ends_with("Error") || STANDALONE.contains(&name)
}
