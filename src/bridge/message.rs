//! Wire format of the bridge channel.
//!
//! Inside the isolated context, every `postMessage` becomes one output line:
//! the ASCII record separator followed by the message as JSON. Lines without
//! the separator are the program's own console output.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tag carried by every console event.
pub const CONSOLE_EVENT_TAG: &str = "console-event";

/// Marks an output line as a posted message.
pub const FRAME_PREFIX: char = '\u{1e}';

/// Which console entry point produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    /// `console.log`
    Log,
    /// `console.info`
    Info,
    /// `console.warn`
    Warn,
    /// `console.error` and uncaught exceptions
    Error,
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogKind::Log => "log",
            LogKind::Info => "info",
            LogKind::Warn => "warn",
            LogKind::Error => "error",
        };
        f.write_str(name)
    }
}

/// A console event as posted by the bootstrap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsoleMessage {
    /// Always [`CONSOLE_EVENT_TAG`].
    pub tag: String,
    /// Entry point that was called.
    pub kind: LogKind,
    /// Normalized call arguments, in call order.
    pub payload: Vec<Value>,
}

impl ConsoleMessage {
    /// Build a tagged console message.
    pub fn new(kind: LogKind, payload: Vec<Value>) -> Self {
        Self {
            tag: CONSOLE_EVENT_TAG.to_string(),
            kind,
            payload,
        }
    }

    /// Encode as one output line (without the trailing newline).
    pub fn to_frame(&self) -> String {
        // Serializing a struct of strings and JSON values cannot fail.
        let json = serde_json::to_string(self).unwrap_or_default();
        format!("{FRAME_PREFIX}{json}")
    }
}

/// One decoded line of context output.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// A console event from the bootstrap.
    Console(ConsoleMessage),
    /// A posted message that is not a console event.
    Foreign(Value),
    /// Plain program output.
    Native(String),
}

/// Classify one output line.
pub fn decode_frame(line: &str) -> Frame {
    let line = line.trim_end_matches(['\r', '\n']);
    let Some(body) = line.strip_prefix(FRAME_PREFIX) else {
        return Frame::Native(line.to_string());
    };

    let value: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(_) => return Frame::Foreign(Value::String(body.to_string())),
    };

    if value.get("tag").and_then(Value::as_str) != Some(CONSOLE_EVENT_TAG) {
        return Frame::Foreign(value);
    }

    match serde_json::from_value::<ConsoleMessage>(value.clone()) {
        Ok(message) => Frame::Console(message),
        Err(_) => Frame::Foreign(value),
    }
}
