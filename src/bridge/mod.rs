//! Console bridge: the in-context bootstrap, the wire format and the host log.

pub mod bootstrap;
pub mod log;
pub mod message;
pub mod receiver;

pub use bootstrap::{bootstrap_script, bootstrap_source};
pub use log::{ConsoleLog, LogEntry, DEFAULT_CONSOLE_CAPACITY};
pub use message::{decode_frame, ConsoleMessage, Frame, LogKind, CONSOLE_EVENT_TAG, FRAME_PREFIX};
pub use receiver::{BridgeSender, ConsoleReceiver, HostMessage, SharedLog};
