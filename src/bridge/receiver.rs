//! Host end of the bridge channel.
//!
//! ```text
//!  context N ──pump──► HostMessage ──mpsc──► ConsoleReceiver ──► ConsoleLog
//!  context N+1 ─pump─┘                             │
//!                                                  └──► exit watch
//! ```
//!
//! Delivery is fire-and-forget. Messages of a destroyed generation may still
//! arrive after its replacement has started; they are dropped unless the
//! receiver is configured to keep them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use tokio::sync::{mpsc, watch};

use crate::bridge::log::ConsoleLog;
use crate::bridge::message::{ConsoleMessage, Frame, LogKind};
use crate::sandbox::runtime::ExecutionReport;

/// Console log shared between the receiver task and the host.
pub type SharedLog = Arc<Mutex<ConsoleLog>>;

/// Lock a shared log, recovering from a poisoned lock.
pub fn lock_log(log: &SharedLog) -> std::sync::MutexGuard<'_, ConsoleLog> {
    log.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Everything that travels from the isolated contexts to the host.
#[derive(Debug, Clone)]
pub enum HostMessage {
    /// A console event from the given generation.
    Console {
        /// Materialization the event came from.
        generation: u64,
        /// The decoded event.
        message: ConsoleMessage,
    },
    /// A posted message that is not a console event.
    Foreign {
        /// Materialization the message came from.
        generation: u64,
        /// Raw message body.
        value: Value,
    },
    /// A program finished; sent after all of its output.
    Exited(ExecutionReport),
}

impl HostMessage {
    /// Wrap a decoded output frame. Native output carries no message.
    pub fn from_frame(generation: u64, frame: Frame) -> Option<Self> {
        match frame {
            Frame::Console(message) => Some(HostMessage::Console {
                generation,
                message,
            }),
            Frame::Foreign(value) => Some(HostMessage::Foreign { generation, value }),
            Frame::Native(_) => None,
        }
    }
}

/// Sending half handed to each context's output pump.
pub type BridgeSender = mpsc::UnboundedSender<HostMessage>;

/// Consumes [`HostMessage`]s and appends console events to the log.
pub struct ConsoleReceiver {
    rx: mpsc::UnboundedReceiver<HostMessage>,
    log: SharedLog,
    current: Arc<AtomicU64>,
    drop_stale: bool,
    exits: watch::Sender<Option<ExecutionReport>>,
}

impl ConsoleReceiver {
    /// Create a receiver and the sender feeding it.
    ///
    /// `current` holds the generation of the live context; the returned
    /// watch yields each report of a finished current-generation program.
    pub fn channel(
        log: SharedLog,
        current: Arc<AtomicU64>,
        drop_stale: bool,
    ) -> (
        BridgeSender,
        Self,
        watch::Receiver<Option<ExecutionReport>>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (exits, exits_rx) = watch::channel(None);
        let receiver = Self {
            rx,
            log,
            current,
            drop_stale,
            exits,
        };
        (tx, receiver, exits_rx)
    }

    /// Drain the channel until every sender is gone.
    pub async fn run(mut self) {
        while let Some(message) = self.rx.recv().await {
            self.handle(message);
        }
        tracing::debug!("bridge channel closed");
    }

    /// Apply one message. Returns `true` if the log changed.
    pub fn handle(&mut self, message: HostMessage) -> bool {
        match message {
            HostMessage::Console {
                generation,
                message,
            } => {
                if self.is_stale(generation) && self.drop_stale {
                    tracing::trace!(generation, kind = %message.kind, "dropping stale console event");
                    return false;
                }
                lock_log(&self.log).append(message.kind, message.payload, generation);
                true
            }
            HostMessage::Foreign { generation, value } => {
                tracing::trace!(generation, %value, "ignoring foreign message");
                false
            }
            HostMessage::Exited(report) => {
                if self.is_stale(report.generation) {
                    tracing::debug!(generation = report.generation, "stale context exited");
                    return false;
                }
                let appended = match &report.failure {
                    Some(failure) => {
                        lock_log(&self.log).append(
                            LogKind::Error,
                            vec![Value::String(failure.clone())],
                            report.generation,
                        );
                        true
                    }
                    None => false,
                };
                self.exits.send_replace(Some(report));
                appended
            }
        }
    }

    fn is_stale(&self, generation: u64) -> bool {
        generation != self.current.load(Ordering::Acquire)
    }
}
