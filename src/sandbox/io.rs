//! Output plumbing between an isolated context and the host.
//!
//! A context writes to two sinks: the message pipe (its stdout, where the
//! bridge frames travel) and a capped stderr capture used for diagnostics.

use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader, DuplexStream};

use crate::bridge::message::decode_frame;
use crate::bridge::receiver::{BridgeSender, HostMessage};

#[derive(Debug, Default)]
struct Captured {
    bytes: Vec<u8>,
    truncated: usize,
}

/// A writer that keeps the first `capacity` bytes written to it.
#[derive(Clone, Debug)]
pub struct CapturedOutput {
    buffer: Arc<Mutex<Captured>>,
    capacity: usize,
}

impl CapturedOutput {
    /// Create a capture keeping at most `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: Arc::new(Mutex::new(Captured::default())),
            capacity,
        }
    }

    /// Append bytes, discarding whatever exceeds the capacity.
    pub fn push(&self, buf: &[u8]) {
        let mut captured = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        let room = self.capacity.saturating_sub(captured.bytes.len());
        let keep = room.min(buf.len());
        captured.bytes.extend_from_slice(&buf[..keep]);
        captured.truncated += buf.len() - keep;
    }

    /// Get the captured output as a string.
    pub fn to_string_lossy(&self) -> String {
        let captured = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&captured.bytes).into_owned()
    }

    /// Bytes discarded because the capacity was reached.
    pub fn truncated(&self) -> usize {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .truncated
    }

    /// Get the length of captured data.
    pub fn len(&self) -> usize {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .bytes
            .len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AsyncWrite for CapturedOutput {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.push(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// The sinks handed to a running program.
#[derive(Debug)]
pub struct ContextIo {
    /// Write end of the message pipe (the program's stdout).
    pub output: DuplexStream,
    /// Diagnostic capture (the program's stderr).
    pub stderr: CapturedOutput,
}

impl ContextIo {
    /// Create the sinks for one context and the read end of its pipe.
    pub fn new(pipe_capacity: usize, stderr_capacity: usize) -> (Self, DuplexStream) {
        let (output, reader) = tokio::io::duplex(pipe_capacity.max(1));
        let io = Self {
            output,
            stderr: CapturedOutput::new(stderr_capacity),
        };
        (io, reader)
    }
}

/// Counters of one pump run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpStats {
    /// Messages forwarded to the host.
    pub forwarded: usize,
    /// Lines of plain program output.
    pub native_lines: usize,
}

/// Read a context's output line by line and forward its messages.
///
/// Runs until the context closes its end of the pipe or the host stops
/// listening. Invalid UTF-8 is replaced rather than aborting the stream.
pub async fn pump_output<R>(reader: R, generation: u64, tx: BridgeSender) -> PumpStats
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();
    let mut stats = PumpStats::default();

    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(generation, error = %e, "context output failed");
                break;
            }
        }

        let text = String::from_utf8_lossy(&line);
        match HostMessage::from_frame(generation, decode_frame(&text)) {
            Some(message) => {
                if tx.send(message).is_err() {
                    tracing::debug!(generation, "host stopped listening");
                    break;
                }
                stats.forwarded += 1;
            }
            None => {
                tracing::trace!(generation, line = %text.trim_end(), "program output");
                stats.native_lines += 1;
            }
        }
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::message::{ConsoleMessage, LogKind};
    use serde_json::json;
    use tokio::io::AsyncWriteExt;
    use tokio::sync::mpsc;

    #[test]
    fn test_captured_output_caps() {
        let output = CapturedOutput::new(8);
        output.push(b"hello ");
        output.push(b"world");
        assert_eq!(output.to_string_lossy(), "hello wo");
        assert_eq!(output.truncated(), 3);
    }

    #[tokio::test]
    async fn test_captured_output_async_write() {
        let mut output = CapturedOutput::new(64);
        output.write_all(b"TypeError: boom\n").await.unwrap();
        assert_eq!(output.to_string_lossy(), "TypeError: boom\n");
    }

    #[tokio::test]
    async fn test_pump_forwards_frames_in_order() {
        let (mut io, reader) = ContextIo::new(1024, 64);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let pump = tokio::spawn(pump_output(reader, 7, tx));

        let first = ConsoleMessage::new(LogKind::Log, vec![json!("a")]);
        let second = ConsoleMessage::new(LogKind::Error, vec![json!("b")]);
        io.output
            .write_all(format!("{}\nnative\n{}\n", first.to_frame(), second.to_frame()).as_bytes())
            .await
            .unwrap();
        drop(io);

        let stats = pump.await.unwrap();
        assert_eq!(stats, PumpStats { forwarded: 2, native_lines: 1 });

        let mut kinds = Vec::new();
        while let Ok(message) = rx.try_recv() {
            match message {
                HostMessage::Console { generation, message } => {
                    assert_eq!(generation, 7);
                    kinds.push(message.kind);
                }
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(kinds, vec![LogKind::Log, LogKind::Error]);
    }

    #[tokio::test]
    async fn test_pump_handles_unterminated_last_line() {
        let (mut io, reader) = ContextIo::new(1024, 64);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let frame = ConsoleMessage::new(LogKind::Info, vec![]).to_frame();
        io.output.write_all(frame.as_bytes()).await.unwrap();
        drop(io);

        let stats = pump_output(reader, 1, tx).await;
        assert_eq!(stats.forwarded, 1);
        assert!(matches!(rx.try_recv(), Ok(HostMessage::Console { .. })));
    }
}
