//! Resource and lifetime limits of an isolated context.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use wasmtime::{ResourceLimiter, Store, UpdateDeadline};

/// Resource limiter that enforces memory and table size limits.
pub struct ContextLimiter {
    /// Maximum memory in bytes.
    max_memory: u64,
    /// Peak memory allocation (highest ever seen).
    peak_memory: u64,
    /// Maximum table elements.
    max_table_elements: u64,
    /// Whether the limit has been exceeded.
    limit_exceeded: bool,
}

impl ContextLimiter {
    /// Create a new resource limiter with the specified memory limit.
    pub fn new(max_memory: u64) -> Self {
        Self {
            max_memory,
            peak_memory: 0,
            max_table_elements: 10_000,
            limit_exceeded: false,
        }
    }

    /// Check if any limit has been exceeded.
    pub fn limit_exceeded(&self) -> bool {
        self.limit_exceeded
    }

    /// Get the peak memory usage (highest ever observed).
    pub fn peak_memory(&self) -> u64 {
        self.peak_memory
    }
}

impl ResourceLimiter for ContextLimiter {
    fn memory_growing(
        &mut self,
        _current: usize,
        desired: usize,
        _maximum: Option<usize>,
    ) -> anyhow::Result<bool> {
        let desired_bytes = desired as u64;
        if desired_bytes > self.max_memory {
            self.limit_exceeded = true;
            return Ok(false);
        }
        self.peak_memory = self.peak_memory.max(desired_bytes);
        Ok(true)
    }

    fn table_growing(
        &mut self,
        _current: usize,
        desired: usize,
        _maximum: Option<usize>,
    ) -> anyhow::Result<bool> {
        if desired as u64 > self.max_table_elements {
            self.limit_exceeded = true;
            return Ok(false);
        }
        Ok(true)
    }
}

/// Shared flag that tears a running context down at its next epoch check.
#[derive(Debug, Clone, Default)]
pub struct KillSwitch(Arc<AtomicBool>);

impl KillSwitch {
    /// Create an untriggered switch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the context to stop.
    pub fn trigger(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Check if the context was asked to stop.
    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Why an epoch check stopped the program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    /// The host destroyed the context.
    Destroyed,
    /// The wall-clock budget ran out.
    TimedOut,
}

impl fmt::Display for Interrupt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interrupt::Destroyed => f.write_str("context destroyed"),
            Interrupt::TimedOut => f.write_str("deadline reached"),
        }
    }
}

impl std::error::Error for Interrupt {}

/// Decide what happens when the epoch deadline is reached.
///
/// The deadline is wall-clock time, so it holds however many programs tick
/// the same engine; the kill switch wins over the deadline.
pub fn check_deadline(kill: &KillSwitch, deadline: Instant, now: Instant) -> Result<UpdateDeadline, Interrupt> {
    if kill.is_triggered() {
        return Err(Interrupt::Destroyed);
    }
    if now >= deadline {
        return Err(Interrupt::TimedOut);
    }
    Ok(UpdateDeadline::Continue(1))
}

/// Store data that includes the resource limiter and execution context.
pub struct ContextData {
    /// The resource limiter.
    pub limiter: ContextLimiter,
    /// WASI Preview 1 context for the program.
    pub wasi: wasmtime_wasi::preview1::WasiP1Ctx,
}

impl ContextData {
    /// Create new store data with the given memory limit and WASI context.
    pub fn new(max_memory: u64, wasi: wasmtime_wasi::preview1::WasiP1Ctx) -> Self {
        Self {
            limiter: ContextLimiter::new(max_memory),
            wasi,
        }
    }
}

/// Extension trait wiring limits into a store.
pub trait StoreLimitsExt {
    /// Enable the memory limiter and the epoch deadline callback.
    fn configure_limits(&mut self, kill: KillSwitch, timeout: Duration);
}

impl StoreLimitsExt for Store<ContextData> {
    fn configure_limits(&mut self, kill: KillSwitch, timeout: Duration) {
        self.limiter(|data| &mut data.limiter);
        let deadline = Instant::now() + timeout;
        self.set_epoch_deadline(1);
        self.epoch_deadline_callback(move |_| {
            check_deadline(&kill, deadline, Instant::now()).map_err(anyhow::Error::new)
        });
    }
}
