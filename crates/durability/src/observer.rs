//! Write outcome hook.
//!
//! Delayed writes are fire-and-forget: their failures never reach the code
//! that scheduled them. Every outcome is logged, and a [`WriteObserver`] can
//! be attached to a store to count, export, or react to them.

use keystash_core::StoreError;
use parking_lot::Mutex;
use std::fmt;

/// What started a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteTrigger {
    /// `save` without a delay
    Immediate,
    /// The debounce timer fired
    Timer,
    /// The shutdown listener fired
    Shutdown,
    /// An explicit `flush`
    Flush,
}

impl WriteTrigger {
    /// True when the caller is not waiting on the outcome.
    pub fn is_fire_and_forget(&self) -> bool {
        matches!(self, WriteTrigger::Timer | WriteTrigger::Shutdown)
    }
}

impl fmt::Display for WriteTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WriteTrigger::Immediate => "immediate",
            WriteTrigger::Timer => "timer",
            WriteTrigger::Shutdown => "shutdown",
            WriteTrigger::Flush => "flush",
        };
        f.write_str(name)
    }
}

/// Receives the outcome of every write attempt.
///
/// Called on the async scheduler after the write lock is released; keep
/// implementations cheap.
pub trait WriteObserver: Send + Sync {
    /// A record was written.
    fn on_write_succeeded(&self, _key: &str, _trigger: WriteTrigger, _bytes: usize) {}

    /// A write attempt failed. The payload it carried is gone.
    fn on_write_failed(&self, _key: &str, _trigger: WriteTrigger, _error: &StoreError) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl WriteObserver for NoopObserver {}

/// One recorded write attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteEvent {
    /// Store key
    pub key: String,
    /// What started the write
    pub trigger: WriteTrigger,
    /// Bytes written, or the error message
    pub outcome: Result<usize, String>,
}

/// Observer that keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<WriteEvent>>,
}

impl RecordingObserver {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// All events so far, oldest first.
    pub fn events(&self) -> Vec<WriteEvent> {
        self.events.lock().clone()
    }

    /// Number of successful writes.
    pub fn successes(&self) -> usize {
        self.events.lock().iter().filter(|e| e.outcome.is_ok()).count()
    }

    /// Number of failed writes.
    pub fn failures(&self) -> usize {
        self.events.lock().iter().filter(|e| e.outcome.is_err()).count()
    }
}

impl WriteObserver for RecordingObserver {
    fn on_write_succeeded(&self, key: &str, trigger: WriteTrigger, bytes: usize) {
        self.events.lock().push(WriteEvent {
            key: key.to_string(),
            trigger,
            outcome: Ok(bytes),
        });
    }

    fn on_write_failed(&self, key: &str, trigger: WriteTrigger, error: &StoreError) {
        self.events.lock().push(WriteEvent {
            key: key.to_string(),
            trigger,
            outcome: Err(error.to_string()),
        });
    }
}
