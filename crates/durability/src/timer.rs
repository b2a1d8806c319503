//! Timer facility for debounced writes.

use crate::cancel::{Callback, CancelHandle};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::trace;

/// Schedules a callback after a delay.
pub trait Timer: Send + Sync {
    /// Run `callback` once `delay` has elapsed, unless the returned handle is
    /// cancelled first.
    fn after(&self, delay: Duration, callback: Callback) -> CancelHandle;
}

/// Timer backed by `tokio::time::sleep`.
///
/// Each armed timer is a spawned task racing the sleep against a cancel
/// channel. Once the sleep wins, cancelling no longer affects the callback,
/// so a write started by the timer always runs to completion.
///
/// Must be armed from within a Tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioTimer;

impl TokioTimer {
    /// Create a timer.
    pub fn new() -> Self {
        TokioTimer
    }
}

impl Timer for TokioTimer {
    fn after(&self, delay: Duration, callback: Callback) -> CancelHandle {
        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = cancel_rx => {
                    trace!(?delay, "timer cancelled");
                }
                _ = tokio::time::sleep(delay) => {
                    callback().await;
                }
            }
        });

        CancelHandle::new(move || {
            let _ = cancel_tx.send(());
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_callback(count: &Arc<AtomicUsize>) -> Callback {
        let c = Arc::clone(count);
        Box::new(move || {
            Box::pin(async move {
                c.fetch_add(1, Ordering::SeqCst);
            })
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_after_delay() {
        let count = Arc::new(AtomicUsize::new(0));
        let _handle = TokioTimer::new().after(Duration::from_secs(10), counting_callback(&count));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_timer_never_fires() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut handle = TokioTimer::new().after(Duration::from_secs(1), counting_callback(&count));
        handle.cancel();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_handle_cancels() {
        let count = Arc::new(AtomicUsize::new(0));
        drop(TokioTimer::new().after(Duration::from_secs(1), counting_callback(&count)));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_after_fire_is_harmless() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut handle = TokioTimer::new().after(Duration::from_millis(10), counting_callback(&count));

        tokio::time::sleep(Duration::from_secs(1)).await;
        handle.cancel();
        handle.cancel();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
