//! Testing utilities for stores
//!
//! - **ManualTimer**: a [`Timer`] whose callbacks fire only when the test says
//!   so, making debounce behavior deterministic
//!
//! # Example
//!
//! ```ignore
//! use keystash_durability::testing::ManualTimer;
//!
//! let timer = ManualTimer::new();
//! let runtime = StoreRuntime::new(executor, Arc::new(timer.clone()), shutdown);
//! store.save_delayed(data, Duration::from_secs(10));
//! assert_eq!(timer.armed(), 1);
//! timer.fire_all().await;
//! ```

use crate::cancel::{Callback, CancelHandle};
use crate::timer::Timer;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct TimerState {
    next_id: u64,
    armed: BTreeMap<u64, (Duration, Callback)>,
    armed_total: usize,
    cancelled: usize,
    fired: usize,
}

/// Timer driven by the test instead of the clock.
///
/// Cloning yields another handle to the same set of timers.
#[derive(Clone, Default)]
pub struct ManualTimer {
    state: Arc<Mutex<TimerState>>,
}

impl ManualTimer {
    /// Create a timer with nothing armed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire every armed timer, oldest first, awaiting each callback.
    pub async fn fire_all(&self) {
        let callbacks = {
            let mut state = self.state.lock();
            let armed = std::mem::take(&mut state.armed);
            state.fired += armed.len();
            armed
        };
        for (_, (_, callback)) in callbacks {
            callback().await;
        }
    }

    /// Timers armed and not yet fired or cancelled.
    pub fn armed(&self) -> usize {
        self.state.lock().armed.len()
    }

    /// Timers ever armed.
    pub fn armed_total(&self) -> usize {
        self.state.lock().armed_total
    }

    /// Timers cancelled before firing.
    pub fn cancelled(&self) -> usize {
        self.state.lock().cancelled
    }

    /// Timers fired.
    pub fn fired(&self) -> usize {
        self.state.lock().fired
    }

    /// Delays of the armed timers, oldest first.
    pub fn armed_delays(&self) -> Vec<Duration> {
        self.state.lock().armed.values().map(|(d, _)| *d).collect()
    }
}

impl Timer for ManualTimer {
    fn after(&self, delay: Duration, callback: Callback) -> CancelHandle {
        let id = {
            let mut state = self.state.lock();
            let id = state.next_id;
            state.next_id += 1;
            state.armed_total += 1;
            state.armed.insert(id, (delay, callback));
            id
        };

        let state = Arc::downgrade(&self.state);
        CancelHandle::new(move || {
            if let Some(state) = state.upgrade() {
                let removed = {
                    let mut state = state.lock();
                    let removed = state.armed.remove(&id);
                    if removed.is_some() {
                        state.cancelled += 1;
                    }
                    removed
                };
                drop(removed);
            }
        })
    }
}

impl std::fmt::Debug for ManualTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ManualTimer")
            .field("armed", &state.armed.len())
            .field("cancelled", &state.cancelled)
            .field("fired", &state.fired)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_callback(count: &Arc<AtomicUsize>) -> Callback {
        let c = Arc::clone(count);
        Box::new(move || {
            Box::pin(async move {
                c.fetch_add(1, Ordering::SeqCst);
            })
        })
    }

    #[tokio::test]
    async fn test_manual_timer_fires_on_demand() {
        let timer = ManualTimer::new();
        let count = Arc::new(AtomicUsize::new(0));
        let _handle = timer.after(Duration::from_secs(5), counting_callback(&count));

        assert_eq!(timer.armed(), 1);
        assert_eq!(timer.armed_delays(), vec![Duration::from_secs(5)]);
        assert_eq!(count.load(Ordering::SeqCst), 0);

        timer.fire_all().await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(timer.fired(), 1);
        assert_eq!(timer.armed(), 0);
    }

    #[tokio::test]
    async fn test_manual_timer_cancel() {
        let timer = ManualTimer::new();
        let count = Arc::new(AtomicUsize::new(0));
        let mut handle = timer.after(Duration::from_secs(5), counting_callback(&count));
        handle.cancel();

        timer.fire_all().await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(timer.cancelled(), 1);
        assert_eq!(timer.armed_total(), 1);
    }
}
