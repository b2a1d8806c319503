//! Shutdown notification.
//!
//! Stores with a debounced write pending register a one-shot listener so the
//! write happens before the process exits. The host owns a
//! [`ShutdownNotifier`] and awaits [`ShutdownNotifier::shutdown`] as the last
//! step of its stop sequence.

use crate::cancel::{Callback, CancelHandle};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use tracing::{debug, info};

/// Registers callbacks that fire once, at process shutdown.
pub trait ShutdownSignal: Send + Sync {
    /// Register `callback`. It fires at most once; cancelling the returned
    /// handle unregisters it if it has not fired yet.
    fn on_shutdown_once(&self, callback: Callback) -> CancelHandle;
}

#[derive(Default)]
struct Listeners {
    next_id: u64,
    fired: bool,
    callbacks: BTreeMap<u64, Callback>,
}

/// Host-owned shutdown registry.
///
/// Cloning yields another handle to the same registry.
#[derive(Clone, Default)]
pub struct ShutdownNotifier {
    inner: Arc<Mutex<Listeners>>,
}

impl ShutdownNotifier {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire every registered listener and wait for all of them.
    ///
    /// Listeners run in registration order. Calling this again is a no-op.
    pub async fn shutdown(&self) {
        let callbacks = {
            let mut listeners = self.inner.lock();
            if listeners.fired {
                return;
            }
            listeners.fired = true;
            std::mem::take(&mut listeners.callbacks)
        };

        info!(listeners = callbacks.len(), "running shutdown listeners");
        for (_, callback) in callbacks {
            callback().await;
        }
    }

    /// True once `shutdown()` has been called.
    pub fn is_shutdown(&self) -> bool {
        self.inner.lock().fired
    }

    /// Number of listeners waiting for shutdown.
    pub fn listener_count(&self) -> usize {
        self.inner.lock().callbacks.len()
    }
}

impl ShutdownSignal for ShutdownNotifier {
    /// Registering after shutdown has already run spawns the callback right
    /// away on the current Tokio runtime.
    fn on_shutdown_once(&self, callback: Callback) -> CancelHandle {
        let id = {
            let mut listeners = self.inner.lock();
            if !listeners.fired {
                let id = listeners.next_id;
                listeners.next_id += 1;
                listeners.callbacks.insert(id, callback);
                Some(id)
            } else {
                drop(listeners);
                debug!("shutdown already signaled, running listener now");
                tokio::spawn(callback());
                None
            }
        };

        match id {
            Some(id) => {
                let registry: Weak<Mutex<Listeners>> = Arc::downgrade(&self.inner);
                CancelHandle::new(move || {
                    if let Some(inner) = registry.upgrade() {
                        // Drop the callback outside the lock: it may own the
                        // last reference to a store whose handles re-enter
                        // this registry.
                        let removed = inner.lock().callbacks.remove(&id);
                        drop(removed);
                    }
                })
            }
            None => CancelHandle::noop(),
        }
    }
}

impl std::fmt::Debug for ShutdownNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let listeners = self.inner.lock();
        f.debug_struct("ShutdownNotifier")
            .field("listeners", &listeners.callbacks.len())
            .field("fired", &listeners.fired)
            .finish()
    }
}
