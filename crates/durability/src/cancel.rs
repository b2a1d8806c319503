//! Callbacks and cancel handles shared by the timer and shutdown facilities.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// Boxed `Send` future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One-shot callback handed to a facility.
///
/// Calling it only builds the future; facilities must not poll that future
/// before `after`/`on_shutdown_once` has returned.
pub type Callback = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send + 'static>;

/// Handle that unregisters a timer or shutdown listener.
///
/// `cancel()` is idempotent and safe to call after the callback has fired.
/// Dropping the handle cancels it.
pub struct CancelHandle {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl CancelHandle {
    /// Wrap a cancel action.
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        CancelHandle {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A handle with nothing to cancel.
    pub fn noop() -> Self {
        CancelHandle { cancel: None }
    }

    /// Run the cancel action if it has not run yet.
    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    /// True until `cancel()` has been called.
    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }
}

impl Drop for CancelHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelHandle")
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_handle() -> (CancelHandle, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let handle = CancelHandle::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        (handle, count)
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let (mut handle, count) = counting_handle();
        assert!(handle.is_active());
        handle.cancel();
        handle.cancel();
        assert!(!handle.is_active());
        drop(handle);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_cancels() {
        let (handle, count) = counting_handle();
        drop(handle);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_noop_handle() {
        let mut handle = CancelHandle::noop();
        assert!(!handle.is_active());
        handle.cancel();
        assert!(format!("{:?}", handle).contains("active: false"));
    }
}
