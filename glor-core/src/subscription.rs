//! Deregistration handles for live listeners.

use std::fmt;

use tokio::task::JoinHandle;

/// Handle returned by every listener registration (store watches, auth
/// listeners).
///
/// Calling [`Unsubscribe::unsubscribe`] deregisters the listener. Calling it
/// again is a no-op. Dropping the handle unsubscribes as well, so a listener
/// never outlives the scope that owns its handle.
pub struct Unsubscribe {
    cancel: Option<Box<dyn FnOnce() + Send + 'static>>,
}

impl Unsubscribe {
    /// Wraps a cancellation closure. The closure runs at most once.
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Cancels a spawned listener task on unsubscribe.
    pub fn from_task(handle: JoinHandle<()>) -> Self {
        Self::new(move || handle.abort())
    }

    /// Deregisters the listener.
    pub fn unsubscribe(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    /// Returns true until the handle has been used.
    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }
}

impl Drop for Unsubscribe {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unsubscribe")
            .field("active", &self.is_active())
            .finish()
    }
}
