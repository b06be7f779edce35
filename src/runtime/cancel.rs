use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// A cooperative cancellation signal.
///
/// A `CancellationToken` is a clonable flag shared between the code that
/// requests cancellation and the code that observes it. Cancellation is
/// cooperative: an action already executing runs to completion, and queued
/// items are neither flushed nor executed.
///
/// Hooks registered with [`on_cancel`](Self::on_cancel) run exactly once, on
/// the thread that calls [`cancel`](Self::cancel). The run loop uses a hook
/// to cancel its work queue so a blocked consumer wakes up promptly.
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<TokenInner>,
}

struct TokenInner {
    /// Set once cancellation has been requested.
    cancelled: AtomicBool,

    /// Hooks to run when cancellation fires. Drained by the first `cancel`.
    hooks: Mutex<Vec<Box<dyn FnOnce() + Send>>>,
}

impl CancellationToken {
    /// Creates a new, not yet cancelled token.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TokenInner {
                cancelled: AtomicBool::new(false),
                hooks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Returns `true` once [`cancel`](Self::cancel) has been called on any
    /// clone of this token.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Requests cancellation.
    ///
    /// The first call flips the flag and runs every registered hook; any
    /// further call is a no-op.
    pub fn cancel(&self) {
        let hooks = {
            let mut hooks = self.inner.hooks.lock().unwrap();
            if self.inner.cancelled.swap(true, Ordering::AcqRel) {
                return;
            }
            std::mem::take(&mut *hooks)
        };

        for hook in hooks {
            hook();
        }
    }

    /// Registers a hook to run when the token is cancelled.
    ///
    /// If the token is already cancelled the hook runs immediately on the
    /// calling thread.
    pub fn on_cancel(&self, hook: impl FnOnce() + Send + 'static) {
        {
            let mut hooks = self.inner.hooks.lock().unwrap();
            if !self.is_cancelled() {
                hooks.push(Box::new(hook));
                return;
            }
        }

        hook();
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}
