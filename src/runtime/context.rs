use crate::error::Error;
use crate::runtime::cancel::CancellationToken;
use crate::runtime::queue::{WorkItem, WorkQueue};

use std::cell::RefCell;
use std::sync::Arc;

thread_local! {
    /// The execution context bound to the current thread, if any.
    ///
    /// Set by the run loop for its lifetime and read by anything that needs
    /// to capture "where am I running", most notably the messenger when a
    /// subscription is created.
    static CURRENT_CONTEXT: RefCell<Option<Arc<ExecutionContext>>> = const { RefCell::new(None) };
}

/// Returns the execution context bound to the calling thread, if any.
pub fn current() -> Option<Arc<ExecutionContext>> {
    CURRENT_CONTEXT.with(|current| current.borrow().clone())
}

/// Clears the thread-local binding when the run loop exits, including by
/// unwind.
struct BindGuard;

impl Drop for BindGuard {
    fn drop(&mut self) {
        CURRENT_CONTEXT.with(|current| current.borrow_mut().take());
    }
}

/// Binds `context` as the thread's current context for the guard's lifetime.
///
/// At most one context may be current per thread; a nested bind fails with
/// [`Error::AlreadyBound`].
fn bind(context: Arc<ExecutionContext>) -> Result<BindGuard, Error> {
    CURRENT_CONTEXT.with(|current| {
        let mut current = current.borrow_mut();

        if current.is_some() {
            return Err(Error::AlreadyBound);
        }

        *current = Some(context);
        Ok(BindGuard)
    })
}

/// A single-threaded execution context.
///
/// An `ExecutionContext` owns exactly one [`WorkQueue`] and runs a strictly
/// sequential dispatch loop over it: one item is invoked to completion
/// before the next is dequeued. Any number of threads may post work; only
/// the thread running [`run`](Self::run) ever executes it.
pub struct ExecutionContext {
    queue: Arc<WorkQueue>,
}

impl ExecutionContext {
    pub(crate) fn new(queue_capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            queue: Arc::new(WorkQueue::with_capacity(queue_capacity)),
        })
    }

    /// Schedules an action to run on this context's thread.
    ///
    /// Fire-and-forget: there is no way to observe the action's completion
    /// through this call, and a panic inside it terminates the whole context.
    /// Callable from any thread, including the context's own.
    pub fn post(&self, action: impl FnOnce() + Send + 'static) {
        self.post_item(Box::new(action));
    }

    pub(crate) fn post_item(&self, work: WorkItem) {
        self.queue.enqueue(work);
    }

    /// Synchronous send-and-wait dispatch. Always fails.
    ///
    /// Waiting for the context to process an item deadlocks when called from
    /// the context's own thread, so the operation is rejected outright with
    /// [`Error::Unsupported`].
    pub fn send(&self, _action: impl FnOnce() + Send + 'static) -> Result<(), Error> {
        Err(Error::Unsupported)
    }

    /// Runs the dispatch loop on the calling thread until cancellation.
    ///
    /// Registers a hook so cancelling `token` cancels the queue, binds this
    /// context as the thread's current one, then dequeues and invokes items
    /// in arrival order. A cancelled dequeue ends the loop normally. A panic
    /// escaping an item unwinds out of this function and is fatal to the
    /// context; the caller is expected to catch it and report it through the
    /// run-loop completion.
    pub(crate) fn run(self: Arc<Self>, token: &CancellationToken) -> Result<(), Error> {
        let queue = self.queue.clone();
        token.on_cancel(move || queue.cancel());

        let _bind = bind(self.clone())?;
        tracing::debug!("execution context started");

        loop {
            match self.queue.dequeue() {
                Ok(work) => work(),
                Err(Error::Cancelled) => break,
                Err(other) => return Err(other),
            }
        }

        tracing::debug!("execution context stopped");
        Ok(())
    }
}
