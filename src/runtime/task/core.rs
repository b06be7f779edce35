use crate::error::{Error, panic_message};
use crate::runtime::context::ExecutionContext;
use crate::runtime::task::handle::{Completion, TaskHandle};
use crate::runtime::task::state::{COMPLETED, IDLE, NOTIFIED, QUEUED, RUNNING};
use crate::runtime::task::waker::make_waker;

use std::cell::UnsafeCell;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};

/// A future being driven on a single execution context.
///
/// A `Task` pairs a pinned future with the lifecycle state that keeps polls
/// exclusive. Wake-ups, from any thread, re-post the task onto the context
/// that owns it, so every poll runs on that context's thread and code on
/// either side of a suspension point stays thread-affine.
pub(crate) struct Task<T> {
    /// The underlying future. `UnsafeCell` gives the polling thread interior
    /// mutability; the RUNNING state keeps access exclusive.
    future: UnsafeCell<Pin<Box<dyn Future<Output = T> + Send>>>,

    /// Lifecycle state (idle, queued, running, completed, notified).
    state: AtomicUsize,

    /// The context every poll is posted onto.
    context: Arc<ExecutionContext>,

    /// Resolved when the future finishes or panics.
    completion: Arc<Completion<T>>,
}

unsafe impl<T: Send> Send for Task<T> {}
unsafe impl<T: Send> Sync for Task<T> {}

impl<T: Send + 'static> Task<T> {
    pub(crate) fn new(
        future: Pin<Box<dyn Future<Output = T> + Send>>,
        context: Arc<ExecutionContext>,
        completion: Arc<Completion<T>>,
    ) -> Self {
        Self {
            future: UnsafeCell::new(future),
            state: AtomicUsize::new(QUEUED),
            context,
            completion,
        }
    }

    /// Polls the task once. Runs on the owning context's thread.
    ///
    /// On pending, the task returns to idle, or re-posts itself if a wake-up
    /// arrived during the poll. On ready, the completion resolves with the
    /// value. A panic inside the poll resolves the completion with
    /// [`Error::ActionFailed`] instead; the context itself survives.
    pub(crate) fn run(self: Arc<Self>) {
        let current = self.state.load(Ordering::Acquire);

        if current != QUEUED && current != NOTIFIED {
            return;
        }

        // Claim exclusive access to the future for this poll.
        if self
            .state
            .compare_exchange(current, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let waker = make_waker(self.clone());
        let mut cx = Context::from_waker(&waker);

        // Safety: the RUNNING state guarantees no other poll is in progress.
        let poll = catch_unwind(AssertUnwindSafe(|| unsafe {
            (*self.future.get()).as_mut().poll(&mut cx)
        }));

        match poll {
            Err(payload) => {
                self.state.store(COMPLETED, Ordering::Release);
                self.completion
                    .complete(Err(Error::ActionFailed(panic_message(payload))));
            }
            Ok(Poll::Ready(value)) => {
                self.state.store(COMPLETED, Ordering::Release);
                self.completion.complete(Ok(value));
            }
            Ok(Poll::Pending) => {
                // Return to idle unless a wake-up raced the poll.
                if self
                    .state
                    .compare_exchange(RUNNING, IDLE, Ordering::AcqRel, Ordering::Acquire)
                    .is_err()
                {
                    self.state.store(QUEUED, Ordering::Release);
                    self.repost();
                }
            }
        }
    }

    /// Signals the task to be polled again.
    ///
    /// An idle task is queued and posted; a running task is marked notified
    /// so the in-progress poll re-posts it. Queued and completed tasks are
    /// left alone.
    pub(crate) fn wake(self: Arc<Self>) {
        loop {
            let state = self.state.load(Ordering::Acquire);

            match state {
                IDLE => {
                    if self
                        .state
                        .compare_exchange(IDLE, QUEUED, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                    {
                        self.repost();
                        return;
                    }
                }
                RUNNING => {
                    if self
                        .state
                        .compare_exchange(RUNNING, NOTIFIED, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                    {
                        return;
                    }
                }
                _ => return,
            }
        }
    }

    fn repost(self: Arc<Self>) {
        let context = self.context.clone();
        context.post_item(Box::new(move || self.run()));
    }
}

/// Posts `future` onto `context` and returns a handle to its outcome.
///
/// The first poll happens once the context's dispatch loop reaches the
/// posted item; later polls are scheduled by the task's waker.
pub(crate) fn spawn_on<F>(context: Arc<ExecutionContext>, future: F) -> TaskHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let completion = Arc::new(Completion::new());
    let task = Arc::new(Task::new(
        Box::pin(future),
        context.clone(),
        completion.clone(),
    ));

    let queued = task.clone();
    context.post_item(Box::new(move || queued.run()));

    TaskHandle::new(completion)
}

/// Drives `future` on `context` with no observable completion.
///
/// Must be called on the context's own thread; the first poll runs inline
/// and any later poll is re-posted by the waker. Used by the messenger,
/// whose deliveries are fire-and-forget.
pub(crate) fn run_detached(
    context: Arc<ExecutionContext>,
    future: Pin<Box<dyn Future<Output = ()> + Send>>,
) {
    let completion = Arc::new(Completion::new());
    let task = Arc::new(Task::new(future, context, completion));
    task.run();
}
