use crate::error::{Error, panic_message};
use crate::runtime::cancel::CancellationToken;
use crate::runtime::context::ExecutionContext;
use crate::runtime::task;
use crate::runtime::task::{Completion, TaskHandle};

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};
use std::thread;

/// A dedicated thread serially executing work posted from other threads.
///
/// A `WorkerThread` owns one [`ExecutionContext`] and manages the thread
/// that runs its dispatch loop. Work is scheduled with
/// [`run_in_thread`](Self::run_in_thread) (fire-and-forget),
/// [`run_in_thread_async`](Self::run_in_thread_async) (awaitable) or
/// [`spawn`](Self::spawn) (awaitable future); all of it executes on the
/// worker's single thread, in posting order.
///
/// Failure propagation differs by entry point: a panic in fire-and-forget
/// work terminates the dispatch loop and surfaces through the
/// [`RunHandle`], while a panic in awaitable work is reported through that
/// operation's [`TaskHandle`] and leaves the worker running.
pub struct WorkerThread {
    context: Arc<ExecutionContext>,
    started: AtomicBool,
}

impl WorkerThread {
    /// Creates a worker with the default queue capacity.
    pub fn new() -> Self {
        super::builder::WorkerBuilder::new().build()
    }

    pub(crate) fn with_queue_capacity(queue_capacity: usize) -> Self {
        Self {
            context: ExecutionContext::new(queue_capacity),
            started: AtomicBool::new(false),
        }
    }

    /// Returns the execution context this worker owns.
    pub fn context(&self) -> Arc<ExecutionContext> {
        self.context.clone()
    }

    /// Starts the dispatch loop on a new dedicated thread.
    ///
    /// The returned [`RunHandle`] resolves with `Ok(())` once the loop exits
    /// through cancellation of `token`, or with
    /// [`Error::ActionFailed`] if fire-and-forget work panicked and killed
    /// the loop.
    ///
    /// # Panics
    ///
    /// Panics if the worker was already started; one worker runs exactly one
    /// dispatch loop over its queue.
    pub fn start(&self, token: CancellationToken) -> RunHandle {
        assert!(
            !self.started.swap(true, Ordering::AcqRel),
            "worker thread already started"
        );

        let context = self.context.clone();
        let completion = Arc::new(Completion::new());
        let remote = completion.clone();

        tracing::debug!("starting worker thread");
        let thread = thread::spawn(move || {
            let outcome = match catch_unwind(AssertUnwindSafe(|| context.run(&token))) {
                Ok(result) => result,
                Err(payload) => Err(Error::ActionFailed(panic_message(payload))),
            };
            remote.complete(outcome);
        });

        RunHandle {
            completion,
            thread: Some(thread),
        }
    }

    /// Runs the dispatch loop on the calling thread instead of spawning one.
    ///
    /// Blocks until `token` is cancelled. Fails immediately with
    /// [`Error::AlreadyBound`] if the calling thread already has a bound
    /// context, and with [`Error::ActionFailed`] if fire-and-forget work
    /// panicked and killed the loop.
    ///
    /// # Panics
    ///
    /// Panics if the worker was already started.
    pub fn start_in_current_thread(&self, token: CancellationToken) -> Result<(), Error> {
        assert!(
            !self.started.swap(true, Ordering::AcqRel),
            "worker thread already started"
        );

        match catch_unwind(AssertUnwindSafe(|| self.context.clone().run(&token))) {
            Ok(result) => result,
            Err(payload) => Err(Error::ActionFailed(panic_message(payload))),
        }
    }

    /// Schedules `action` on the worker, fire-and-forget.
    ///
    /// There is no way to observe completion through this call, and a panic
    /// inside `action` is fatal to the whole worker: the dispatch loop
    /// terminates, the [`RunHandle`] resolves with the failure, and pending
    /// items never run.
    pub fn run_in_thread(&self, action: impl FnOnce() + Send + 'static) {
        self.context.post(action);
    }

    /// Schedules `action` on the worker and returns a handle to its result.
    ///
    /// The handle resolves only after `action` has fully run. A panic inside
    /// `action` is caught on the worker and reported through the handle as
    /// [`Error::ActionFailed`]; the worker stays alive and keeps processing
    /// subsequent items.
    pub fn run_in_thread_async<T, F>(&self, action: F) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let completion = Arc::new(Completion::new());
        let remote = completion.clone();

        self.context.post(move || {
            let outcome = catch_unwind(AssertUnwindSafe(action))
                .map_err(|payload| Error::ActionFailed(panic_message(payload)));
            remote.complete(outcome);
        });

        TaskHandle::new(completion)
    }

    /// Schedules `future` on the worker and returns a handle to its output.
    ///
    /// Every poll of `future` runs on the worker's thread: wake-ups re-post
    /// the future onto the same context, so code before and after a
    /// suspension point stays on the one thread. Panics behave as in
    /// [`run_in_thread_async`](Self::run_in_thread_async).
    pub fn spawn<F>(&self, future: F) -> TaskHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        task::spawn_on(self.context.clone(), future)
    }
}

impl Default for WorkerThread {
    fn default() -> Self {
        Self::new()
    }
}

/// Completion of a worker's dispatch loop.
///
/// Resolves with `Ok(())` when the loop exits through cancellation, or with
/// the failure that terminated it. Can be awaited, or joined from a plain
/// thread with [`join`](Self::join).
pub struct RunHandle {
    completion: Arc<Completion<()>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl RunHandle {
    /// Blocks until the dispatch loop has terminated and its thread exited.
    pub fn join(mut self) -> Result<(), Error> {
        let outcome = self.completion.wait();

        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }

        outcome
    }
}

impl Future for RunHandle {
    type Output = Result<(), Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.completion.poll(cx)
    }
}
