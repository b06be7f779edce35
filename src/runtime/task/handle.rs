use crate::error::Error;

use std::mem;
use std::pin::Pin;
use std::sync::{Arc, Condvar, Mutex};
use std::task::{Context, Poll, Waker};

/// Shared completion cell behind every awaitable operation.
///
/// The cell is written exactly once, by whichever side finishes the work,
/// and can be observed two ways: asynchronously through registered wakers,
/// or synchronously through the condition variable. Both observers see the
/// result only after the producing work has fully run.
pub(crate) struct Completion<T> {
    cell: Mutex<CompletionCell<T>>,
    ready: Condvar,
}

struct CompletionCell<T> {
    /// The outcome, present once finished. Taken by the first observer.
    result: Option<Result<T, Error>>,

    /// Set together with `result`; stays set after the result is taken.
    finished: bool,

    /// Wakers registered by pending polls of the owning handle.
    wakers: Vec<Waker>,
}

impl<T> Completion<T> {
    pub(crate) fn new() -> Self {
        Self {
            cell: Mutex::new(CompletionCell {
                result: None,
                finished: false,
                wakers: Vec::new(),
            }),
            ready: Condvar::new(),
        }
    }

    /// Resolves the completion. The first call wins; later calls are no-ops.
    pub(crate) fn complete(&self, result: Result<T, Error>) {
        let wakers = {
            let mut cell = self.cell.lock().unwrap();

            if cell.finished {
                return;
            }

            cell.result = Some(result);
            cell.finished = true;
            mem::take(&mut cell.wakers)
        };

        self.ready.notify_all();
        for waker in wakers {
            waker.wake();
        }
    }

    /// Blocks the calling thread until the completion resolves.
    pub(crate) fn wait(&self) -> Result<T, Error> {
        let mut cell = self.cell.lock().unwrap();

        while !cell.finished {
            cell = self.ready.wait(cell).unwrap();
        }

        cell.result.take().expect("completion already consumed")
    }

    pub(crate) fn poll(&self, cx: &mut Context<'_>) -> Poll<Result<T, Error>> {
        let mut cell = self.cell.lock().unwrap();

        if cell.finished {
            return Poll::Ready(cell.result.take().expect("completion already consumed"));
        }

        cell.wakers.push(cx.waker().clone());
        Poll::Pending
    }
}

/// A handle to work posted onto an execution context.
///
/// A `TaskHandle` resolves once the posted action or future has fully run,
/// carrying its value or, if it panicked, [`Error::ActionFailed`]. Failures
/// reported here never terminate the owning context.
///
/// The handle can be awaited from async code, or joined from a plain thread
/// with [`wait`](Self::wait). Dropping it detaches the work; the work still
/// runs, only the outcome becomes unobservable.
pub struct TaskHandle<T> {
    completion: Arc<Completion<T>>,
}

impl<T> TaskHandle<T> {
    pub(crate) fn new(completion: Arc<Completion<T>>) -> Self {
        Self { completion }
    }

    /// Blocks the calling thread until the work has run.
    ///
    /// Must not be called from the context's own thread: the work can never
    /// run while its thread is parked here.
    pub fn wait(self) -> Result<T, Error> {
        self.completion.wait()
    }
}

impl<T> Future for TaskHandle<T> {
    type Output = Result<T, Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.completion.poll(cx)
    }
}
