/// The task is not scheduled and not executing.
pub(crate) const IDLE: usize = 0;

/// The task has been posted to its context and awaits its next poll.
pub(crate) const QUEUED: usize = 1;

/// The task is being polled on its context's thread.
pub(crate) const RUNNING: usize = 2;

/// The future finished; the task will not be polled again.
pub(crate) const COMPLETED: usize = 3;

/// A wake-up arrived while the task was running.
///
/// The poll in progress re-posts the task once it returns pending, so the
/// wake-up is not lost.
pub(crate) const NOTIFIED: usize = 4;
