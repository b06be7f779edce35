use super::worker::WorkerThread;

/// Builder for configuring and creating a worker thread.
///
/// # Examples
///
/// ```rust,ignore
/// let worker = WorkerBuilder::new()
///     .queue_capacity(64)
///     .build();
/// ```
pub struct WorkerBuilder {
    /// Initial capacity of the worker's work queue.
    queue_capacity: usize,
}

impl WorkerBuilder {
    /// Creates a new `WorkerBuilder` with default configuration.
    ///
    /// The work queue starts with 32 slots; it grows on demand, so the
    /// capacity only tunes how soon the first growth happens.
    pub fn new() -> Self {
        Self { queue_capacity: 32 }
    }

    /// Sets the initial capacity of the work queue.
    ///
    /// # Panics
    ///
    /// Panics if `capacity < 2`. One slot is always kept free to tell a
    /// full queue from an empty one.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        assert!(capacity >= 2, "queue_capacity must be >= 2");

        self.queue_capacity = capacity;
        self
    }

    /// Builds the worker with the configured options.
    ///
    /// The worker is created stopped; call [`WorkerThread::start`] or
    /// [`WorkerThread::start_in_current_thread`] to run it.
    pub fn build(self) -> WorkerThread {
        WorkerThread::with_queue_capacity(self.queue_capacity)
    }
}

impl Default for WorkerBuilder {
    /// Creates a default `WorkerBuilder`.
    fn default() -> Self {
        Self::new()
    }
}
