use std::any::Any;

/// Errors produced by the execution runtime and the messenger.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The work queue was cancelled while the consumer was waiting.
    ///
    /// This is an internal loop-termination signal. The dispatch loop treats
    /// it as a normal exit, so callers only observe it when they inspect a
    /// queue operation directly.
    #[error("work queue cancelled")]
    Cancelled,

    /// An execution context is already bound to the current thread.
    ///
    /// At most one context may be current per thread; binding a second one
    /// is rejected.
    #[error("an execution context is already bound to this thread")]
    AlreadyBound,

    /// Synchronous send-and-wait dispatch is not supported.
    ///
    /// Blocking the caller until a context has processed an item deadlocks
    /// as soon as the caller is the context's own thread, so the operation
    /// always fails.
    #[error("synchronous dispatch is not supported; post the action instead")]
    Unsupported,

    /// The current thread has no bound execution context.
    #[error("no execution context is bound to this thread")]
    NotBound,

    /// A user-supplied action panicked.
    ///
    /// Carries the panic message. Whether this terminates the owning context
    /// depends on how the action was posted: fire-and-forget failures are
    /// fatal to the dispatch loop, awaitable failures are reported through
    /// the operation's completion handle only.
    #[error("posted action failed: {0}")]
    ActionFailed(String),
}

/// Extracts a printable message from a panic payload.
///
/// Panics raised with a string literal or a formatted `String` keep their
/// message; any other payload maps to a fixed fallback.
pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        String::from("posted action panicked")
    }
}
