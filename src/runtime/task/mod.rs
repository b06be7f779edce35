//! Task primitives for futures posted onto an execution context.
//!
//! A posted future is wrapped in a [`Task`] that owns its lifecycle state
//! and completion cell. The custom waker re-posts the task onto the context
//! it belongs to, which is what pins every poll, before and after any
//! suspension point, to the context's single thread.

pub(crate) mod core;
pub(crate) mod handle;
pub(crate) mod state;
pub(crate) mod waker;

pub(crate) use self::core::{Task, run_detached, spawn_on};
pub(crate) use self::handle::Completion;

pub use self::handle::TaskHandle;
