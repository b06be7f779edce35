//! # Solus
//!
//! **Solus** is a thread-affine task execution layer for Rust, designed as the
//! serial-execution building block for the **Nebula** ecosystem.
//!
//! Unlike a thread pool, Solus gives every [`WorkerThread`] exactly one
//! dedicated consumer thread. Work posted from any number of producer
//! threads is executed serially, in posting order, on that single thread,
//! which makes it the natural substrate for actor-like designs where state
//! must only ever be touched from one place.
//!
//! Solus offers:
//!
//! - A **growable multi-producer work queue** with blocking wake-up and
//!   cooperative cancellation
//! - **Fire-and-forget and awaitable posts**, with panic propagation that
//!   matches the entry point: awaitable failures resolve their handle,
//!   fire-and-forget failures are fatal to the worker
//! - **Suspending actions** that always resume on the worker's own thread
//! - A **type-keyed [`Messenger`]** that delivers each published message on
//!   the execution context its subscriber was registered from
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use solus::{CancellationToken, WorkerBuilder};
//!
//! let worker = WorkerBuilder::new().queue_capacity(32).build();
//! let token = CancellationToken::new();
//! let run = worker.start(token.clone());
//!
//! let answer = worker.run_in_thread_async(|| 1 + 1).wait().unwrap();
//! assert_eq!(answer, 2);
//!
//! token.cancel();
//! run.join().unwrap();
//! ```
//!
//! ## Modules
//!
//! - [`messenger`] — Type-keyed publish/subscribe over execution contexts
//!
//! ## Getting Started
//!
//! Add Solus to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! solus = { git = "https://github.com/Nebula-ecosystem/Solus" }
//! ```

mod error;
mod runtime;

pub mod messenger;

pub use error::Error;
pub use messenger::{MessageFuture, Messenger, Subscriber};
pub use runtime::builder::WorkerBuilder;
pub use runtime::cancel::CancellationToken;
pub use runtime::context::{ExecutionContext, current};
pub use runtime::task::TaskHandle;
pub use runtime::worker::{RunHandle, WorkerThread};
