//! Core runtime components.
//!
//! This module contains the building blocks of the thread-affine executor:
//! the growable work queue, the execution context and its thread-local
//! binding, the worker thread wrapper, cancellation signalling, and the
//! task machinery that lets posted futures suspend and resume on the same
//! context.
//!
//! Most users will interact with [`worker::WorkerThread`] and the handles it
//! returns rather than using these modules directly.

pub(crate) mod builder;
pub(crate) mod cancel;
pub(crate) mod context;
pub(crate) mod queue;
pub(crate) mod worker;

pub(crate) mod task;
