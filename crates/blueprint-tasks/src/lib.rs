//! # Blueprint Tasks
//!
//! Background execution of Blueprint operations with retry semantics.
//!
//! The [`retry::BackgroundTaskRunner`] dispatches an operation through
//! the executor registry in rethrow mode, so raw failures come back to
//! the retry loop instead of being converted to results. Transient
//! attempts stay silent; the final attempt is reported through the
//! error-logger service with the retry count in metadata.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod retry;

pub use retry::{BackgroundTaskRunner, RetryPolicy};
