//! # Blueprint Runtime
//!
//! Dispatch for Blueprint's generated pipelines.
//!
//! After generation, every operation has a sealed
//! [`executor::CompiledExecutor`]: constructor-bound singletons, the
//! resolved frame plan, and the emitted source. The
//! [`registry::ExecutorRegistry`] maps payload types to executors,
//! walking the declared base chain for polymorphic operations, and runs
//! each dispatch in a fresh service scope with cancellation threaded
//! through.
//!
//! The registry also carries the introspection surface backing the test
//! suite: [`registry::ExecutorRegistry::what_code_did_i_generate`] and
//! [`registry::ExecutorRegistry::what_code_did_i_generate_for`].

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod executor;
pub mod registry;

pub use executor::CompiledExecutor;
pub use registry::{ExecutorRegistry, OperationInstance};
