//! # Blueprint Codegen
//!
//! The frame/variable graph and source writer behind Blueprint's
//! generated executors.
//!
//! The model has three layers:
//!
//! 1. [`writer::SourceWriter`]: a pure indented text buffer with
//!    block/namespace/using primitives.
//! 2. [`variable::Variable`] and [`frame::Frame`]: typed values and the
//!    imperative units that produce and consume them. Frames carry both
//!    an emission face (write source text) and a runtime face (invoke
//!    during a dispatch), so what is emitted and what runs cannot drift
//!    apart.
//! 3. [`method::GeneratedMethod`] and [`class::GeneratedType`]: the
//!    aggregates that place frames deterministically, lift services to
//!    constructor-injected fields, and emit class bodies.
//!
//! The resolution walk is the central algorithm: contributor order in,
//! producer-before-consumer emission order out, with cycle detection and
//! a hard gate on missing return values.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod chain;
pub mod class;
pub mod frame;
pub mod method;
pub mod variable;
pub mod writer;

pub use chain::{InstanceSource, ResolvedInstance, VariableChain};
pub use class::{GeneratedType, InjectedField};
pub use frame::{BoxFuture, Frame, Locals, StepContext, StepOutcome};
pub use method::GeneratedMethod;
pub use variable::{variable_key, Variable};
pub use writer::{SourceWriter, BLOCK};
