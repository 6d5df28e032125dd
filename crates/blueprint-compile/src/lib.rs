//! # Blueprint Compile
//!
//! Assembly emission and compilation for Blueprint.
//!
//! The [`emitter::AssemblyEmitter`] serializes generated types into
//! source files with a fixed, snapshot-tested layout. The
//! [`compiler::Compiler`] seam accepts those files plus the assembly
//! reference closure; the default [`compiler::InMemoryCompiler`]
//! structurally verifies every file and seals the resolved frame plans
//! into an immutable [`assembly::GeneratedAssembly`].
//!
//! The [`generator::PipelineGenerator`] drives the whole run through a
//! one-shot state machine; any failure is fatal at startup and is stored
//! for replay, never swallowed.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod assembly;
pub mod compiler;
pub mod emitter;
pub mod generator;

pub use assembly::{ExecutorBinding, GeneratedAssembly};
pub use compiler::{
    AssemblyHandle, CompilationUnit, CompiledTypeKey, Compiler, InMemoryCompiler,
};
pub use emitter::{AssemblyEmitter, SourceFile, AUTO_GENERATED_HEADER};
pub use generator::{GeneratorState, PipelineGenerator};
