//! # Blueprint
//!
//! **An API framework built around a compile-time pipeline generator.**
//!
//! At host start-up, Blueprint inspects the declared operation catalog
//! and, per operation, synthesizes dedicated executor source that weaves
//! the configured middleware stages together: authentication, validation,
//! the handler calls, result handling, and error trapping. The source is
//! verified by an in-process compiler and sealed into immutable executor
//! objects; at dispatch time the registry jumps straight to the
//! pre-resolved executor, with no per-request reflection, dependency
//! lookup, or pipeline traversal.
//!
//! ## Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use blueprint::prelude::*;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = BlueprintConfig::builder("AcmeApi")
//!     .assembly_name("AcmeApi.Generated")
//!     .build()?;
//!
//! let mut handlers = HandlerRegistry::new();
//! let operation = TypeRef::in_namespace("Acme.Api", "Ping");
//! handlers.register(
//!     OperationHandler::new("PingHandler", operation.clone(), |_ctx| {
//!         Box::pin(async { Ok(Some(serde_json::json!("pong"))) })
//!     })
//!     .returning(),
//! );
//!
//! let mut generator = PipelineGenerator::new(
//!     config,
//!     PipelineComposer::with_defaults(Arc::new(handlers)),
//!     ServiceRegistry::new(),
//!     Arc::new(InMemoryCompiler::new()),
//! );
//! generator.register_operation(
//!     OperationDescriptor::builder("ping", operation).build(),
//! );
//!
//! let services = generator.services();
//! let assembly = generator.generate()?;
//! let registry = ExecutorRegistry::from_assembly(assembly, services)?;
//! assert!(registry.what_code_did_i_generate().contains("PingExecutor"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! catalog ─▶ composer (stages) ─▶ frame/variable graph ─▶ method/type
//!        ─▶ emitter ─▶ compiler ─▶ executor registry ─▶ dispatch
//! ```

#![doc(html_root_url = "https://docs.rs/blueprint/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export core types
pub use blueprint_core as core;

// Re-export the code generation model
pub use blueprint_codegen as codegen;

// Re-export middleware composition
pub use blueprint_middleware as middleware;

// Re-export emission and compilation
pub use blueprint_compile as compile;

// Re-export dispatch
pub use blueprint_runtime as runtime;

// Re-export background task execution
pub use blueprint_tasks as tasks;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use blueprint::prelude::*;
/// ```
pub mod prelude {
    pub use blueprint_core::{
        ApiOperationContext, BlueprintConfig, CallerIdentity, CompileStrategy, FeatureKind,
        GenerationError, GenerationResult, OperationDescriptor, OperationResult,
        OptimizationLevel, PropertyDescriptor, PropertySource, ResponseCategory,
        ResponseDescriptor, ServiceLifetime, ServiceRegistry, TypeRef, ValidationFailures,
        ValidationRule,
    };

    pub use blueprint_middleware::{
        HandlerRegistry, MiddlewareBuilder, MiddlewareBuilderContext, MiddlewareStage,
        OperationHandler, PipelineComposer,
    };

    pub use blueprint_compile::{InMemoryCompiler, PipelineGenerator};

    pub use blueprint_runtime::{ExecutorRegistry, OperationInstance};

    pub use blueprint_tasks::{BackgroundTaskRunner, RetryPolicy};
}
