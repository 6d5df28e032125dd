//! # Blueprint Core
//!
//! Core types for the Blueprint pipeline generator: operation
//! descriptors, operation results, the service model, the per-dispatch
//! context, and host configuration.
//!
//! Everything downstream of this crate (code generation, middleware
//! composition, compilation, dispatch) is driven off these types. The
//! central design rule is that all reflection-like knowledge (payload
//! properties, validation rules, base types, service lifetimes) is
//! collected into descriptors once at startup; generated executors then
//! work purely from direct accesses and static dispatch.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod context;
pub mod error;
pub mod operation;
pub mod result;
pub mod services;
pub mod types;

pub use config::{BlueprintConfig, BlueprintConfigBuilder, CompileStrategy, OptimizationLevel};
pub use context::{api_operation_context_type, ApiOperationContext, CallerIdentity};
pub use error::{Diagnostic, GenerationError, GenerationResult, ServiceError};
pub use operation::{
    FeatureKind, OperationDescriptor, OperationDescriptorBuilder, PropertyDescriptor,
    PropertySource, ResponseCategory, ResponseDescriptor, ValidationRule,
};
pub use result::{OperationResult, ValidationFailures};
pub use types::{TypeParseError, TypeRef};
pub use services::{
    error_logger_type, register_default_error_logger, ErrorLogger, ErrorLoggerHandle, ScopeStats,
    ServiceBinding, ServiceFactory, ServiceInstance, ServiceLifetime, ServiceRegistration,
    ServiceRegistry, ServiceResolver, ServiceScope, TracingErrorLogger,
};
