//! Error types for Blueprint.
//!
//! Blueprint distinguishes two failure worlds:
//!
//! - **Generation-time failures** ([`GenerationError`]) are fatal at
//!   startup. They halt the host with the offending operation and
//!   diagnostic and are never swallowed.
//! - **Runtime failures** inside a generated executor are trapped by the
//!   emitted exception frame and surface as
//!   [`OperationResult`](crate::OperationResult) variants, not errors.
//!
//! Service resolution at dispatch time has its own small error type,
//! [`ServiceError`], which the executor converts into an
//! `UnhandledException` result when it escapes.

use thiserror::Error;

/// Result alias for generation-time work.
pub type GenerationResult<T> = Result<T, GenerationError>;

/// A single compiler diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Path of the offending source file, when known.
    pub file: Option<String>,
    /// Human-readable description.
    pub message: String,
}

impl Diagnostic {
    /// Creates a diagnostic attached to a file.
    #[must_use]
    pub fn in_file(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            file: Some(file.into()),
            message: message.into(),
        }
    }

    /// Creates a diagnostic with no file context.
    #[must_use]
    pub fn bare(message: impl Into<String>) -> Self {
        Self {
            file: None,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{file}: {}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Fatal failures raised while composing, resolving, emitting, or
/// compiling the pipeline.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    /// A frame required a service no registration can satisfy.
    #[error("no service registered for {service_type}, required by operation '{operation}'")]
    UnresolvedService {
        /// The requested service type.
        service_type: String,
        /// The operation whose pipeline required it.
        operation: String,
    },

    /// The execution stage found no handler for an operation.
    #[error("no handler registered for operation '{operation}' ({payload_type})")]
    MissingHandler {
        /// The operation name.
        operation: String,
        /// The operation payload type.
        payload_type: String,
    },

    /// The operation requires a return value but no handler produced one.
    #[error("operation '{operation}' requires a return value, but none was produced: {detail}")]
    MissingReturnValue {
        /// The operation name.
        operation: String,
        /// What went wrong, including any interface-to-concrete handler
        /// mismatch.
        detail: String,
    },

    /// Two injected fields would collide on the generated constructor.
    #[error(
        "duplicate constructor argument on executor for '{operation}': \
         {existing} and {requested} both resolve to {concrete}"
    )]
    DuplicateInjectedField {
        /// The operation whose executor is affected.
        operation: String,
        /// The field already present.
        existing: String,
        /// The field being added.
        requested: String,
        /// The shared concrete implementation.
        concrete: String,
    },

    /// The frame graph contains a cycle.
    #[error("cycle detected while placing frames for operation '{operation}': {path}")]
    PipelineCycle {
        /// The operation whose method was being resolved.
        operation: String,
        /// The frame path that closed the cycle.
        path: String,
    },

    /// The compiler rejected the generated source.
    ///
    /// The full offending source is attached for diagnosis.
    #[error("generated source failed to compile with {} diagnostic(s); first: {}", .diagnostics.len(), first_diagnostic(.diagnostics))]
    Compilation {
        /// All diagnostics the compiler produced.
        diagnostics: Vec<Diagnostic>,
        /// The complete generated source of the failing unit.
        source_code: String,
    },

    /// Host configuration is invalid.
    #[error("invalid configuration: {field}: {reason}")]
    InvalidConfig {
        /// Dotted path of the offending field.
        field: String,
        /// Why it is invalid.
        reason: String,
    },

    /// The generator was driven out of order.
    #[error("pipeline generator is in state '{state}', cannot {action}")]
    InvalidState {
        /// Current state name.
        state: String,
        /// The attempted action.
        action: String,
    },
}

fn first_diagnostic(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .first()
        .map_or_else(|| "<none>".to_string(), ToString::to_string)
}

impl GenerationError {
    /// Returns the attached generated source for compilation failures.
    #[must_use]
    pub fn offending_source(&self) -> Option<&str> {
        match self {
            Self::Compilation { source_code, .. } => Some(source_code),
            _ => None,
        }
    }
}

/// Runtime service-resolution failures inside a dispatch.
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    /// No registration exists for the requested type.
    #[error("service {service_type} is not registered")]
    NotRegistered {
        /// The requested service type.
        service_type: String,
    },

    /// The registered instance could not be downcast to the expected shape.
    #[error("service {service_type} is registered with an incompatible instance type")]
    IncompatibleInstance {
        /// The requested service type.
        service_type: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_field_message_names_the_contract() {
        let err = GenerationError::DuplicateInjectedField {
            operation: "getUser".into(),
            existing: "Acme.IInjectable".into(),
            requested: "Acme.Injectable".into(),
            concrete: "Acme.Injectable".into(),
        };
        let message = err.to_string();
        assert!(message.contains("duplicate constructor argument"));
        assert!(message.contains("Acme.IInjectable"));
    }

    #[test]
    fn test_compilation_error_carries_source() {
        let err = GenerationError::Compilation {
            diagnostics: vec![Diagnostic::in_file("Acme/Executor.cs", "unbalanced braces")],
            source_code: "class Executor {".into(),
        };
        assert_eq!(err.offending_source(), Some("class Executor {"));
        assert!(err.to_string().contains("unbalanced braces"));
        assert!(err.to_string().contains("Acme/Executor.cs"));
    }

    #[test]
    fn test_cycle_error_reports_path() {
        let err = GenerationError::PipelineCycle {
            operation: "getUser".into(),
            path: "frameA -> frameB -> frameA".into(),
        };
        assert!(err.to_string().contains("frameA -> frameB -> frameA"));
    }

    #[test]
    fn test_service_error_display() {
        let err = ServiceError::NotRegistered {
            service_type: "Acme.IInjectable".into(),
        };
        assert!(err.to_string().contains("Acme.IInjectable"));
        assert!(err.to_string().contains("not registered"));
    }
}
