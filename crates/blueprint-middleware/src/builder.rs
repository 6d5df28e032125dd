//! The middleware builder capability.
//!
//! A middleware builder is a stateless contributor: given an operation
//! descriptor it decides whether it applies ([`matches`]), and if so
//! appends frames to the executor method under construction
//! ([`build`]). Builders never see each other; they communicate only
//! through variables.
//!
//! [`matches`]: MiddlewareBuilder::matches
//! [`build`]: MiddlewareBuilder::build

use std::sync::Arc;

use blueprint_core::{
    api_operation_context_type, GenerationResult, OperationDescriptor, TypeRef,
};
use blueprint_codegen::{
    Frame, GeneratedMethod, GeneratedType, InstanceSource, ResolvedInstance, Variable,
};

use crate::provider::InstanceFrameProvider;

/// A stateless contributor of frames to an operation's executor method.
pub trait MiddlewareBuilder: Send + Sync {
    /// Builder name for diagnostics.
    fn name(&self) -> &'static str;

    /// Whether this builder applies to the operation.
    fn matches(&self, descriptor: &OperationDescriptor) -> bool {
        let _ = descriptor;
        true
    }

    /// Contributes frames; may return a variable of interest to the
    /// composer (the execution stage returns the result variable).
    ///
    /// # Errors
    ///
    /// Fails generation for this operation; generation-time failures are
    /// fatal at startup.
    fn build(
        &self,
        context: &mut MiddlewareBuilderContext<'_>,
    ) -> GenerationResult<Option<Arc<Variable>>>;
}

/// Mutable state handed to each selected builder.
pub struct MiddlewareBuilderContext<'a> {
    descriptor: &'a Arc<OperationDescriptor>,
    method: &'a mut GeneratedMethod,
    class: &'a mut GeneratedType,
    provider: &'a InstanceFrameProvider,
    context_variable: Arc<Variable>,
    result_variable: Option<Arc<Variable>>,
}

impl<'a> MiddlewareBuilderContext<'a> {
    /// Creates the context for one operation's composition run.
    #[must_use]
    pub fn new(
        descriptor: &'a Arc<OperationDescriptor>,
        method: &'a mut GeneratedMethod,
        class: &'a mut GeneratedType,
        provider: &'a InstanceFrameProvider,
    ) -> Self {
        let context_variable = method
            .parameters()
            .iter()
            .find(|p| p.variable_type() == &api_operation_context_type())
            .map(Arc::clone)
            .unwrap_or_else(|| {
                Arc::new(Variable::named(api_operation_context_type(), "context"))
            });
        Self {
            descriptor,
            method,
            class,
            provider,
            context_variable,
            result_variable: None,
        }
    }

    /// The operation being composed.
    #[must_use]
    pub fn descriptor(&self) -> &OperationDescriptor {
        self.descriptor
    }

    /// The method's operation-context parameter variable.
    #[must_use]
    pub fn context_variable(&self) -> Arc<Variable> {
        Arc::clone(&self.context_variable)
    }

    /// Appends one frame in contributor order.
    pub fn append_frame(&mut self, frame: Arc<dyn Frame>) {
        self.method.add_frame(frame);
    }

    /// Appends frames in contributor order.
    pub fn append_frames(&mut self, frames: impl IntoIterator<Item = Arc<dyn Frame>>) {
        for frame in frames {
            self.method.add_frame(frame);
        }
    }

    /// Appends a frame to the exception-handling region.
    pub fn append_catch_frame(&mut self, frame: Arc<dyn Frame>) {
        self.method.add_catch_frame(frame);
    }

    /// Obtains a variable holding a service instance, letting the DI
    /// strategy decide between a constructor field and a per-dispatch
    /// resolution frame.
    ///
    /// # Errors
    ///
    /// Propagates unresolved services and duplicate constructor
    /// arguments.
    pub fn variable_from_service(
        &mut self,
        service_type: &TypeRef,
    ) -> GenerationResult<Arc<Variable>> {
        match self
            .provider
            .resolve(service_type, self.descriptor.name())?
        {
            ResolvedInstance::Field(field) => self.class.add_injected_field(field),
            ResolvedInstance::Frame { variable, frame } => {
                self.method.add_frame(frame);
                Ok(variable)
            }
        }
    }

    /// Like [`variable_from_service`](Self::variable_from_service), but a
    /// resolution frame lands in the exception-handling region, for
    /// services consumed only on the error path.
    ///
    /// # Errors
    ///
    /// Propagates unresolved services and duplicate constructor
    /// arguments.
    pub fn variable_from_service_in_catch(
        &mut self,
        service_type: &TypeRef,
    ) -> GenerationResult<Arc<Variable>> {
        match self
            .provider
            .resolve(service_type, self.descriptor.name())?
        {
            ResolvedInstance::Field(field) => self.class.add_injected_field(field),
            ResolvedInstance::Frame { variable, frame } => {
                self.method.add_catch_frame(frame);
                Ok(variable)
            }
        }
    }

    /// Declares the method's result variable.
    pub fn set_result_variable(&mut self, variable: Arc<Variable>) {
        self.method.set_result_variable(Arc::clone(&variable));
        self.result_variable = Some(variable);
    }

    /// The result variable, once the execution stage declared it.
    #[must_use]
    pub fn result_variable(&self) -> Option<&Arc<Variable>> {
        self.result_variable.as_ref()
    }
}
