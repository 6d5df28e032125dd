//! The middleware pipeline composer.
//!
//! Per operation, the composer walks the stages in order, selects the
//! registered builders whose `matches` accepts the descriptor, and lets
//! each contribute frames to the executor method. The body is then
//! wrapped in the exception-trapping frame, variables are resolved, and
//! the finished [`GeneratedType`] is handed to the emitter.
//!
//! ```text
//! Setup → Authentication → Authorisation → Validation → OperationChecks
//!       → PreExecute → Execution → PostExecute → Teardown
//! ```
//!
//! Builders within one stage contribute in registration order; the
//! resulting emission order is deterministic and observable in the
//! generated source.

use std::sync::Arc;

use blueprint_core::{
    api_operation_context_type, error_logger_type, GenerationResult, OperationDescriptor,
};
use blueprint_codegen::{
    GeneratedMethod, GeneratedType, InstanceSource, Variable, VariableChain,
};
use tracing::debug;

use crate::builder::{MiddlewareBuilder, MiddlewareBuilderContext};
use crate::builders::{
    AuthenticationBuilder, AuthorisationBuilder, ExceptionHandlerFrame, ExecutionStageBuilder,
    OperationChecksBuilder, PostExecuteTelemetryBuilder, SetupStageBuilder, TeardownStageBuilder,
    ValidationStageBuilder,
};
use crate::handlers::HandlerRegistry;
use crate::provider::InstanceFrameProvider;
use crate::stage::MiddlewareStage;

/// Composes one executor type per operation from registered builders.
pub struct PipelineComposer {
    builders: Vec<(MiddlewareStage, Arc<dyn MiddlewareBuilder>)>,
}

impl PipelineComposer {
    /// Creates a composer with no builders.
    #[must_use]
    pub fn new() -> Self {
        Self {
            builders: Vec::new(),
        }
    }

    /// Creates a composer wired with the built-in stage builders.
    #[must_use]
    pub fn with_defaults(handlers: Arc<HandlerRegistry>) -> Self {
        let mut composer = Self::new();
        composer.register(MiddlewareStage::Setup, Arc::new(SetupStageBuilder));
        composer.register(
            MiddlewareStage::Authentication,
            Arc::new(AuthenticationBuilder),
        );
        composer.register(
            MiddlewareStage::Authorisation,
            Arc::new(AuthorisationBuilder),
        );
        composer.register(MiddlewareStage::Validation, Arc::new(ValidationStageBuilder));
        composer.register(
            MiddlewareStage::OperationChecks,
            Arc::new(OperationChecksBuilder),
        );
        composer.register(
            MiddlewareStage::Execution,
            Arc::new(ExecutionStageBuilder::new(handlers)),
        );
        composer.register(
            MiddlewareStage::PostExecute,
            Arc::new(PostExecuteTelemetryBuilder),
        );
        composer.register(MiddlewareStage::Teardown, Arc::new(TeardownStageBuilder));
        composer
    }

    /// Registers a builder into a stage. Builders in one stage keep
    /// registration order.
    pub fn register(&mut self, stage: MiddlewareStage, builder: Arc<dyn MiddlewareBuilder>) {
        self.builders.push((stage, builder));
    }

    /// Number of registered builders.
    #[must_use]
    pub fn builder_count(&self) -> usize {
        self.builders.len()
    }

    /// Composes the executor type for one operation.
    ///
    /// # Errors
    ///
    /// Propagates every generation-time failure: missing handlers,
    /// missing return values, unresolved services, duplicate constructor
    /// arguments, and frame-graph cycles.
    pub fn compose(
        &self,
        descriptor: &Arc<OperationDescriptor>,
        provider: &Arc<InstanceFrameProvider>,
        namespace: &str,
    ) -> GenerationResult<GeneratedType> {
        let class_name = format!("{}Executor", descriptor.payload_type().simple_name());
        let mut class = GeneratedType::new(namespace, class_name, descriptor.name())
            .implementing("IOperationExecutor");

        let context_parameter = Arc::new(Variable::named(api_operation_context_type(), "context"));
        let mut method =
            GeneratedMethod::new("ExecuteAsync").with_parameter(Arc::clone(&context_parameter));
        if descriptor.requires_return_value() {
            method.require_result();
        }

        {
            let mut context =
                MiddlewareBuilderContext::new(descriptor, &mut method, &mut class, provider);
            for stage in MiddlewareStage::all() {
                for (registered_stage, builder) in &self.builders {
                    if *registered_stage != stage || !builder.matches(descriptor) {
                        continue;
                    }
                    debug!(
                        stage = %stage,
                        builder = builder.name(),
                        operation = descriptor.name(),
                        "building middleware"
                    );
                    builder.build(&mut context)?;
                }
            }

            let logger_variable = context.variable_from_service_in_catch(&error_logger_type())?;
            context.append_catch_frame(Arc::new(ExceptionHandlerFrame::new(
                descriptor.name(),
                logger_variable,
            )));
        }

        let mut chain = VariableChain::new(descriptor.name(), vec![context_parameter])
            .with_instance_source(Arc::clone(provider) as Arc<dyn InstanceSource>);
        for field in class.fields() {
            chain.offer_field(Arc::clone(field.variable()));
        }
        let fields = method.resolve(chain)?;
        for field in fields {
            class.add_injected_field(field)?;
        }
        class.add_method(method);
        Ok(class)
    }
}

impl Default for PipelineComposer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PipelineComposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineComposer")
            .field("builder_count", &self.builders.len())
            .finish()
    }
}
