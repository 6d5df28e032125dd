//! Execution stage: handler invocation.
//!
//! One call frame is emitted per registered handler matching the
//! operation type or one of its bases, most distant base first. Every
//! call is awaited in sequence and none is guarded by a type test or
//! cast; handler applicability was settled at generation time.
//!
//! The result variable belongs to the last matching handler that
//! declares a return value. When the operation requires a return value
//! and no matching handler can produce one, generation fails: a handler
//! keyed to a concrete sub-type cannot be the sole producer for an
//! operation registered against an interface or base class, because
//! runtime dispatch may land on a different concrete type.

use std::sync::Arc;

use blueprint_core::{
    GenerationError, GenerationResult, OperationDescriptor, ResponseCategory, TypeRef,
};
use blueprint_codegen::{
    BoxFuture, Frame, SourceWriter, StepContext, StepOutcome, Variable, VariableChain,
};

use crate::builder::{MiddlewareBuilder, MiddlewareBuilderContext};
use crate::handlers::{HandlerRegistry, OperationHandler};

/// Contributes one awaited call per matching handler.
pub struct ExecutionStageBuilder {
    handlers: Arc<HandlerRegistry>,
}

impl ExecutionStageBuilder {
    /// Creates the builder over the host's handler registrations.
    #[must_use]
    pub fn new(handlers: Arc<HandlerRegistry>) -> Self {
        Self { handlers }
    }

    fn result_type(descriptor: &OperationDescriptor) -> TypeRef {
        descriptor
            .responses()
            .iter()
            .find(|r| r.category == ResponseCategory::Success)
            .map(|r| r.payload_type.clone())
            .unwrap_or_else(|| TypeRef::in_namespace("System", "Object"))
    }
}

impl std::fmt::Debug for ExecutionStageBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionStageBuilder")
            .field("handlers", &self.handlers)
            .finish()
    }
}

impl MiddlewareBuilder for ExecutionStageBuilder {
    fn name(&self) -> &'static str {
        "execution"
    }

    fn build(
        &self,
        context: &mut MiddlewareBuilderContext<'_>,
    ) -> GenerationResult<Option<Arc<Variable>>> {
        let descriptor = context.descriptor();
        let matched = self.handlers.matching(descriptor);

        if matched.is_empty() {
            let other = self.handlers.non_matching(descriptor);
            if descriptor.requires_return_value() && !other.is_empty() {
                let candidates = other
                    .iter()
                    .map(|h| format!("'{}' (keyed to {})", h.name(), h.operation_type()))
                    .collect::<Vec<_>>()
                    .join(", ");
                return Err(GenerationError::MissingReturnValue {
                    operation: descriptor.name().to_string(),
                    detail: format!(
                        "registered handlers {candidates} are keyed to types that are \
                         neither {payload} nor one of its bases; a handler keyed to a \
                         concrete sub-type cannot be the sole producer of the return \
                         value for an operation registered against an interface or \
                         base class, because runtime dispatch may land on a different \
                         concrete type",
                        payload = descriptor.payload_type()
                    ),
                });
            }
            return Err(GenerationError::MissingHandler {
                operation: descriptor.name().to_string(),
                payload_type: descriptor.payload_type().fully_qualified(),
            });
        }

        if descriptor.requires_return_value() && !matched.iter().any(OperationHandler::returns_value)
        {
            return Err(GenerationError::MissingReturnValue {
                operation: descriptor.name().to_string(),
                detail: "no matching handler declares a return value".into(),
            });
        }

        let last_returning = matched.iter().rposition(OperationHandler::returns_value);
        let result_variable = last_returning.map(|_| {
            Arc::new(Variable::named(
                Self::result_type(descriptor),
                "operationResult",
            ))
        });

        let context_variable = context.context_variable();
        for (index, handler) in matched.into_iter().enumerate() {
            let assigns = (Some(index) == last_returning)
                .then(|| result_variable.as_ref().map(Arc::clone))
                .flatten();
            context.append_frame(Arc::new(HandlerCallFrame {
                handler,
                result: assigns,
                context_variable: Arc::clone(&context_variable),
            }));
        }

        if let Some(result) = &result_variable {
            context.set_result_variable(Arc::clone(result));
        }
        Ok(result_variable)
    }
}

/// One awaited handler call.
struct HandlerCallFrame {
    handler: OperationHandler,
    result: Option<Arc<Variable>>,
    context_variable: Arc<Variable>,
}

impl Frame for HandlerCallFrame {
    fn description(&self) -> String {
        format!("invoke handler {}", self.handler.name())
    }

    fn is_async(&self) -> bool {
        true
    }

    fn creates(&self) -> Vec<Arc<Variable>> {
        self.result.iter().map(Arc::clone).collect()
    }

    fn find_variables(&self, _chain: &mut VariableChain) -> GenerationResult<Vec<Arc<Variable>>> {
        Ok(vec![Arc::clone(&self.context_variable)])
    }

    fn write(&self, writer: &mut SourceWriter) -> GenerationResult<()> {
        match &self.result {
            Some(result) => writer.write(&format!(
                "{} = await {}.HandleAsync(context);",
                result.name(),
                self.handler.name()
            )),
            None => writer.write(&format!(
                "await {}.HandleAsync(context);",
                self.handler.name()
            )),
        }
        Ok(())
    }

    fn invoke<'a>(
        &'a self,
        step: &'a mut StepContext<'_>,
    ) -> BoxFuture<'a, anyhow::Result<StepOutcome>> {
        Box::pin(async move {
            let value = self.handler.invoke(step.context).await?;
            if let (Some(result), Some(value)) = (&self.result, value) {
                step.locals.set_json(result.name(), value);
            }
            Ok(StepOutcome::Continue)
        })
    }
}
