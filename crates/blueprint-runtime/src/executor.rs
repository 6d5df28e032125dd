//! Sealed executors.
//!
//! A [`CompiledExecutor`] is the runtime face of one generated type: the
//! resolved frame plan in placement order, the constructor-bound
//! singleton services, and the emitted source for introspection. Sealing
//! happens once, right after compilation; from then on the executor is
//! immutable and every dispatch walks the same pre-resolved steps, with
//! no per-request reflection, dependency lookup, or pipeline traversal.

use std::sync::Arc;

use blueprint_core::{
    ApiOperationContext, GenerationError, GenerationResult, OperationDescriptor, OperationResult,
    ServiceInstance, ServiceRegistry,
};
use blueprint_codegen::{GeneratedMethod, GeneratedType, Locals, StepContext, StepOutcome};
use blueprint_compile::ExecutorBinding;
use blueprint_middleware::EXCEPTION_LOCAL;
use serde_json::json;

/// One operation's sealed executor.
pub struct CompiledExecutor {
    descriptor: Arc<OperationDescriptor>,
    generated: Arc<GeneratedType>,
    singletons: Vec<(String, ServiceInstance)>,
    source: String,
}

impl CompiledExecutor {
    /// Seals a compiled binding: resolves every constructor-injected
    /// singleton once and freezes the step plan.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::UnresolvedService`] when a singleton
    /// field cannot be bound.
    pub fn seal(
        binding: &ExecutorBinding,
        services: &Arc<ServiceRegistry>,
    ) -> GenerationResult<Self> {
        let mut singletons = Vec::with_capacity(binding.generated.fields().len());
        for field in binding.generated.fields() {
            let instance = services.get_singleton(field.service_type()).map_err(|_| {
                GenerationError::UnresolvedService {
                    service_type: field.service_type().fully_qualified(),
                    operation: binding.generated.operation().to_string(),
                }
            })?;
            singletons.push((field.field_name().to_string(), instance));
        }
        Ok(Self {
            descriptor: Arc::clone(&binding.descriptor),
            generated: Arc::clone(&binding.generated),
            singletons,
            source: binding.source.content.clone(),
        })
    }

    /// The operation this executor runs.
    #[must_use]
    pub fn descriptor(&self) -> &Arc<OperationDescriptor> {
        &self.descriptor
    }

    /// The generated source of this executor's type.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    fn method(&self) -> &GeneratedMethod {
        self.generated
            .methods()
            .first()
            .expect("a sealed executor always carries its execute method")
    }

    /// Runs one dispatch through the sealed step plan.
    ///
    /// Uncaught frame errors run the exception-handling region and come
    /// back as an `UnhandledException` result, unless `rethrow_unhandled`
    /// asks for the raw error (test mode). Cancellation observed at a
    /// suspension point runs the exception region and yields `Cancelled`.
    ///
    /// # Errors
    ///
    /// Only with `rethrow_unhandled`: the original frame error.
    pub async fn execute(
        &self,
        context: &mut ApiOperationContext,
        rethrow_unhandled: bool,
    ) -> anyhow::Result<OperationResult> {
        let method = self.method();
        let mut locals = Locals::new();
        for (name, instance) in &self.singletons {
            locals.set_service(name, Arc::clone(instance));
        }
        let mut step = StepContext {
            context,
            locals: &mut locals,
        };

        for frame in method.placed_frames() {
            if frame.is_async() && step.context.is_cancelled() {
                let _ = Self::run_catch(method, &mut step, "operation cancelled").await;
                return Ok(OperationResult::Cancelled);
            }
            match frame.invoke(&mut step).await {
                Ok(StepOutcome::Continue) => {}
                Ok(StepOutcome::ShortCircuit(result)) => return Ok(result),
                Err(error) => {
                    if rethrow_unhandled {
                        return Err(error);
                    }
                    let result = Self::run_catch(method, &mut step, &error.to_string()).await;
                    return Ok(result);
                }
            }
        }

        if let Some(result) = method.result_variable() {
            if let Some(value) = step.locals.json(result.name()) {
                return Ok(OperationResult::Ok(value.clone()));
            }
        }
        Ok(OperationResult::NoResult)
    }

    /// Runs the exception-handling region with the trapped message bound.
    async fn run_catch(
        method: &GeneratedMethod,
        step: &mut StepContext<'_>,
        message: &str,
    ) -> OperationResult {
        step.locals.set_json(EXCEPTION_LOCAL, json!(message));
        for frame in method.placed_catch_frames() {
            match frame.invoke(step).await {
                Ok(StepOutcome::ShortCircuit(result)) => return result,
                Ok(StepOutcome::Continue) => {}
                Err(error) => {
                    tracing::error!(%error, "error while handling a trapped error");
                    break;
                }
            }
        }
        OperationResult::UnhandledException {
            message: message.to_string(),
        }
    }
}

impl std::fmt::Debug for CompiledExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledExecutor")
            .field("operation", &self.descriptor.name())
            .field("type", &self.generated.name())
            .field("singleton_count", &self.singletons.len())
            .finish()
    }
}
