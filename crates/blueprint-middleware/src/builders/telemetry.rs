//! Post-execute stage: result telemetry.
//!
//! Observes the result variable read-only on the success path. Error
//! handling is a separate enclosing frame; post-execute frames never see
//! exceptions.

use std::sync::Arc;

use blueprint_core::GenerationResult;
use blueprint_codegen::{
    BoxFuture, Frame, SourceWriter, StepContext, StepOutcome, Variable, VariableChain,
};

use crate::builder::{MiddlewareBuilder, MiddlewareBuilderContext};

/// Emits a completion log observing the operation result.
#[derive(Debug, Default)]
pub struct PostExecuteTelemetryBuilder;

impl MiddlewareBuilder for PostExecuteTelemetryBuilder {
    fn name(&self) -> &'static str {
        "post_execute_telemetry"
    }

    fn build(
        &self,
        context: &mut MiddlewareBuilderContext<'_>,
    ) -> GenerationResult<Option<Arc<Variable>>> {
        let frame = TelemetryFrame {
            operation: context.descriptor().name().to_string(),
            result: context.result_variable().map(Arc::clone),
        };
        context.append_frame(Arc::new(frame));
        Ok(None)
    }
}

struct TelemetryFrame {
    operation: String,
    result: Option<Arc<Variable>>,
}

impl Frame for TelemetryFrame {
    fn description(&self) -> String {
        format!("telemetry for {}", self.operation)
    }

    fn find_variables(&self, _chain: &mut VariableChain) -> GenerationResult<Vec<Arc<Variable>>> {
        Ok(self.result.iter().map(Arc::clone).collect())
    }

    fn write(&self, writer: &mut SourceWriter) -> GenerationResult<()> {
        match &self.result {
            Some(result) => writer.write(&format!(
                "Logger.Information(\"operation {} completed\", {});",
                self.operation,
                result.name()
            )),
            None => writer.write(&format!(
                "Logger.Information(\"operation {} completed\");",
                self.operation
            )),
        }
        Ok(())
    }

    fn invoke<'a>(
        &'a self,
        step: &'a mut StepContext<'_>,
    ) -> BoxFuture<'a, anyhow::Result<StepOutcome>> {
        Box::pin(async move {
            let produced = self
                .result
                .as_ref()
                .is_some_and(|r| step.locals.contains(r.name()));
            tracing::info!(
                operation = %self.operation,
                produced_result = produced,
                "operation completed"
            );
            Ok(StepOutcome::Continue)
        })
    }
}
