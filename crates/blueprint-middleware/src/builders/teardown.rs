//! Teardown stage: scope completion.

use std::sync::Arc;

use blueprint_core::GenerationResult;
use blueprint_codegen::{
    BoxFuture, Frame, SourceWriter, StepContext, StepOutcome, Variable,
};

use crate::builder::{MiddlewareBuilder, MiddlewareBuilderContext};

/// Emits the scope-completion trace at the end of the pipeline.
#[derive(Debug, Default)]
pub struct TeardownStageBuilder;

impl MiddlewareBuilder for TeardownStageBuilder {
    fn name(&self) -> &'static str {
        "teardown"
    }

    fn build(
        &self,
        context: &mut MiddlewareBuilderContext<'_>,
    ) -> GenerationResult<Option<Arc<Variable>>> {
        context.append_frame(Arc::new(TeardownFrame {
            operation: context.descriptor().name().to_string(),
        }));
        Ok(None)
    }
}

struct TeardownFrame {
    operation: String,
}

impl Frame for TeardownFrame {
    fn description(&self) -> String {
        format!("teardown for {}", self.operation)
    }

    fn write(&self, writer: &mut SourceWriter) -> GenerationResult<()> {
        writer.write("Logger.Debug(\"request scope completing\");");
        Ok(())
    }

    fn invoke<'a>(
        &'a self,
        _step: &'a mut StepContext<'_>,
    ) -> BoxFuture<'a, anyhow::Result<StepOutcome>> {
        Box::pin(async move {
            tracing::debug!(operation = %self.operation, "request scope completing");
            Ok(StepOutcome::Continue)
        })
    }
}
