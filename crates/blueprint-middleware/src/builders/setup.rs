//! Setup stage: context preamble.
//!
//! The first frames of every executor method: a trace line binding the
//! request id and operation name, so every later log correlates.

use std::sync::Arc;

use blueprint_core::GenerationResult;
use blueprint_codegen::{
    BoxFuture, Frame, SourceWriter, StepContext, StepOutcome, Variable, VariableChain,
};

use crate::builder::{MiddlewareBuilder, MiddlewareBuilderContext};

/// Contributes the context preamble frame to every operation.
#[derive(Debug, Default)]
pub struct SetupStageBuilder;

impl MiddlewareBuilder for SetupStageBuilder {
    fn name(&self) -> &'static str {
        "setup"
    }

    fn build(
        &self,
        context: &mut MiddlewareBuilderContext<'_>,
    ) -> GenerationResult<Option<Arc<Variable>>> {
        let frame = SetupFrame {
            operation: context.descriptor().name().to_string(),
            context_variable: context.context_variable(),
        };
        context.append_frame(Arc::new(frame));
        Ok(None)
    }
}

struct SetupFrame {
    operation: String,
    context_variable: Arc<Variable>,
}

impl Frame for SetupFrame {
    fn description(&self) -> String {
        format!("setup {}", self.operation)
    }

    fn find_variables(&self, _chain: &mut VariableChain) -> GenerationResult<Vec<Arc<Variable>>> {
        Ok(vec![Arc::clone(&self.context_variable)])
    }

    fn write(&self, writer: &mut SourceWriter) -> GenerationResult<()> {
        writer.write(&format!(
            "Logger.Debug(\"executing operation {}\", context.RequestId);",
            self.operation
        ));
        Ok(())
    }

    fn invoke<'a>(
        &'a self,
        step: &'a mut StepContext<'_>,
    ) -> BoxFuture<'a, anyhow::Result<StepOutcome>> {
        Box::pin(async move {
            tracing::debug!(
                operation = %self.operation,
                request_id = %step.context.request_id(),
                "executing operation"
            );
            Ok(StepOutcome::Continue)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blueprint_core::api_operation_context_type;

    #[test]
    fn test_setup_frame_reads_only_the_context() {
        let frame = SetupFrame {
            operation: "getUser".into(),
            context_variable: Arc::new(Variable::named(api_operation_context_type(), "context")),
        };
        let mut chain = VariableChain::new("getUser", vec![]);
        let reads = frame.find_variables(&mut chain).expect("finds");
        assert_eq!(reads.len(), 1);
        assert_eq!(reads[0].variable_type(), &api_operation_context_type());
    }

    #[test]
    fn test_setup_frame_emission() {
        let frame = SetupFrame {
            operation: "getUser".into(),
            context_variable: Arc::new(Variable::named(api_operation_context_type(), "context")),
        };
        let mut writer = SourceWriter::new();
        frame.write(&mut writer).expect("writes");
        assert!(writer.code().contains("executing operation getUser"));
        assert!(writer.code().contains("context.RequestId"));
    }
}
