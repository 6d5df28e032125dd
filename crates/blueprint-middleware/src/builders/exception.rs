//! The exception-trapping frame.
//!
//! The composer wraps every executor body in this frame: uncaught errors
//! are recorded through the error-logger service and converted to an
//! `UnhandledException` result. The frame lives in the method's catch
//! region; it never runs on the success path.

use std::sync::Arc;

use blueprint_core::{ErrorLoggerHandle, GenerationResult, OperationResult};
use blueprint_codegen::{
    BoxFuture, Frame, SourceWriter, StepContext, StepOutcome, Variable, VariableChain,
};
use serde_json::json;

/// Name of the runtime local holding the trapped error message while the
/// catch region runs.
pub const EXCEPTION_LOCAL: &str = "exception";

/// Records the trapped error and terminates with `UnhandledException`.
pub struct ExceptionHandlerFrame {
    operation: String,
    logger_variable: Arc<Variable>,
}

impl ExceptionHandlerFrame {
    /// Creates the frame; the logger variable comes from the DI strategy
    /// (a constructor field for singleton registrations, a catch-region
    /// resolution frame otherwise).
    #[must_use]
    pub fn new(operation: impl Into<String>, logger_variable: Arc<Variable>) -> Self {
        Self {
            operation: operation.into(),
            logger_variable,
        }
    }
}

impl Frame for ExceptionHandlerFrame {
    fn description(&self) -> String {
        format!("exception trap for {}", self.operation)
    }

    fn find_variables(&self, _chain: &mut VariableChain) -> GenerationResult<Vec<Arc<Variable>>> {
        Ok(vec![Arc::clone(&self.logger_variable)])
    }

    fn write(&self, writer: &mut SourceWriter) -> GenerationResult<()> {
        writer.write(&format!(
            "{}.Record(\"{}\", exception, context.RequestId);",
            self.logger_variable.name(),
            self.operation
        ));
        writer.write("return OperationResult.UnhandledException(exception);");
        Ok(())
    }

    fn invoke<'a>(
        &'a self,
        step: &'a mut StepContext<'_>,
    ) -> BoxFuture<'a, anyhow::Result<StepOutcome>> {
        Box::pin(async move {
            let message = step
                .locals
                .json(EXCEPTION_LOCAL)
                .and_then(|v| v.as_str())
                .unwrap_or("unknown error")
                .to_string();
            let metadata = json!({ "request_id": step.context.request_id().to_string() });

            match step
                .locals
                .service_as::<ErrorLoggerHandle>(self.logger_variable.name())
            {
                Some(logger) => logger.record(&self.operation, &message, metadata),
                None => tracing::error!(
                    operation = %self.operation,
                    "unhandled operation error (no error logger bound): {message}"
                ),
            }

            Ok(StepOutcome::ShortCircuit(
                OperationResult::UnhandledException { message },
            ))
        })
    }
}
