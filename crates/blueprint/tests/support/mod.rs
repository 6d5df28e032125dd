#![allow(dead_code)]

//! Shared fixtures for the end-to-end tests.

use std::sync::{Arc, Mutex};

use blueprint::codegen::{
    BoxFuture, Frame, SourceWriter, StepContext, StepOutcome, Variable, VariableChain,
};
use blueprint::core::{error_logger_type, ErrorLogger, ErrorLoggerHandle, ServiceInstance};
use blueprint::prelude::*;
use serde_json::{json, Value};

/// A service the DI scenarios inject into operations.
#[derive(Debug)]
pub struct Injectable {
    pub tag: String,
}

pub fn iinjectable_type() -> TypeRef {
    TypeRef::in_namespace("Acme.Services", "IInjectable")
}

pub fn injectable_type() -> TypeRef {
    TypeRef::in_namespace("Acme.Services", "Injectable")
}

/// Middleware that resolves services and copies the first one's tag into
/// the operation payload.
pub struct CopyInjectableBuilder {
    pub services: Vec<TypeRef>,
}

impl MiddlewareBuilder for CopyInjectableBuilder {
    fn name(&self) -> &'static str {
        "copy_injectable"
    }

    fn build(
        &self,
        context: &mut MiddlewareBuilderContext<'_>,
    ) -> GenerationResult<Option<Arc<Variable>>> {
        let mut first = None;
        for service in &self.services {
            let variable = context.variable_from_service(service)?;
            first.get_or_insert(variable);
        }
        if let Some(variable) = first {
            let frame = CopyFrame {
                variable,
                context_variable: context.context_variable(),
            };
            context.append_frame(Arc::new(frame));
        }
        Ok(None)
    }
}

struct CopyFrame {
    variable: Arc<Variable>,
    context_variable: Arc<Variable>,
}

impl Frame for CopyFrame {
    fn description(&self) -> String {
        "copy injected service into operation".into()
    }

    fn find_variables(
        &self,
        _chain: &mut VariableChain,
    ) -> GenerationResult<Vec<Arc<Variable>>> {
        Ok(vec![
            Arc::clone(&self.variable),
            Arc::clone(&self.context_variable),
        ])
    }

    fn write(&self, writer: &mut SourceWriter) -> GenerationResult<()> {
        writer.write(&format!(
            "context.Operation.Injected = {};",
            self.variable.name()
        ));
        Ok(())
    }

    fn invoke<'a>(
        &'a self,
        step: &'a mut StepContext<'_>,
    ) -> BoxFuture<'a, anyhow::Result<StepOutcome>> {
        Box::pin(async move {
            if let Some(service) = step.locals.service_as::<Injectable>(self.variable.name()) {
                step.context.set_property("Injected", json!(service.tag));
            }
            Ok(StepOutcome::Continue)
        })
    }
}

/// Error logger that captures its records for assertions.
#[derive(Debug, Default)]
pub struct CapturingLogger {
    pub records: Mutex<Vec<(String, String, Value)>>,
}

impl ErrorLogger for CapturingLogger {
    fn record(&self, operation: &str, message: &str, metadata: Value) {
        self.records
            .lock()
            .expect("logger mutex")
            .push((operation.to_string(), message.to_string(), metadata));
    }
}

/// Registers a capturing logger as the error-logger service and returns
/// the capture handle.
pub fn install_capturing_logger(services: &mut ServiceRegistry) -> Arc<CapturingLogger> {
    let logger = Arc::new(CapturingLogger::default());
    let handle = ErrorLoggerHandle::new(Arc::clone(&logger) as Arc<dyn ErrorLogger>);
    services.singleton(
        error_logger_type(),
        TypeRef::in_namespace("Acme.Services", "CapturingLogger"),
        Arc::new(handle) as ServiceInstance,
    );
    logger
}

/// Everything needed to stand up one generated stack.
pub struct StackBuilder {
    pub assembly_name: String,
    pub services: ServiceRegistry,
    pub handlers: HandlerRegistry,
    pub operations: Vec<OperationDescriptor>,
    pub extra_builders: Vec<(MiddlewareStage, Arc<dyn MiddlewareBuilder>)>,
    pub rethrow_unhandled: bool,
}

impl StackBuilder {
    pub fn new(assembly_name: &str) -> Self {
        Self {
            assembly_name: assembly_name.to_string(),
            services: ServiceRegistry::new(),
            handlers: HandlerRegistry::new(),
            operations: Vec::new(),
            extra_builders: Vec::new(),
            rethrow_unhandled: false,
        }
    }

    pub fn build(self) -> GenerationResult<ExecutorRegistry> {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let mut config = BlueprintConfig::builder("Acme").assembly_name(&self.assembly_name);
        if self.rethrow_unhandled {
            config = config.rethrow_unhandled();
        }
        let config = config.build()?;

        let mut composer = PipelineComposer::with_defaults(Arc::new(self.handlers));
        for (stage, builder) in self.extra_builders {
            composer.register(stage, builder);
        }

        let mut generator = PipelineGenerator::new(
            config,
            composer,
            self.services,
            Arc::new(InMemoryCompiler::new()),
        );
        for operation in self.operations {
            generator.register_operation(operation);
        }

        let services = generator.services();
        let assembly = generator.generate()?;
        ExecutorRegistry::from_assembly(assembly, services)
    }
}
