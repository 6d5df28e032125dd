//! The one-shot generation driver.
//!
//! [`PipelineGenerator`] walks a fixed state machine:
//!
//! ```text
//! Unbuilt → Composing → Resolving → Emitting → Compiled | Failed
//! ```
//!
//! - **Composing**: every catalog operation is run through the
//!   middleware pipeline composer, which also places its frames.
//! - **Resolving**: every constructor-injected singleton is resolved
//!   once against the service registry, so binding failures surface at
//!   startup rather than on the first dispatch.
//! - **Emitting**: source files are emitted and handed to the compiler;
//!   descriptors are bound to compiled types by `(namespace, typeName)`.
//!
//! Transitions are one-shot. `Failed` stores the first error and returns
//! it for every subsequent call; generation-time failures are never
//! swallowed.

use std::sync::Arc;

use blueprint_core::{
    register_default_error_logger, BlueprintConfig, GenerationError, GenerationResult,
    OperationDescriptor, ServiceRegistry, ServiceResolver,
};
use blueprint_codegen::GeneratedType;
use blueprint_middleware::{InstanceFrameProvider, PipelineComposer};
use tracing::{debug, info};

use crate::assembly::{ExecutorBinding, GeneratedAssembly};
use crate::compiler::{CompilationUnit, Compiler};
use crate::emitter::AssemblyEmitter;

/// Phase of the generation state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorState {
    /// Nothing has run yet.
    Unbuilt,
    /// Pipelines are being composed and placed.
    Composing,
    /// Singleton fields are being bound.
    Resolving,
    /// Source is being emitted and compiled.
    Emitting,
    /// Generation finished; the assembly answers dispatch.
    Compiled,
    /// Generation failed; the first error is stored.
    Failed,
}

impl GeneratorState {
    /// State name for diagnostics.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Unbuilt => "unbuilt",
            Self::Composing => "composing",
            Self::Resolving => "resolving",
            Self::Emitting => "emitting",
            Self::Compiled => "compiled",
            Self::Failed => "failed",
        }
    }
}

/// Drives catalog → composer → emitter → compiler → bound assembly.
pub struct PipelineGenerator {
    config: BlueprintConfig,
    catalog: Vec<Arc<OperationDescriptor>>,
    composer: PipelineComposer,
    services: Arc<ServiceRegistry>,
    compiler: Arc<dyn Compiler>,
    state: GeneratorState,
    failure: Option<GenerationError>,
}

impl PipelineGenerator {
    /// Creates a generator. The default tracing-backed error logger is
    /// registered unless the host provided its own.
    #[must_use]
    pub fn new(
        config: BlueprintConfig,
        composer: PipelineComposer,
        mut services: ServiceRegistry,
        compiler: Arc<dyn Compiler>,
    ) -> Self {
        register_default_error_logger(&mut services);
        Self {
            config,
            catalog: Vec::new(),
            composer,
            services: Arc::new(services),
            compiler,
            state: GeneratorState::Unbuilt,
            failure: None,
        }
    }

    /// Adds an operation to the catalog.
    pub fn register_operation(&mut self, descriptor: OperationDescriptor) {
        self.catalog.push(Arc::new(descriptor));
    }

    /// The shared service registry, for the dispatch side.
    #[must_use]
    pub fn services(&self) -> Arc<ServiceRegistry> {
        Arc::clone(&self.services)
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> GeneratorState {
        self.state
    }

    /// Runs the whole generation.
    ///
    /// # Errors
    ///
    /// Every generation-time failure from §Failure semantics: invalid
    /// configuration, unresolved services, missing handlers or return
    /// values, duplicate constructor arguments, frame cycles, and
    /// compiler rejections (with the full generated source attached).
    /// After a failure, every further call returns the stored error.
    pub fn generate(&mut self) -> GenerationResult<Arc<GeneratedAssembly>> {
        match self.state {
            GeneratorState::Unbuilt => {}
            GeneratorState::Failed => {
                return Err(self
                    .failure
                    .clone()
                    .expect("failed state always stores its error"));
            }
            other => {
                return Err(GenerationError::InvalidState {
                    state: other.name().to_string(),
                    action: "generate again".to_string(),
                });
            }
        }

        if let Err(err) = self.config.validate() {
            return self.fail(err);
        }

        self.state = GeneratorState::Composing;
        let provider = Arc::new(InstanceFrameProvider::new(
            Arc::clone(&self.services) as Arc<dyn ServiceResolver>
        ));
        let namespace = format!("{}.Generated", self.config.app_name);
        let mut types: Vec<Arc<GeneratedType>> = Vec::with_capacity(self.catalog.len());
        for descriptor in &self.catalog {
            debug!(operation = descriptor.name(), "composing pipeline");
            match self.composer.compose(descriptor, &provider, &namespace) {
                Ok(generated) => types.push(Arc::new(generated)),
                Err(err) => return self.fail(err),
            }
        }

        self.state = GeneratorState::Resolving;
        for generated in &types {
            for field in generated.fields() {
                if self.services.get_singleton(field.service_type()).is_err() {
                    return self.fail(GenerationError::UnresolvedService {
                        service_type: field.service_type().fully_qualified(),
                        operation: generated.operation().to_string(),
                    });
                }
            }
        }

        self.state = GeneratorState::Emitting;
        let mut emitter = AssemblyEmitter::new();
        for generated in &types {
            for namespace in generated.required_namespaces() {
                if let Some(root) = namespace.split('.').next() {
                    emitter.add_reference(root);
                }
            }
            emitter.add_type(Arc::clone(generated));
        }
        let sources = match emitter.emit() {
            Ok(sources) => sources,
            Err(err) => return self.fail(err),
        };

        let unit = CompilationUnit {
            assembly_name: self.config.assembly_name.clone(),
            optimization: self.config.optimization,
            sources: sources.clone(),
            references: emitter.references(),
        };
        let handle = match self.compiler.compile(&unit) {
            Ok(handle) => handle,
            Err(diagnostics) => {
                let source = sources
                    .iter()
                    .map(|f| f.content.as_str())
                    .collect::<Vec<_>>()
                    .join("\n");
                return self.fail(GenerationError::Compilation {
                    diagnostics,
                    source_code: source,
                });
            }
        };

        let mut bindings = Vec::with_capacity(types.len());
        for (descriptor, generated) in self.catalog.iter().zip(types.iter()) {
            if handle.find(generated.namespace(), generated.name()).is_none() {
                return self.fail(GenerationError::Compilation {
                    diagnostics: vec![blueprint_core::Diagnostic::bare(format!(
                        "compiled assembly is missing type {}.{}",
                        generated.namespace(),
                        generated.name()
                    ))],
                    source_code: String::new(),
                });
            }
            let path = AssemblyEmitter::path_for(generated.namespace(), generated.name());
            let source = sources
                .iter()
                .find(|f| f.path == path)
                .cloned()
                .expect("every bound type was emitted");
            bindings.push(ExecutorBinding {
                descriptor: Arc::clone(descriptor),
                generated: Arc::clone(generated),
                source,
            });
        }

        self.state = GeneratorState::Compiled;
        info!(
            assembly = %self.config.assembly_name,
            operations = bindings.len(),
            "pipeline generation complete"
        );
        Ok(Arc::new(GeneratedAssembly::new(
            self.config.clone(),
            handle,
            sources,
            bindings,
        )))
    }

    fn fail(&mut self, error: GenerationError) -> GenerationResult<Arc<GeneratedAssembly>> {
        tracing::error!(%error, "pipeline generation failed");
        self.state = GeneratorState::Failed;
        self.failure = Some(error.clone());
        Err(error)
    }
}

impl std::fmt::Debug for PipelineGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineGenerator")
            .field("state", &self.state)
            .field("operations", &self.catalog.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::InMemoryCompiler;
    use blueprint_middleware::{HandlerRegistry, OperationHandler};
    use blueprint_core::TypeRef;
    use serde_json::json;

    fn empty_operation() -> TypeRef {
        TypeRef::in_namespace("Acme.Api", "EmptyOperation")
    }

    fn generator(assembly_name: &str) -> PipelineGenerator {
        let config = BlueprintConfig::builder("AcmeApi")
            .assembly_name(assembly_name)
            .build()
            .expect("valid config");

        let mut handlers = HandlerRegistry::new();
        handlers.register(
            OperationHandler::new("EmptyOperationHandler", empty_operation(), |_ctx| {
                Box::pin(async { Ok(Some(json!(12345))) })
            })
            .returning(),
        );

        let mut generator = PipelineGenerator::new(
            config,
            PipelineComposer::with_defaults(Arc::new(handlers)),
            ServiceRegistry::new(),
            Arc::new(InMemoryCompiler::new()),
        );
        generator
            .register_operation(OperationDescriptor::builder("emptyOperation", empty_operation()).build());
        generator
    }

    #[test]
    fn test_generation_reaches_compiled() {
        let mut generator = generator("AcmeApi.G1");
        assert_eq!(generator.state(), GeneratorState::Unbuilt);

        let assembly = generator.generate().expect("generates");
        assert_eq!(generator.state(), GeneratorState::Compiled);
        assert_eq!(assembly.name(), "AcmeApi.G1");
        assert_eq!(assembly.bindings().len(), 1);
        assert!(assembly.source().contains("EmptyOperationExecutor"));
        assert!(assembly.source_for(&empty_operation()).is_some());
    }

    #[test]
    fn test_source_is_deterministic_across_runs() {
        let a = generator("AcmeApi.G2").generate().expect("generates");
        let b = generator("AcmeApi.G3").generate().expect("generates");
        assert_eq!(a.source(), b.source());
    }

    #[test]
    fn test_generation_is_single_shot() {
        let mut generator = generator("AcmeApi.G4");
        generator.generate().expect("generates");
        let err = generator.generate().expect_err("one-shot");
        assert!(matches!(err, GenerationError::InvalidState { .. }));
    }

    #[test]
    fn test_failed_state_replays_first_error() {
        let config = BlueprintConfig::builder("AcmeApi")
            .assembly_name("AcmeApi.G5")
            .build()
            .expect("valid config");
        let mut generator = PipelineGenerator::new(
            config,
            PipelineComposer::with_defaults(Arc::new(HandlerRegistry::new())),
            ServiceRegistry::new(),
            Arc::new(InMemoryCompiler::new()),
        );
        generator.register_operation(
            OperationDescriptor::builder("emptyOperation", empty_operation()).build(),
        );

        let first = generator.generate().expect_err("no handler");
        assert_eq!(generator.state(), GeneratorState::Failed);
        let replay = generator.generate().expect_err("still failed");
        assert_eq!(first.to_string(), replay.to_string());
    }
}
