//! The generated assembly.
//!
//! A [`GeneratedAssembly`] is the sealed output of one generation run:
//! the compiled handle, every emitted source file, and the binding of
//! each operation descriptor to its generated type. Once built it is
//! immutable; the executor registry and the introspection surface read
//! from it.

use std::sync::Arc;

use blueprint_core::{BlueprintConfig, OperationDescriptor, TypeRef};
use blueprint_codegen::GeneratedType;

use crate::compiler::AssemblyHandle;
use crate::emitter::SourceFile;

/// One descriptor bound to its compiled executor type.
#[derive(Debug, Clone)]
pub struct ExecutorBinding {
    /// The operation.
    pub descriptor: Arc<OperationDescriptor>,
    /// The generated type, with its resolved frame plan.
    pub generated: Arc<GeneratedType>,
    /// The emitted source file of the type.
    pub source: SourceFile,
}

/// Immutable output of one generation run.
#[derive(Debug)]
pub struct GeneratedAssembly {
    config: BlueprintConfig,
    handle: AssemblyHandle,
    sources: Vec<SourceFile>,
    bindings: Vec<ExecutorBinding>,
}

impl GeneratedAssembly {
    pub(crate) fn new(
        config: BlueprintConfig,
        handle: AssemblyHandle,
        sources: Vec<SourceFile>,
        bindings: Vec<ExecutorBinding>,
    ) -> Self {
        Self {
            config,
            handle,
            sources,
            bindings,
        }
    }

    /// The assembly name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.handle.name()
    }

    /// The configuration the assembly was generated under.
    #[must_use]
    pub fn config(&self) -> &BlueprintConfig {
        &self.config
    }

    /// The compiled handle.
    #[must_use]
    pub fn handle(&self) -> &AssemblyHandle {
        &self.handle
    }

    /// Every emitted source file, in emission order. With the `ToDisk`
    /// compile strategy the host persists these.
    #[must_use]
    pub fn files(&self) -> &[SourceFile] {
        &self.sources
    }

    /// Descriptor-to-type bindings, in catalog order.
    #[must_use]
    pub fn bindings(&self) -> &[ExecutorBinding] {
        &self.bindings
    }

    /// The concatenated source of every generated type.
    #[must_use]
    pub fn source(&self) -> String {
        self.sources
            .iter()
            .map(|f| f.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// The generated source for one operation payload type.
    #[must_use]
    pub fn source_for(&self, payload_type: &TypeRef) -> Option<&str> {
        self.bindings
            .iter()
            .find(|b| b.descriptor.payload_type() == payload_type)
            .map(|b| b.source.content.as_str())
    }
}
