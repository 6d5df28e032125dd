//! Executor registry and dispatch.
//!
//! Maps operation payload types to their sealed executors. For
//! polymorphic operations the lookup prefers the exact payload type and
//! then walks the declared base chain, closest base first, so dispatch
//! always lands on the most specific executor available.
//!
//! Every dispatch opens a fresh service scope, threads the cancellation
//! token through the context, and disposes the scope on all exit paths
//! (success, failure, cancellation).

use std::collections::HashMap;
use std::sync::Arc;

use blueprint_core::{
    ApiOperationContext, GenerationResult, OperationResult, ServiceRegistry, TypeRef,
};
use blueprint_compile::GeneratedAssembly;
use indexmap::IndexMap;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::executor::CompiledExecutor;

/// A runtime operation instance to dispatch.
#[derive(Debug, Clone)]
pub struct OperationInstance {
    /// Concrete payload type of the instance.
    pub type_ref: TypeRef,
    /// The payload.
    pub payload: Value,
}

impl OperationInstance {
    /// Creates an instance.
    #[must_use]
    pub fn new(type_ref: TypeRef, payload: Value) -> Self {
        Self { type_ref, payload }
    }
}

/// Read-only mapping from payload types to sealed executors.
pub struct ExecutorRegistry {
    executors: IndexMap<String, Arc<CompiledExecutor>>,
    bases: HashMap<String, Vec<TypeRef>>,
    services: Arc<ServiceRegistry>,
    assembly: Arc<GeneratedAssembly>,
    rethrow_unhandled: bool,
}

impl ExecutorRegistry {
    /// Seals every binding of a generated assembly into the registry.
    ///
    /// # Errors
    ///
    /// Propagates singleton binding failures from sealing.
    pub fn from_assembly(
        assembly: Arc<GeneratedAssembly>,
        services: Arc<ServiceRegistry>,
    ) -> GenerationResult<Self> {
        let mut executors: IndexMap<String, Arc<CompiledExecutor>> = IndexMap::new();
        let mut bases = HashMap::new();
        for binding in assembly.bindings() {
            let executor = Arc::new(CompiledExecutor::seal(binding, &services)?);
            let key = binding.descriptor.payload_type().fully_qualified();
            bases.insert(key.clone(), binding.descriptor.base_types().to_vec());
            if executors.contains_key(&key) {
                warn!(payload_type = %key, "duplicate executor registration ignored");
                continue;
            }
            executors.insert(key, executor);
        }
        let rethrow_unhandled = assembly.config().rethrow_unhandled;
        Ok(Self {
            executors,
            bases,
            services,
            assembly,
            rethrow_unhandled,
        })
    }

    /// Number of registered executors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.executors.len()
    }

    /// Returns `true` when no executor is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.executors.is_empty()
    }

    /// The shared service registry.
    #[must_use]
    pub fn services(&self) -> &Arc<ServiceRegistry> {
        &self.services
    }

    /// Finds the most specific executor for a payload type: the exact
    /// type first, then the declared base chain, closest base first.
    #[must_use]
    pub fn executor_for(&self, payload_type: &TypeRef) -> Option<&Arc<CompiledExecutor>> {
        let key = payload_type.fully_qualified();
        if let Some(executor) = self.executors.get(&key) {
            return Some(executor);
        }
        self.bases.get(&key).and_then(|bases| {
            bases
                .iter()
                .find_map(|base| self.executors.get(&base.fully_qualified()))
        })
    }

    /// Dispatches an operation on an already-built context.
    ///
    /// # Errors
    ///
    /// Fails when no executor matches, or with the raw frame error when
    /// the host opted into rethrow (test mode).
    pub async fn execute(
        &self,
        context: &mut ApiOperationContext,
    ) -> anyhow::Result<OperationResult> {
        let payload_type = context.descriptor().payload_type().clone();
        let executor = self
            .executor_for(&payload_type)
            .map(Arc::clone)
            .ok_or_else(|| anyhow::anyhow!("no executor registered for {payload_type}"))?;
        executor.execute(context, self.rethrow_unhandled).await
    }

    /// Dispatches an operation instance in a fresh scope.
    ///
    /// The scope lives exactly as long as the dispatch and is disposed
    /// on success, failure, and cancellation alike.
    ///
    /// # Errors
    ///
    /// Fails when no executor matches, or with the raw frame error when
    /// the host opted into rethrow (test mode).
    pub async fn execute_with_new_scope(
        &self,
        operation: OperationInstance,
        cancellation: CancellationToken,
    ) -> anyhow::Result<OperationResult> {
        self.dispatch(operation, cancellation, self.rethrow_unhandled)
            .await
    }

    /// Like [`execute_with_new_scope`](Self::execute_with_new_scope) but
    /// always rethrows trapped errors; used by retrying task
    /// infrastructure that must observe the raw failure.
    ///
    /// # Errors
    ///
    /// The raw frame error of a failed dispatch.
    pub async fn execute_rethrowing(
        &self,
        operation: OperationInstance,
        cancellation: CancellationToken,
    ) -> anyhow::Result<OperationResult> {
        self.dispatch(operation, cancellation, true).await
    }

    async fn dispatch(
        &self,
        operation: OperationInstance,
        cancellation: CancellationToken,
        rethrow: bool,
    ) -> anyhow::Result<OperationResult> {
        let executor = self
            .executor_for(&operation.type_ref)
            .map(Arc::clone)
            .ok_or_else(|| {
                anyhow::anyhow!("no executor registered for {}", operation.type_ref)
            })?;

        let scope = self.services.create_scope();
        let mut context = ApiOperationContext::new(
            Arc::clone(executor.descriptor()),
            operation.payload,
            scope,
        )
        .with_cancellation(cancellation);

        executor.execute(&mut context, rethrow).await
        // `context` drops here on every path, disposing the scope.
    }

    /// The concatenated source of every generated type.
    #[must_use]
    pub fn what_code_did_i_generate(&self) -> String {
        self.assembly.source()
    }

    /// The generated source of one operation's executor, resolved with
    /// the same most-specific-match rule as dispatch.
    #[must_use]
    pub fn what_code_did_i_generate_for(&self, payload_type: &TypeRef) -> Option<String> {
        self.executor_for(payload_type)
            .map(|executor| executor.source().to_string())
    }
}

impl std::fmt::Debug for ExecutorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorRegistry")
            .field("executor_count", &self.executors.len())
            .field("assembly", &self.assembly.name())
            .finish()
    }
}
