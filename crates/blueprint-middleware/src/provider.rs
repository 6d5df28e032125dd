//! DI-aware instance frame provider.
//!
//! For each service a frame needs, the provider queries the host's
//! service registrations and decides how the generated executor obtains
//! the instance:
//!
//! - exactly one registration with *singleton* lifetime: the service is
//!   hoisted to a constructor-injected field, so the generated source
//!   carries no resolution call at all;
//! - exactly one registration with *scoped* or *transient* lifetime: a
//!   per-dispatch frame calls `GetRequiredService` on the scope, with the
//!   concrete type noted in a trailing comment;
//! - multiple registrations: the runtime call is emitted and the choice
//!   is the container's;
//! - zero registrations: generation fails with an unresolved-service
//!   error.

use std::collections::BTreeSet;
use std::sync::Arc;

use blueprint_core::{
    api_operation_context_type, GenerationError, GenerationResult, ServiceLifetime,
    ServiceResolver, TypeRef,
};
use blueprint_codegen::{
    BoxFuture, Frame, InjectedField, InstanceSource, ResolvedInstance, SourceWriter, StepContext,
    StepOutcome, Variable, VariableChain,
};

/// Decides singleton-hoist versus scope-resolution for service requests.
pub struct InstanceFrameProvider {
    resolver: Arc<dyn ServiceResolver>,
}

impl InstanceFrameProvider {
    /// Creates a provider over the host's registrations.
    #[must_use]
    pub fn new(resolver: Arc<dyn ServiceResolver>) -> Self {
        Self { resolver }
    }
}

impl InstanceSource for InstanceFrameProvider {
    fn resolve(
        &self,
        service_type: &TypeRef,
        operation: &str,
    ) -> GenerationResult<ResolvedInstance> {
        let Some(binding) = self.resolver.for_type(service_type) else {
            return Err(GenerationError::UnresolvedService {
                service_type: service_type.fully_qualified(),
                operation: operation.to_string(),
            });
        };

        if binding.count == 1 && binding.lifetime == ServiceLifetime::Singleton {
            return Ok(ResolvedInstance::Field(InjectedField::new(
                service_type.clone(),
                binding.implementation_type,
            )));
        }

        let frame = GetRequiredServiceFrame::new(
            service_type.clone(),
            binding.implementation_type,
            binding.count,
        );
        let variable = Arc::clone(frame.variable());
        Ok(ResolvedInstance::Frame {
            variable,
            frame: Arc::new(frame),
        })
    }
}

impl std::fmt::Debug for InstanceFrameProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceFrameProvider").finish_non_exhaustive()
    }
}

/// Frame resolving a scoped or transient service from the dispatch scope.
pub struct GetRequiredServiceFrame {
    variable: Arc<Variable>,
    service_type: TypeRef,
    concrete_type: TypeRef,
    registration_count: usize,
}

impl GetRequiredServiceFrame {
    /// Creates a resolution frame for a service type.
    #[must_use]
    pub fn new(service_type: TypeRef, concrete_type: TypeRef, registration_count: usize) -> Self {
        let variable = Arc::new(Variable::new(service_type.clone()));
        Self {
            variable,
            service_type,
            concrete_type,
            registration_count,
        }
    }

    /// The variable this frame produces.
    #[must_use]
    pub fn variable(&self) -> &Arc<Variable> {
        &self.variable
    }
}

impl Frame for GetRequiredServiceFrame {
    fn description(&self) -> String {
        format!("get-required-service {}", self.service_type.source_name())
    }

    fn creates(&self) -> Vec<Arc<Variable>> {
        vec![Arc::clone(&self.variable)]
    }

    fn find_variables(&self, chain: &mut VariableChain) -> GenerationResult<Vec<Arc<Variable>>> {
        Ok(chain
            .find(&api_operation_context_type())
            .into_iter()
            .collect())
    }

    fn required_namespaces(&self) -> BTreeSet<String> {
        self.concrete_type.namespaces()
    }

    fn write(&self, writer: &mut SourceWriter) -> GenerationResult<()> {
        let note = if self.registration_count > 1 {
            format!("{} registrations, container picks", self.registration_count)
        } else {
            format!("via {}", self.concrete_type.source_name())
        };
        writer.write(&format!(
            "{} = context.ServiceProvider.GetRequiredService<{}>(); // {note}",
            self.variable.name(),
            self.service_type.source_name(),
        ));
        Ok(())
    }

    fn invoke<'a>(
        &'a self,
        step: &'a mut StepContext<'_>,
    ) -> BoxFuture<'a, anyhow::Result<StepOutcome>> {
        Box::pin(async move {
            let instance = step.context.scope().get_required(&self.service_type)?;
            step.locals.set_service(self.variable.name(), instance);
            Ok(StepOutcome::Continue)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blueprint_core::{ServiceBinding, ServiceInstance, ServiceRegistry};

    struct FixedResolver(Option<ServiceBinding>);

    impl ServiceResolver for FixedResolver {
        fn for_type(&self, _service_type: &TypeRef) -> Option<ServiceBinding> {
            self.0.clone()
        }
    }

    fn injectable() -> TypeRef {
        TypeRef::in_namespace("Acme.Services", "IInjectable")
    }

    fn concrete() -> TypeRef {
        TypeRef::in_namespace("Acme.Services", "Injectable")
    }

    #[test]
    fn test_unique_singleton_becomes_field() {
        let provider = InstanceFrameProvider::new(Arc::new(FixedResolver(Some(ServiceBinding {
            lifetime: ServiceLifetime::Singleton,
            count: 1,
            implementation_type: concrete(),
        }))));

        let resolved = provider.resolve(&injectable(), "op").expect("resolves");
        match resolved {
            ResolvedInstance::Field(field) => {
                assert_eq!(field.service_type(), &injectable());
                assert_eq!(field.concrete_type(), &concrete());
            }
            ResolvedInstance::Frame { .. } => panic!("singleton must hoist to a field"),
        }
    }

    #[test]
    fn test_scoped_becomes_resolution_frame() {
        let provider = InstanceFrameProvider::new(Arc::new(FixedResolver(Some(ServiceBinding {
            lifetime: ServiceLifetime::Scoped,
            count: 1,
            implementation_type: concrete(),
        }))));

        let resolved = provider.resolve(&injectable(), "op").expect("resolves");
        let ResolvedInstance::Frame { frame, .. } = resolved else {
            panic!("scoped must resolve per dispatch");
        };

        let mut writer = SourceWriter::new();
        frame.write(&mut writer).expect("writes");
        let code = writer.code();
        assert!(code.contains("context.ServiceProvider.GetRequiredService<IInjectable>"));
        assert!(code.contains("// via Injectable"));
    }

    #[test]
    fn test_multiple_registrations_delegate_to_container() {
        let provider = InstanceFrameProvider::new(Arc::new(FixedResolver(Some(ServiceBinding {
            lifetime: ServiceLifetime::Singleton,
            count: 2,
            implementation_type: concrete(),
        }))));

        let resolved = provider.resolve(&injectable(), "op").expect("resolves");
        let ResolvedInstance::Frame { frame, .. } = resolved else {
            panic!("ambiguous registrations resolve at runtime");
        };

        let mut writer = SourceWriter::new();
        frame.write(&mut writer).expect("writes");
        assert!(writer.code().contains("2 registrations, container picks"));
    }

    #[test]
    fn test_unregistered_service_is_fatal() {
        let provider = InstanceFrameProvider::new(Arc::new(FixedResolver(None)));
        let err = provider
            .resolve(&injectable(), "getUser")
            .expect_err("unresolved");
        assert!(matches!(err, GenerationError::UnresolvedService { .. }));
        assert!(err.to_string().contains("getUser"));
    }

    #[test]
    fn test_provider_over_real_registry() {
        let mut registry = ServiceRegistry::new();
        registry.scoped(
            injectable(),
            concrete(),
            Arc::new(|| Arc::new(42u32) as ServiceInstance),
        );
        let provider = InstanceFrameProvider::new(Arc::new(registry));

        assert!(matches!(
            provider.resolve(&injectable(), "op").expect("resolves"),
            ResolvedInstance::Frame { .. }
        ));
    }
}
