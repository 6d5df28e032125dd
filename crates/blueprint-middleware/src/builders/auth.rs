//! Authentication and authorisation stages.
//!
//! Both builders key off the operation's feature bag: an operation with
//! the `Authenticated` feature requires a caller identity, and may also
//! name a required role in the feature payload (`{"role": "admin"}`).
//! Operations marked `Anonymous` skip both stages regardless.
//!
//! Rejections are results, not errors: the emitted frames short-circuit
//! with `Unauthorized` or `Forbidden`.

use std::sync::Arc;

use blueprint_core::{FeatureKind, GenerationResult, OperationDescriptor, OperationResult};
use blueprint_codegen::{
    BoxFuture, Frame, SourceWriter, StepContext, StepOutcome, Variable, VariableChain, BLOCK,
};
use serde_json::Value;

use crate::builder::{MiddlewareBuilder, MiddlewareBuilderContext};

fn requires_identity(descriptor: &OperationDescriptor) -> bool {
    descriptor.has_feature(FeatureKind::Authenticated)
        && !descriptor.has_feature(FeatureKind::Anonymous)
}

/// Rejects dispatches that carry no caller identity.
#[derive(Debug, Default)]
pub struct AuthenticationBuilder;

impl MiddlewareBuilder for AuthenticationBuilder {
    fn name(&self) -> &'static str {
        "authentication"
    }

    fn matches(&self, descriptor: &OperationDescriptor) -> bool {
        requires_identity(descriptor)
    }

    fn build(
        &self,
        context: &mut MiddlewareBuilderContext<'_>,
    ) -> GenerationResult<Option<Arc<Variable>>> {
        context.append_frame(Arc::new(AuthenticationFrame {
            context_variable: context.context_variable(),
        }));
        Ok(None)
    }
}

struct AuthenticationFrame {
    context_variable: Arc<Variable>,
}

impl Frame for AuthenticationFrame {
    fn description(&self) -> String {
        "authentication".into()
    }

    fn find_variables(&self, _chain: &mut VariableChain) -> GenerationResult<Vec<Arc<Variable>>> {
        Ok(vec![Arc::clone(&self.context_variable)])
    }

    fn write(&self, writer: &mut SourceWriter) -> GenerationResult<()> {
        writer.write(&format!("{BLOCK}if (context.Identity == null)"));
        writer.write("return OperationResult.Unauthorized(\"no caller identity\");");
        writer.finish_block();
        Ok(())
    }

    fn invoke<'a>(
        &'a self,
        step: &'a mut StepContext<'_>,
    ) -> BoxFuture<'a, anyhow::Result<StepOutcome>> {
        Box::pin(async move {
            if step.context.identity().is_none() {
                return Ok(StepOutcome::ShortCircuit(OperationResult::Unauthorized {
                    reason: "no caller identity".into(),
                }));
            }
            Ok(StepOutcome::Continue)
        })
    }
}

/// Rejects identities missing the role the operation demands.
#[derive(Debug, Default)]
pub struct AuthorisationBuilder;

impl AuthorisationBuilder {
    fn required_role(descriptor: &OperationDescriptor) -> Option<String> {
        descriptor
            .feature(FeatureKind::Authenticated)
            .and_then(|payload| payload.get("role"))
            .and_then(Value::as_str)
            .map(ToString::to_string)
    }
}

impl MiddlewareBuilder for AuthorisationBuilder {
    fn name(&self) -> &'static str {
        "authorisation"
    }

    fn matches(&self, descriptor: &OperationDescriptor) -> bool {
        requires_identity(descriptor) && Self::required_role(descriptor).is_some()
    }

    fn build(
        &self,
        context: &mut MiddlewareBuilderContext<'_>,
    ) -> GenerationResult<Option<Arc<Variable>>> {
        let role = Self::required_role(context.descriptor())
            .expect("matches() guarantees a required role");
        context.append_frame(Arc::new(AuthorisationFrame {
            role,
            context_variable: context.context_variable(),
        }));
        Ok(None)
    }
}

struct AuthorisationFrame {
    role: String,
    context_variable: Arc<Variable>,
}

impl Frame for AuthorisationFrame {
    fn description(&self) -> String {
        format!("authorisation role={}", self.role)
    }

    fn find_variables(&self, _chain: &mut VariableChain) -> GenerationResult<Vec<Arc<Variable>>> {
        Ok(vec![Arc::clone(&self.context_variable)])
    }

    fn write(&self, writer: &mut SourceWriter) -> GenerationResult<()> {
        writer.write(&format!(
            "{BLOCK}if (!context.Identity.HasRole(\"{}\"))",
            self.role
        ));
        writer.write(&format!(
            "return OperationResult.Forbidden(\"missing role {}\");",
            self.role
        ));
        writer.finish_block();
        Ok(())
    }

    fn invoke<'a>(
        &'a self,
        step: &'a mut StepContext<'_>,
    ) -> BoxFuture<'a, anyhow::Result<StepOutcome>> {
        Box::pin(async move {
            let permitted = step
                .context
                .identity()
                .is_some_and(|identity| identity.has_role(&self.role));
            if !permitted {
                return Ok(StepOutcome::ShortCircuit(OperationResult::Forbidden {
                    reason: format!("missing role {}", self.role),
                }));
            }
            Ok(StepOutcome::Continue)
        })
    }
}
