//! Validation stage.
//!
//! For every property carrying validation rules, the emitted frame loops
//! over the property's rules, invokes each one, and accumulates failures
//! into a `ValidationFailures` variable. When any failure is recorded the
//! method short-circuits with a `ValidationFailed` result, so the handler
//! never runs on an invalid payload.

use std::sync::Arc;

use blueprint_core::{
    GenerationResult, OperationDescriptor, OperationResult, PropertyDescriptor, TypeRef,
    ValidationFailures,
};
use blueprint_codegen::{
    BoxFuture, Frame, SourceWriter, StepContext, StepOutcome, Variable, VariableChain, BLOCK,
};

use crate::builder::{MiddlewareBuilder, MiddlewareBuilderContext};

/// Contributes the payload-validation frame for operations with
/// validated properties.
#[derive(Debug, Default)]
pub struct ValidationStageBuilder;

impl MiddlewareBuilder for ValidationStageBuilder {
    fn name(&self) -> &'static str {
        "validation"
    }

    fn matches(&self, descriptor: &OperationDescriptor) -> bool {
        descriptor.has_validated_properties()
    }

    fn build(
        &self,
        context: &mut MiddlewareBuilderContext<'_>,
    ) -> GenerationResult<Option<Arc<Variable>>> {
        let failures = Arc::new(Variable::named(
            TypeRef::in_namespace("Blueprint", "ValidationFailures"),
            "validationFailures",
        ));
        let properties = context
            .descriptor()
            .properties()
            .iter()
            .filter(|p| !p.validators.is_empty())
            .cloned()
            .collect();
        let frame = ValidationFrame {
            properties,
            failures: Arc::clone(&failures),
            context_variable: context.context_variable(),
        };
        context.append_frame(Arc::new(frame));
        Ok(Some(failures))
    }
}

struct ValidationFrame {
    properties: Vec<PropertyDescriptor>,
    failures: Arc<Variable>,
    context_variable: Arc<Variable>,
}

impl Frame for ValidationFrame {
    fn description(&self) -> String {
        format!("validation of {} properties", self.properties.len())
    }

    fn creates(&self) -> Vec<Arc<Variable>> {
        vec![Arc::clone(&self.failures)]
    }

    fn find_variables(&self, _chain: &mut VariableChain) -> GenerationResult<Vec<Arc<Variable>>> {
        Ok(vec![Arc::clone(&self.context_variable)])
    }

    fn write(&self, writer: &mut SourceWriter) -> GenerationResult<()> {
        let failures = self.failures.name();
        writer.write(&format!("{failures} = new ValidationFailures();"));
        for property in &self.properties {
            let rule_names = property
                .validators
                .iter()
                .map(blueprint_core::ValidationRule::source_name)
                .collect::<Vec<_>>()
                .join(", ");
            writer.write(&format!(
                "{BLOCK}foreach (var rule in OperationRules.For(\"{}\")) // {rule_names}",
                property.name
            ));
            writer.write(&format!(
                "rule.Check(context.Operation.{}, {failures});",
                property.name
            ));
            writer.finish_block();
        }
        writer.write(&format!("{BLOCK}if ({failures}.Count > 0)"));
        writer.write(&format!(
            "return OperationResult.ValidationFailed({failures});"
        ));
        writer.finish_block();
        Ok(())
    }

    fn invoke<'a>(
        &'a self,
        step: &'a mut StepContext<'_>,
    ) -> BoxFuture<'a, anyhow::Result<StepOutcome>> {
        Box::pin(async move {
            let mut failures = ValidationFailures::new();
            for property in &self.properties {
                let value = step.context.property(&property.name).cloned();
                for rule in &property.validators {
                    if let Some(message) = rule.check(value.as_ref()) {
                        failures.add(&property.name, message);
                    }
                }
            }
            step.locals
                .set_json(self.failures.name(), serde_json::to_value(&failures)?);
            if !failures.is_empty() {
                return Ok(StepOutcome::ShortCircuit(OperationResult::ValidationFailed(
                    failures,
                )));
            }
            Ok(StepOutcome::Continue)
        })
    }
}
