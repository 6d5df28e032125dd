//! Generated types and injected fields.
//!
//! A [`GeneratedType`] owns the methods and constructor-injected fields
//! of one executor class. Injected fields are deduplicated by service
//! type; two fields that resolve to the same concrete implementation
//! under different service types are a constructor-ambiguity defect and
//! fail generation.

use std::collections::BTreeSet;
use std::sync::Arc;

use blueprint_core::{GenerationError, GenerationResult, TypeRef};

use crate::method::GeneratedMethod;
use crate::variable::Variable;
use crate::writer::{SourceWriter, BLOCK};

/// A service hoisted to a constructor-injected field.
#[derive(Debug, Clone)]
pub struct InjectedField {
    variable: Arc<Variable>,
    concrete_type: TypeRef,
}

impl InjectedField {
    /// Creates a field for a service type backed by the given concrete
    /// implementation. The field name is the service identifier with a
    /// leading underscore.
    #[must_use]
    pub fn new(service_type: TypeRef, concrete_type: TypeRef) -> Self {
        let name = format!("_{}", service_type.variable_name());
        Self {
            variable: Arc::new(Variable::named(service_type, name)),
            concrete_type,
        }
    }

    /// The variable generated code uses to reference the field.
    #[must_use]
    pub fn variable(&self) -> &Arc<Variable> {
        &self.variable
    }

    /// The service type of the field.
    #[must_use]
    pub fn service_type(&self) -> &TypeRef {
        self.variable.variable_type()
    }

    /// The concrete implementation behind the service type.
    #[must_use]
    pub fn concrete_type(&self) -> &TypeRef {
        &self.concrete_type
    }

    /// Field identifier, underscore-prefixed.
    #[must_use]
    pub fn field_name(&self) -> &str {
        self.variable.name()
    }

    /// Constructor parameter identifier for this field.
    #[must_use]
    pub fn parameter_name(&self) -> String {
        self.variable.name().trim_start_matches('_').to_string()
    }
}

/// One generated executor class.
#[derive(Debug)]
pub struct GeneratedType {
    namespace: String,
    name: String,
    operation: String,
    implements: Vec<String>,
    fields: Vec<InjectedField>,
    methods: Vec<GeneratedMethod>,
}

impl GeneratedType {
    /// Creates an empty type for an operation's executor.
    #[must_use]
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        operation: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            operation: operation.into(),
            implements: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Adds a base type or interface to the declaration.
    #[must_use]
    pub fn implementing(mut self, name: impl Into<String>) -> Self {
        self.implements.push(name.into());
        self
    }

    /// The namespace the type is emitted into.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The operation this type executes.
    #[must_use]
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// The injected fields accumulated so far.
    #[must_use]
    pub fn fields(&self) -> &[InjectedField] {
        &self.fields
    }

    /// The methods of the type.
    #[must_use]
    pub fn methods(&self) -> &[GeneratedMethod] {
        &self.methods
    }

    /// Adds a method.
    pub fn add_method(&mut self, method: GeneratedMethod) {
        self.methods.push(method);
    }

    /// Adds an injected field, deduplicating by service type.
    ///
    /// Requesting the same service type twice returns the existing
    /// field's variable. Two different service types backed by the same
    /// concrete implementation cannot both become constructor arguments.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::DuplicateInjectedField`] on a concrete
    /// implementation collision.
    pub fn add_injected_field(&mut self, field: InjectedField) -> GenerationResult<Arc<Variable>> {
        if let Some(existing) = self
            .fields
            .iter()
            .find(|f| f.service_type() == field.service_type())
        {
            return Ok(Arc::clone(existing.variable()));
        }
        if let Some(conflict) = self
            .fields
            .iter()
            .find(|f| f.concrete_type() == field.concrete_type())
        {
            return Err(GenerationError::DuplicateInjectedField {
                operation: self.operation.clone(),
                existing: conflict.service_type().fully_qualified(),
                requested: field.service_type().fully_qualified(),
                concrete: field.concrete_type().fully_qualified(),
            });
        }
        let variable = Arc::clone(field.variable());
        self.fields.push(field);
        Ok(variable)
    }

    /// Namespaces required to reference everything the type touches.
    #[must_use]
    pub fn required_namespaces(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        for field in &self.fields {
            out.extend(field.service_type().namespaces());
            out.extend(field.concrete_type().namespaces());
        }
        for method in &self.methods {
            out.extend(method.required_namespaces());
        }
        out
    }

    /// Writes the class declaration, fields, constructor, and methods.
    ///
    /// # Errors
    ///
    /// Propagates frame emission failures.
    pub fn write(&self, writer: &mut SourceWriter) -> GenerationResult<()> {
        let header = if self.implements.is_empty() {
            format!("{BLOCK}public class {}", self.name)
        } else {
            format!("{BLOCK}public class {} : {}", self.name, self.implements.join(", "))
        };
        writer.write(&header);

        for field in &self.fields {
            writer.write(&format!(
                "private readonly {} {};",
                field.service_type().source_name(),
                field.field_name()
            ));
        }

        if !self.fields.is_empty() {
            writer.blank_line();
            let parameters = self
                .fields
                .iter()
                .map(|f| {
                    format!(
                        "{} {}",
                        f.service_type().source_name(),
                        f.parameter_name()
                    )
                })
                .collect::<Vec<_>>()
                .join(", ");
            writer.write(&format!("{BLOCK}public {}({parameters})", self.name));
            for field in &self.fields {
                writer.write(&format!(
                    "{} = {};",
                    field.field_name(),
                    field.parameter_name()
                ));
            }
            writer.finish_block();
        }

        for method in &self.methods {
            writer.blank_line();
            method.write(writer)?;
        }

        writer.finish_block();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interface() -> TypeRef {
        TypeRef::in_namespace("Acme.Services", "IInjectable")
    }

    fn concrete() -> TypeRef {
        TypeRef::in_namespace("Acme.Services", "Injectable")
    }

    #[test]
    fn test_field_naming() {
        let field = InjectedField::new(interface(), concrete());
        assert_eq!(field.field_name(), "_iInjectable");
        assert_eq!(field.parameter_name(), "iInjectable");
        assert_eq!(field.service_type(), &interface());
    }

    #[test]
    fn test_same_service_type_is_idempotent() {
        let mut class = GeneratedType::new("Acme.Generated", "Executor", "getUser");
        let first = class
            .add_injected_field(InjectedField::new(interface(), concrete()))
            .expect("adds");
        let second = class
            .add_injected_field(InjectedField::new(interface(), concrete()))
            .expect("dedups");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(class.fields().len(), 1);
    }

    #[test]
    fn test_concrete_collision_is_duplicate_constructor_argument() {
        let mut class = GeneratedType::new("Acme.Generated", "Executor", "getUser");
        class
            .add_injected_field(InjectedField::new(interface(), concrete()))
            .expect("adds");
        let err = class
            .add_injected_field(InjectedField::new(concrete(), concrete()))
            .expect_err("collides");
        assert!(err.to_string().contains("duplicate constructor argument"));
    }

    #[test]
    fn test_class_emission_with_constructor() {
        let mut class = GeneratedType::new("Acme.Generated", "GetUserExecutor", "getUser")
            .implementing("IOperationExecutor");
        class
            .add_injected_field(InjectedField::new(interface(), concrete()))
            .expect("adds");

        let mut writer = SourceWriter::new();
        class.write(&mut writer).expect("writes");
        let code = writer.code();

        assert!(code.contains("public class GetUserExecutor : IOperationExecutor"));
        assert!(code.contains("private readonly IInjectable _iInjectable;"));
        assert!(code.contains("public GetUserExecutor(IInjectable iInjectable)"));
        assert!(code.contains("_iInjectable = iInjectable;"));
    }

    #[test]
    fn test_required_namespaces_cover_fields() {
        let mut class = GeneratedType::new("Acme.Generated", "Executor", "getUser");
        class
            .add_injected_field(InjectedField::new(interface(), concrete()))
            .expect("adds");
        assert!(class.required_namespaces().contains("Acme.Services"));
    }
}
