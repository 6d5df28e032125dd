//! Typed variables in generated methods.
//!
//! A [`Variable`] is a named, typed slot in a generated method. Every
//! variable a method uses is either a parameter of the method, an
//! injected field of the enclosing type, or the output of exactly one
//! frame placed earlier in the method; which of those it is lives in the
//! resolver's bookkeeping, not on the variable itself, so the variables
//! stay cheap shared values.
//!
//! Identity is by allocation: two `Arc<Variable>` clones are the same
//! variable, two separately-constructed variables are distinct even when
//! type and name agree.

use std::sync::Arc;

use blueprint_core::TypeRef;

/// A named, typed value available in a generated method.
#[derive(Debug, Clone)]
pub struct Variable {
    variable_type: TypeRef,
    name: String,
    dependency: Option<Arc<Variable>>,
}

impl Variable {
    /// Creates a variable named after its type.
    #[must_use]
    pub fn new(variable_type: TypeRef) -> Self {
        let name = variable_type.variable_name();
        Self {
            variable_type,
            name,
            dependency: None,
        }
    }

    /// Creates a variable with an explicit usage name.
    #[must_use]
    pub fn named(variable_type: TypeRef, name: impl Into<String>) -> Self {
        Self {
            variable_type,
            name: name.into(),
            dependency: None,
        }
    }

    /// Declares that this variable is derived from another one, which
    /// must therefore be available wherever this one is used.
    #[must_use]
    pub fn depending_on(mut self, dependency: Arc<Variable>) -> Self {
        self.dependency = Some(dependency);
        self
    }

    /// The variable's type.
    #[must_use]
    pub fn variable_type(&self) -> &TypeRef {
        &self.variable_type
    }

    /// Identifier used when the variable is referenced in source.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The variable this one is derived from, if any.
    #[must_use]
    pub fn dependency(&self) -> Option<&Arc<Variable>> {
        self.dependency.as_ref()
    }
}

/// Pointer-identity key for a shared variable.
#[must_use]
pub fn variable_key(variable: &Arc<Variable>) -> usize {
    Arc::as_ptr(variable) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_defaults_to_type_identifier() {
        let v = Variable::new(TypeRef::in_namespace("Acme.Api", "UserQuery"));
        assert_eq!(v.name(), "userQuery");
        assert_eq!(v.variable_type().simple_name(), "UserQuery");
    }

    #[test]
    fn test_named_variable() {
        let v = Variable::named(TypeRef::in_namespace("System", "Int32"), "retryCount");
        assert_eq!(v.name(), "retryCount");
    }

    #[test]
    fn test_dependency_chain() {
        let base = Arc::new(Variable::new(TypeRef::named("Context")));
        let derived = Variable::named(TypeRef::named("Identity"), "identity")
            .depending_on(Arc::clone(&base));
        assert!(derived.dependency().is_some());
    }

    #[test]
    fn test_identity_is_by_allocation() {
        let a = Arc::new(Variable::new(TypeRef::named("Thing")));
        let b = Arc::new(Variable::new(TypeRef::named("Thing")));
        assert_ne!(variable_key(&a), variable_key(&b));
        assert_eq!(variable_key(&a), variable_key(&Arc::clone(&a)));
    }
}
