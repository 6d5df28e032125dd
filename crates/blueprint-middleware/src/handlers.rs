//! Operation handlers.
//!
//! Handlers are the user-supplied endpoints of the pipeline. They are
//! registered against an operation payload type; the execution stage
//! emits one call per handler that matches the operation type or one of
//! its base types, most distant base first, insertion order within a
//! type.

use std::fmt;
use std::sync::Arc;

use blueprint_core::{ApiOperationContext, OperationDescriptor, TypeRef};
use blueprint_codegen::BoxFuture;
use serde_json::Value;

/// The callable part of a handler.
pub type HandlerFn = Arc<
    dyn for<'a> Fn(&'a mut ApiOperationContext) -> BoxFuture<'a, anyhow::Result<Option<Value>>>
        + Send
        + Sync,
>;

/// One registered operation handler.
#[derive(Clone)]
pub struct OperationHandler {
    name: String,
    operation_type: TypeRef,
    returns_value: bool,
    func: HandlerFn,
}

impl OperationHandler {
    /// Creates a handler keyed to an operation payload type.
    pub fn new<F>(name: impl Into<String>, operation_type: TypeRef, func: F) -> Self
    where
        F: for<'a> Fn(&'a mut ApiOperationContext) -> BoxFuture<'a, anyhow::Result<Option<Value>>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            operation_type,
            returns_value: false,
            func: Arc::new(func),
        }
    }

    /// Declares that this handler produces the operation's return value.
    #[must_use]
    pub fn returning(mut self) -> Self {
        self.returns_value = true;
        self
    }

    /// Handler name, used in generated source.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The payload type the handler is keyed to.
    #[must_use]
    pub fn operation_type(&self) -> &TypeRef {
        &self.operation_type
    }

    /// Whether the handler declares a return value.
    #[must_use]
    pub fn returns_value(&self) -> bool {
        self.returns_value
    }

    /// Invokes the handler.
    pub fn invoke<'a>(
        &'a self,
        context: &'a mut ApiOperationContext,
    ) -> BoxFuture<'a, anyhow::Result<Option<Value>>> {
        (self.func)(context)
    }
}

impl fmt::Debug for OperationHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationHandler")
            .field("name", &self.name)
            .field("operation_type", &self.operation_type.fully_qualified())
            .field("returns_value", &self.returns_value)
            .finish_non_exhaustive()
    }
}

/// All registered handlers, in registration order.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: Vec<OperationHandler>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler.
    pub fn register(&mut self, handler: OperationHandler) {
        self.handlers.push(handler);
    }

    /// All handlers in registration order.
    #[must_use]
    pub fn handlers(&self) -> &[OperationHandler] {
        &self.handlers
    }

    /// Handlers that apply to an operation, in invocation order.
    ///
    /// A handler applies when its keyed type is the operation payload
    /// type or one of the payload's declared bases. Ordering is most
    /// distant base first, then registration order within a rank, so a
    /// base handler always runs before a concrete one.
    #[must_use]
    pub fn matching(&self, descriptor: &OperationDescriptor) -> Vec<OperationHandler> {
        let mut ranked: Vec<(usize, OperationHandler)> = self
            .handlers
            .iter()
            .filter_map(|handler| {
                self.rank(descriptor, handler.operation_type())
                    .map(|rank| (rank, handler.clone()))
            })
            .collect();
        ranked.sort_by_key(|(rank, _)| *rank);
        ranked.into_iter().map(|(_, handler)| handler).collect()
    }

    /// Handlers registered to types that do not apply to the operation.
    #[must_use]
    pub fn non_matching(&self, descriptor: &OperationDescriptor) -> Vec<&OperationHandler> {
        self.handlers
            .iter()
            .filter(|handler| self.rank(descriptor, handler.operation_type()).is_none())
            .collect()
    }

    /// Invocation rank of a keyed type for an operation: lower runs
    /// earlier. Bases are declared closest-first on the descriptor, so
    /// the rank reverses that order and puts the payload type last.
    fn rank(&self, descriptor: &OperationDescriptor, keyed: &TypeRef) -> Option<usize> {
        let bases = descriptor.base_types();
        if keyed == descriptor.payload_type() {
            return Some(bases.len());
        }
        bases
            .iter()
            .position(|base| base == keyed)
            .map(|i| bases.len() - 1 - i)
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handler_count", &self.handlers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(name: &str, keyed: TypeRef) -> OperationHandler {
        OperationHandler::new(name, keyed, |_ctx| Box::pin(async { Ok(None) }))
    }

    fn base() -> TypeRef {
        TypeRef::in_namespace("Acme.Api", "OperationBase")
    }

    fn child(n: u8) -> TypeRef {
        TypeRef::in_namespace("Acme.Api", format!("OperationChild{n}"))
    }

    fn child_descriptor(n: u8) -> OperationDescriptor {
        OperationDescriptor::builder(format!("child{n}"), child(n))
            .base_type(base())
            .build()
    }

    #[test]
    fn test_matching_orders_base_before_concrete() {
        let mut registry = HandlerRegistry::new();
        registry.register(noop("Child2Handler", child(2)));
        registry.register(noop("BaseHandler", base()));
        registry.register(noop("Child1Handler", child(1)));

        let matched = registry.matching(&child_descriptor(2));
        let names: Vec<&str> = matched.iter().map(OperationHandler::name).collect();
        assert_eq!(names, ["BaseHandler", "Child2Handler"]);
    }

    #[test]
    fn test_same_type_handlers_keep_registration_order() {
        let mut registry = HandlerRegistry::new();
        registry.register(noop("First", child(1)));
        registry.register(noop("Second", child(1)));

        let matched = registry.matching(&child_descriptor(1));
        let names: Vec<&str> = matched.iter().map(OperationHandler::name).collect();
        assert_eq!(names, ["First", "Second"]);
    }

    #[test]
    fn test_non_matching_lists_the_rest() {
        let mut registry = HandlerRegistry::new();
        registry.register(noop("Child1Handler", child(1)));
        registry.register(noop("BaseHandler", base()));

        let non = registry.non_matching(&child_descriptor(2));
        assert_eq!(non.len(), 1);
        assert_eq!(non[0].name(), "Child1Handler");
    }

    #[tokio::test]
    async fn test_invoke_returns_value() {
        use blueprint_core::ServiceRegistry;
        use serde_json::json;

        let handler = OperationHandler::new("H", child(1), |_ctx| {
            Box::pin(async { Ok(Some(json!(7))) })
        })
        .returning();
        assert!(handler.returns_value());

        let registry = Arc::new(ServiceRegistry::new());
        let mut ctx = ApiOperationContext::new(
            Arc::new(child_descriptor(1)),
            json!({}),
            registry.create_scope(),
        );
        let value = handler.invoke(&mut ctx).await.expect("invokes");
        assert_eq!(value, Some(json!(7)));
    }
}
