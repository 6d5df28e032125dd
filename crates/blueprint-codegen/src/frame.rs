//! Frames: units of generated code.
//!
//! A [`Frame`] contributes zero or more variables and consumes zero or
//! more variables. At generation time a frame writes its textual body
//! into the source writer; at dispatch time the sealed executor invokes
//! the same frame's [`invoke`](Frame::invoke) in exactly the order the
//! resolver placed it. The two faces stay in lockstep because they live
//! on one object.
//!
//! Frames form a DAG through producer/consumer relationships on
//! variables; cycles are an invariant violation the resolver rejects.

use std::any::Any;
use std::collections::BTreeSet;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use blueprint_core::{
    ApiOperationContext, GenerationResult, OperationResult, ServiceInstance,
};
use serde_json::Value;

use crate::chain::VariableChain;
use crate::variable::Variable;
use crate::writer::SourceWriter;

/// Boxed future used by frame invocation.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Result of invoking one frame at dispatch time.
#[derive(Debug)]
pub enum StepOutcome {
    /// Proceed to the next frame.
    Continue,
    /// Stop the method and return this result.
    ShortCircuit(OperationResult),
}

/// Runtime values of the variables in flight during one dispatch.
///
/// JSON values and type-erased service instances are kept apart because
/// they are consumed differently: payload data flows into handlers,
/// services get downcast and called.
#[derive(Default)]
pub struct Locals {
    values: HashMap<String, LocalValue>,
}

enum LocalValue {
    Json(Value),
    Service(ServiceInstance),
}

impl Locals {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a JSON value under a variable name.
    pub fn set_json(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), LocalValue::Json(value));
    }

    /// Reads a JSON value by variable name.
    #[must_use]
    pub fn json(&self, name: &str) -> Option<&Value> {
        match self.values.get(name) {
            Some(LocalValue::Json(value)) => Some(value),
            _ => None,
        }
    }

    /// Stores a service instance under a variable name.
    pub fn set_service(&mut self, name: impl Into<String>, instance: ServiceInstance) {
        self.values
            .insert(name.into(), LocalValue::Service(instance));
    }

    /// Reads a service instance by variable name.
    #[must_use]
    pub fn service(&self, name: &str) -> Option<&ServiceInstance> {
        match self.values.get(name) {
            Some(LocalValue::Service(instance)) => Some(instance),
            _ => None,
        }
    }

    /// Reads and downcasts a service instance.
    #[must_use]
    pub fn service_as<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.service(name)
            .and_then(|instance| Arc::clone(instance).downcast::<T>().ok())
    }

    /// Returns `true` if a variable of either kind is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }
}

impl fmt::Debug for Locals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.values.keys().collect();
        names.sort();
        f.debug_struct("Locals").field("names", &names).finish()
    }
}

/// Mutable view a frame receives when invoked at dispatch time.
pub struct StepContext<'a> {
    /// The dispatch context.
    pub context: &'a mut ApiOperationContext,
    /// Live variable values.
    pub locals: &'a mut Locals,
}

/// A unit of imperative generated code.
///
/// # Invariants
///
/// - Everything returned from [`creates`](Frame::creates) must be
///   assigned by the frame's emitted body and populated by its
///   [`invoke`](Frame::invoke).
/// - [`find_variables`](Frame::find_variables) must return every variable
///   the emitted body reads; the resolver places producers first based on
///   this answer.
/// - A frame with [`is_async`](Frame::is_async) true introduces a
///   suspension point; synchronous frames must not block on I/O.
pub trait Frame: Send + Sync {
    /// Short description used in diagnostics and cycle paths.
    fn description(&self) -> String;

    /// Whether this frame introduces a suspension point.
    fn is_async(&self) -> bool {
        false
    }

    /// Variables produced by this frame.
    fn creates(&self) -> Vec<Arc<Variable>> {
        Vec::new()
    }

    /// Variables this frame reads.
    ///
    /// The chain resolves reads against method parameters, placed frame
    /// outputs, injected fields, and the DI bridge, in that order.
    ///
    /// # Errors
    ///
    /// Fails when a read cannot be satisfied by any source.
    fn find_variables(&self, chain: &mut VariableChain) -> GenerationResult<Vec<Arc<Variable>>> {
        let _ = chain;
        Ok(Vec::new())
    }

    /// Namespaces the emitted body requires beyond those of its variables.
    fn required_namespaces(&self) -> BTreeSet<String> {
        BTreeSet::new()
    }

    /// Writes the frame body.
    ///
    /// # Errors
    ///
    /// Fails only when the frame detects an unsatisfied emission
    /// precondition; plain text writing is infallible.
    fn write(&self, writer: &mut SourceWriter) -> GenerationResult<()>;

    /// Executes the frame during one dispatch.
    fn invoke<'a>(
        &'a self,
        step: &'a mut StepContext<'_>,
    ) -> BoxFuture<'a, anyhow::Result<StepOutcome>>;
}

impl fmt::Debug for dyn Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({})", self.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_locals_json_round_trip() {
        let mut locals = Locals::new();
        locals.set_json("result", json!(42));

        assert!(locals.contains("result"));
        assert_eq!(locals.json("result"), Some(&json!(42)));
        assert!(locals.json("missing").is_none());
    }

    #[test]
    fn test_locals_service_downcast() {
        struct Marker(u8);

        let mut locals = Locals::new();
        locals.set_service("svc", Arc::new(Marker(7)));

        let found = locals.service_as::<Marker>("svc").expect("downcasts");
        assert_eq!(found.0, 7);
        assert!(locals.service_as::<String>("svc").is_none());
        assert!(locals.json("svc").is_none());
    }

    #[test]
    fn test_default_frame_hooks() {
        struct Empty;

        impl Frame for Empty {
            fn description(&self) -> String {
                "empty".into()
            }

            fn write(&self, writer: &mut SourceWriter) -> GenerationResult<()> {
                writer.comment("empty");
                Ok(())
            }

            fn invoke<'a>(
                &'a self,
                _step: &'a mut StepContext<'_>,
            ) -> BoxFuture<'a, anyhow::Result<StepOutcome>> {
                Box::pin(async { Ok(StepOutcome::Continue) })
            }
        }

        let frame = Empty;
        assert!(!frame.is_async());
        assert!(frame.creates().is_empty());
        assert!(frame.required_namespaces().is_empty());
    }
}
