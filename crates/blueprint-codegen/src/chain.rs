//! The variable chain.
//!
//! During resolution every frame is asked which variables it reads
//! ([`Frame::find_variables`](crate::frame::Frame::find_variables)); the
//! [`VariableChain`] is what it asks. Lookups walk the method's
//! parameters, the outputs of known frames, and the injected fields, in
//! that order. A miss falls through to the DI bridge, which either hoists
//! the service to a constructor-injected field or synthesizes a
//! per-dispatch resolution frame; either way the chain records what was
//! created so the resolver and the type builder can pick it up.

use std::collections::HashMap;
use std::sync::Arc;

use blueprint_core::{GenerationError, GenerationResult, TypeRef};

use crate::class::InjectedField;
use crate::frame::Frame;
use crate::variable::Variable;

/// What the DI bridge produced for one service request.
pub enum ResolvedInstance {
    /// The service is hoisted to a constructor-injected field.
    Field(InjectedField),
    /// The service is fetched per dispatch by the given frame.
    Frame {
        /// The variable the frame produces.
        variable: Arc<Variable>,
        /// The producing frame.
        frame: Arc<dyn Frame>,
    },
}

impl std::fmt::Debug for ResolvedInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Field(field) => f.debug_tuple("Field").field(field).finish(),
            Self::Frame { variable, frame } => f
                .debug_struct("Frame")
                .field("variable", variable)
                .field("frame", &frame.description())
                .finish(),
        }
    }
}

/// Generation-time bridge from service requests to producers.
///
/// Implemented over the host's service registry; the chain consults it
/// when no in-method source satisfies a read.
pub trait InstanceSource: Send + Sync {
    /// Resolves a service request into a field or a producing frame.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::UnresolvedService`] when no
    /// registration can satisfy the request.
    fn resolve(
        &self,
        service_type: &TypeRef,
        operation: &str,
    ) -> GenerationResult<ResolvedInstance>;
}

/// Ordered variable lookup for one method under resolution.
pub struct VariableChain {
    operation: String,
    parameters: Vec<Arc<Variable>>,
    frame_outputs: Vec<Arc<Variable>>,
    fields: Vec<Arc<Variable>>,
    instance_source: Option<Arc<dyn InstanceSource>>,
    service_cache: HashMap<String, Arc<Variable>>,
    synthesized_frames: Vec<Arc<dyn Frame>>,
    new_fields: Vec<InjectedField>,
}

impl VariableChain {
    /// Creates a chain over the method's parameter variables.
    #[must_use]
    pub fn new(operation: impl Into<String>, parameters: Vec<Arc<Variable>>) -> Self {
        Self {
            operation: operation.into(),
            parameters,
            frame_outputs: Vec::new(),
            fields: Vec::new(),
            instance_source: None,
            service_cache: HashMap::new(),
            synthesized_frames: Vec::new(),
            new_fields: Vec::new(),
        }
    }

    /// Attaches the DI bridge.
    #[must_use]
    pub fn with_instance_source(mut self, source: Arc<dyn InstanceSource>) -> Self {
        self.instance_source = Some(source);
        self
    }

    /// The operation whose method is being resolved.
    #[must_use]
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Makes a frame's outputs visible to subsequent lookups.
    pub fn offer_frame_outputs(&mut self, frame: &dyn Frame) {
        self.frame_outputs.extend(frame.creates());
    }

    /// Makes an injected field visible to subsequent lookups.
    pub fn offer_field(&mut self, variable: Arc<Variable>) {
        self.fields.push(variable);
    }

    /// Finds an in-method variable of the given type.
    ///
    /// Searches parameters, then frame outputs, then injected fields.
    /// Does not consult the DI bridge.
    #[must_use]
    pub fn find(&self, variable_type: &TypeRef) -> Option<Arc<Variable>> {
        self.parameters
            .iter()
            .chain(self.frame_outputs.iter())
            .chain(self.fields.iter())
            .find(|v| v.variable_type() == variable_type)
            .map(Arc::clone)
    }

    /// Resolves a service variable, synthesizing a producer on first use.
    ///
    /// Repeated requests for the same service type within one method
    /// return the same variable.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::UnresolvedService`] when the service is
    /// unknown to the bridge, or when the chain has no bridge at all.
    pub fn resolve_service(&mut self, service_type: &TypeRef) -> GenerationResult<Arc<Variable>> {
        if let Some(existing) = self.find(service_type) {
            return Ok(existing);
        }
        let key = service_type.fully_qualified();
        if let Some(cached) = self.service_cache.get(&key) {
            return Ok(Arc::clone(cached));
        }

        let source =
            self.instance_source
                .as_ref()
                .ok_or_else(|| GenerationError::UnresolvedService {
                    service_type: key.clone(),
                    operation: self.operation.clone(),
                })?;

        let variable = match source.resolve(service_type, &self.operation)? {
            ResolvedInstance::Field(field) => {
                let variable = Arc::clone(field.variable());
                self.fields.push(Arc::clone(&variable));
                self.new_fields.push(field);
                variable
            }
            ResolvedInstance::Frame { variable, frame } => {
                self.frame_outputs.push(Arc::clone(&variable));
                self.synthesized_frames.push(frame);
                variable
            }
        };

        self.service_cache.insert(key, Arc::clone(&variable));
        Ok(variable)
    }

    /// Drains frames synthesized since the last call.
    pub fn take_synthesized_frames(&mut self) -> Vec<Arc<dyn Frame>> {
        std::mem::take(&mut self.synthesized_frames)
    }

    /// Drains injected fields created since the last call.
    pub fn take_new_fields(&mut self) -> Vec<InjectedField> {
        std::mem::take(&mut self.new_fields)
    }
}
