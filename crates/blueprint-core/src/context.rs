//! Per-dispatch operation context.
//!
//! An [`ApiOperationContext`] is created for every dispatch and handed to
//! the generated executor: the descriptor, the operation payload, the
//! caller identity, the dispatch scope, and the cancellation token all
//! travel through it. Handlers receive it mutably, so middleware frames
//! can enrich the payload before execution.

use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::operation::OperationDescriptor;
use crate::services::ServiceScope;

/// The type reference generated code uses for the operation context
/// parameter.
#[must_use]
pub fn api_operation_context_type() -> crate::types::TypeRef {
    crate::types::TypeRef::in_namespace("Blueprint", "ApiOperationContext")
}

/// Identity of the caller, as established by the authentication stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    /// Stable subject identifier.
    pub subject: String,
    /// Roles granted to the caller.
    pub roles: Vec<String>,
}

impl CallerIdentity {
    /// Creates an identity with no roles.
    #[must_use]
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            roles: Vec::new(),
        }
    }

    /// Adds a role.
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    /// Returns `true` if the caller holds the role.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Everything a generated executor needs for one dispatch.
#[derive(Debug)]
pub struct ApiOperationContext {
    request_id: Uuid,
    descriptor: Arc<OperationDescriptor>,
    payload: Value,
    identity: Option<CallerIdentity>,
    scope: ServiceScope,
    cancellation: CancellationToken,
}

impl ApiOperationContext {
    /// Creates a context for one dispatch.
    #[must_use]
    pub fn new(descriptor: Arc<OperationDescriptor>, payload: Value, scope: ServiceScope) -> Self {
        Self {
            request_id: Uuid::now_v7(),
            descriptor,
            payload,
            identity: None,
            scope,
            cancellation: CancellationToken::new(),
        }
    }

    /// Attaches a caller identity.
    #[must_use]
    pub fn with_identity(mut self, identity: CallerIdentity) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Threads an externally-owned cancellation token through the dispatch.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Unique id of this dispatch.
    #[must_use]
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// The operation descriptor.
    #[must_use]
    pub fn descriptor(&self) -> &Arc<OperationDescriptor> {
        &self.descriptor
    }

    /// The operation payload.
    #[must_use]
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Mutable access to the payload.
    pub fn payload_mut(&mut self) -> &mut Value {
        &mut self.payload
    }

    /// Reads one payload property by name.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.payload.get(name)
    }

    /// Writes one payload property, creating the object shape if the
    /// payload was empty.
    pub fn set_property(&mut self, name: impl Into<String>, value: Value) {
        if !self.payload.is_object() {
            self.payload = Value::Object(serde_json::Map::new());
        }
        if let Some(map) = self.payload.as_object_mut() {
            map.insert(name.into(), value);
        }
    }

    /// The caller identity, if authentication ran.
    #[must_use]
    pub fn identity(&self) -> Option<&CallerIdentity> {
        self.identity.as_ref()
    }

    /// Sets the caller identity (authentication stage).
    pub fn set_identity(&mut self, identity: CallerIdentity) {
        self.identity = Some(identity);
    }

    /// The dispatch scope.
    #[must_use]
    pub fn scope(&self) -> &ServiceScope {
        &self.scope
    }

    /// The cancellation token for this dispatch.
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Returns `true` once cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}
