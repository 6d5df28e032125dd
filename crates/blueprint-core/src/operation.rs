//! Operation descriptors.
//!
//! An [`OperationDescriptor`] is the immutable record describing a single
//! API operation: its payload type, typed properties with their source
//! parts and validation rules, declared responses, feature bag, and link
//! templates. Descriptors are built once from the declared catalog at
//! startup and are read-only thereafter; everything downstream (pipeline
//! composition, code generation, dispatch) works purely from them so that
//! no runtime reflection is ever needed.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::TypeRef;

/// Which part of the request a property is bound from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertySource {
    /// Bound from a request header.
    Header,
    /// Bound from the query string.
    Query,
    /// Bound from a cookie.
    Cookie,
    /// Bound from the request body.
    Body,
    /// Bound from the route template.
    Route,
}

/// A declared validation constraint on an operation property.
///
/// The set is closed: the validation stage iterates these rules and emits
/// one check per rule into the generated executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationRule {
    /// The property must be present and non-null.
    Required,
    /// Minimum string length.
    MinLength(usize),
    /// Maximum string length.
    MaxLength(usize),
    /// Inclusive numeric range.
    Range {
        /// Lower bound, inclusive.
        min: i64,
        /// Upper bound, inclusive.
        max: i64,
    },
}

impl ValidationRule {
    /// Checks a property value against this rule.
    ///
    /// `None` means the property was absent from the payload. Returns a
    /// failure message when the rule is violated.
    #[must_use]
    pub fn check(&self, value: Option<&Value>) -> Option<String> {
        match self {
            Self::Required => match value {
                None | Some(Value::Null) => Some("is required".to_string()),
                Some(_) => None,
            },
            Self::MinLength(min) => match value {
                Some(Value::String(s)) if s.len() < *min => {
                    Some(format!("must be at least {min} characters"))
                }
                _ => None,
            },
            Self::MaxLength(max) => match value {
                Some(Value::String(s)) if s.len() > *max => {
                    Some(format!("must be at most {max} characters"))
                }
                _ => None,
            },
            Self::Range { min, max } => match value.and_then(Value::as_i64) {
                Some(n) if n < *min || n > *max => {
                    Some(format!("must be between {min} and {max}"))
                }
                _ => None,
            },
        }
    }

    /// Short name used when the rule is referenced in generated source.
    #[must_use]
    pub fn source_name(&self) -> &'static str {
        match self {
            Self::Required => "Required",
            Self::MinLength(_) => "MinLength",
            Self::MaxLength(_) => "MaxLength",
            Self::Range { .. } => "Range",
        }
    }
}

/// A typed property of an operation payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    /// Property name as it appears in the payload.
    pub name: String,
    /// Declared property type.
    pub property_type: TypeRef,
    /// Whether the property admits null.
    pub nullable: bool,
    /// Which request part the property binds from.
    pub source: PropertySource,
    /// Validation rules declared on the property.
    pub validators: Vec<ValidationRule>,
}

impl PropertyDescriptor {
    /// Creates a body-sourced, nullable property with no validators.
    #[must_use]
    pub fn new(name: impl Into<String>, property_type: TypeRef) -> Self {
        Self {
            name: name.into(),
            property_type,
            nullable: true,
            source: PropertySource::Body,
            validators: Vec::new(),
        }
    }

    /// Sets the source part.
    #[must_use]
    pub fn from_source(mut self, source: PropertySource) -> Self {
        self.source = source;
        self
    }

    /// Marks the property non-nullable.
    #[must_use]
    pub fn not_nullable(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Adds a validation rule.
    #[must_use]
    pub fn with_rule(mut self, rule: ValidationRule) -> Self {
        self.validators.push(rule);
        self
    }
}

/// Classification of a declared response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseCategory {
    /// The operation succeeded.
    Success,
    /// The caller made an invalid request.
    ClientError,
    /// The server failed.
    ServerError,
    /// Request validation failed.
    Validation,
}

/// A declared response of an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseDescriptor {
    /// HTTP status code.
    pub status: u16,
    /// Response payload type.
    pub payload_type: TypeRef,
    /// Response classification.
    pub category: ResponseCategory,
}

impl ResponseDescriptor {
    /// Creates a response descriptor.
    #[must_use]
    pub fn new(status: u16, payload_type: TypeRef, category: ResponseCategory) -> Self {
        Self {
            status,
            payload_type,
            category,
        }
    }
}

/// Keys of the per-operation feature bag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    /// The operation is callable without a caller identity.
    Anonymous,
    /// The operation requires an authenticated caller.
    Authenticated,
    /// Dispatches of the operation are audit-logged.
    Audit,
}

/// Immutable record describing a single API operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationDescriptor {
    name: String,
    payload_type: TypeRef,
    base_types: Vec<TypeRef>,
    properties: Vec<PropertyDescriptor>,
    responses: Vec<ResponseDescriptor>,
    features: IndexMap<FeatureKind, Value>,
    requires_return_value: bool,
    links: Vec<String>,
}

impl OperationDescriptor {
    /// Starts building a descriptor for the given operation name and
    /// payload type.
    #[must_use]
    pub fn builder(name: impl Into<String>, payload_type: TypeRef) -> OperationDescriptorBuilder {
        OperationDescriptorBuilder {
            descriptor: Self {
                name: name.into(),
                payload_type,
                base_types: Vec::new(),
                properties: Vec::new(),
                responses: Vec::new(),
                features: IndexMap::new(),
                requires_return_value: false,
                links: Vec::new(),
            },
        }
    }

    /// Stable operation name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The operation payload type.
    #[must_use]
    pub fn payload_type(&self) -> &TypeRef {
        &self.payload_type
    }

    /// Base types of the payload type, closest base first.
    #[must_use]
    pub fn base_types(&self) -> &[TypeRef] {
        &self.base_types
    }

    /// Returns `true` if `candidate` is the payload type or one of its
    /// declared bases.
    #[must_use]
    pub fn is_assignable_from(&self, candidate: &TypeRef) -> bool {
        candidate == &self.payload_type || self.base_types.contains(candidate)
    }

    /// Declared payload properties.
    #[must_use]
    pub fn properties(&self) -> &[PropertyDescriptor] {
        &self.properties
    }

    /// Returns `true` if any property carries a validation rule.
    #[must_use]
    pub fn has_validated_properties(&self) -> bool {
        self.properties.iter().any(|p| !p.validators.is_empty())
    }

    /// Declared responses.
    #[must_use]
    pub fn responses(&self) -> &[ResponseDescriptor] {
        &self.responses
    }

    /// Looks up a feature payload by kind.
    #[must_use]
    pub fn feature(&self, kind: FeatureKind) -> Option<&Value> {
        self.features.get(&kind)
    }

    /// Returns `true` if the feature bag contains the given kind.
    #[must_use]
    pub fn has_feature(&self, kind: FeatureKind) -> bool {
        self.features.contains_key(&kind)
    }

    /// Whether the executor must produce a return value.
    #[must_use]
    pub fn requires_return_value(&self) -> bool {
        self.requires_return_value
    }

    /// Link/route templates bound to the operation.
    #[must_use]
    pub fn links(&self) -> &[String] {
        &self.links
    }
}

/// Builder for [`OperationDescriptor`].
#[derive(Debug)]
pub struct OperationDescriptorBuilder {
    descriptor: OperationDescriptor,
}

impl OperationDescriptorBuilder {
    /// Declares a base type of the payload type. Call in order from the
    /// closest base outward.
    #[must_use]
    pub fn base_type(mut self, base: TypeRef) -> Self {
        self.descriptor.base_types.push(base);
        self
    }

    /// Adds a payload property.
    #[must_use]
    pub fn property(mut self, property: PropertyDescriptor) -> Self {
        self.descriptor.properties.push(property);
        self
    }

    /// Adds a declared response.
    #[must_use]
    pub fn response(mut self, response: ResponseDescriptor) -> Self {
        self.descriptor.responses.push(response);
        self
    }

    /// Attaches a feature payload.
    #[must_use]
    pub fn feature(mut self, kind: FeatureKind, payload: Value) -> Self {
        self.descriptor.features.insert(kind, payload);
        self
    }

    /// Requires the executor to produce a return value.
    #[must_use]
    pub fn requires_return_value(mut self) -> Self {
        self.descriptor.requires_return_value = true;
        self
    }

    /// Binds a link/route template to the operation.
    #[must_use]
    pub fn link(mut self, template: impl Into<String>) -> Self {
        self.descriptor.links.push(template.into());
        self
    }

    /// Finishes the descriptor.
    #[must_use]
    pub fn build(self) -> OperationDescriptor {
        self.descriptor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn query_type() -> TypeRef {
        TypeRef::in_namespace("Acme.Api", "UserQuery")
    }

    #[test]
    fn test_builder_collects_everything() {
        let descriptor = OperationDescriptor::builder("getUser", query_type())
            .base_type(TypeRef::in_namespace("Acme.Api", "QueryBase"))
            .property(
                PropertyDescriptor::new("UserId", TypeRef::in_namespace("System", "String"))
                    .from_source(PropertySource::Route)
                    .not_nullable()
                    .with_rule(ValidationRule::Required),
            )
            .response(ResponseDescriptor::new(
                200,
                TypeRef::in_namespace("Acme.Api", "UserView"),
                ResponseCategory::Success,
            ))
            .feature(FeatureKind::Authenticated, json!(true))
            .requires_return_value()
            .link("/users/{UserId}")
            .build();

        assert_eq!(descriptor.name(), "getUser");
        assert_eq!(descriptor.properties().len(), 1);
        assert_eq!(descriptor.responses().len(), 1);
        assert!(descriptor.requires_return_value());
        assert!(descriptor.has_feature(FeatureKind::Authenticated));
        assert!(!descriptor.has_feature(FeatureKind::Anonymous));
        assert_eq!(descriptor.links(), ["/users/{UserId}"]);
    }

    #[test]
    fn test_assignability_walks_bases() {
        let descriptor = OperationDescriptor::builder("child", query_type())
            .base_type(TypeRef::in_namespace("Acme.Api", "QueryBase"))
            .build();

        assert!(descriptor.is_assignable_from(&query_type()));
        assert!(descriptor.is_assignable_from(&TypeRef::in_namespace("Acme.Api", "QueryBase")));
        assert!(!descriptor.is_assignable_from(&TypeRef::in_namespace("Acme.Api", "Other")));
    }

    #[test]
    fn test_required_rule() {
        let rule = ValidationRule::Required;
        assert!(rule.check(None).is_some());
        assert!(rule.check(Some(&Value::Null)).is_some());
        assert!(rule.check(Some(&json!("x"))).is_none());
    }

    #[test]
    fn test_length_rules_only_apply_to_strings() {
        let min = ValidationRule::MinLength(3);
        assert!(min.check(Some(&json!("ab"))).is_some());
        assert!(min.check(Some(&json!("abc"))).is_none());
        assert!(min.check(Some(&json!(12))).is_none());

        let max = ValidationRule::MaxLength(3);
        assert!(max.check(Some(&json!("abcd"))).is_some());
        assert!(max.check(Some(&json!("abc"))).is_none());
    }

    #[test]
    fn test_range_rule() {
        let rule = ValidationRule::Range { min: 1, max: 10 };
        assert!(rule.check(Some(&json!(0))).is_some());
        assert!(rule.check(Some(&json!(5))).is_none());
        assert!(rule.check(Some(&json!(11))).is_some());
        assert!(rule.check(None).is_none());
    }

    #[test]
    fn test_has_validated_properties() {
        let without = OperationDescriptor::builder("a", query_type())
            .property(PropertyDescriptor::new(
                "Name",
                TypeRef::in_namespace("System", "String"),
            ))
            .build();
        assert!(!without.has_validated_properties());

        let with = OperationDescriptor::builder("b", query_type())
            .property(
                PropertyDescriptor::new("Name", TypeRef::in_namespace("System", "String"))
                    .with_rule(ValidationRule::Required),
            )
            .build();
        assert!(with.has_validated_properties());
    }
}
