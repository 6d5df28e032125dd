//! Type references for generated source.
//!
//! Generated executors refer to types by name, not by language handle. A
//! [`TypeRef`] models a fully-qualified type reference: namespace, simple
//! name, generic arguments (recursive), and an array marker. It knows how
//! to render itself into generated source, how to derive a safe local
//! identifier, and which namespaces a reference to it pulls in.
//!
//! # Example
//!
//! ```
//! use blueprint_core::TypeRef;
//!
//! let inner = TypeRef::in_namespace("Acme.Api", "UserQuery");
//! let list = TypeRef::generic("System.Collections.Generic", "List", vec![inner]);
//!
//! assert_eq!(list.fully_qualified(), "System.Collections.Generic.List<Acme.Api.UserQuery>");
//! assert_eq!(list.variable_name(), "list");
//! assert!(list.namespaces().contains("Acme.Api"));
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when a type reference cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid type reference '{input}': {reason}")]
pub struct TypeParseError {
    /// The input that failed to parse.
    pub input: String,
    /// Why parsing failed.
    pub reason: String,
}

impl TypeParseError {
    fn new(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            reason: reason.into(),
        }
    }
}

/// A reference to a type in generated source.
///
/// `TypeRef` is the identity currency of the whole generator: operation
/// descriptors, variables, injected fields, and service registrations all
/// name types through it. Two references are equal when they render to the
/// same fully-qualified name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeRef {
    /// Containing namespace, if any.
    namespace: Option<String>,
    /// Simple type name without namespace or generic arguments.
    name: String,
    /// Generic arguments, in declaration order.
    generic_args: Vec<TypeRef>,
    /// Whether this reference is an array of the element type.
    array: bool,
}

impl TypeRef {
    /// Creates a reference to a type with no namespace.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            name: name.into(),
            generic_args: Vec::new(),
            array: false,
        }
    }

    /// Creates a reference to a type inside a namespace.
    #[must_use]
    pub fn in_namespace(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            name: name.into(),
            generic_args: Vec::new(),
            array: false,
        }
    }

    /// Creates a generic type instantiation.
    #[must_use]
    pub fn generic(
        namespace: impl Into<String>,
        name: impl Into<String>,
        args: Vec<TypeRef>,
    ) -> Self {
        Self {
            namespace: Some(namespace.into()),
            name: name.into(),
            generic_args: args,
            array: false,
        }
    }

    /// Wraps this reference into an array of it.
    #[must_use]
    pub fn array_of(self) -> Self {
        Self {
            array: true,
            ..self
        }
    }

    /// Parses a rendered type reference back into a `TypeRef`.
    ///
    /// Accepts the same grammar [`fully_qualified`](Self::fully_qualified)
    /// produces: `Namespace.Name<Arg1, Arg2>[]`.
    ///
    /// # Errors
    ///
    /// Returns [`TypeParseError`] on unbalanced generic brackets, empty
    /// names, or dangling separators.
    pub fn parse(input: &str) -> Result<Self, TypeParseError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(TypeParseError::new(input, "empty type reference"));
        }

        // Array suffix binds last.
        if let Some(element) = trimmed.strip_suffix("[]") {
            return Ok(Self::parse(element)?.array_of());
        }

        let (head, args) = match trimmed.find('<') {
            Some(open) => {
                if !trimmed.ends_with('>') {
                    return Err(TypeParseError::new(input, "unterminated generic argument list"));
                }
                let inner = &trimmed[open + 1..trimmed.len() - 1];
                (&trimmed[..open], split_top_level(inner, input)?)
            }
            None => (trimmed, Vec::new()),
        };

        if head.is_empty() {
            return Err(TypeParseError::new(input, "missing type name"));
        }

        let (namespace, name) = match head.rfind('.') {
            Some(dot) => {
                let (ns, simple) = (&head[..dot], &head[dot + 1..]);
                if ns.is_empty() || simple.is_empty() {
                    return Err(TypeParseError::new(input, "dangling namespace separator"));
                }
                (Some(ns.to_string()), simple.to_string())
            }
            None => (None, head.to_string()),
        };

        let mut generic_args = Vec::with_capacity(args.len());
        for arg in args {
            generic_args.push(Self::parse(arg)?);
        }

        Ok(Self {
            namespace,
            name,
            generic_args,
            array: false,
        })
    }

    /// Returns the simple name without namespace or generic arguments.
    #[must_use]
    pub fn simple_name(&self) -> &str {
        &self.name
    }

    /// Returns the containing namespace, if any.
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Returns the generic arguments of this reference.
    #[must_use]
    pub fn generic_args(&self) -> &[TypeRef] {
        &self.generic_args
    }

    /// Returns `true` if this is a generic instantiation.
    #[must_use]
    pub fn is_generic(&self) -> bool {
        !self.generic_args.is_empty()
    }

    /// Returns the generic arity (zero for non-generic types).
    #[must_use]
    pub fn arity(&self) -> usize {
        self.generic_args.len()
    }

    /// Returns `true` if this reference is an array.
    #[must_use]
    pub fn is_array(&self) -> bool {
        self.array
    }

    /// Renders the fully-qualified reference, generic arguments included.
    #[must_use]
    pub fn fully_qualified(&self) -> String {
        let mut out = String::new();
        if let Some(ns) = &self.namespace {
            out.push_str(ns);
            out.push('.');
        }
        out.push_str(&self.name);
        if !self.generic_args.is_empty() {
            out.push('<');
            for (i, arg) in self.generic_args.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(&arg.fully_qualified());
            }
            out.push('>');
        }
        if self.array {
            out.push_str("[]");
        }
        out
    }

    /// Renders the reference without namespace qualifiers, for use in
    /// source that imports the namespaces via using declarations.
    #[must_use]
    pub fn source_name(&self) -> String {
        let mut out = String::from(&self.name);
        if !self.generic_args.is_empty() {
            out.push('<');
            for (i, arg) in self.generic_args.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(&arg.source_name());
            }
            out.push('>');
        }
        if self.array {
            out.push_str("[]");
        }
        out
    }

    /// Derives an identifier safe to use for a local variable of this type.
    ///
    /// The simple name with its first character lowered; generic and array
    /// markers do not contribute. Falls back to `value` when the name holds
    /// no identifier characters at all.
    #[must_use]
    pub fn variable_name(&self) -> String {
        let cleaned: String = self
            .name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
            .collect();
        let mut chars = cleaned.chars();
        match chars.next() {
            Some(first) => first.to_ascii_lowercase().to_string() + chars.as_str(),
            None => "value".to_string(),
        }
    }

    /// Returns every namespace a reference to this type requires.
    ///
    /// Includes the type's own namespace and, recursively, the namespaces
    /// of all generic arguments. The result is sorted and deduplicated.
    #[must_use]
    pub fn namespaces(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_namespaces(&mut out);
        out
    }

    fn collect_namespaces(&self, out: &mut BTreeSet<String>) {
        if let Some(ns) = &self.namespace {
            out.insert(ns.clone());
        }
        for arg in &self.generic_args {
            arg.collect_namespaces(out);
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fully_qualified())
    }
}

impl FromStr for TypeRef {
    type Err = TypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Splits a generic argument list at top-level commas.
fn split_top_level<'a>(inner: &'a str, original: &str) -> Result<Vec<&'a str>, TypeParseError> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (i, c) in inner.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| TypeParseError::new(original, "unbalanced generic brackets"))?;
            }
            ',' if depth == 0 => {
                parts.push(inner[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(TypeParseError::new(original, "unbalanced generic brackets"));
    }
    let last = inner[start..].trim();
    if last.is_empty() {
        return Err(TypeParseError::new(original, "empty generic argument"));
    }
    parts.push(last);
    Ok(parts)
}
