//! Operation results.
//!
//! Every dispatch of a generated executor terminates in an
//! [`OperationResult`]. Runtime failures (validation, authorization,
//! unhandled exceptions, cancellation) are results, not panics: the
//! emitted exception frame converts them so the dispatcher always gets a
//! value back.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Accumulated validation failures, keyed by property.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Error)]
#[error("validation failed for {} property/properties", .failures.len())]
pub struct ValidationFailures {
    /// Map of property key to failure messages.
    failures: IndexMap<String, Vec<String>>,
}

impl ValidationFailures {
    /// Creates an empty failure set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a failure for a property.
    pub fn add(&mut self, property: impl Into<String>, message: impl Into<String>) {
        self.failures
            .entry(property.into())
            .or_default()
            .push(message.into());
    }

    /// Returns the messages recorded for a property.
    #[must_use]
    pub fn get(&self, property: &str) -> Option<&[String]> {
        self.failures.get(property).map(Vec::as_slice)
    }

    /// Returns `true` if a property has recorded failures.
    #[must_use]
    pub fn contains(&self, property: &str) -> bool {
        self.failures.contains_key(property)
    }

    /// Returns `true` if no failures were recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of properties with failures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.failures.len()
    }

    /// Iterates over `(property, messages)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.failures
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

/// The terminal outcome of one operation dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "body", rename_all = "snake_case")]
pub enum OperationResult {
    /// The operation produced a value.
    Ok(Value),
    /// The operation completed without producing a value.
    NoResult,
    /// Request validation failed before the handler ran.
    ValidationFailed(ValidationFailures),
    /// The caller could not be authenticated.
    Unauthorized {
        /// Why authentication failed.
        reason: String,
    },
    /// The caller is authenticated but not permitted.
    Forbidden {
        /// Why authorization was denied.
        reason: String,
    },
    /// An uncaught error escaped the handler and was trapped by the
    /// emitted exception frame.
    UnhandledException {
        /// The trapped error, rendered.
        message: String,
    },
    /// The dispatch was cancelled at a suspension point.
    Cancelled,
}

impl OperationResult {
    /// Creates an `Ok` result from any serializable value.
    ///
    /// # Panics
    ///
    /// Panics if the value fails to serialize, which cannot happen for the
    /// plain data types handlers return.
    #[must_use]
    pub fn ok(value: impl Serialize) -> Self {
        Self::Ok(serde_json::to_value(value).expect("handler return values serialize"))
    }

    /// Returns `true` for [`OperationResult::Ok`].
    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    /// Returns `true` for any non-success outcome other than `NoResult`.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        !matches!(self, Self::Ok(_) | Self::NoResult)
    }

    /// Returns the payload of an `Ok` result.
    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Ok(value) => Some(value),
            _ => None,
        }
    }
}
