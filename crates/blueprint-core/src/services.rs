//! Service registration and resolution.
//!
//! The generator decides at build time whether a service is hoisted to a
//! constructor-injected field (singleton) or fetched from the per-dispatch
//! scope (scoped/transient). That decision is driven by the
//! [`ServiceResolver`] view of the [`ServiceRegistry`]; at dispatch time
//! the generated executor resolves non-hoisted services through a
//! [`ServiceScope`].
//!
//! Instances are stored type-erased as `Arc<dyn Any + Send + Sync>` and
//! keyed by their [`TypeRef`], because generated code names services by
//! type reference, not by language handle.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::ServiceError;
use crate::types::TypeRef;

/// A type-erased, shareable service instance.
pub type ServiceInstance = Arc<dyn Any + Send + Sync>;

/// Factory producing service instances.
pub type ServiceFactory = Arc<dyn Fn() -> ServiceInstance + Send + Sync>;

/// Lifetime of a registered service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceLifetime {
    /// One instance for the whole host; hoisted to a constructor field in
    /// generated executors.
    Singleton,
    /// One instance per dispatch scope.
    Scoped,
    /// A fresh instance per resolution.
    Transient,
}

impl fmt::Display for ServiceLifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Singleton => write!(f, "singleton"),
            Self::Scoped => write!(f, "scoped"),
            Self::Transient => write!(f, "transient"),
        }
    }
}

/// One registration in the registry.
pub struct ServiceRegistration {
    /// The type the service is requested as.
    pub service_type: TypeRef,
    /// The concrete implementation type.
    pub implementation_type: TypeRef,
    /// Registered lifetime.
    pub lifetime: ServiceLifetime,
    /// Instance factory.
    pub factory: ServiceFactory,
}

impl fmt::Debug for ServiceRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistration")
            .field("service_type", &self.service_type.fully_qualified())
            .field(
                "implementation_type",
                &self.implementation_type.fully_qualified(),
            )
            .field("lifetime", &self.lifetime)
            .finish_non_exhaustive()
    }
}

/// What the registry knows about a service type at generation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceBinding {
    /// Lifetime of the (first) registration.
    pub lifetime: ServiceLifetime,
    /// Number of registrations for the type.
    pub count: usize,
    /// Concrete implementation of the first registration.
    pub implementation_type: TypeRef,
}

/// Generation-time view of the IoC model.
///
/// The instance frame provider consults this to decide between a
/// singleton hoist and a per-dispatch scope resolution.
pub trait ServiceResolver: Send + Sync {
    /// Describes the registrations for a service type, or `None` when the
    /// type is unregistered.
    fn for_type(&self, service_type: &TypeRef) -> Option<ServiceBinding>;
}

/// Counters observing scope lifecycle, readable by tests and telemetry.
#[derive(Debug, Default)]
pub struct ScopeStats {
    created: AtomicUsize,
    disposed: AtomicUsize,
}

impl ScopeStats {
    /// Scopes created so far.
    #[must_use]
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Scopes disposed so far.
    #[must_use]
    pub fn disposed(&self) -> usize {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Returns `true` when every created scope has been disposed.
    #[must_use]
    pub fn all_disposed(&self) -> bool {
        self.created() == self.disposed()
    }
}

/// The service registry backing generation and dispatch.
///
/// Registrations are added during host configuration; after generation
/// starts the registry is shared read-only behind an `Arc`. Multiple
/// registrations for one type are allowed; resolution returns the last
/// one, matching container conventions.
#[derive(Default)]
pub struct ServiceRegistry {
    registrations: IndexMap<String, Vec<ServiceRegistration>>,
    singletons: Mutex<HashMap<String, ServiceInstance>>,
    stats: ScopeStats,
}

impl ServiceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a registration.
    pub fn add(&mut self, registration: ServiceRegistration) {
        self.registrations
            .entry(registration.service_type.fully_qualified())
            .or_default()
            .push(registration);
    }

    /// Registers an already-built singleton instance.
    pub fn singleton(
        &mut self,
        service_type: TypeRef,
        implementation_type: TypeRef,
        instance: ServiceInstance,
    ) {
        self.add(ServiceRegistration {
            service_type,
            implementation_type,
            lifetime: ServiceLifetime::Singleton,
            factory: Arc::new(move || Arc::clone(&instance)),
        });
    }

    /// Registers a scoped factory.
    pub fn scoped(
        &mut self,
        service_type: TypeRef,
        implementation_type: TypeRef,
        factory: ServiceFactory,
    ) {
        self.add(ServiceRegistration {
            service_type,
            implementation_type,
            lifetime: ServiceLifetime::Scoped,
            factory,
        });
    }

    /// Registers a transient factory.
    pub fn transient(
        &mut self,
        service_type: TypeRef,
        implementation_type: TypeRef,
        factory: ServiceFactory,
    ) {
        self.add(ServiceRegistration {
            service_type,
            implementation_type,
            lifetime: ServiceLifetime::Transient,
            factory,
        });
    }

    /// Returns `true` if the type has at least one registration.
    #[must_use]
    pub fn contains(&self, service_type: &TypeRef) -> bool {
        self.registrations
            .contains_key(&service_type.fully_qualified())
    }

    /// Scope lifecycle counters.
    #[must_use]
    pub fn scope_stats(&self) -> &ScopeStats {
        &self.stats
    }

    /// Opens a fresh dispatch scope.
    #[must_use]
    pub fn create_scope(self: &Arc<Self>) -> ServiceScope {
        self.stats.created.fetch_add(1, Ordering::SeqCst);
        ServiceScope {
            registry: Arc::clone(self),
            scoped: Mutex::new(HashMap::new()),
        }
    }

    /// Resolves the singleton instance for a type, building and caching it
    /// on first use.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotRegistered`] when the type is unknown.
    pub fn get_singleton(&self, service_type: &TypeRef) -> Result<ServiceInstance, ServiceError> {
        let key = service_type.fully_qualified();
        if let Some(instance) = self.singletons.lock().get(&key) {
            return Ok(Arc::clone(instance));
        }
        let registration = self.last_registration(service_type)?;
        let instance = (registration.factory)();
        self.singletons.lock().insert(key, Arc::clone(&instance));
        Ok(instance)
    }

    fn last_registration(
        &self,
        service_type: &TypeRef,
    ) -> Result<&ServiceRegistration, ServiceError> {
        self.registrations
            .get(&service_type.fully_qualified())
            .and_then(|regs| regs.last())
            .ok_or_else(|| ServiceError::NotRegistered {
                service_type: service_type.fully_qualified(),
            })
    }
}

impl ServiceResolver for ServiceRegistry {
    fn for_type(&self, service_type: &TypeRef) -> Option<ServiceBinding> {
        let registrations = self.registrations.get(&service_type.fully_qualified())?;
        let first = registrations.first()?;
        Some(ServiceBinding {
            lifetime: first.lifetime,
            count: registrations.len(),
            implementation_type: first.implementation_type.clone(),
        })
    }
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("registration_count", &self.registrations.len())
            .finish()
    }
}

/// Per-dispatch service scope.
///
/// Scoped instances are cached for the lifetime of the scope; transient
/// instances are built fresh on every resolution; singleton requests fall
/// through to the registry cache. Disposal is observed by the registry's
/// [`ScopeStats`] when the scope drops.
pub struct ServiceScope {
    registry: Arc<ServiceRegistry>,
    scoped: Mutex<HashMap<String, ServiceInstance>>,
}

impl ServiceScope {
    /// Resolves a required service from this scope.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotRegistered`] when the type is unknown.
    pub fn get_required(&self, service_type: &TypeRef) -> Result<ServiceInstance, ServiceError> {
        let registration = self.registry.last_registration(service_type)?;
        match registration.lifetime {
            ServiceLifetime::Singleton => self.registry.get_singleton(service_type),
            ServiceLifetime::Scoped => {
                let key = service_type.fully_qualified();
                if let Some(instance) = self.scoped.lock().get(&key) {
                    return Ok(Arc::clone(instance));
                }
                let instance = (registration.factory)();
                self.scoped.lock().insert(key, Arc::clone(&instance));
                Ok(instance)
            }
            ServiceLifetime::Transient => Ok((registration.factory)()),
        }
    }

    /// Resolves a required service and downcasts it.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::IncompatibleInstance`] when the registered
    /// instance is not a `T`.
    pub fn get_required_as<T: Send + Sync + 'static>(
        &self,
        service_type: &TypeRef,
    ) -> Result<Arc<T>, ServiceError> {
        self.get_required(service_type)?
            .downcast::<T>()
            .map_err(|_| ServiceError::IncompatibleInstance {
                service_type: service_type.fully_qualified(),
            })
    }

    /// The registry this scope belongs to.
    #[must_use]
    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }
}

impl Drop for ServiceScope {
    fn drop(&mut self) {
        self.registry.stats.disposed.fetch_add(1, Ordering::SeqCst);
    }
}

impl fmt::Debug for ServiceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceScope")
            .field("scoped_count", &self.scoped.lock().len())
            .finish()
    }
}

/// Capability for recording errors trapped at runtime.
///
/// Generated executors resolve this as a service, so hosts can route
/// trapped exceptions anywhere. The default implementation logs through
/// `tracing`.
pub trait ErrorLogger: Send + Sync {
    /// Records one trapped error with structured metadata.
    fn record(&self, operation: &str, message: &str, metadata: Value);
}

/// Concrete wrapper so an `ErrorLogger` can live in the type-erased
/// registry and be downcast by generated executors.
#[derive(Clone)]
pub struct ErrorLoggerHandle(Arc<dyn ErrorLogger>);

impl ErrorLoggerHandle {
    /// Wraps a logger implementation.
    #[must_use]
    pub fn new(logger: Arc<dyn ErrorLogger>) -> Self {
        Self(logger)
    }

    /// Records through the wrapped logger.
    pub fn record(&self, operation: &str, message: &str, metadata: Value) {
        self.0.record(operation, message, metadata);
    }
}

impl fmt::Debug for ErrorLoggerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorLoggerHandle").finish_non_exhaustive()
    }
}

/// The well-known type reference generated code uses for the error logger
/// service.
#[must_use]
pub fn error_logger_type() -> TypeRef {
    TypeRef::in_namespace("Blueprint.Errors", "IErrorLogger")
}

/// Error logger that records through `tracing`.
#[derive(Debug, Default)]
pub struct TracingErrorLogger;

impl ErrorLogger for TracingErrorLogger {
    fn record(&self, operation: &str, message: &str, metadata: Value) {
        tracing::error!(operation, %metadata, "unhandled operation error: {message}");
    }
}

/// Registers the default tracing-backed error logger unless the host
/// already provided one.
pub fn register_default_error_logger(registry: &mut ServiceRegistry) {
    let service_type = error_logger_type();
    if registry.contains(&service_type) {
        return;
    }
    let handle = ErrorLoggerHandle::new(Arc::new(TracingErrorLogger));
    registry.singleton(
        service_type,
        TypeRef::in_namespace("Blueprint.Errors", "TracingErrorLogger"),
        Arc::new(handle),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Database {
        url: String,
    }

    fn database_type() -> TypeRef {
        TypeRef::in_namespace("Acme.Services", "Database")
    }

    fn database_registration(lifetime: ServiceLifetime) -> ServiceRegistration {
        ServiceRegistration {
            service_type: database_type(),
            implementation_type: TypeRef::in_namespace("Acme.Services", "PostgresDatabase"),
            lifetime,
            factory: Arc::new(|| {
                Arc::new(Database {
                    url: "postgres://localhost".into(),
                })
            }),
        }
    }

    #[test]
    fn test_for_type_reports_binding() {
        let mut registry = ServiceRegistry::new();
        registry.add(database_registration(ServiceLifetime::Singleton));

        let binding = registry.for_type(&database_type()).expect("registered");
        assert_eq!(binding.lifetime, ServiceLifetime::Singleton);
        assert_eq!(binding.count, 1);
        assert_eq!(
            binding.implementation_type.fully_qualified(),
            "Acme.Services.PostgresDatabase"
        );
        assert!(registry.for_type(&TypeRef::named("Unknown")).is_none());
    }

    #[test]
    fn test_singleton_is_cached() {
        let mut registry = ServiceRegistry::new();
        registry.add(database_registration(ServiceLifetime::Singleton));
        let registry = Arc::new(registry);

        let a = registry.get_singleton(&database_type()).expect("resolves");
        let b = registry.get_singleton(&database_type()).expect("resolves");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_scoped_instances_are_per_scope() {
        let mut registry = ServiceRegistry::new();
        registry.add(database_registration(ServiceLifetime::Scoped));
        let registry = Arc::new(registry);

        let scope_a = registry.create_scope();
        let scope_b = registry.create_scope();

        let a1 = scope_a.get_required(&database_type()).expect("resolves");
        let a2 = scope_a.get_required(&database_type()).expect("resolves");
        let b = scope_b.get_required(&database_type()).expect("resolves");

        assert!(Arc::ptr_eq(&a1, &a2));
        assert!(!Arc::ptr_eq(&a1, &b));
    }

    #[test]
    fn test_transient_instances_are_always_fresh() {
        let mut registry = ServiceRegistry::new();
        registry.add(database_registration(ServiceLifetime::Transient));
        let registry = Arc::new(registry);

        let scope = registry.create_scope();
        let a = scope.get_required(&database_type()).expect("resolves");
        let b = scope.get_required(&database_type()).expect("resolves");
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_scope_stats_track_disposal() {
        let registry = Arc::new(ServiceRegistry::new());
        assert_eq!(registry.scope_stats().created(), 0);

        {
            let _scope = registry.create_scope();
            assert_eq!(registry.scope_stats().created(), 1);
            assert_eq!(registry.scope_stats().disposed(), 0);
        }

        assert_eq!(registry.scope_stats().disposed(), 1);
        assert!(registry.scope_stats().all_disposed());
    }

    #[test]
    fn test_last_registration_wins() {
        let mut registry = ServiceRegistry::new();
        registry.add(database_registration(ServiceLifetime::Transient));
        registry.add(ServiceRegistration {
            service_type: database_type(),
            implementation_type: TypeRef::in_namespace("Acme.Services", "SqliteDatabase"),
            lifetime: ServiceLifetime::Transient,
            factory: Arc::new(|| {
                Arc::new(Database {
                    url: "sqlite://memory".into(),
                })
            }),
        });
        let registry = Arc::new(registry);

        let binding = registry.for_type(&database_type()).expect("registered");
        assert_eq!(binding.count, 2);

        let scope = registry.create_scope();
        let instance = scope
            .get_required_as::<Database>(&database_type())
            .expect("resolves");
        assert_eq!(instance.url, "sqlite://memory");
    }

    #[test]
    fn test_get_required_as_rejects_wrong_type() {
        let mut registry = ServiceRegistry::new();
        registry.add(database_registration(ServiceLifetime::Singleton));
        let registry = Arc::new(registry);

        let scope = registry.create_scope();
        let result = scope.get_required_as::<String>(&database_type());
        assert!(matches!(
            result,
            Err(ServiceError::IncompatibleInstance { .. })
        ));
    }

    #[test]
    fn test_default_error_logger_registration_is_idempotent() {
        let mut registry = ServiceRegistry::new();
        register_default_error_logger(&mut registry);
        register_default_error_logger(&mut registry);

        let binding = registry.for_type(&error_logger_type()).expect("registered");
        assert_eq!(binding.count, 1);
        assert_eq!(binding.lifetime, ServiceLifetime::Singleton);
    }
}
