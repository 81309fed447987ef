//! ServiceRegistry — explicit service resolution keyed by identity and scope.
//!
//! Built once at server construction from base instances plus a static list
//! of factories; no runtime discovery. Factory-produced services are
//! instantiated lazily and memoized for the registry's lifetime.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info};

/// Abstract service identity: a name plus an optional scope qualifier
/// (e.g. "applies only to language X").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceId {
    pub name: &'static str,
    pub scope: Option<String>,
}

impl ServiceId {
    pub fn global(name: &'static str) -> Self {
        Self { name, scope: None }
    }

    pub fn scoped(name: &'static str, scope: impl Into<String>) -> Self {
        Self { name, scope: Some(scope.into()) }
    }
}

impl std::fmt::Display for ServiceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.scope {
            Some(scope) => write!(f, "{} (scope: {scope})", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Contract for registry-managed services. `dispose` runs once at
/// connection shutdown for every instance that was actually resolved.
pub trait Service: Send + Sync + 'static {
    fn dispose(&self) {}
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("no service registered for {0}")]
    NotRegistered(String),
    #[error("service {0} is registered with a different type")]
    TypeMismatch(String),
}

struct Entry {
    any: Arc<dyn Any + Send + Sync>,
    service: Arc<dyn Service>,
}

impl Entry {
    fn new<T: Service>(instance: Arc<T>) -> Self {
        Self {
            any: instance.clone(),
            service: instance,
        }
    }
}

type Factory = Box<dyn Fn(&ServiceRegistry) -> Entry + Send + Sync>;

/// Builder for the immutable part of a [`ServiceRegistry`].
#[derive(Default)]
pub struct ServiceRegistryBuilder {
    base: HashMap<ServiceId, Entry>,
    factories: HashMap<ServiceId, Factory>,
}

impl ServiceRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an already-constructed singleton.
    pub fn with_base<T: Service>(mut self, id: ServiceId, instance: Arc<T>) -> Self {
        self.base.insert(id, Entry::new(instance));
        self
    }

    /// Register a factory, invoked at most once per registry and memoized.
    /// Factories must be side-effect-free; a first-resolution race settles
    /// by compare-and-set and the loser's instance is dropped.
    pub fn with_factory<T, F>(mut self, id: ServiceId, factory: F) -> Self
    where
        T: Service,
        F: Fn(&ServiceRegistry) -> Arc<T> + Send + Sync + 'static,
    {
        self.factories
            .insert(id, Box::new(move |registry| Entry::new(factory(registry))));
        self
    }

    pub fn build(self) -> ServiceRegistry {
        info!(
            base = self.base.len(),
            factories = self.factories.len(),
            "service registry built"
        );
        ServiceRegistry {
            base: self.base,
            factories: self.factories,
            resolved: DashMap::new(),
        }
    }
}

/// One registry instance per server connection.
pub struct ServiceRegistry {
    base: HashMap<ServiceId, Entry>,
    factories: HashMap<ServiceId, Factory>,
    resolved: DashMap<ServiceId, Arc<Entry>>,
}

impl ServiceRegistry {
    pub fn builder() -> ServiceRegistryBuilder {
        ServiceRegistryBuilder::new()
    }

    /// Resolve a service by identity, downcast to its concrete type.
    pub fn resolve<T: Service>(&self, id: &ServiceId) -> Option<Arc<T>> {
        if let Some(entry) = self.base.get(id) {
            return entry.any.clone().downcast::<T>().ok();
        }
        if let Some(entry) = self.resolved.get(id) {
            return entry.any.clone().downcast::<T>().ok();
        }
        let factory = self.factories.get(id)?;
        let entry = Arc::new(factory(self));
        debug!(service = %id, "service instantiated");
        // First resolution may race; keep whichever entry landed.
        let kept = self
            .resolved
            .entry(id.clone())
            .or_insert(entry)
            .value()
            .clone();
        kept.any.clone().downcast::<T>().ok()
    }

    /// Resolve a service that must exist, failing otherwise.
    pub fn resolve_required<T: Service>(&self, id: &ServiceId) -> Result<Arc<T>, RegistryError> {
        let registered =
            self.base.contains_key(id) || self.factories.contains_key(id) || self.resolved.contains_key(id);
        match self.resolve::<T>(id) {
            Some(instance) => Ok(instance),
            None if registered => Err(RegistryError::TypeMismatch(id.to_string())),
            None => Err(RegistryError::NotRegistered(id.to_string())),
        }
    }

    /// Dispose every resolved instance (base and lazily created), in
    /// unspecified but complete order. Called once at connection shutdown.
    pub fn dispose_all(&self) {
        for entry in self.base.values() {
            entry.service.dispose();
        }
        let mut count = self.base.len();
        for item in self.resolved.iter() {
            item.value().service.dispose();
            count += 1;
        }
        self.resolved.clear();
        info!(disposed = count, "service registry disposed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter {
        disposed: AtomicUsize,
    }

    impl Counter {
        fn new() -> Arc<Self> {
            Arc::new(Self { disposed: AtomicUsize::new(0) })
        }
    }

    impl Service for Counter {
        fn dispose(&self) {
            self.disposed.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Other;
    impl Service for Other {}

    #[test]
    fn base_services_resolve_by_identity() {
        let counter = Counter::new();
        let registry = ServiceRegistry::builder()
            .with_base(ServiceId::global("counter"), counter.clone())
            .build();

        let resolved = registry.resolve::<Counter>(&ServiceId::global("counter")).unwrap();
        assert!(Arc::ptr_eq(&resolved, &counter));
    }

    #[test]
    fn factories_are_invoked_once_and_memoized() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);
        let registry = ServiceRegistry::builder()
            .with_factory(ServiceId::global("lazy"), |_| {
                CALLS.fetch_add(1, Ordering::SeqCst);
                Counter::new()
            })
            .build();

        let a = registry.resolve::<Counter>(&ServiceId::global("lazy")).unwrap();
        let b = registry.resolve::<Counter>(&ServiceId::global("lazy")).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn scoped_identities_are_distinct() {
        let registry = ServiceRegistry::builder()
            .with_factory(ServiceId::scoped("analyzer", "rust"), |_| Counter::new())
            .build();

        assert!(registry.resolve::<Counter>(&ServiceId::scoped("analyzer", "rust")).is_some());
        assert!(registry.resolve::<Counter>(&ServiceId::global("analyzer")).is_none());
        assert!(registry.resolve::<Counter>(&ServiceId::scoped("analyzer", "go")).is_none());
    }

    #[test]
    fn resolve_required_distinguishes_missing_from_mistyped() {
        let registry = ServiceRegistry::builder()
            .with_base(ServiceId::global("counter"), Counter::new())
            .build();

        assert!(matches!(
            registry.resolve_required::<Counter>(&ServiceId::global("absent")),
            Err(RegistryError::NotRegistered(_))
        ));
        assert!(matches!(
            registry.resolve_required::<Other>(&ServiceId::global("counter")),
            Err(RegistryError::TypeMismatch(_))
        ));
    }

    #[test]
    fn dispose_all_reaches_resolved_instances() {
        let base = Counter::new();
        let registry = ServiceRegistry::builder()
            .with_base(ServiceId::global("base"), base.clone())
            .with_factory(ServiceId::global("lazy"), |_| Counter::new())
            .build();

        let lazy = registry.resolve::<Counter>(&ServiceId::global("lazy")).unwrap();
        registry.dispose_all();
        assert_eq!(base.disposed.load(Ordering::SeqCst), 1);
        assert_eq!(lazy.disposed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unresolved_factories_are_not_disposed() {
        let registry = ServiceRegistry::builder()
            .with_factory(ServiceId::global("never"), |_| -> Arc<Counter> {
                panic!("factory must not run unless resolved")
            })
            .build();
        registry.dispose_all();
    }
}
