//! Service registry: every descriptor, keyed by [`ServiceKey`].
//!
//! The registry is a plain map that remembers registration order. It does
//! no validation; that happens once the graph is built. Iteration order is
//! registration order, which keeps eager singleton construction and error
//! reporting deterministic.

use std::collections::HashMap;

use tracing::debug;
use wasil_support::rendering::suggest_similar;

use crate::descriptor::ServiceDescriptor;
use crate::key::ServiceKey;

/// Registered descriptors in registration order.
#[derive(Debug, Default)]
pub struct Registry {
    descriptors: Vec<ServiceDescriptor>,
    index: HashMap<ServiceKey, usize>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `descriptor`, replacing any earlier registration of the same
    /// key (last one wins). A replaced key keeps its original position.
    ///
    /// Returns the replaced descriptor, if any.
    pub fn register(&mut self, descriptor: ServiceDescriptor) -> Option<ServiceDescriptor> {
        let key = descriptor.key;
        debug!(key = %key, lifetime = %descriptor.lifetime, "Registered service");

        match self.index.get(&key) {
            Some(&position) => Some(std::mem::replace(&mut self.descriptors[position], descriptor)),
            None => {
                self.index.insert(key, self.descriptors.len());
                self.descriptors.push(descriptor);
                None
            }
        }
    }

    pub fn get(&self, key: &ServiceKey) -> Option<&ServiceDescriptor> {
        self.index.get(key).map(|&position| &self.descriptors[position])
    }

    /// Registration position of `key`.
    pub fn position(&self, key: &ServiceKey) -> Option<usize> {
        self.index.get(key).copied()
    }

    pub fn contains(&self, key: &ServiceKey) -> bool {
        self.index.contains_key(key)
    }

    /// Every descriptor, in registration order.
    pub fn all(&self) -> &[ServiceDescriptor] {
        &self.descriptors
    }

    pub fn keys(&self) -> impl Iterator<Item = &ServiceKey> {
        self.descriptors.iter().map(|d| &d.key)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Registered type names resembling `key`, for "did you mean?" hints.
    pub fn suggestions_for(&self, key: &ServiceKey) -> Vec<String> {
        let available: Vec<&str> = self.keys().map(ServiceKey::type_name).collect();
        suggest_similar(key.type_name(), &available, 3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::CreationStrategy;
    use crate::lifetime::Lifetime;
    use std::sync::Arc;

    struct Database;
    struct DatabasePool;
    struct Mailer;

    fn descriptor(key: ServiceKey, lifetime: Lifetime) -> ServiceDescriptor {
        ServiceDescriptor {
            key,
            lifetime,
            strategy: CreationStrategy::FromInstance(Arc::new(0u8)),
            disposer: None,
        }
    }

    #[test]
    fn register_and_get() {
        let mut registry = Registry::new();
        let key = ServiceKey::of::<Database>();
        assert!(registry.register(descriptor(key, Lifetime::Singleton)).is_none());
        assert!(registry.get(&key).is_some());
        assert!(registry.contains(&key));
        assert!(registry.get(&ServiceKey::of::<Mailer>()).is_none());
    }

    #[test]
    fn last_registration_wins_in_place() {
        let mut registry = Registry::new();
        registry.register(descriptor(ServiceKey::of::<Database>(), Lifetime::Singleton));
        registry.register(descriptor(ServiceKey::of::<Mailer>(), Lifetime::Singleton));

        let replaced = registry.register(descriptor(ServiceKey::of::<Database>(), Lifetime::Transient));
        assert_eq!(replaced.map(|d| d.lifetime), Some(Lifetime::Singleton));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.position(&ServiceKey::of::<Database>()), Some(0));
        assert_eq!(
            registry.get(&ServiceKey::of::<Database>()).map(|d| d.lifetime),
            Some(Lifetime::Transient)
        );
    }

    #[test]
    fn iteration_follows_registration_order() {
        let mut registry = Registry::new();
        registry.register(descriptor(ServiceKey::of::<Mailer>(), Lifetime::Transient));
        registry.register(descriptor(ServiceKey::of::<Database>(), Lifetime::Transient));
        registry.register(descriptor(ServiceKey::named::<Mailer>("smtp"), Lifetime::Transient));

        let keys: Vec<ServiceKey> = registry.all().iter().map(|d| d.key).collect();
        assert_eq!(
            keys,
            vec![
                ServiceKey::of::<Mailer>(),
                ServiceKey::of::<Database>(),
                ServiceKey::named::<Mailer>("smtp"),
            ]
        );
    }

    #[test]
    fn suggestions_for_near_names() {
        let mut registry = Registry::new();
        registry.register(descriptor(ServiceKey::of::<DatabasePool>(), Lifetime::Singleton));
        registry.register(descriptor(ServiceKey::of::<Mailer>(), Lifetime::Singleton));

        let suggestions = registry.suggestions_for(&ServiceKey::of::<Database>());
        assert_eq!(suggestions.len(), 1);
        assert!(suggestions[0].contains("DatabasePool"));
    }
}
