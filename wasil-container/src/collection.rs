//! Service registration and provider construction.
//!
//! # Architecture
//! ```text
//! ServiceCollection ──build_provider()──> Provider
//!        │                                   │
//!   add_singleton()                    create_scope()
//!   add_scoped()                             │
//!   add_transient()                          ▼
//!   add_module()                           Scope
//! ```
//!
//! `build_provider()` derives the dependency graph, validates it, and
//! (by default) builds every singleton up front. A provider that comes out
//! of it is graph-valid: missing registrations, cycles, captive
//! dependencies and bad parameter annotations are all reported here.

use tracing::{debug, info, instrument};

use crate::descriptor::Definition;
use crate::error::{AlreadyRegisteredError, Result, WasilError};
use crate::graph::DependencyGraph;
use crate::key::ServiceKey;
use crate::lifetime::Lifetime;
use crate::module::{ModuleRegistry, ServiceModule};
use crate::options::ProviderOptions;
use crate::provider::{Provider, log_built};
use crate::registry::Registry;
use crate::validate::validate;

/// Collects service registrations and builds a [`Provider`].
///
/// Registration methods take and return `self`, so a whole application can
/// be wired in one expression.
///
/// # Examples
/// ```rust
/// use wasil_container::prelude::*;
///
/// struct Config { pool_size: usize }
/// struct Pool { size: usize }
///
/// let provider = ServiceCollection::new()
///     .add_singleton(Service::instance(Config { pool_size: 4 }))
///     .add_singleton(Service::factory(vec![Param::of::<Config>()], |args| {
///         Ok(Pool { size: args.take::<Config>()?.pool_size })
///     }))
///     .build_provider()
///     .unwrap();
///
/// assert_eq!(provider.resolve::<Pool>().unwrap().size, 4);
/// ```
#[derive(Debug, Default)]
pub struct ServiceCollection {
    registry: Registry,
    options: ProviderOptions,
    /// Keys registered more than once, in the order it happened.
    duplicates: Vec<ServiceKey>,
}

impl ServiceCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(mut self, options: ProviderOptions) -> Self {
        self.options = options;
        self
    }

    /// Whether a later registration of a key replaces an earlier one
    /// (default) or fails the build.
    pub fn allow_override(mut self, allow: bool) -> Self {
        self.options.allow_override = allow;
        self
    }

    /// Whether singletons are built during `build_provider` (default) or on
    /// first resolve.
    pub fn eager_singletons(mut self, eager: bool) -> Self {
        self.options.eager_singletons = eager;
        self
    }

    /// Registers `definition` with `lifetime`.
    pub fn add(mut self, lifetime: Lifetime, definition: impl Into<Definition>) -> Self {
        self.insert(lifetime, definition.into());
        self
    }

    pub fn add_singleton(self, definition: impl Into<Definition>) -> Self {
        self.add(Lifetime::Singleton, definition)
    }

    pub fn add_scoped(self, definition: impl Into<Definition>) -> Self {
        self.add(Lifetime::Scoped, definition)
    }

    pub fn add_transient(self, definition: impl Into<Definition>) -> Self {
        self.add(Lifetime::Transient, definition)
    }

    /// Registers every definition with the same lifetime, in order.
    pub fn register_many<D>(mut self, definitions: impl IntoIterator<Item = D>, lifetime: Lifetime) -> Self
    where
        D: Into<Definition>,
    {
        for definition in definitions {
            self.insert(lifetime, definition.into());
        }
        self
    }

    /// Lets `module` register its services.
    pub fn add_module(mut self, module: &dyn ServiceModule) -> Self {
        debug!(module = module.name(), "Registering module");
        module.register(&mut self);
        self
    }

    pub fn contains(&self, key: &ServiceKey) -> bool {
        self.registry.contains(key)
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    fn insert(&mut self, lifetime: Lifetime, definition: Definition) {
        let key = definition.key;
        if self.registry.register(definition.with_lifetime(lifetime)).is_some() {
            debug!(key = %key, "Registration replaced");
            self.duplicates.push(key);
        }
    }

    /// Validates the registrations and builds the provider.
    ///
    /// With eager singletons on, every singleton is built here in
    /// dependency order. Singletons that need an async factory are left
    /// for [`Provider::resolve_async`]; use
    /// [`build_provider_async`](ServiceCollection::build_provider_async)
    /// to build those up front too.
    ///
    /// # Errors
    /// - [`WasilError::AlreadyRegistered`]: duplicate key with overrides off
    /// - [`WasilError::Unresolvable`]: a required dependency is not registered
    /// - [`WasilError::TypeAnnotation`]: a by-name parameter cannot be resolved
    /// - [`WasilError::CircularDependency`]: cycle detected
    /// - [`WasilError::InvalidLifetime`]: captive dependency, or an instance
    ///   registered with a non-singleton lifetime
    /// - [`WasilError::Factory`] / [`WasilError::Constructor`]: an eager
    ///   singleton failed to build
    #[instrument(skip(self), name = "provider_build")]
    pub fn build_provider(self) -> Result<Provider> {
        let provider = self.assemble()?;
        if provider.options().eager_singletons {
            provider.build_eager_singletons()?;
        }
        log_built(&provider);
        Ok(provider)
    }

    /// Like [`build_provider`](ServiceCollection::build_provider), but
    /// eager construction also awaits async factories.
    #[cfg(feature = "async")]
    #[instrument(skip(self), name = "provider_build")]
    pub async fn build_provider_async(self) -> Result<Provider> {
        let provider = self.assemble()?;
        if provider.options().eager_singletons {
            provider.build_eager_singletons_async().await?;
        }
        log_built(&provider);
        Ok(provider)
    }

    fn assemble(self) -> Result<Provider> {
        info!(registered = self.registry.len(), "Building provider");

        if !self.options.allow_override {
            if let Some(&key) = self.duplicates.first() {
                return Err(WasilError::AlreadyRegistered(AlreadyRegisteredError { key }));
            }
        }

        let mut graph = DependencyGraph::build(&self.registry)?;
        let order = validate(&graph)?;
        graph.seal(order);

        Ok(Provider::new(self.registry, graph, self.options))
    }
}

impl ModuleRegistry for ServiceCollection {
    fn register(&mut self, lifetime: Lifetime, definition: Definition) {
        self.insert(lifetime, definition);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Param;
    use crate::error::{BoxError, InvalidLifetimeError};
    use crate::service::Service;
    use std::sync::Arc;

    #[derive(Debug)]
    struct Config(u32);
    #[derive(Debug)]
    struct Repo;

    #[test]
    fn last_registration_wins_by_default() {
        let provider = ServiceCollection::new()
            .add_singleton(Service::instance(Config(1)))
            .add_singleton(Service::instance(Config(2)))
            .build_provider()
            .unwrap();

        assert_eq!(provider.len(), 1);
        assert_eq!(provider.resolve::<Config>().unwrap().0, 2);
    }

    #[test]
    fn duplicates_fail_when_overrides_are_off() {
        let result = ServiceCollection::new()
            .allow_override(false)
            .add_singleton(Service::instance(Config(1)))
            .add_singleton(Service::instance(Config(2)))
            .build_provider();

        match result.unwrap_err() {
            WasilError::AlreadyRegistered(err) => assert_eq!(err.key, ServiceKey::of::<Config>()),
            other => panic!("Expected AlreadyRegistered, got: {other:?}"),
        }
    }

    #[test]
    fn named_registrations_coexist() {
        let provider = ServiceCollection::new()
            .allow_override(false)
            .add_singleton(Service::instance(Config(1)).named("primary"))
            .add_singleton(Service::instance(Config(2)).named("replica"))
            .build_provider()
            .unwrap();

        assert_eq!(provider.resolve_named::<Config>("primary").unwrap().0, 1);
        assert_eq!(provider.resolve_named::<Config>("replica").unwrap().0, 2);
    }

    #[test]
    fn register_many_uses_one_lifetime() {
        let definitions: Vec<Definition> = vec![
            Service::instance(Config(1)).named("a").into(),
            Service::instance(Config(2)).named("b").into(),
        ];
        let collection = ServiceCollection::new().register_many(definitions, Lifetime::Singleton);

        assert_eq!(collection.len(), 2);
        assert!(
            collection
                .registry()
                .all()
                .iter()
                .all(|d| d.lifetime == Lifetime::Singleton)
        );
    }

    #[test]
    fn instance_with_scoped_lifetime_is_rejected() {
        let result = ServiceCollection::new().add_scoped(Service::instance(Config(1))).build_provider();
        assert!(matches!(
            result,
            Err(WasilError::InvalidLifetime(InvalidLifetimeError::InstanceNotSingleton { .. }))
        ));
    }

    #[test]
    fn eager_singleton_failure_surfaces_at_build() {
        let result = ServiceCollection::new()
            .add_singleton(Service::factory(vec![], |_| Err::<Repo, BoxError>("database unreachable".into())))
            .build_provider();

        let err = result.unwrap_err();
        assert!(matches!(err, WasilError::Factory(_)));
        assert!(err.to_string().contains("database unreachable"));
    }

    #[test]
    fn lazy_singletons_wait_for_first_resolve() {
        let provider = ServiceCollection::new()
            .eager_singletons(false)
            .add_singleton(Service::factory(vec![], |_| Err::<Repo, BoxError>("database unreachable".into())))
            .build_provider()
            .unwrap();

        assert!(provider.resolve::<Repo>().is_err());
    }

    #[test]
    fn missing_dependency_is_reported_at_build() {
        let result = ServiceCollection::new()
            .add_transient(Service::factory(vec![Param::of::<Config>()], |_| Ok(Repo)))
            .build_provider();
        assert!(matches!(result, Err(WasilError::Unresolvable(_))));
    }

    #[test]
    fn options_round_trip_through_collection() {
        let options = ProviderOptions {
            eager_singletons: false,
            allow_override: false,
        };
        let provider = ServiceCollection::new().with_options(options).build_provider().unwrap();
        assert_eq!(*provider.options(), options);
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn async_build_constructs_async_singletons() {
        let provider = ServiceCollection::new()
            .add_singleton(Service::async_factory(vec![], |_| async { Ok::<_, BoxError>(Config(7)) }))
            .add_transient(Service::factory(vec![Param::of::<Config>()], |_| Ok(Repo)))
            .build_provider_async()
            .await
            .unwrap();

        let config = provider.resolve_async::<Config>().await.unwrap();
        assert_eq!(config.0, 7);
        assert!(Arc::ptr_eq(&config, &provider.resolve_async::<Config>().await.unwrap()));
    }

    #[cfg(feature = "async")]
    #[test]
    fn sync_resolve_of_async_dependency_is_refused() {
        let provider = ServiceCollection::new()
            .add_singleton(Service::async_factory(vec![], |_| async { Ok::<_, BoxError>(Config(7)) }))
            .add_transient(Service::factory(vec![Param::of::<Config>()], |_| Ok(Repo)))
            .build_provider()
            .unwrap();

        match provider.resolve::<Repo>().unwrap_err() {
            WasilError::AsyncFactoryRequired { key } => assert_eq!(key, ServiceKey::of::<Repo>()),
            other => panic!("Expected AsyncFactoryRequired, got: {other:?}"),
        }
    }
}
