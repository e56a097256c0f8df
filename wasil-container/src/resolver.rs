//! Resolution engine.
//!
//! # Architecture
//! ```text
//! Provider / Scope ──resolve()──> Engine { root, scope }
//!                                    │
//!                       Singleton ───┼──> provider cache (root context)
//!                       Scoped ──────┼──> scope cache
//!                       Transient ───┴──> construct, never cached
//! ```
//!
//! Every construction resolves its parameters recursively in the same
//! context, then runs the creation strategy. The chain of keys being
//! resolved travels down the call stack; it names the consumers in
//! construction errors and catches cycles introduced at runtime through
//! the [`Resolver`] handed to factories.

use std::any::type_name;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use tracing::{debug, trace};

use crate::args::Args;
use crate::cache::{Acquired, InstanceCache};
use crate::descriptor::{CreationStrategy, FactoryFn, Instance, ServiceDescriptor};
use crate::error::{
    CircularDependencyError, ConstructionError, InvalidLifetimeError, Result, UnresolvableTypeError, WasilError,
};
use crate::graph::{Node, NodeParam};
use crate::key::ServiceKey;
use crate::lifetime::Lifetime;
use crate::provider::ProviderCore;
use crate::scope::ScopeCore;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

// ═══════════════════════════════════════════
// Resolver trait
// ═══════════════════════════════════════════

/// Type-erased access to a resolution context.
///
/// Implemented by [`Provider`](crate::provider::Provider),
/// [`Scope`](crate::scope::Scope) and the resolver a factory receives
/// through [`Args::resolver`]. Typed helpers live on [`ResolverExt`].
pub trait Resolver: Send + Sync {
    /// Resolves the service registered under `key`.
    fn resolve_key(&self, key: ServiceKey) -> Result<Instance>;

    /// Whether `key` is registered.
    fn contains_key(&self, key: &ServiceKey) -> bool;

    /// Resolves `key`, awaiting async factories on the way.
    #[cfg(feature = "async")]
    fn resolve_key_async<'a>(&'a self, key: ServiceKey) -> BoxFuture<'a, Result<Instance>>;
}

/// Typed resolution on top of any [`Resolver`].
///
/// # Examples
/// ```rust
/// use std::sync::Arc;
/// use wasil_container::prelude::*;
///
/// struct Clock;
/// struct Audit { clock: Option<Arc<Clock>> }
///
/// let provider = ServiceCollection::new()
///     .add_transient(Service::factory(vec![Param::context()], |args| {
///         let resolver = args.resolver()?;
///         Ok(Audit { clock: resolver.try_resolve::<Clock>()? })
///     }))
///     .build_provider()
///     .unwrap();
///
/// assert!(provider.resolve::<Audit>().unwrap().clock.is_none());
/// ```
pub trait ResolverExt: Resolver {
    fn resolve<T: Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        let key = ServiceKey::of::<T>();
        downcast(key, self.resolve_key(key)?)
    }

    fn resolve_named<T: Send + Sync + 'static>(&self, name: &'static str) -> Result<Arc<T>> {
        let key = ServiceKey::named::<T>(name);
        downcast(key, self.resolve_key(key)?)
    }

    /// `Ok(None)` when `T` is not registered.
    fn try_resolve<T: Send + Sync + 'static>(&self) -> Result<Option<Arc<T>>> {
        let key = ServiceKey::of::<T>();
        if !self.contains_key(&key) {
            return Ok(None);
        }
        downcast(key, self.resolve_key(key)?).map(Some)
    }

    #[cfg(feature = "async")]
    fn resolve_async<T: Send + Sync + 'static>(&self) -> impl Future<Output = Result<Arc<T>>> + Send + '_ {
        let key = ServiceKey::of::<T>();
        async move { downcast(key, self.resolve_key_async(key).await?) }
    }
}

impl<R: Resolver + ?Sized> ResolverExt for R {}

pub(crate) fn downcast<T: Send + Sync + 'static>(key: ServiceKey, instance: Instance) -> Result<Arc<T>> {
    instance.downcast::<T>().map_err(|_| WasilError::TypeMismatch {
        key,
        expected: type_name::<T>(),
    })
}

// ═══════════════════════════════════════════
// Resolution chain
// ═══════════════════════════════════════════

/// Keys currently being resolved on this call path, innermost first.
#[derive(Clone, Copy)]
pub(crate) struct Chain<'c> {
    key: ServiceKey,
    parent: Option<&'c Chain<'c>>,
}

impl Chain<'_> {
    fn contains(&self, key: &ServiceKey) -> bool {
        let mut link = Some(self);
        while let Some(chain) = link {
            if chain.key == *key {
                return true;
            }
            link = chain.parent;
        }
        false
    }

    /// Keys outermost first.
    fn keys(&self) -> Vec<ServiceKey> {
        let mut keys = Vec::new();
        let mut link = Some(self);
        while let Some(chain) = link {
            keys.push(chain.key);
            link = chain.parent;
        }
        keys.reverse();
        keys
    }
}

// ═══════════════════════════════════════════
// Engine
// ═══════════════════════════════════════════

/// One resolution context: the provider, plus the active scope if any.
#[derive(Clone, Copy)]
pub(crate) struct Engine<'a> {
    root: &'a ProviderCore,
    scope: Option<&'a ScopeCore>,
}

impl<'a> Engine<'a> {
    pub(crate) fn root(root: &'a ProviderCore) -> Self {
        Self { root, scope: None }
    }

    pub(crate) fn scoped(root: &'a ProviderCore, scope: &'a ScopeCore) -> Self {
        Self {
            root,
            scope: Some(scope),
        }
    }

    /// Singletons are always built and cached in the provider context.
    fn singleton_context(self) -> Self {
        Self::root(self.root)
    }

    fn ensure_alive(&self) -> Result<()> {
        if let Some(scope) = self.scope {
            if scope.disposed.load(Ordering::Acquire) {
                return Err(WasilError::ScopeDisposed);
            }
        }
        if self.root.disposed.load(Ordering::Acquire) {
            return Err(WasilError::ProviderDisposed);
        }
        Ok(())
    }

    /// Finds the descriptor and graph node for `key`, refusing keys that
    /// are already being resolved on this path.
    fn lookup(&self, key: ServiceKey, parent: Option<&Chain<'_>>) -> Result<(&'a ServiceDescriptor, &'a Node)> {
        let root = self.root;
        let (Some(descriptor), Some(node)) = (root.registry.get(&key), root.graph.node(&key)) else {
            return Err(WasilError::Unresolvable(UnresolvableTypeError {
                requested: key,
                required_by: parent.map(|chain| chain.key),
                suggestions: root.registry.suggestions_for(&key),
            }));
        };

        if let Some(parent) = parent {
            if parent.contains(&key) {
                let mut chain = parent.keys();
                chain.push(key);
                return Err(WasilError::CircularDependency(CircularDependencyError { chain }));
            }
        }

        Ok((descriptor, node))
    }

    fn scope_for(&self, key: ServiceKey, parent: Option<&Chain<'_>>) -> Result<&'a ScopeCore> {
        self.scope.ok_or_else(|| {
            WasilError::InvalidLifetime(InvalidLifetimeError::ScopedWithoutScope {
                key,
                required_by: parent.map(|chain| chain.key),
            })
        })
    }

    /// Hands a freshly built instance to its owner. Fails when the owner
    /// was disposed while the instance was being built; a disposable is
    /// then torn down before returning.
    ///
    /// Transients resolved without a scope are not tracked.
    fn adopt(&self, descriptor: &ServiceDescriptor, instance: &Instance) -> Result<()> {
        let owner = match (descriptor.lifetime, self.scope) {
            (Lifetime::Singleton, _) => Some((&self.root.disposables, WasilError::ProviderDisposed)),
            (Lifetime::Scoped | Lifetime::Transient, Some(scope)) => {
                Some((&scope.disposables, WasilError::ScopeDisposed))
            }
            (Lifetime::Transient, None) => None,
            // Rejected by `scope_for` before anything is built.
            (Lifetime::Scoped, None) => None,
        };

        if let (Some(disposer), Some((bag, closed))) = (descriptor.disposer, owner) {
            if !bag.push(descriptor.key, instance.clone(), disposer) {
                return Err(closed);
            }
        }
        self.ensure_alive()
    }

    // ── Sync ──

    pub(crate) fn resolve(self, key: ServiceKey, parent: Option<&Chain<'_>>) -> Result<Instance> {
        self.ensure_alive()?;
        let (descriptor, node) = self.lookup(key, parent)?;

        if let CreationStrategy::FromInstance(instance) = &descriptor.strategy {
            return Ok(instance.clone());
        }
        if self.root.graph.needs_async(&key) {
            return Err(WasilError::AsyncFactoryRequired { key });
        }

        trace!(key = %key, lifetime = %descriptor.lifetime, "Resolving");
        let chain = Chain { key, parent };

        match descriptor.lifetime {
            Lifetime::Singleton => {
                let engine = self.singleton_context();
                engine.cached(&self.root.singletons, descriptor, node, &chain)
            }
            Lifetime::Scoped => {
                let scope = self.scope_for(key, parent)?;
                self.cached(&scope.cache, descriptor, node, &chain)
            }
            Lifetime::Transient => {
                let instance = self.construct(descriptor, node, &chain)?;
                self.adopt(descriptor, &instance)?;
                Ok(instance)
            }
        }
    }

    fn cached(
        self,
        cache: &InstanceCache,
        descriptor: &ServiceDescriptor,
        node: &Node,
        chain: &Chain<'_>,
    ) -> Result<Instance> {
        if let Some(instance) = cache.get(&descriptor.key) {
            return Ok(instance);
        }

        match cache.acquire(descriptor.key) {
            Acquired::Ready(instance) => Ok(instance),
            Acquired::Claimed(claim) => {
                let instance = self.construct(descriptor, node, chain)?;
                self.adopt(descriptor, &instance)?;
                claim.fulfill(instance.clone());
                Ok(instance)
            }
        }
    }

    fn construct(self, descriptor: &ServiceDescriptor, node: &Node, chain: &Chain<'_>) -> Result<Instance> {
        let resolver = ContextResolver { engine: self, chain };
        let mut args = Args::new(wants_context(node).then_some(&resolver as &dyn Resolver));

        for param in &node.params {
            if let NodeParam::Dependency(edge) = param {
                let value = if edge.met {
                    Some(self.resolve(edge.dependency, Some(chain))?)
                } else {
                    None
                };
                args.push(edge.dependency, value);
            }
        }

        debug!(key = %descriptor.key, lifetime = %descriptor.lifetime, "Constructing service");
        match &descriptor.strategy {
            CreationStrategy::FromConstructor { construct, .. } => construct
                .construct(&mut args)
                .map_err(|source| WasilError::Constructor(failure(chain, source))),
            CreationStrategy::FromFactory {
                factory: FactoryFn::Sync(factory),
                ..
            } => factory
                .construct(&mut args)
                .map_err(|source| WasilError::Factory(failure(chain, source))),
            #[cfg(feature = "async")]
            CreationStrategy::FromFactory {
                factory: FactoryFn::Async(_),
                ..
            } => Err(WasilError::AsyncFactoryRequired { key: descriptor.key }),
            CreationStrategy::FromInstance(instance) => Ok(instance.clone()),
        }
    }

    // ── Async ──

    /// Resolves `key`, awaiting async factories. Services that need no
    /// async factory take the sync path.
    #[cfg(feature = "async")]
    pub(crate) fn resolve_async<'c>(self, key: ServiceKey, parent: Option<&'c Chain<'c>>) -> BoxFuture<'c, Result<Instance>>
    where
        'a: 'c,
    {
        Box::pin(async move {
            self.ensure_alive()?;
            let (descriptor, node) = self.lookup(key, parent)?;

            if !self.root.graph.needs_async(&key) {
                return self.resolve(key, parent);
            }

            trace!(key = %key, lifetime = %descriptor.lifetime, "Resolving async");
            let chain = Chain { key, parent };

            match descriptor.lifetime {
                Lifetime::Singleton => {
                    let engine = self.singleton_context();
                    engine
                        .cached_async(&self.root.singletons, descriptor, node, &chain)
                        .await
                }
                Lifetime::Scoped => {
                    let scope = self.scope_for(key, parent)?;
                    self.cached_async(&scope.cache, descriptor, node, &chain).await
                }
                Lifetime::Transient => {
                    let instance = self.construct_async(descriptor, node, &chain).await?;
                    self.adopt(descriptor, &instance)?;
                    Ok(instance)
                }
            }
        })
    }

    #[cfg(feature = "async")]
    async fn cached_async(
        self,
        cache: &InstanceCache,
        descriptor: &ServiceDescriptor,
        node: &Node,
        chain: &Chain<'_>,
    ) -> Result<Instance> {
        if let Some(instance) = cache.get(&descriptor.key) {
            return Ok(instance);
        }

        match cache.acquire_async(descriptor.key).await {
            Acquired::Ready(instance) => Ok(instance),
            Acquired::Claimed(claim) => {
                let instance = self.construct_async(descriptor, node, chain).await?;
                self.adopt(descriptor, &instance)?;
                claim.fulfill(instance.clone());
                Ok(instance)
            }
        }
    }

    #[cfg(feature = "async")]
    async fn construct_async(self, descriptor: &ServiceDescriptor, node: &Node, chain: &Chain<'_>) -> Result<Instance> {
        let mut values = Vec::with_capacity(node.params.len());
        for param in &node.params {
            if let NodeParam::Dependency(edge) = param {
                let value = if edge.met {
                    Some(self.resolve_async(edge.dependency, Some(chain)).await?)
                } else {
                    None
                };
                values.push((edge.dependency, value));
            }
        }

        let resolver = ContextResolver { engine: self, chain };
        let mut args = Args::new(wants_context(node).then_some(&resolver as &dyn Resolver));
        for (key, value) in values {
            args.push(key, value);
        }

        debug!(key = %descriptor.key, lifetime = %descriptor.lifetime, "Constructing service");
        match &descriptor.strategy {
            CreationStrategy::FromFactory {
                factory: FactoryFn::Async(factory),
                ..
            } => factory
                .construct(args)
                .await
                .map_err(|source| WasilError::Factory(failure(chain, source))),
            CreationStrategy::FromFactory {
                factory: FactoryFn::Sync(factory),
                ..
            } => factory
                .construct(&mut args)
                .map_err(|source| WasilError::Factory(failure(chain, source))),
            CreationStrategy::FromConstructor { construct, .. } => construct
                .construct(&mut args)
                .map_err(|source| WasilError::Constructor(failure(chain, source))),
            CreationStrategy::FromInstance(instance) => Ok(instance.clone()),
        }
    }
}

fn wants_context(node: &Node) -> bool {
    node.params.iter().any(|param| matches!(param, NodeParam::Context))
}

fn failure(chain: &Chain<'_>, source: crate::error::BoxError) -> ConstructionError {
    ConstructionError {
        chain: chain.keys(),
        source,
    }
}

// ═══════════════════════════════════════════
// ContextResolver (handed to factories)
// ═══════════════════════════════════════════

/// The resolver a factory receives. Resolves in the factory's own context
/// and keeps extending its resolution chain.
struct ContextResolver<'a, 'c> {
    engine: Engine<'a>,
    chain: &'c Chain<'c>,
}

impl Resolver for ContextResolver<'_, '_> {
    fn resolve_key(&self, key: ServiceKey) -> Result<Instance> {
        self.engine.resolve(key, Some(self.chain))
    }

    fn contains_key(&self, key: &ServiceKey) -> bool {
        self.engine.root.registry.contains(key)
    }

    #[cfg(feature = "async")]
    fn resolve_key_async<'s>(&'s self, key: ServiceKey) -> BoxFuture<'s, Result<Instance>> {
        let engine: Engine<'s> = self.engine;
        let chain: &'s Chain<'s> = self.chain;
        engine.resolve_async(key, Some(chain))
    }
}
