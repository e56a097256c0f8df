//! The provider: the built, validated container.
//!
//! A [`Provider`] is produced by
//! [`ServiceCollection::build_provider`](crate::collection::ServiceCollection::build_provider)
//! and is immutable from then on. It owns the singleton cache and the
//! disposables of everything built in its own context. Handles are cheap
//! to clone and share across threads.
//!
//! # Examples
//! ```rust
//! use std::sync::Arc;
//! use wasil_container::prelude::*;
//!
//! struct Config { name: &'static str }
//! struct Greeter { config: Arc<Config> }
//!
//! let provider = ServiceCollection::new()
//!     .add_singleton(Service::instance(Config { name: "wasil" }))
//!     .add_scoped(Service::factory(vec![Param::of::<Config>()], |args| {
//!         Ok(Greeter { config: args.take()? })
//!     }))
//!     .build_provider()
//!     .unwrap();
//!
//! let greeting = provider
//!     .scoped(|scope| Ok(format!("hello from {}", scope.resolve::<Greeter>()?.config.name)))
//!     .unwrap();
//! assert_eq!(greeting, "hello from wasil");
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tracing::{debug, info, warn};

use crate::cache::InstanceCache;
use crate::descriptor::{CreationStrategy, Instance, ServiceDescriptor};
use crate::dispose::DisposeBag;
use crate::error::{Result, WasilError};
use crate::graph::DependencyGraph;
use crate::key::ServiceKey;
use crate::lifetime::Lifetime;
use crate::options::ProviderOptions;
use crate::registry::Registry;
use crate::resolver::{Engine, Resolver, downcast};
use crate::scope::Scope;

#[cfg(feature = "async")]
use crate::resolver::BoxFuture;

/// Shared state behind every [`Provider`] handle.
pub(crate) struct ProviderCore {
    pub(crate) registry: Registry,
    pub(crate) graph: DependencyGraph,
    pub(crate) singletons: InstanceCache,
    pub(crate) disposables: DisposeBag,
    pub(crate) options: ProviderOptions,
    pub(crate) disposed: AtomicBool,
    next_scope_id: AtomicU64,
}

impl ProviderCore {
    fn dispose(&self) -> Result<()> {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        debug!(tracked = self.disposables.len(), "Disposing provider");
        let outcome = self.disposables.dispose_all();
        self.singletons.clear();
        outcome.map_err(WasilError::Disposal)
    }

    /// Singletons to build up front: dependencies first, skipping pre-built
    /// instances, and async ones unless `include_async`.
    fn eager_keys(&self, include_async: bool) -> Vec<ServiceKey> {
        self.graph
            .topological_order()
            .filter(|node| node.lifetime == Lifetime::Singleton)
            .filter(|node| include_async || !self.graph.needs_async(&node.key))
            .filter(|node| {
                !matches!(
                    self.registry.get(&node.key).map(|d| &d.strategy),
                    Some(CreationStrategy::FromInstance(_))
                )
            })
            .map(|node| node.key)
            .collect()
    }
}

impl Drop for ProviderCore {
    fn drop(&mut self) {
        if let Err(err) = self.dispose() {
            warn!(error = %err, "Provider dropped with failing disposables");
        }
    }
}

// ═══════════════════════════════════════════
// Provider
// ═══════════════════════════════════════════

/// Immutable, thread-safe service provider.
#[derive(Clone)]
pub struct Provider {
    pub(crate) core: Arc<ProviderCore>,
}

impl Provider {
    pub(crate) fn new(registry: Registry, graph: DependencyGraph, options: ProviderOptions) -> Self {
        Self {
            core: Arc::new(ProviderCore {
                registry,
                graph,
                singletons: InstanceCache::default(),
                disposables: DisposeBag::default(),
                options,
                disposed: AtomicBool::new(false),
                next_scope_id: AtomicU64::new(1),
            }),
        }
    }

    fn engine(&self) -> Engine<'_> {
        Engine::root(&self.core)
    }

    /// Builds every sync singleton in dependency order.
    pub(crate) fn build_eager_singletons(&self) -> Result<()> {
        let keys = self.core.eager_keys(false);
        debug!(count = keys.len(), "Building eager singletons");
        for key in keys {
            self.engine().resolve(key, None)?;
        }
        Ok(())
    }

    /// Builds every singleton in dependency order, awaiting async factories.
    #[cfg(feature = "async")]
    pub(crate) async fn build_eager_singletons_async(&self) -> Result<()> {
        let keys = self.core.eager_keys(true);
        debug!(count = keys.len(), "Building eager singletons");
        for key in keys {
            self.engine().resolve_async(key, None).await?;
        }
        Ok(())
    }

    /// Resolves `T`.
    ///
    /// # Errors
    /// - [`WasilError::Unresolvable`]: `T` is not registered
    /// - [`WasilError::InvalidLifetime`]: `T` (or a dependency) is scoped;
    ///   resolve it from a [`Scope`] instead
    /// - [`WasilError::AsyncFactoryRequired`]: use [`resolve_async`](Provider::resolve_async)
    /// - [`WasilError::Factory`] / [`WasilError::Constructor`]: user code failed
    pub fn resolve<T: Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        let key = ServiceKey::of::<T>();
        downcast(key, self.engine().resolve(key, None)?)
    }

    /// Resolves the registration of `T` named `name`.
    pub fn resolve_named<T: Send + Sync + 'static>(&self, name: &'static str) -> Result<Arc<T>> {
        let key = ServiceKey::named::<T>(name);
        downcast(key, self.engine().resolve(key, None)?)
    }

    /// Like [`resolve`](Provider::resolve), but `Ok(None)` when `T` is not
    /// registered.
    pub fn try_resolve<T: Send + Sync + 'static>(&self) -> Result<Option<Arc<T>>> {
        let key = ServiceKey::of::<T>();
        if !self.contains_key(&key) {
            return Ok(None);
        }
        downcast(key, self.engine().resolve(key, None)?).map(Some)
    }

    /// Resolves `T`, awaiting any async factory on the way.
    #[cfg(feature = "async")]
    pub async fn resolve_async<T: Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        let key = ServiceKey::of::<T>();
        downcast(key, self.engine().resolve_async(key, None).await?)
    }

    #[cfg(feature = "async")]
    pub async fn resolve_named_async<T: Send + Sync + 'static>(&self, name: &'static str) -> Result<Arc<T>> {
        let key = ServiceKey::named::<T>(name);
        downcast(key, self.engine().resolve_async(key, None).await?)
    }

    /// Opens a new scope. Scoped services resolved from it live until it is
    /// disposed or dropped.
    pub fn create_scope(&self) -> Scope<'_> {
        let id = self.core.next_scope_id.fetch_add(1, Ordering::Relaxed);
        debug!(scope = id, "Creating new scope");
        Scope::new(self, id)
    }

    /// Runs `f` inside a fresh scope and disposes it afterwards, whatever
    /// `f` returned.
    ///
    /// An error from `f` wins over a disposal error.
    pub fn scoped<R>(&self, f: impl FnOnce(&Scope<'_>) -> Result<R>) -> Result<R> {
        let scope = self.create_scope();
        let outcome = f(&scope);
        let disposal = scope.dispose();

        match (outcome, disposal) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(err)) => Err(err),
            (Err(err), disposal) => {
                if let Err(disposal) = disposal {
                    warn!(error = %disposal, "Scope disposal failed after an error");
                }
                Err(err)
            }
        }
    }

    pub fn contains<T: ?Sized + 'static>(&self) -> bool {
        self.contains_key(&ServiceKey::of::<T>())
    }

    pub fn descriptor(&self, key: &ServiceKey) -> Option<&ServiceDescriptor> {
        self.core.registry.get(key)
    }

    /// Every registered key, dependencies before their consumers.
    pub fn topological_order(&self) -> Vec<ServiceKey> {
        self.core.graph.topological_order().map(|node| node.key).collect()
    }

    pub fn options(&self) -> &ProviderOptions {
        &self.core.options
    }

    /// Number of registered services.
    pub fn len(&self) -> usize {
        self.core.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.core.registry.is_empty()
    }

    /// Tears down every disposable singleton, last built first. Afterwards
    /// every resolve fails with [`WasilError::ProviderDisposed`]. Transients
    /// resolved from the provider itself are not tracked; their caller owns
    /// them.
    ///
    /// Runs at most once, also on drop of the last handle. Failing hooks do
    /// not stop the rest; all failures are reported together.
    pub fn dispose(&self) -> Result<()> {
        self.core.dispose()
    }

    pub fn is_disposed(&self) -> bool {
        self.core.disposed.load(Ordering::Acquire)
    }
}

impl Resolver for Provider {
    fn resolve_key(&self, key: ServiceKey) -> Result<Instance> {
        self.engine().resolve(key, None)
    }

    fn contains_key(&self, key: &ServiceKey) -> bool {
        self.core.registry.contains(key)
    }

    #[cfg(feature = "async")]
    fn resolve_key_async<'a>(&'a self, key: ServiceKey) -> BoxFuture<'a, Result<Instance>> {
        self.engine().resolve_async(key, None)
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("registered", &self.core.registry.len())
            .field("singletons", &self.core.singletons.len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

pub(crate) fn log_built(provider: &Provider) {
    info!(
        registered = provider.len(),
        singletons = provider.core.singletons.len(),
        "Provider built"
    );
}
