//! Scopes: bounded units of work inside a provider.
//!
//! A [`Scope`] caches its own scoped instances and owns the disposables
//! of everything built in it (scoped services and transients resolved from
//! it). Singletons still come from the provider.
//!
//! Disposing a scope tears its disposables down in reverse construction
//! order. Dropping an undisposed scope does the same and logs any failures.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, warn};

use crate::cache::InstanceCache;
use crate::descriptor::Instance;
use crate::dispose::DisposeBag;
use crate::error::{Result, WasilError};
use crate::key::ServiceKey;
use crate::provider::Provider;
use crate::resolver::{Engine, Resolver, downcast};

#[cfg(feature = "async")]
use crate::resolver::BoxFuture;

pub(crate) struct ScopeCore {
    pub(crate) id: u64,
    pub(crate) cache: InstanceCache,
    pub(crate) disposables: DisposeBag,
    pub(crate) disposed: AtomicBool,
}

/// A child resolution context created by [`Provider::create_scope`].
///
/// # Examples
/// ```rust
/// use std::sync::Arc;
/// use wasil_container::prelude::*;
///
/// struct Transaction;
///
/// let provider = ServiceCollection::new()
///     .add_scoped(Service::factory(vec![], |_| Ok(Transaction)))
///     .build_provider()
///     .unwrap();
///
/// let scope = provider.create_scope();
/// let a = scope.resolve::<Transaction>().unwrap();
/// let b = scope.resolve::<Transaction>().unwrap();
/// assert!(Arc::ptr_eq(&a, &b));
/// scope.dispose().unwrap();
/// ```
pub struct Scope<'p> {
    provider: &'p Provider,
    core: ScopeCore,
}

impl<'p> Scope<'p> {
    pub(crate) fn new(provider: &'p Provider, id: u64) -> Self {
        Self {
            provider,
            core: ScopeCore {
                id,
                cache: InstanceCache::default(),
                disposables: DisposeBag::default(),
                disposed: AtomicBool::new(false),
            },
        }
    }

    fn engine(&self) -> Engine<'_> {
        Engine::scoped(&self.provider.core, &self.core)
    }

    /// Identifier unique within the provider, for logs.
    pub fn id(&self) -> u64 {
        self.core.id
    }

    pub fn provider(&self) -> &'p Provider {
        self.provider
    }

    pub fn resolve<T: Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        let key = ServiceKey::of::<T>();
        downcast(key, self.engine().resolve(key, None)?)
    }

    pub fn resolve_named<T: Send + Sync + 'static>(&self, name: &'static str) -> Result<Arc<T>> {
        let key = ServiceKey::named::<T>(name);
        downcast(key, self.engine().resolve(key, None)?)
    }

    /// `Ok(None)` when `T` is not registered.
    pub fn try_resolve<T: Send + Sync + 'static>(&self) -> Result<Option<Arc<T>>> {
        let key = ServiceKey::of::<T>();
        if !self.contains_key(&key) {
            return Ok(None);
        }
        downcast(key, self.engine().resolve(key, None)?).map(Some)
    }

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

    /// Tears down this scope's disposables, last built first. Afterwards
    /// every resolve from this scope fails with [`WasilError::ScopeDisposed`].
    ///
    /// Calling it again is a no-op. Failing hooks do not stop the rest;
    /// all failures are reported together.
    pub fn dispose(&self) -> Result<()> {
        if self.core.disposed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        debug!(scope = self.core.id, tracked = self.core.disposables.len(), "Disposing scope");
        let outcome = self.core.disposables.dispose_all();
        self.core.cache.clear();
        outcome.map_err(WasilError::Disposal)
    }

    pub fn is_disposed(&self) -> bool {
        self.core.disposed.load(Ordering::Acquire)
    }
}

impl Drop for Scope<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.dispose() {
            warn!(scope = self.core.id, error = %err, "Scope dropped with failing disposables");
        }
    }
}

impl Resolver for Scope<'_> {
    fn resolve_key(&self, key: ServiceKey) -> Result<Instance> {
        self.engine().resolve(key, None)
    }

    fn contains_key(&self, key: &ServiceKey) -> bool {
        self.provider.core.registry.contains(key)
    }

    #[cfg(feature = "async")]
    fn resolve_key_async<'a>(&'a self, key: ServiceKey) -> BoxFuture<'a, Result<Instance>> {
        self.engine().resolve_async(key, None)
    }
}

impl fmt::Debug for Scope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.core.id)
            .field("instances", &self.core.cache.len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
