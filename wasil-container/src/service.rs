//! Typed service definitions.
//!
//! [`Service<T>`] is how registrations are written: pick a strategy
//! (instance, constructor, factory, async factory), optionally a name and
//! a teardown hook, then hand it to
//! [`ServiceCollection::add_singleton`](crate::collection::ServiceCollection::add_singleton)
//! and friends, which supply the lifetime.
//!
//! # Examples
//! ```rust
//! use std::sync::Arc;
//! use wasil_container::prelude::*;
//!
//! struct Config;
//! struct Repo { config: Arc<Config> }
//!
//! impl Injectable for Repo {
//!     fn params() -> Vec<Param> {
//!         vec![Param::of::<Config>()]
//!     }
//!
//!     fn construct(args: &mut Args<'_>) -> Result<Self, BoxError> {
//!         Ok(Repo { config: args.take()? })
//!     }
//! }
//!
//! let provider = ServiceCollection::new()
//!     .add_singleton(Service::instance(Config))
//!     .add_transient(Service::<Repo>::constructor())
//!     .build_provider()
//!     .unwrap();
//!
//! let repo = provider.resolve::<Repo>().unwrap();
//! let config = provider.resolve::<Config>().unwrap();
//! assert!(Arc::ptr_eq(&repo.config, &config));
//! ```

use std::marker::PhantomData;
use std::sync::Arc;

#[cfg(feature = "async")]
use std::future::Future;

use crate::args::Args;
use crate::descriptor::{Construct, CreationStrategy, Definition, FactoryFn, Instance, Param};
use crate::dispose::{Dispose, disposer_for};
use crate::error::BoxError;
use crate::key::ServiceKey;

#[cfg(feature = "async")]
use crate::descriptor::AsyncConstruct;
#[cfg(feature = "async")]
use crate::resolver::BoxFuture;

/// A type the container can build from its declared parameters.
///
/// Usually derived with `#[derive(Injectable)]`; implement it by hand when
/// construction needs logic.
pub trait Injectable: Sized + Send + Sync + 'static {
    /// The constructor's parameters, in the order `construct` takes them.
    fn params() -> Vec<Param>;

    fn construct(args: &mut Args<'_>) -> Result<Self, BoxError>;
}

/// An awaited factory for `T`.
///
/// Implemented for every `Fn(Args<'_>) -> impl Future<Output = Result<T, BoxError>>`
/// whose future does not borrow the arguments; take what you need from
/// `args` before the `async move` block.
#[cfg(feature = "async")]
#[async_trait::async_trait]
pub trait AsyncFactory<T>: Send + Sync + 'static {
    async fn create(&self, args: Args<'_>) -> Result<T, BoxError>;
}

#[cfg(feature = "async")]
#[async_trait::async_trait]
impl<T, F, Fut> AsyncFactory<T> for F
where
    T: Send + 'static,
    F: Fn(Args<'_>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, BoxError>> + Send + 'static,
{
    async fn create(&self, args: Args<'_>) -> Result<T, BoxError> {
        (self)(args).await
    }
}

struct ConstructorAdapter<T>(PhantomData<fn() -> T>);

impl<T: Injectable> Construct for ConstructorAdapter<T> {
    fn construct(&self, args: &mut Args<'_>) -> Result<Instance, BoxError> {
        T::construct(args).map(|value| Arc::new(value) as Instance)
    }
}

struct FactoryAdapter<T, F> {
    factory: F,
    _marker: PhantomData<fn() -> T>,
}

impl<T, F> Construct for FactoryAdapter<T, F>
where
    T: Send + Sync + 'static,
    F: Fn(&mut Args<'_>) -> Result<T, BoxError> + Send + Sync,
{
    fn construct(&self, args: &mut Args<'_>) -> Result<Instance, BoxError> {
        (self.factory)(args).map(|value| Arc::new(value) as Instance)
    }
}

#[cfg(feature = "async")]
struct AsyncAdapter<T, F> {
    factory: F,
    _marker: PhantomData<fn() -> T>,
}

#[cfg(feature = "async")]
impl<T, F> AsyncConstruct for AsyncAdapter<T, F>
where
    T: Send + Sync + 'static,
    F: AsyncFactory<T>,
{
    fn construct<'a>(&'a self, args: Args<'a>) -> BoxFuture<'a, Result<Instance, BoxError>> {
        Box::pin(async move {
            let value = self.factory.create(args).await?;
            Ok(Arc::new(value) as Instance)
        })
    }
}

/// A typed service definition, waiting for a lifetime.
pub struct Service<T> {
    definition: Definition,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> Service<T> {
    fn with_strategy(strategy: CreationStrategy) -> Self {
        Self {
            definition: Definition {
                key: ServiceKey::of::<T>(),
                strategy,
                disposer: None,
            },
            _marker: PhantomData,
        }
    }

    /// A value built ahead of time. Only valid as a singleton.
    pub fn instance(value: T) -> Self {
        Self::shared(Arc::new(value))
    }

    /// Like [`instance`](Service::instance), keeping the caller's `Arc` so
    /// resolutions return the very same allocation.
    pub fn shared(value: Arc<T>) -> Self {
        Self::with_strategy(CreationStrategy::FromInstance(value))
    }

    /// Built by `T`'s [`Injectable`] constructor.
    pub fn constructor() -> Self
    where
        T: Injectable,
    {
        Self::with_strategy(CreationStrategy::FromConstructor {
            params: T::params(),
            construct: Arc::new(ConstructorAdapter::<T>(PhantomData)),
        })
    }

    /// Built by `factory` from the declared `params`.
    pub fn factory<F>(params: Vec<Param>, factory: F) -> Self
    where
        F: Fn(&mut Args<'_>) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        Self::with_strategy(CreationStrategy::FromFactory {
            params,
            factory: FactoryFn::Sync(Arc::new(FactoryAdapter {
                factory,
                _marker: PhantomData,
            })),
        })
    }

    /// Built by an awaited factory closure. Services depending on it must
    /// be resolved with `resolve_async`.
    #[cfg(feature = "async")]
    pub fn async_factory<F, Fut>(params: Vec<Param>, factory: F) -> Self
    where
        F: Fn(Args<'_>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, BoxError>> + Send + 'static,
    {
        Self::async_factory_with(params, factory)
    }

    /// Built by an [`AsyncFactory`] implementation.
    #[cfg(feature = "async")]
    pub fn async_factory_with<F>(params: Vec<Param>, factory: F) -> Self
    where
        F: AsyncFactory<T>,
    {
        Self::with_strategy(CreationStrategy::FromFactory {
            params,
            factory: FactoryFn::Async(Arc::new(AsyncAdapter {
                factory,
                _marker: PhantomData,
            })),
        })
    }

    /// Registers under a named key, so several registrations of `T` can
    /// coexist.
    pub fn named(mut self, name: &'static str) -> Self {
        self.definition.key = self.definition.key.with_name(name);
        self
    }

    /// Tracks constructed instances for teardown.
    pub fn disposable(mut self) -> Self
    where
        T: Dispose,
    {
        self.definition.disposer = Some(disposer_for::<T>());
        self
    }

    pub fn key(&self) -> ServiceKey {
        self.definition.key
    }

    pub fn into_definition(self) -> Definition {
        self.definition
    }
}

impl<T> From<Service<T>> for Definition {
    fn from(service: Service<T>) -> Self {
        service.definition
    }
}
