//! Service descriptors: what a registration says about a service.
//!
//! A [`ServiceDescriptor`] is `{key, lifetime, strategy}`. The strategy
//! declares its parameters as typed [`Param`] metadata, so the graph can be
//! derived at build time without looking inside construction code.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::args::Args;
use crate::dispose::Disposer;
use crate::error::BoxError;
use crate::key::ServiceKey;
use crate::lifetime::Lifetime;

/// A type-erased, shareable service instance.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// How a parameter names the type it needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    /// A concrete key, checked by the compiler.
    Key(ServiceKey),
    /// A type referenced by name (full path or short name), looked up in
    /// the registry at build time.
    Deferred(&'static str),
}

/// One declared parameter of a constructor or factory.
///
/// # Examples
/// ```
/// use wasil_container::descriptor::Param;
///
/// struct Config;
/// struct Clock;
///
/// let params = vec![
///     Param::of::<Config>(),
///     Param::optional::<Clock>(),
///     Param::context(),
/// ];
/// assert!(params[1].is_optional());
/// assert!(params[2].is_context());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Param {
    ty: ParamType,
    optional: bool,
}

impl Param {
    /// A required dependency on the service registered for `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::key(ServiceKey::of::<T>())
    }

    /// An optional dependency; left empty when `T` is not registered.
    pub fn optional<T: ?Sized + 'static>() -> Self {
        Self::of::<T>().or_default()
    }

    /// A required dependency on the named registration of `T`.
    pub fn named<T: ?Sized + 'static>(name: &'static str) -> Self {
        Self::key(ServiceKey::named::<T>(name))
    }

    pub fn key(key: ServiceKey) -> Self {
        Self {
            ty: ParamType::Key(key),
            optional: false,
        }
    }

    /// A dependency on a type referenced by name.
    pub fn deferred(type_name: &'static str) -> Self {
        Self {
            ty: ParamType::Deferred(type_name),
            optional: false,
        }
    }

    /// Requests the resolving provider or scope itself.
    pub fn context() -> Self {
        Self::key(ServiceKey::context())
    }

    /// Marks the parameter optional: it keeps its default (nothing) when the
    /// dependency is not registered.
    pub fn or_default(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn ty(&self) -> ParamType {
        self.ty
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn is_context(&self) -> bool {
        matches!(self.ty, ParamType::Key(key) if key.is_context())
    }
}

/// Synchronous construction code behind a strategy.
pub trait Construct: Send + Sync {
    fn construct(&self, args: &mut Args<'_>) -> Result<Instance, BoxError>;
}

/// Asynchronous construction code behind a factory.
#[cfg(feature = "async")]
pub trait AsyncConstruct: Send + Sync {
    fn construct<'a>(&'a self, args: Args<'a>) -> crate::resolver::BoxFuture<'a, Result<Instance, BoxError>>;
}

/// A factory, either plain or awaited.
#[derive(Clone)]
pub enum FactoryFn {
    Sync(Arc<dyn Construct>),
    #[cfg(feature = "async")]
    Async(Arc<dyn AsyncConstruct>),
}

impl FactoryFn {
    pub fn is_async(&self) -> bool {
        match self {
            FactoryFn::Sync(_) => false,
            #[cfg(feature = "async")]
            FactoryFn::Async(_) => true,
        }
    }
}

/// How a service gets built.
#[derive(Clone)]
pub enum CreationStrategy {
    /// An `Injectable` type's own constructor.
    FromConstructor {
        params: Vec<Param>,
        construct: Arc<dyn Construct>,
    },
    /// A registered factory function.
    FromFactory { params: Vec<Param>, factory: FactoryFn },
    /// A value built before registration. No parameters.
    FromInstance(Instance),
}

impl CreationStrategy {
    /// Declared parameters, in order.
    pub fn params(&self) -> &[Param] {
        match self {
            CreationStrategy::FromConstructor { params, .. } | CreationStrategy::FromFactory { params, .. } => params,
            CreationStrategy::FromInstance(_) => &[],
        }
    }

    pub fn is_async(&self) -> bool {
        matches!(self, CreationStrategy::FromFactory { factory, .. } if factory.is_async())
    }

    fn label(&self) -> &'static str {
        match self {
            CreationStrategy::FromConstructor { .. } => "constructor",
            CreationStrategy::FromFactory { factory, .. } if factory.is_async() => "async factory",
            CreationStrategy::FromFactory { .. } => "factory",
            CreationStrategy::FromInstance(_) => "instance",
        }
    }
}

impl fmt::Debug for CreationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreationStrategy")
            .field("kind", &self.label())
            .field("params", &self.params())
            .finish()
    }
}

/// A service definition without a lifetime yet.
///
/// Produced by [`Service`](crate::service::Service); the registration
/// method that receives it supplies the lifetime.
#[derive(Clone, Debug)]
pub struct Definition {
    pub key: ServiceKey,
    pub strategy: CreationStrategy,
    pub disposer: Option<Disposer>,
}

impl Definition {
    pub fn with_lifetime(self, lifetime: Lifetime) -> ServiceDescriptor {
        ServiceDescriptor {
            key: self.key,
            lifetime,
            strategy: self.strategy,
            disposer: self.disposer,
        }
    }
}

/// A complete registration.
#[derive(Clone)]
pub struct ServiceDescriptor {
    pub key: ServiceKey,
    pub lifetime: Lifetime,
    pub strategy: CreationStrategy,
    /// Teardown hook, present when the service was registered as disposable.
    pub disposer: Option<Disposer>,
}

impl fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDescriptor")
            .field("key", &self.key)
            .field("lifetime", &self.lifetime)
            .field("strategy", &self.strategy)
            .field("disposable", &self.disposer.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Config;

    #[test]
    fn param_builders() {
        let p = Param::of::<Config>();
        assert_eq!(p.ty(), ParamType::Key(ServiceKey::of::<Config>()));
        assert!(!p.is_optional());

        assert!(Param::optional::<Config>().is_optional());
        assert_eq!(
            Param::named::<Config>("prod").ty(),
            ParamType::Key(ServiceKey::named::<Config>("prod"))
        );
        assert_eq!(Param::deferred("Config").ty(), ParamType::Deferred("Config"));
        assert!(Param::context().is_context());
        assert!(!Param::of::<Config>().is_context());
    }

    #[test]
    fn instance_strategy_has_no_params() {
        let strategy = CreationStrategy::FromInstance(Arc::new(Config));
        assert!(strategy.params().is_empty());
        assert!(!strategy.is_async());
        assert!(format!("{strategy:?}").contains("instance"));
    }

    #[test]
    fn definition_takes_lifetime() {
        let definition = Definition {
            key: ServiceKey::of::<Config>(),
            strategy: CreationStrategy::FromInstance(Arc::new(Config)),
            disposer: None,
        };
        let descriptor = definition.with_lifetime(Lifetime::Singleton);
        assert_eq!(descriptor.lifetime, Lifetime::Singleton);
        assert!(format!("{descriptor:?}").contains("Singleton"));
    }
}
