//! Error types for Wasil container operations.
//!
//! Build-time errors (cycles, captive dependencies, missing registrations,
//! bad parameter annotations) are raised by
//! [`ServiceCollection::build_provider`](crate::collection::ServiceCollection::build_provider)
//! before a provider exists. Only construction, disposal and lifecycle
//! errors can happen afterwards.

use std::fmt;

use wasil_support::rendering::{PathEntry, render_chain, render_lifetime_path};

use crate::key::ServiceKey;
use crate::lifetime::Lifetime;

/// Error type user construction code returns.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for all Wasil operations.
#[derive(Debug, thiserror::Error)]
pub enum WasilError {
    /// Requested service has no registration.
    #[error("{}", .0)]
    Unresolvable(UnresolvableTypeError),

    /// The dependency graph (or a dynamic resolution) loops back on itself.
    #[error("{}", .0)]
    CircularDependency(CircularDependencyError),

    /// A lifetime rule was broken.
    #[error("{}", .0)]
    InvalidLifetime(InvalidLifetimeError),

    /// A declared parameter type could not be resolved at build time.
    #[error("{}", .0)]
    TypeAnnotation(TypeAnnotationError),

    /// A factory returned an error.
    #[error(transparent)]
    Factory(ConstructionError),

    /// An `Injectable` constructor returned an error.
    #[error(transparent)]
    Constructor(ConstructionError),

    /// One or more teardown hooks failed.
    #[error("{}", .0)]
    Disposal(DisposalError),

    /// A key was registered twice while overrides are disabled.
    #[error("{}", .0)]
    AlreadyRegistered(AlreadyRegisteredError),

    #[error("Scope already disposed\n  Hint: create a fresh scope with Provider::create_scope()")]
    ScopeDisposed,

    #[error("Provider already disposed")]
    ProviderDisposed,

    /// Synchronous resolution reached an async factory.
    #[error("{key} depends on an async factory\n  Hint: resolve it with resolve_async() or build with build_provider_async()")]
    AsyncFactoryRequired { key: ServiceKey },

    /// The stored instance is not of the requested type.
    #[error("Type mismatch for {key}: expected {expected}")]
    TypeMismatch { key: ServiceKey, expected: &'static str },
}

impl WasilError {
    /// Returns the consumer chain for construction failures.
    pub fn chain(&self) -> Option<&[ServiceKey]> {
        match self {
            WasilError::Factory(err) | WasilError::Constructor(err) => Some(&err.chain),
            WasilError::CircularDependency(err) => Some(&err.chain),
            _ => None,
        }
    }
}

/// A service was requested (or depended on) but never registered.
#[derive(Debug)]
pub struct UnresolvableTypeError {
    pub requested: ServiceKey,
    /// The consumer whose parameter asked for it, when known.
    pub required_by: Option<ServiceKey>,
    /// Registered type names that look like the requested one.
    pub suggestions: Vec<String>,
}

impl fmt::Display for UnresolvableTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Service not registered: {}", self.requested)?;

        if let Some(parent) = self.required_by {
            write!(f, "\n  Required by: {parent}")?;
        }

        if !self.suggestions.is_empty() {
            write!(f, "\n  Did you mean one of:")?;
            for suggestion in &self.suggestions {
                write!(f, "\n    - {suggestion}")?;
            }
        }

        write!(
            f,
            "\n  Hint: register {} with add_singleton/add_scoped/add_transient, or declare the parameter optional",
            self.requested.short_name()
        )
    }
}

/// A dependency cycle, with the full chain that closes it.
#[derive(Debug)]
pub struct CircularDependencyError {
    /// Ordered chain; the first and last entries are the same key,
    /// e.g. `[A, B, A]`.
    pub chain: Vec<ServiceKey>,
}

impl CircularDependencyError {
    /// The chain as short type names, e.g. `["A", "B", "A"]`.
    pub fn chain_names(&self) -> Vec<String> {
        self.chain.iter().map(ServiceKey::short_name).collect()
    }
}

impl fmt::Display for CircularDependencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Circular dependency detected:\n  {}", render_chain(&self.chain_names()))?;
        write!(
            f,
            "\n  Hint: break the cycle by making one edge optional and resolving it through the context"
        )
    }
}

/// Lifetime rule violations.
#[derive(Debug)]
pub enum InvalidLifetimeError {
    /// A singleton captures a shorter-lived service, directly or through
    /// other singletons. `path` runs from the singleton to the captive.
    CaptiveDependency { path: Vec<(ServiceKey, Lifetime)> },

    /// A scoped service was resolved from the provider, outside any scope.
    ScopedWithoutScope {
        key: ServiceKey,
        required_by: Option<ServiceKey>,
    },

    /// A pre-built instance was registered with a lifetime other than
    /// Singleton.
    InstanceNotSingleton { key: ServiceKey, lifetime: Lifetime },
}

impl fmt::Display for InvalidLifetimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidLifetimeError::CaptiveDependency { path } => {
                let (Some((consumer, _)), Some((captive, captive_lifetime))) = (path.first(), path.last())
                else {
                    return write!(f, "Captive dependency detected");
                };
                write!(
                    f,
                    "Captive dependency: Singleton {} would hold {} {}\n",
                    consumer.short_name(),
                    captive_lifetime,
                    captive.short_name(),
                )?;
                let entries: Vec<PathEntry> = path
                    .iter()
                    .map(|(key, lifetime)| PathEntry::new(key.short_name(), lifetime.to_string()))
                    .collect();
                write!(f, "{}", render_lifetime_path(&entries))?;
                write!(
                    f,
                    "  Hint: change {} to Singleton, or make the consumer Scoped/Transient",
                    captive.short_name()
                )
            }
            InvalidLifetimeError::ScopedWithoutScope { key, required_by } => {
                write!(f, "Scoped service {key} resolved outside of a scope")?;
                if let Some(parent) = required_by {
                    write!(f, "\n  Required by: {parent}")?;
                }
                write!(f, "\n  Hint: resolve it from provider.create_scope()")
            }
            InvalidLifetimeError::InstanceNotSingleton { key, lifetime } => {
                write!(
                    f,
                    "Pre-built instance {key} registered as {lifetime}\n  Hint: instances can only be registered with add_singleton"
                )
            }
        }
    }
}

/// Why a parameter's declared type could not be used.
#[derive(Debug)]
pub enum AnnotationIssue {
    /// The type was referenced by a name no registration carries.
    Unknown(&'static str),
    /// Several registrations match the referenced name.
    Ambiguous(&'static str, Vec<ServiceKey>),
}

/// A construction strategy declares a parameter whose type cannot be
/// resolved.
#[derive(Debug)]
pub struct TypeAnnotationError {
    pub consumer: ServiceKey,
    /// Zero-based position in the declared parameter list.
    pub position: usize,
    pub issue: AnnotationIssue,
}

impl fmt::Display for TypeAnnotationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Unresolvable type annotation on parameter #{} of {}: ",
            self.position, self.consumer
        )?;
        match &self.issue {
            AnnotationIssue::Unknown(name) => {
                write!(f, "no registered type is named {name:?}")
            }
            AnnotationIssue::Ambiguous(name, candidates) => {
                write!(f, "{name:?} matches {} registrations:", candidates.len())?;
                for candidate in candidates {
                    write!(f, "\n    - {candidate}")?;
                }
                write!(f, "\n  Hint: reference the type with Param::of::<T>() instead of by name")
            }
        }
    }
}

/// User construction code failed.
///
/// Carries the original error as [`source`](std::error::Error::source) and
/// the chain of consumers that led to the failing service.
#[derive(Debug)]
pub struct ConstructionError {
    /// Resolution chain, outermost consumer first; the last key is the
    /// service whose construction failed.
    pub chain: Vec<ServiceKey>,
    pub source: BoxError,
}

impl ConstructionError {
    /// The service whose construction failed.
    pub fn key(&self) -> Option<&ServiceKey> {
        self.chain.last()
    }
}

impl fmt::Display for ConstructionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.chain.iter().map(ServiceKey::short_name).collect();
        match self.chain.last() {
            Some(key) => write!(f, "Failed to construct {key}: {}", self.source)?,
            None => write!(f, "Construction failed: {}", self.source)?,
        }
        if names.len() > 1 {
            write!(f, "\n  Resolution chain: {}", render_chain(&names))?;
        }
        Ok(())
    }
}

impl std::error::Error for ConstructionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}

/// A single failed teardown hook.
#[derive(Debug)]
pub struct DisposalFailure {
    pub key: ServiceKey,
    pub source: BoxError,
}

/// Every teardown failure of one disposal pass, in the order they were
/// attempted (reverse construction order).
#[derive(Debug)]
pub struct DisposalError {
    pub failures: Vec<DisposalFailure>,
}

impl DisposalError {
    /// The first failure encountered.
    pub fn first(&self) -> Option<&DisposalFailure> {
        self.failures.first()
    }
}

impl fmt::Display for DisposalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} disposable(s) failed during teardown:", self.failures.len())?;
        for failure in &self.failures {
            write!(f, "\n  - {}: {}", failure.key, failure.source)?;
        }
        Ok(())
    }
}

/// A key was registered twice with overrides disabled.
#[derive(Debug)]
pub struct AlreadyRegisteredError {
    pub key: ServiceKey,
}

impl fmt::Display for AlreadyRegisteredError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Service already registered: {}", self.key)?;
        write!(
            f,
            "\n  Hint: enable allow_override(true) to let the last registration win, or use a named key"
        )
    }
}

/// Convenient Result type for Wasil operations.
pub type Result<T, E = WasilError> = std::result::Result<T, E>;
