//! Service identification keys.
//!
//! [`ServiceKey`] identifies a capability in the registry. It combines a
//! [`TypeId`] with an optional discriminator so several registrations of
//! the same type can live side by side.

use std::any::{TypeId, type_name};
use std::fmt;
use std::hash::{Hash, Hasher};

use wasil_support::rendering::shorten_type_name;

/// Marker type behind [`ServiceKey::context`].
struct ResolutionContext;

/// Uniquely identifies a service in the registry.
///
/// # Examples
/// ```
/// use wasil_container::key::ServiceKey;
///
/// let key = ServiceKey::of::<String>();
/// assert_eq!(key.type_name(), "alloc::string::String");
/// assert_eq!(key.name(), None);
///
/// let primary = ServiceKey::named::<String>("primary_db");
/// let replica = ServiceKey::named::<String>("replica_db");
/// assert_ne!(primary, replica);
/// ```
#[derive(Clone, Copy)]
pub struct ServiceKey {
    type_id: TypeId,
    type_name: &'static str,
    name: Option<&'static str>,
}

impl ServiceKey {
    /// Creates a key for type `T`.
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            name: None,
        }
    }

    /// Creates a named key for type `T`.
    #[inline]
    pub fn named<T: ?Sized + 'static>(name: &'static str) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            name: Some(name),
        }
    }

    /// The sentinel key a factory declares to receive the resolving
    /// provider or scope itself.
    ///
    /// It never becomes a graph edge, so it is exempt from cycle and
    /// lifetime checks.
    #[inline]
    pub fn context() -> Self {
        Self::of::<ResolutionContext>()
    }

    /// Returns `true` for the [`ServiceKey::context`] sentinel.
    #[inline]
    pub fn is_context(&self) -> bool {
        self.type_id == TypeId::of::<ResolutionContext>()
    }

    /// Returns a copy of this key carrying `name` as discriminator.
    #[inline]
    pub fn with_name(self, name: &'static str) -> Self {
        Self { name: Some(name), ..self }
    }

    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Full type name, as reported by [`std::any::type_name`].
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Short type name used in diagnostics (`Repo` rather than `app::db::Repo`).
    pub fn short_name(&self) -> String {
        match self.name {
            Some(name) => format!("{}[{name}]", shorten_type_name(self.type_name)),
            None => shorten_type_name(self.type_name),
        }
    }

    #[inline]
    pub fn name(&self) -> Option<&'static str> {
        self.name
    }
}

// Identity is the type plus the discriminator; the type name is display only.
impl PartialEq for ServiceKey {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id && self.name == other.name
    }
}

impl Eq for ServiceKey {}

impl Hash for ServiceKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
        self.name.hash(state);
    }
}

impl fmt::Debug for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name {
            Some(name) => write!(f, "ServiceKey({}, name={:?})", self.type_name, name),
            None => write!(f, "ServiceKey({})", self.type_name),
        }
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name {
            Some(name) => write!(f, "{} (name={:?})", self.type_name, name),
            None => write!(f, "{}", self.type_name),
        }
    }
}
