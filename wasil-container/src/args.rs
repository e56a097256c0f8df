//! Resolved arguments handed to constructors and factories.

use std::sync::Arc;

use crate::descriptor::Instance;
use crate::error::BoxError;
use crate::key::ServiceKey;
use crate::resolver::Resolver;

/// The resolved parameters of one construction, in declaration order.
///
/// Constructors pull values off the front with [`take`](Args::take) and
/// [`take_optional`](Args::take_optional). A parameter declared with
/// [`Param::context`](crate::descriptor::Param::context) does not occupy a
/// slot; it makes [`resolver`](Args::resolver) available instead.
///
/// ```rust
/// use std::sync::Arc;
/// use wasil_container::prelude::*;
///
/// struct Config { url: &'static str }
/// struct Pool { url: &'static str }
///
/// let provider = ServiceCollection::new()
///     .add_singleton(Service::instance(Config { url: "postgres://localhost" }))
///     .add_singleton(Service::factory(vec![Param::of::<Config>()], |args| {
///         let config: Arc<Config> = args.take()?;
///         Ok(Pool { url: config.url })
///     }))
///     .build_provider()
///     .unwrap();
///
/// assert_eq!(provider.resolve::<Pool>().unwrap().url, "postgres://localhost");
/// ```
pub struct Args<'a> {
    slots: Vec<Slot>,
    cursor: usize,
    resolver: Option<&'a dyn Resolver>,
}

struct Slot {
    key: ServiceKey,
    value: Option<Instance>,
}

impl<'a> Args<'a> {
    pub(crate) fn new(resolver: Option<&'a dyn Resolver>) -> Self {
        Self {
            slots: Vec::new(),
            cursor: 0,
            resolver,
        }
    }

    pub(crate) fn push(&mut self, key: ServiceKey, value: Option<Instance>) {
        self.slots.push(Slot { key, value });
    }

    /// Takes the next argument, which must be present.
    pub fn take<T: Send + Sync + 'static>(&mut self) -> Result<Arc<T>, BoxError> {
        let position = self.cursor;
        self.take_optional::<T>()?.ok_or_else(|| {
            let key = self.slots[position].key;
            format!("argument #{position} ({key}) was not provided").into()
        })
    }

    /// Takes the next argument; `None` when an optional dependency is not
    /// registered.
    pub fn take_optional<T: Send + Sync + 'static>(&mut self) -> Result<Option<Arc<T>>, BoxError> {
        let position = self.cursor;
        let Some(slot) = self.slots.get_mut(position) else {
            return Err(format!("argument #{position} requested but only {} declared", self.slots.len()).into());
        };
        self.cursor += 1;

        match slot.value.take() {
            None => Ok(None),
            Some(instance) => instance.downcast::<T>().map(Some).map_err(|_| {
                format!(
                    "argument #{position} ({}) is not a {}",
                    slot.key,
                    std::any::type_name::<T>()
                )
                .into()
            }),
        }
    }

    /// Peeks at an argument by position without consuming it.
    pub fn get<T: Send + Sync + 'static>(&self, position: usize) -> Option<Arc<T>> {
        let value = self.slots.get(position)?.value.clone()?;
        value.downcast::<T>().ok()
    }

    /// The resolving provider or scope, when the strategy declared
    /// [`Param::context`](crate::descriptor::Param::context).
    pub fn resolver(&self) -> Result<&'a dyn Resolver, BoxError> {
        self.resolver
            .ok_or_else(|| "resolver requested without declaring Param::context()".into())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Config(u8);
    #[derive(Debug)]
    struct Clock;

    fn args_with(values: Vec<(ServiceKey, Option<Instance>)>) -> Args<'static> {
        let mut args = Args::new(None);
        for (key, value) in values {
            args.push(key, value);
        }
        args
    }

    #[test]
    fn takes_in_order() {
        let mut args = args_with(vec![
            (ServiceKey::of::<Config>(), Some(Arc::new(Config(7)))),
            (ServiceKey::of::<Clock>(), None),
        ]);

        assert_eq!(args.len(), 2);
        assert_eq!(args.take::<Config>().unwrap().0, 7);
        assert!(args.take_optional::<Clock>().unwrap().is_none());
        assert!(args.take::<Clock>().is_err());
    }

    #[test]
    fn missing_required_value_is_an_error() {
        let mut args = args_with(vec![(ServiceKey::of::<Clock>(), None)]);
        let err = args.take::<Clock>().unwrap_err();
        assert!(err.to_string().contains("not provided"));
    }

    #[test]
    fn wrong_type_is_an_error() {
        let mut args = args_with(vec![(ServiceKey::of::<Config>(), Some(Arc::new(Config(1))))]);
        let err = args.take::<Clock>().unwrap_err();
        assert!(err.to_string().contains("is not a"));
    }

    #[test]
    fn get_does_not_consume() {
        let mut args = args_with(vec![(ServiceKey::of::<Config>(), Some(Arc::new(Config(3))))]);
        assert_eq!(args.get::<Config>(0).map(|c| c.0), Some(3));
        assert_eq!(args.take::<Config>().unwrap().0, 3);
    }

    #[test]
    fn resolver_requires_declaration() {
        let args = args_with(vec![]);
        assert!(args.is_empty());
        assert!(args.resolver().is_err());
    }
}
