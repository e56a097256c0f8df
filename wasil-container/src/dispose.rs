//! Teardown of constructed services.
//!
//! Services registered with [`Service::disposable`](crate::service::Service::disposable)
//! are tracked by their owner once they are cached or handed out: scoped
//! and scope-resolved transient instances by the [`Scope`](crate::scope::Scope),
//! singletons by the [`Provider`](crate::provider::Provider). Teardown runs
//! in reverse construction order.
//!
//! Transients resolved straight from the provider are not tracked; the
//! caller owns them and their teardown.

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::descriptor::Instance;
use crate::error::{BoxError, DisposalError, DisposalFailure};
use crate::key::ServiceKey;

/// A service with an explicit teardown hook.
///
/// # Examples
/// ```
/// use wasil_container::dispose::Dispose;
/// use wasil_container::error::BoxError;
///
/// struct Connection;
///
/// impl Dispose for Connection {
///     fn dispose(&self) -> Result<(), BoxError> {
///         // flush and close
///         Ok(())
///     }
/// }
/// ```
pub trait Dispose: Send + Sync + 'static {
    fn dispose(&self) -> Result<(), BoxError>;
}

/// Type-erased teardown hook stored on a descriptor.
pub type Disposer = fn(&Instance) -> Result<(), BoxError>;

/// The [`Disposer`] for `T`.
pub fn disposer_for<T: Dispose>() -> Disposer {
    dispose_erased::<T>
}

fn dispose_erased<T: Dispose>(instance: &Instance) -> Result<(), BoxError> {
    match instance.downcast_ref::<T>() {
        Some(service) => service.dispose(),
        None => Err(format!("tracked instance is not a {}", std::any::type_name::<T>()).into()),
    }
}

struct Tracked {
    key: ServiceKey,
    instance: Instance,
    disposer: Disposer,
}

/// Disposables of one owner, in construction order.
///
/// Closed by [`dispose_all`](DisposeBag::dispose_all). Instances pushed
/// after that are torn down on the spot instead of being kept.
#[derive(Default)]
pub(crate) struct DisposeBag {
    state: Mutex<BagState>,
}

#[derive(Default)]
struct BagState {
    entries: Vec<Tracked>,
    closed: bool,
}

impl DisposeBag {
    /// Tracks `instance`. Returns `false` when the bag is already closed;
    /// the hook has then run before returning.
    pub(crate) fn push(&self, key: ServiceKey, instance: Instance, disposer: Disposer) -> bool {
        let tracked = Tracked { key, instance, disposer };
        {
            let mut state = self.state.lock();
            if !state.closed {
                debug!(key = %key, "Tracking disposable");
                state.entries.push(tracked);
                return true;
            }
        }

        debug!(key = %key, "Owner already disposed, tearing down late instance");
        if let Err(error) = (tracked.disposer)(&tracked.instance) {
            warn!(key = %key, error = %error, "Teardown failed");
        }
        false
    }

    pub(crate) fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Closes the bag and runs every hook, last tracked first. A failing
    /// hook does not stop the rest; all failures come back together.
    pub(crate) fn dispose_all(&self) -> Result<(), DisposalError> {
        let entries = {
            let mut state = self.state.lock();
            state.closed = true;
            std::mem::take(&mut state.entries)
        };
        let mut failures = Vec::new();

        for tracked in entries.into_iter().rev() {
            match (tracked.disposer)(&tracked.instance) {
                Ok(()) => debug!(key = %tracked.key, "Disposed"),
                Err(source) => {
                    warn!(key = %tracked.key, error = %source, "Teardown failed");
                    failures.push(DisposalFailure { key: tracked.key, source });
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(DisposalError { failures })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
        fail: bool,
    }

    impl Dispose for Recorder {
        fn dispose(&self) -> Result<(), BoxError> {
            self.log.lock().push(self.name);
            if self.fail {
                Err(format!("{} refused", self.name).into())
            } else {
                Ok(())
            }
        }
    }

    fn track(bag: &DisposeBag, log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str, fail: bool) {
        let instance: Instance = Arc::new(Recorder { name, log: log.clone(), fail });
        bag.push(ServiceKey::named::<Recorder>(name), instance, disposer_for::<Recorder>());
    }

    #[test]
    fn disposes_in_reverse_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let bag = DisposeBag::default();
        track(&bag, &log, "x", false);
        track(&bag, &log, "y", false);
        track(&bag, &log, "z", false);
        assert_eq!(bag.len(), 3);

        bag.dispose_all().unwrap();
        assert_eq!(*log.lock(), vec!["z", "y", "x"]);
        assert_eq!(bag.len(), 0);
    }

    #[test]
    fn failure_does_not_stop_remaining_hooks() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let bag = DisposeBag::default();
        track(&bag, &log, "x", false);
        track(&bag, &log, "y", true);
        track(&bag, &log, "z", false);

        let err = bag.dispose_all().unwrap_err();
        assert_eq!(*log.lock(), vec!["z", "y", "x"]);
        assert_eq!(err.failures.len(), 1);
        assert_eq!(err.failures[0].key, ServiceKey::named::<Recorder>("y"));
        assert!(err.to_string().contains("y refused"));
    }

    #[test]
    fn second_pass_is_a_no_op() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let bag = DisposeBag::default();
        track(&bag, &log, "x", false);
        bag.dispose_all().unwrap();
        bag.dispose_all().unwrap();
        assert_eq!(log.lock().len(), 1);
    }

    #[test]
    fn wrong_instance_type_reports_failure() {
        let bag = DisposeBag::default();
        bag.push(ServiceKey::of::<u8>(), Arc::new(1u8), disposer_for::<Recorder>());
        assert!(bag.dispose_all().is_err());
    }

    #[test]
    fn push_after_close_tears_down_immediately() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let bag = DisposeBag::default();
        track(&bag, &log, "x", false);
        bag.dispose_all().unwrap();

        let late: Instance = Arc::new(Recorder { name: "late", log: log.clone(), fail: false });
        assert!(!bag.push(ServiceKey::named::<Recorder>("late"), late, disposer_for::<Recorder>()));
        assert_eq!(*log.lock(), vec!["x", "late"]);
        assert_eq!(bag.len(), 0);
    }
}
