//! Per-key instance cache with build markers.
//!
//! Each cached key owns a slot that is either empty, being built, or ready.
//! The first resolver to find a slot empty claims it and builds outside any
//! lock; later resolvers wait for it to become ready. Different keys never
//! contend with each other.
//!
//! A [`Claim`] that is dropped without being fulfilled (construction failed,
//! or the resolving future was cancelled) puts the slot back to empty and
//! wakes every waiter, so one of them retries. Failures are never cached.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use tracing::trace;

#[cfg(feature = "async")]
use tokio::sync::Notify;

use crate::descriptor::Instance;
use crate::key::ServiceKey;

enum SlotState {
    Empty,
    Building,
    Ready(Instance),
}

struct Slot {
    state: Mutex<SlotState>,
    ready: Condvar,
    #[cfg(feature = "async")]
    notify: Notify,
}

impl Default for Slot {
    fn default() -> Self {
        Self {
            state: Mutex::new(SlotState::Empty),
            ready: Condvar::new(),
            #[cfg(feature = "async")]
            notify: Notify::new(),
        }
    }
}

impl Slot {
    fn wake_all(&self) {
        self.ready.notify_all();
        #[cfg(feature = "async")]
        self.notify.notify_waiters();
    }
}

/// Outcome of [`InstanceCache::acquire`].
pub(crate) enum Acquired {
    /// Someone already built it.
    Ready(Instance),
    /// The caller must build it and [`fulfill`](Claim::fulfill) the claim.
    Claimed(Claim),
}

/// Exclusive right to build one slot.
pub(crate) struct Claim {
    key: ServiceKey,
    slot: Arc<Slot>,
    fulfilled: bool,
}

impl Claim {
    /// Publishes `instance` and wakes every waiter.
    pub(crate) fn fulfill(mut self, instance: Instance) {
        *self.slot.state.lock() = SlotState::Ready(instance);
        self.fulfilled = true;
        self.slot.wake_all();
    }
}

impl Drop for Claim {
    fn drop(&mut self) {
        if !self.fulfilled {
            trace!(key = %self.key, "Build abandoned, releasing slot");
            *self.slot.state.lock() = SlotState::Empty;
            self.slot.wake_all();
        }
    }
}

/// Instances of one owner (the provider's singletons or one scope's
/// scoped services).
#[derive(Default)]
pub(crate) struct InstanceCache {
    slots: DashMap<ServiceKey, Arc<Slot>>,
}

impl InstanceCache {
    /// The cached instance, if ready.
    pub(crate) fn get(&self, key: &ServiceKey) -> Option<Instance> {
        let slot = self.slots.get(key)?.value().clone();
        let state = slot.state.lock();
        match &*state {
            SlotState::Ready(instance) => Some(instance.clone()),
            _ => None,
        }
    }

    fn slot(&self, key: ServiceKey) -> Arc<Slot> {
        self.slots.entry(key).or_default().value().clone()
    }

    /// Returns the ready instance or claims the slot, blocking while another
    /// thread is building it.
    pub(crate) fn acquire(&self, key: ServiceKey) -> Acquired {
        let slot = self.slot(key);
        let mut state = slot.state.lock();
        loop {
            match &*state {
                SlotState::Ready(instance) => return Acquired::Ready(instance.clone()),
                SlotState::Empty => {
                    *state = SlotState::Building;
                    drop(state);
                    return Acquired::Claimed(Claim {
                        key,
                        slot,
                        fulfilled: false,
                    });
                }
                SlotState::Building => {
                    trace!(key = %key, "Waiting for concurrent build");
                    slot.ready.wait(&mut state);
                }
            }
        }
    }

    /// Async counterpart of [`acquire`](InstanceCache::acquire): waits
    /// without blocking the executor.
    #[cfg(feature = "async")]
    pub(crate) async fn acquire_async(&self, key: ServiceKey) -> Acquired {
        let slot = self.slot(key);
        loop {
            let notified = slot.notify.notified();
            tokio::pin!(notified);
            // Register before looking at the state so a wake-up between the
            // check and the await is not lost.
            notified.as_mut().enable();

            {
                let mut state = slot.state.lock();
                match &*state {
                    SlotState::Ready(instance) => return Acquired::Ready(instance.clone()),
                    SlotState::Empty => {
                        *state = SlotState::Building;
                        drop(state);
                        return Acquired::Claimed(Claim {
                            key,
                            slot: slot.clone(),
                            fulfilled: false,
                        });
                    }
                    SlotState::Building => {}
                }
            }

            trace!(key = %key, "Waiting for concurrent build");
            notified.await;
        }
    }

    /// Number of ready instances.
    pub(crate) fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|entry| matches!(*entry.value().state.lock(), SlotState::Ready(_)))
            .count()
    }

    pub(crate) fn clear(&self) {
        self.slots.clear();
    }
}
