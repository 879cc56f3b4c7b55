//! Single-flight coordination of refresh operations
//!
//! At most one operation runs per coordinator. Callers arriving while it is
//! in flight receive a clone of the same shared handle, so a success or a
//! failure is observed identically by every waiter.
//!
//! The operation is spawned onto the tokio runtime. Dropping a handle only
//! abandons that caller's wait; the operation itself runs to completion.

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::{Arc, Weak};

use crate::error::{TrustError, TrustResult};

/// Awaitable, cloneable handle to an in-flight operation
pub type FlightHandle<T> = Shared<BoxFuture<'static, TrustResult<T>>>;

struct Slot<T> {
    generation: u64,
    in_flight: Option<FlightHandle<T>>,
}

pub struct SingleFlight<T> {
    slot: Arc<Mutex<Slot<T>>>,
}

impl<T> Default for SingleFlight<T> {
    fn default() -> Self {
        Self {
            slot: Arc::new(Mutex::new(Slot {
                generation: 0,
                in_flight: None,
            })),
        }
    }
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach to the running operation, or start `operation` if none is
    /// running. `operation` is invoked at most once per started flight.
    ///
    /// Must be called from within a tokio runtime.
    pub fn run_single<F, Fut>(&self, operation: F) -> FlightHandle<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = TrustResult<T>> + Send + 'static,
    {
        let mut slot = self.slot.lock();
        if let Some(existing) = &slot.in_flight {
            return existing.clone();
        }

        slot.generation = slot.generation.wrapping_add(1);
        let generation = slot.generation;
        let weak_slot: Weak<Mutex<Slot<T>>> = Arc::downgrade(&self.slot);
        let future = operation();

        // The slot lock is held until the handle is installed, so the task
        // cannot clear the slot before it has been filled.
        let task = tokio::spawn(async move {
            let _release = SlotRelease {
                slot: weak_slot,
                generation,
            };
            future.await
        });

        let handle = async move {
            match task.await {
                Ok(result) => result,
                Err(join_error) => Err(TrustError::RefreshAborted(join_error.to_string())),
            }
        }
        .boxed()
        .shared();

        slot.in_flight = Some(handle.clone());
        handle
    }

    pub fn is_in_flight(&self) -> bool {
        self.slot.lock().in_flight.is_some()
    }
}

/// Clears the slot when the spawned task ends, including by panic
struct SlotRelease<T> {
    slot: Weak<Mutex<Slot<T>>>,
    generation: u64,
}

impl<T> Drop for SlotRelease<T> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.upgrade() {
            let mut slot = slot.lock();
            if slot.generation == self.generation {
                slot.in_flight = None;
            }
        }
    }
}

impl<T> Drop for SingleFlight<T> {
    fn drop(&mut self) {
        // The task only holds a weak reference; releasing the handle here
        // lets the operation finish and be dropped on its own.
        self.slot.lock().in_flight = None;
    }
}
