//! Process-wide single-flight registry.
//!
//! At most one in-flight computation exists per key at any instant.
//! Callers arriving while a flight is registered receive the same shared
//! future and therefore observe the same eventual result, including the
//! same error. The computation runs in a spawned task so it settles even
//! if every caller goes away, and the registration is removed on every
//! exit path: success, failure, and panic.

use std::future::Future;
use std::hash::Hash;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use thiserror::Error;
use tokio::sync::oneshot;

/// Shared handle to one in-flight computation.
pub type FlightFuture<T, E> = Shared<BoxFuture<'static, Result<T, FlightError<E>>>>;

#[derive(Debug, Clone, Error)]
pub enum FlightError<E> {
    /// The computation itself failed; every waiter sees the same error.
    #[error("{0}")]
    Task(E),
    /// The computation panicked before settling.
    #[error("in-flight task panicked before settling")]
    Panicked,
    /// The computation task was dropped before it could report a result.
    #[error("in-flight task abandoned before settling")]
    Abandoned,
}

/// Map from key to the single in-flight computation for that key.
pub struct FlightRegistry<K, T, E> {
    in_flight: Arc<DashMap<K, FlightFuture<T, E>>>,
}

impl<K, T, E> Default for FlightRegistry<K, T, E>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self {
            in_flight: Arc::new(DashMap::new()),
        }
    }
}

impl<K, T, E> FlightRegistry<K, T, E>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the in-flight computation for `key`, or invoke `factory` and
    /// register its result as the flight.
    ///
    /// The factory future runs to completion in its own task regardless
    /// of how many waiters remain.
    pub fn run_exclusive<F, Fut>(&self, key: K, factory: F) -> FlightFuture<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        match self.in_flight.entry(key.clone()) {
            Entry::Occupied(existing) => existing.get().clone(),
            Entry::Vacant(vacant) => {
                let (tx, rx) = oneshot::channel();
                let registered = Arc::clone(&self.in_flight);
                let task = factory();

                tokio::spawn(async move {
                    let outcome = AssertUnwindSafe(task).catch_unwind().await;
                    // Unregister before publishing so a caller arriving
                    // after settlement starts a new flight.
                    registered.remove(&key);
                    let result = match outcome {
                        Ok(Ok(value)) => Ok(value),
                        Ok(Err(err)) => Err(FlightError::Task(err)),
                        Err(_) => Err(FlightError::Panicked),
                    };
                    let _ = tx.send(result);
                });

                let shared = async move {
                    match rx.await {
                        Ok(result) => result,
                        Err(_) => Err(FlightError::Abandoned),
                    }
                }
                .boxed()
                .shared();

                vacant.insert(shared.clone());
                shared
            }
        }
    }

    /// Whether a flight is currently registered for `key`.
    pub fn contains(&self, key: &K) -> bool {
        self.in_flight.contains_key(key)
    }

    /// Number of currently registered flights.
    pub fn len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.in_flight.is_empty()
    }
}
