//! In-flight request coalescing.
//!
//! The [`Dispatcher`] keeps one table of in-flight keys. For each key it
//! issues at most one transport call; every waiter registered under the key
//! while that call is outstanding receives the same [`Outcome`].
//!
//! Invariants:
//! - a key is present iff its transport call has not completed;
//! - lookup-or-insert and issuing the call happen under the table lock, so
//!   two submitters never both issue and no waiter is lost;
//! - completion removes the entry and takes its waiters in one step, then
//!   posts every waiter to the callback executor, whichever way the call
//!   ended (response, transport error, panic, or task drop).

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tandem_core::Outcome;
use tracing::{debug, warn};

use crate::executor::{CallbackExecutor, SerialExecutor};
use crate::{Error, FailureKind, Request, Transport};

/// A completion callback awaiting the outcome of an in-flight call.
pub type Waiter = Box<dyn FnOnce(&Outcome) + Send + 'static>;

type InFlightTable = HashMap<String, Vec<Waiter>>;

/// What [`Dispatcher::submit`] did with a waiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// A new transport call was issued for the key.
    Issued,
    /// The waiter joined a call already in flight.
    Coalesced,
}

/// Coalescing dispatcher over a [`Transport`].
///
/// Clones share the same in-flight table.
pub struct Dispatcher<T, E = SerialExecutor> {
    transport: T,
    executor: E,
    in_flight: Arc<Mutex<InFlightTable>>,
}

impl<T: Clone, E: Clone> Clone for Dispatcher<T, E> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            executor: self.executor.clone(),
            in_flight: Arc::clone(&self.in_flight),
        }
    }
}

impl<T, E> std::fmt::Debug for Dispatcher<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("in_flight", &lock(&self.in_flight).len())
            .finish_non_exhaustive()
    }
}

impl<T, E> Dispatcher<T, E>
where
    T: Transport,
    E: CallbackExecutor,
{
    /// Create a dispatcher delivering completions on `executor`.
    #[must_use]
    pub fn new(transport: T, executor: E) -> Self {
        Self {
            transport,
            executor,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// The transport calls are issued on.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// The executor completions are delivered on.
    #[must_use]
    pub const fn executor(&self) -> &E {
        &self.executor
    }

    /// Register `on_complete` under `key`, issuing `request` if no call for
    /// `key` is in flight.
    ///
    /// When the key is already in flight, `request` is dropped and the
    /// waiter joins the outstanding call. Must be called within a tokio
    /// runtime; otherwise the waiter receives
    /// [`FailureKind::Runtime`] and nothing is registered.
    pub fn submit<F>(&self, key: String, request: Request, on_complete: F) -> Submission
    where
        F: FnOnce(&Outcome) + Send + 'static,
    {
        let waiter: Waiter = Box::new(on_complete);

        let mut table = lock(&self.in_flight);
        if let Some(waiters) = table.get_mut(&key) {
            waiters.push(waiter);
            debug!(key = %key, waiters = waiters.len(), "coalesced onto in-flight request");
            return Submission::Coalesced;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            drop(table);
            warn!(key = %key, "no tokio runtime to issue request on");
            let outcome: Outcome = Err(Error::request_failed(
                FailureKind::Runtime,
                "no tokio runtime available to issue the request",
            ));
            self.executor.execute(Box::new(move || waiter(&outcome)));
            return Submission::Issued;
        };

        table.insert(key.clone(), vec![waiter]);
        debug!(key = %key, method = %request.method(), "issuing request");

        let completion = Completion {
            key: Some(key),
            in_flight: Arc::clone(&self.in_flight),
            executor: self.executor.clone(),
        };
        let transport = self.transport.clone();
        runtime.spawn(async move {
            let outcome = transport.execute(request).await;
            completion.complete(outcome);
        });

        Submission::Issued
    }

    /// Number of keys with a transport call in flight.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        lock(&self.in_flight).len()
    }

    /// Number of waiters registered under `key` (0 when not in flight).
    #[must_use]
    pub fn waiters(&self, key: &str) -> usize {
        lock(&self.in_flight).get(key).map_or(0, Vec::len)
    }
}

fn lock(table: &Mutex<InFlightTable>) -> MutexGuard<'_, InFlightTable> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Resolves one in-flight entry exactly once.
///
/// Dropping an unresolved completion (the transport task panicked or was
/// cancelled) resolves the entry with [`FailureKind::Aborted`].
struct Completion<E: CallbackExecutor> {
    key: Option<String>,
    in_flight: Arc<Mutex<InFlightTable>>,
    executor: E,
}

impl<E: CallbackExecutor> Completion<E> {
    fn complete(mut self, outcome: Outcome) {
        if let Some(key) = self.key.take() {
            self.fan_out(&key, outcome);
        }
    }

    fn fan_out(&self, key: &str, outcome: Outcome) {
        let waiters = lock(&self.in_flight).remove(key).unwrap_or_default();

        match &outcome {
            Ok(response) => debug!(
                key = %key,
                status = response.status(),
                waiters = waiters.len(),
                "request completed"
            ),
            Err(err) => warn!(
                key = %key,
                error = %err,
                waiters = waiters.len(),
                "request failed"
            ),
        }

        let outcome = Arc::new(outcome);
        for waiter in waiters {
            let outcome = Arc::clone(&outcome);
            self.executor.execute(Box::new(move || waiter(&outcome)));
        }
    }
}

impl<E: CallbackExecutor> Drop for Completion<E> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.fan_out(
                &key,
                Err(Error::request_failed(
                    FailureKind::Aborted,
                    "transport task ended without a result",
                )),
            );
        }
    }
}
