//! Optimistic state with rollback.
//!
//! An [`Optimistic`] value tracks what the view shows, what the server last
//! confirmed, and the mutations still in flight in issue order. The shown
//! value is always the newest in-flight proposal, or the settled value when
//! nothing is in flight. Removing a failed mutation and recomputing gives
//! the rollback, so an earlier failure never overwrites a later proposal.

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::error::ClientError;
use crate::view::ScopeHandle;

struct Pending<T> {
    generation: u64,
    proposed: T,
}

struct State<T> {
    settled: T,
    /// Generation of the mutation that produced `settled` (0 = initial).
    settled_generation: u64,
    in_flight: Vec<Pending<T>>,
    next_generation: u64,
    rollbacks: u64,
}

impl<T: Clone> State<T> {
    fn shown(&self) -> T {
        self.in_flight
            .last()
            .map(|p| p.proposed.clone())
            .unwrap_or_else(|| self.settled.clone())
    }

    fn remove(&mut self, generation: u64) -> Option<Pending<T>> {
        let idx = self.in_flight.iter().position(|p| p.generation == generation)?;
        Some(self.in_flight.remove(idx))
    }
}

struct Shared<T> {
    entity: String,
    state: Mutex<State<T>>,
    shown: watch::Sender<T>,
    scope: ScopeHandle,
}

/// Optimistically mutable view state for one entity.
pub struct Optimistic<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Optimistic<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> Optimistic<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn new(entity: impl Into<String>, value: T) -> Self {
        Self::with_scope(entity, value, ScopeHandle::detached())
    }

    /// State owned by a view: once `scope` closes, settling and rollback
    /// become no-ops.
    pub fn with_scope(entity: impl Into<String>, value: T, scope: ScopeHandle) -> Self {
        let (shown, _) = watch::channel(value.clone());
        Self {
            shared: Arc::new(Shared {
                entity: entity.into(),
                state: Mutex::new(State {
                    settled: value,
                    settled_generation: 0,
                    in_flight: Vec::new(),
                    next_generation: 1,
                    rollbacks: 0,
                }),
                shown,
                scope,
            }),
        }
    }

    pub fn entity(&self) -> &str {
        &self.shared.entity
    }

    /// The value the view should render right now.
    pub fn get(&self) -> T {
        self.shared.shown.borrow().clone()
    }

    /// The last server-confirmed value.
    pub fn settled(&self) -> T {
        self.shared.state.lock().settled.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.shared.shown.subscribe()
    }

    pub fn in_flight(&self) -> usize {
        self.shared.state.lock().in_flight.len()
    }

    /// Number of failed mutations rolled back so far.
    pub fn rollbacks(&self) -> u64 {
        self.shared.state.lock().rollbacks
    }

    fn publish(&self, state: &State<T>) {
        let next = state.shown();
        self.shared.shown.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    /// Apply a server-pushed change to the settled value and to every
    /// in-flight proposal, so a concurrent mutation neither hides nor
    /// double-counts it.
    pub fn rebase(&self, f: impl Fn(&T) -> T) {
        if !self.shared.scope.is_alive() {
            return;
        }
        let mut state = self.shared.state.lock();
        state.settled = f(&state.settled);
        for pending in state.in_flight.iter_mut() {
            pending.proposed = f(&pending.proposed);
        }
        self.publish(&state);
    }

    /// Apply `propose(current)` now, run `remote`, and keep the proposal on
    /// success or roll back on failure.
    pub async fn mutate<P, F, Fut, R>(&self, propose: P, remote: F) -> Result<(T, R), ClientError>
    where
        P: FnOnce(&T) -> T,
        F: FnOnce(T) -> Fut,
        Fut: Future<Output = Result<R, ClientError>>,
    {
        self.mutate_with(propose, remote, |proposed, _| proposed).await
    }

    /// Like [`Optimistic::mutate`], with `reconcile` turning the proposal and
    /// the server response into the settled value (e.g. server-side counts).
    ///
    /// Returns the settled value this mutation produced and the response.
    pub async fn mutate_with<P, F, Fut, R, C>(
        &self,
        propose: P,
        remote: F,
        reconcile: C,
    ) -> Result<(T, R), ClientError>
    where
        P: FnOnce(&T) -> T,
        F: FnOnce(T) -> Fut,
        Fut: Future<Output = Result<R, ClientError>>,
        C: FnOnce(T, &R) -> T,
    {
        let (generation, proposed) = {
            let mut state = self.shared.state.lock();
            let proposed = propose(&state.shown());
            let generation = state.next_generation;
            state.next_generation += 1;
            state.in_flight.push(Pending {
                generation,
                proposed: proposed.clone(),
            });
            self.publish(&state);
            (generation, proposed)
        };

        let outcome = remote(proposed).await;

        let mut state = self.shared.state.lock();
        if !self.shared.scope.is_alive() {
            state.remove(generation);
            tracing::debug!(entity = %self.shared.entity, generation, "view gone, mutation result dropped");
            return outcome.map(|r| (state.settled.clone(), r));
        }

        let Some(pending) = state.remove(generation) else {
            return Err(ClientError::Decode("optimistic mutation vanished".into()));
        };

        match outcome {
            Ok(response) => {
                let value = reconcile(pending.proposed, &response);
                if generation > state.settled_generation {
                    state.settled = value.clone();
                    state.settled_generation = generation;
                }
                self.publish(&state);
                Ok((value, response))
            }
            Err(err) => {
                state.rollbacks += 1;
                tracing::warn!(
                    entity = %self.shared.entity,
                    generation,
                    still_in_flight = state.in_flight.len(),
                    error = %err,
                    "optimistic mutation rolled back"
                );
                self.publish(&state);
                Err(err)
            }
        }
    }
}
