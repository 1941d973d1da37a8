//! Scoped Fetcher
//!
//! One fetch slot per view: it knows which customer scope it last loaded for,
//! issues a stamped ticket per request and only accepts the response of the
//! newest ticket. Anything older is dropped on arrival, and a request for a
//! scope older than one already seen is never dispatched.

use std::future::Future;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::debug;

use crate::session::Scope;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum FetchState<T> {
    /// No customer selected yet, nothing was requested
    Idle,
    Loading,
    /// Localized message for the view
    Error(String),
    Ready(T),
}

impl<T> FetchState<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> FetchState<U> {
        match self {
            FetchState::Idle => FetchState::Idle,
            FetchState::Loading => FetchState::Loading,
            FetchState::Error(message) => FetchState::Error(message),
            FetchState::Ready(data) => FetchState::Ready(f(data)),
        }
    }
}

/// Stamp carried by an in-flight request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub scope: Scope,
    seq: u64,
}

struct Slot<T> {
    scope: Option<Scope>,
    /// Highest context generation ever dispatched
    newest_generation: u64,
    seq: u64,
    state: FetchState<T>,
}

pub struct ScopedFetcher<T> {
    slot: RwLock<Slot<T>>,
}

impl<T> Default for ScopedFetcher<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ScopedFetcher<T> {
    pub fn new() -> Self {
        Self::from_generation(0)
    }

    /// Empty slot that already refuses scopes older than `generation`.
    pub fn from_generation(generation: u64) -> Self {
        Self {
            slot: RwLock::new(Slot {
                scope: None,
                newest_generation: generation,
                seq: 0,
                state: FetchState::Idle,
            }),
        }
    }

    /// Start a request for `scope`. Without a scope the slot goes back to
    /// `Idle` and no ticket is issued. A scope from an older context
    /// generation than one already dispatched is refused and leaves the slot
    /// untouched.
    pub async fn dispatch(&self, scope: Option<Scope>) -> Option<Ticket> {
        let mut slot = self.slot.write().await;
        if let Some(scope) = &scope {
            if scope.generation < slot.newest_generation {
                debug!(
                    "Refusing request for customer {} (generation {} < {})",
                    scope.customer_id, scope.generation, slot.newest_generation
                );
                return None;
            }
            slot.newest_generation = scope.generation;
        }

        slot.seq += 1;
        slot.scope = scope.clone();

        match scope {
            None => {
                slot.state = FetchState::Idle;
                None
            }
            Some(scope) => {
                slot.state = FetchState::Loading;
                Some(Ticket { scope, seq: slot.seq })
            }
        }
    }

    /// Store the outcome of `ticket`. Returns false if a newer dispatch has
    /// happened since, in which case the outcome is discarded.
    pub async fn resolve(&self, ticket: Ticket, outcome: Result<T, String>) -> bool {
        let mut slot = self.slot.write().await;
        if slot.seq != ticket.seq || slot.scope.as_ref() != Some(&ticket.scope) {
            debug!(
                "Discarding stale response for customer {} (generation {})",
                ticket.scope.customer_id, ticket.scope.generation
            );
            return false;
        }

        slot.state = match outcome {
            Ok(data) => FetchState::Ready(data),
            Err(message) => FetchState::Error(message),
        };
        true
    }

    /// Scope of the latest dispatch.
    pub async fn scope(&self) -> Option<Scope> {
        self.slot.read().await.scope.clone()
    }
}

impl<T: Clone> ScopedFetcher<T> {
    pub async fn state(&self) -> FetchState<T> {
        self.slot.read().await.state.clone()
    }

    /// Dispatch, run `loader` for the ticket's scope, resolve, then report the
    /// slot's current state (which belongs to a newer request if this one went
    /// stale meanwhile, or was refused as outdated).
    pub async fn load<F, Fut>(&self, scope: Option<Scope>, loader: F) -> FetchState<T>
    where
        F: FnOnce(Scope) -> Fut,
        Fut: Future<Output = Result<T, String>>,
    {
        let Some(ticket) = self.dispatch(scope).await else {
            return self.state().await;
        };

        let outcome = loader(ticket.scope.clone()).await;
        self.resolve(ticket, outcome).await;
        self.state().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::RecordId;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::oneshot;

    fn scope(id: i64, generation: u64) -> Scope {
        Scope {
            customer_id: RecordId::from(id),
            generation,
        }
    }

    #[tokio::test]
    async fn test_idle_without_scope_and_no_request() {
        let fetcher: ScopedFetcher<Vec<u32>> = ScopedFetcher::new();
        let calls = AtomicUsize::new(0);

        let state = fetcher
            .load(None, |_| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(vec![1])
            })
            .await;

        assert_eq!(state, FetchState::Idle);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_first_scope_issues_exactly_one_request() {
        let fetcher: ScopedFetcher<Vec<u32>> = ScopedFetcher::new();
        let calls = AtomicUsize::new(0);

        let state = fetcher
            .load(Some(scope(7, 1)), |s| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    assert_eq!(s.customer_id.as_str(), "7");
                    Ok(vec![1, 2])
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(state, FetchState::Ready(vec![1, 2]));
    }

    #[tokio::test]
    async fn test_failure_becomes_error_state() {
        let fetcher: ScopedFetcher<Vec<u32>> = ScopedFetcher::new();
        let state = fetcher
            .load(Some(scope(7, 1)), |_| async { Err("Nepodařilo se načíst kontroly.".to_string()) })
            .await;
        assert_eq!(state, FetchState::Error("Nepodařilo se načíst kontroly.".into()));
    }

    #[tokio::test]
    async fn test_only_latest_scope_survives_out_of_order_responses() {
        let fetcher: Arc<ScopedFetcher<&'static str>> = Arc::new(ScopedFetcher::new());
        let (slow_tx, slow_rx) = oneshot::channel::<()>();

        // first customer: response held back
        let first = {
            let fetcher = fetcher.clone();
            tokio::spawn(async move {
                fetcher
                    .load(Some(scope(1, 1)), |_| async move {
                        let _ = slow_rx.await;
                        Ok("customer 1")
                    })
                    .await
            })
        };
        tokio::task::yield_now().await;
        while fetcher.scope().await.is_none() {
            tokio::task::yield_now().await;
        }

        // second customer answers immediately
        let second = fetcher
            .load(Some(scope(2, 2)), |_| async { Ok("customer 2") })
            .await;
        assert_eq!(second, FetchState::Ready("customer 2"));

        // now the stale response arrives
        slow_tx.send(()).unwrap();
        let first_seen = first.await.unwrap();

        assert_eq!(first_seen, FetchState::Ready("customer 2"));
        assert_eq!(fetcher.state().await, FetchState::Ready("customer 2"));
        assert_eq!(fetcher.scope().await, Some(scope(2, 2)));
    }

    #[tokio::test]
    async fn test_clearing_scope_rejects_in_flight_ticket() {
        let fetcher: ScopedFetcher<u32> = ScopedFetcher::new();
        let ticket = fetcher.dispatch(Some(scope(1, 1))).await.unwrap();
        assert_eq!(fetcher.state().await, FetchState::Loading);

        assert!(fetcher.dispatch(None).await.is_none());
        assert!(!fetcher.resolve(ticket, Ok(5)).await);
        assert_eq!(fetcher.state().await, FetchState::Idle);
    }

    #[tokio::test]
    async fn test_outdated_generation_cannot_take_over_the_slot() {
        let fetcher: ScopedFetcher<&'static str> = ScopedFetcher::new();
        let newer = fetcher.dispatch(Some(scope(2, 2))).await.unwrap();

        // a request built from a snapshot taken before the switch
        let calls = AtomicUsize::new(0);
        let late = fetcher
            .load(Some(scope(1, 1)), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok("customer 1") }
            })
            .await;
        assert_eq!(late, FetchState::Loading);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        assert!(fetcher.resolve(newer, Ok("customer 2")).await);
        assert_eq!(fetcher.state().await, FetchState::Ready("customer 2"));
        assert_eq!(fetcher.scope().await, Some(scope(2, 2)));
    }

    #[tokio::test]
    async fn test_fresh_slot_can_start_at_a_generation() {
        let fetcher: ScopedFetcher<u32> = ScopedFetcher::from_generation(3);
        assert!(fetcher.dispatch(Some(scope(1, 2))).await.is_none());
        assert_eq!(fetcher.state().await, FetchState::Idle);
        assert!(fetcher.dispatch(Some(scope(1, 3))).await.is_some());
    }

    #[tokio::test]
    async fn test_same_generation_may_reload() {
        let fetcher: ScopedFetcher<u32> = ScopedFetcher::new();
        fetcher.load(Some(scope(2, 2)), |_| async { Ok(1) }).await;
        let again = fetcher.load(Some(scope(2, 2)), |_| async { Ok(2) }).await;
        assert_eq!(again, FetchState::Ready(2));
    }

    #[test]
    fn test_state_serializes_with_status_tag() {
        let ready = serde_json::to_value(FetchState::Ready(vec![1])).unwrap();
        assert_eq!(ready, serde_json::json!({ "status": "ready", "data": [1] }));

        let idle = serde_json::to_value(FetchState::<u32>::Idle).unwrap();
        assert_eq!(idle, serde_json::json!({ "status": "idle" }));
    }
}
