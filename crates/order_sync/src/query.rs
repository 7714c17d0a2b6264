//! Parameterized queries that re-execute on parameter change and can be
//! force-refreshed.
//!
//! Each issue bumps a request sequence number. A completed fetch is published
//! only if its sequence is still the latest, so a slow response for a
//! superseded parameter set never reaches the subscriber.

use std::{fmt::Debug, sync::Arc};

use futures::future::BoxFuture;
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinHandle,
};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::debug;

use crate::error::QueryError;

pub type Fetcher<P, T> = Arc<dyn Fn(P) -> BoxFuture<'static, Result<T, QueryError>> + Send + Sync>;

#[derive(Debug, Clone)]
pub struct Delivery<P, T> {
    pub seq: u64,
    pub params: P,
    pub result: Result<T, QueryError>,
}

struct QueryState<P> {
    params: Option<P>,
    seq: u64,
    in_flight: Option<JoinHandle<()>>,
}

pub struct ReactiveQuery<P, T> {
    name: &'static str,
    fetch: Fetcher<P, T>,
    state: Arc<Mutex<QueryState<P>>>,
    deliveries: mpsc::UnboundedSender<Delivery<P, T>>,
}

pub type DeliveryStream<P, T> = UnboundedReceiverStream<Delivery<P, T>>;

impl<P, T> ReactiveQuery<P, T>
where
    P: Clone + PartialEq + Debug + Send + Sync + 'static,
    T: Send + 'static,
{
    /// Builds the query together with its only result stream.
    pub fn new(name: &'static str, fetch: Fetcher<P, T>) -> (Self, DeliveryStream<P, T>) {
        let (deliveries, rx) = mpsc::unbounded_channel();
        let query = Self {
            name,
            fetch,
            state: Arc::new(Mutex::new(QueryState {
                params: None,
                seq: 0,
                in_flight: None,
            })),
            deliveries,
        };
        (query, UnboundedReceiverStream::new(rx))
    }

    /// Issues the query if `params` differs from the last issued set.
    pub async fn set_params(&self, params: P) -> bool {
        let mut state = self.state.lock().await;
        if state.params.as_ref() == Some(&params) {
            return false;
        }
        self.issue(&mut state, params);
        true
    }

    /// Re-issues the last parameter set. No-op before the first issue.
    pub async fn refresh(&self) -> bool {
        let mut state = self.state.lock().await;
        let Some(params) = state.params.clone() else {
            debug!(query = self.name, "refresh ignored; query never issued");
            return false;
        };
        self.issue(&mut state, params);
        true
    }

    pub async fn params(&self) -> Option<P> {
        self.state.lock().await.params.clone()
    }

    pub async fn is_current(&self, seq: u64) -> bool {
        self.state.lock().await.seq == seq
    }

    /// Aborts the in-flight fetch and invalidates anything already completed
    /// but not yet consumed.
    pub async fn cancel(&self) {
        let mut state = self.state.lock().await;
        state.seq += 1;
        if let Some(task) = state.in_flight.take() {
            task.abort();
        }
    }

    fn issue(&self, state: &mut QueryState<P>, params: P) {
        state.seq += 1;
        let seq = state.seq;
        state.params = Some(params.clone());
        debug!(query = self.name, seq, ?params, "issuing query");

        let name = self.name;
        let fetch = Arc::clone(&self.fetch);
        let shared = Arc::clone(&self.state);
        let deliveries = self.deliveries.clone();
        let task = tokio::spawn(async move {
            let result = fetch(params.clone()).await;
            let state = shared.lock().await;
            if state.seq != seq {
                debug!(query = name, seq, latest = state.seq, "discarding superseded result");
                return;
            }
            if deliveries.send(Delivery { seq, params, result }).is_err() {
                debug!(query = name, seq, "result stream closed");
            }
        });

        if let Some(previous) = state.in_flight.replace(task) {
            previous.abort();
        }
    }
}

impl<P, T> Drop for ReactiveQuery<P, T> {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.try_lock() {
            if let Some(task) = state.in_flight.take() {
                task.abort();
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/query_tests.rs"]
mod tests;
