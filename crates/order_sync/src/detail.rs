//! Single-order detail view with one-shot weather enrichment.
//!
//! The first successful load after an id is bound requests enrichment once.
//! If the request is accepted, the detail query is refreshed a single time
//! after `enrichment_refresh_delay` to pick up the enriched fields.

use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use async_trait::async_trait;
use futures::{FutureExt, StreamExt};
use shared::{
    domain::OrderId,
    protocol::{OrderDetail, OrderItem},
};
use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    config::SyncSettings,
    error::{describe_error, QueryError, DETAIL_ERROR_FALLBACK},
    query::{DeliveryStream, Fetcher, ReactiveQuery},
    rows::detail_customer_name,
    timer::TimerHandle,
    EnrichmentService, OrderQueryService, Refreshable,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailPhase {
    Idle,
    Loading,
    Loaded,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichmentStage {
    NotRequested,
    Pending,
    Done,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetailView {
    pub order_id: Option<OrderId>,
    pub phase: DetailPhase,
    pub order: Option<OrderDetail>,
    pub error: Option<String>,
    pub enrichment: EnrichmentStage,
}

impl DetailView {
    fn idle() -> Self {
        Self {
            order_id: None,
            phase: DetailPhase::Idle,
            order: None,
            error: None,
            enrichment: EnrichmentStage::NotRequested,
        }
    }

    pub fn customer_name(&self) -> String {
        self.order
            .as_ref()
            .map(detail_customer_name)
            .unwrap_or_default()
    }

    pub fn item_rows(&self) -> &[OrderItem] {
        self.order
            .as_ref()
            .map(|order| order.items.as_slice())
            .unwrap_or_default()
    }
}

struct DetailState {
    order_id: Option<OrderId>,
    /// Bumped on every rebind so late enrichment completions for a previous
    /// id can be recognized.
    activation: u64,
    enrichment_requested: bool,
    enrichment_task: Option<JoinHandle<()>>,
    delayed_refresh: Option<TimerHandle>,
    torn_down: bool,
}

impl DetailState {
    fn cancel_background(&mut self) {
        if let Some(timer) = self.delayed_refresh.take() {
            timer.cancel();
        }
        if let Some(task) = self.enrichment_task.take() {
            task.abort();
        }
    }
}

struct DetailInner {
    query: ReactiveQuery<OrderId, OrderDetail>,
    enrichment: Arc<dyn EnrichmentService>,
    refresh_delay: Duration,
    state: Mutex<DetailState>,
    view: watch::Sender<DetailView>,
    pump: JoinHandle<()>,
    this: Weak<DetailInner>,
}

#[derive(Clone)]
pub struct DetailSyncController {
    inner: Arc<DetailInner>,
}

impl DetailSyncController {
    /// Must be called from within a Tokio runtime.
    pub fn new(
        service: Arc<dyn OrderQueryService>,
        enrichment: Arc<dyn EnrichmentService>,
        settings: &SyncSettings,
    ) -> Self {
        let fetch: Fetcher<OrderId, OrderDetail> = Arc::new(move |order_id: OrderId| {
            let service = Arc::clone(&service);
            async move { service.fetch_detail(&order_id).await }.boxed()
        });
        let (query, deliveries) = ReactiveQuery::new("order_detail", fetch);
        let (view, _) = watch::channel(DetailView::idle());

        let inner = Arc::new_cyclic(|weak: &Weak<DetailInner>| DetailInner {
            query,
            enrichment,
            refresh_delay: settings.enrichment_refresh_delay(),
            state: Mutex::new(DetailState {
                order_id: None,
                activation: 0,
                enrichment_requested: false,
                enrichment_task: None,
                delayed_refresh: None,
                torn_down: false,
            }),
            view,
            pump: tokio::spawn(run_detail_pump(weak.clone(), deliveries)),
            this: weak.clone(),
        });
        Self { inner }
    }

    /// Binds the view to `order_id`. Binding a different id starts a new
    /// activation: pending enrichment work for the old id is cancelled and
    /// enrichment may be requested again.
    pub async fn set_id(&self, order_id: OrderId) -> bool {
        let mut state = self.inner.state.lock().await;
        if state.torn_down {
            return false;
        }
        self.inner.bind(&mut state, order_id).await
    }

    pub async fn on_result(&self, result: Result<OrderDetail, QueryError>) {
        self.inner.on_result(None, result).await;
    }

    pub async fn refresh(&self) -> bool {
        self.inner.refresh().await
    }

    pub fn subscribe(&self) -> watch::Receiver<DetailView> {
        self.inner.view.subscribe()
    }

    pub fn snapshot(&self) -> DetailView {
        self.inner.view.borrow().clone()
    }

    /// Cancels the delayed refresh, the enrichment request, and the in-flight
    /// query. Every later call is a no-op.
    pub async fn teardown(&self) {
        {
            let mut state = self.inner.state.lock().await;
            if state.torn_down {
                return;
            }
            state.torn_down = true;
            state.cancel_background();
        }
        self.inner.query.cancel().await;
        self.inner.pump.abort();
        info!("order detail controller torn down");
    }
}

#[async_trait]
impl Refreshable for DetailSyncController {
    async fn refresh(&self) -> bool {
        self.inner.refresh().await
    }
}

impl DetailInner {
    async fn bind(&self, state: &mut DetailState, order_id: OrderId) -> bool {
        if state.order_id.as_ref() != Some(&order_id) {
            state.cancel_background();
            state.activation += 1;
            state.enrichment_requested = false;
            state.order_id = Some(order_id.clone());
            let bound = order_id.clone();
            self.view.send_modify(|view| {
                view.order_id = Some(bound);
                view.phase = DetailPhase::Loading;
                view.order = None;
                view.error = None;
                view.enrichment = EnrichmentStage::NotRequested;
            });
        }

        let issued = self.query.set_params(order_id.clone()).await;
        if issued {
            info!(order_id = %order_id, "order detail query issued");
        }
        issued
    }

    async fn refresh(&self) -> bool {
        if self.state.lock().await.torn_down {
            return false;
        }
        self.query.refresh().await
    }

    async fn on_result(&self, seq: Option<u64>, result: Result<OrderDetail, QueryError>) {
        let mut state = self.state.lock().await;
        if state.torn_down {
            return;
        }
        // Same lock order as `set_id`: state first, then the query.
        if let Some(seq) = seq {
            if !self.query.is_current(seq).await {
                debug!(seq, "dropping stale order detail");
                return;
            }
        }

        match result {
            Ok(order) => {
                debug!(order_id = %order.id, items = order.items.len(), "order detail delivered");
                let request_enrichment = !state.enrichment_requested;
                self.view.send_modify(|view| {
                    view.phase = DetailPhase::Loaded;
                    view.order = Some(order);
                    view.error = None;
                    if request_enrichment {
                        view.enrichment = EnrichmentStage::Pending;
                    }
                });

                if request_enrichment {
                    if let Some(order_id) = state.order_id.clone() {
                        let activation = state.activation;
                        state.enrichment_requested = true;
                        state.enrichment_task = Some(tokio::spawn(run_enrichment(
                            self.this.clone(),
                            Arc::clone(&self.enrichment),
                            order_id,
                            activation,
                        )));
                    }
                }
            }
            Err(err) => {
                warn!(error = %err, "error loading order detail");
                let message = describe_error(&err, DETAIL_ERROR_FALLBACK);
                self.view.send_modify(|view| {
                    view.phase = DetailPhase::Failed;
                    view.order = None;
                    view.error = Some(message);
                });
            }
        }
    }

    async fn finish_enrichment(&self, activation: u64, accepted: bool) {
        let mut state = self.state.lock().await;
        if state.torn_down || state.activation != activation {
            debug!(activation, "ignoring enrichment outcome for a previous activation");
            return;
        }

        if accepted {
            let this = self.this.clone();
            state.delayed_refresh = Some(TimerHandle::schedule(self.refresh_delay, async move {
                let Some(inner) = this.upgrade() else { return };
                inner.delayed_refresh(activation).await;
            }));
        }
        self.view.send_modify(|view| {
            view.enrichment = if accepted {
                EnrichmentStage::Done
            } else {
                EnrichmentStage::Failed
            };
        });
    }

    async fn delayed_refresh(&self, activation: u64) {
        {
            let state = self.state.lock().await;
            if state.torn_down || state.activation != activation {
                return;
            }
        }
        debug!(activation, "refreshing order detail after enrichment");
        self.query.refresh().await;
    }
}

impl Drop for DetailInner {
    fn drop(&mut self) {
        self.pump.abort();
        if let Ok(mut state) = self.state.try_lock() {
            state.cancel_background();
        }
    }
}

async fn run_enrichment(
    inner: Weak<DetailInner>,
    service: Arc<dyn EnrichmentService>,
    order_id: OrderId,
    activation: u64,
) {
    info!(order_id = %order_id, "requesting weather enrichment");
    let accepted = match service.request_update(&order_id).await {
        Ok(()) => true,
        Err(err) => {
            warn!(order_id = %order_id, error = %err, "weather enrichment failed; keeping current fields");
            false
        }
    };

    if let Some(inner) = inner.upgrade() {
        inner.finish_enrichment(activation, accepted).await;
    }
}

async fn run_detail_pump(
    inner: Weak<DetailInner>,
    mut deliveries: DeliveryStream<OrderId, OrderDetail>,
) {
    while let Some(delivery) = deliveries.next().await {
        let Some(inner) = inner.upgrade() else { break };
        debug!(seq = delivery.seq, order_id = %delivery.params, "order detail delivery");
        inner.on_result(Some(delivery.seq), delivery.result).await;
    }
}

#[cfg(test)]
#[path = "tests/detail_tests.rs"]
mod tests;
