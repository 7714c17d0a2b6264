//! Recording fakes for the collaborator traits.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use shared::{
    domain::{CustomerId, EntityKind, OrderId, OrderItemId, RecordId},
    protocol::{CustomerRecord, FieldMap, ListParams, OrderDetail, OrderItem, OrderRecord, Page},
};

use crate::{
    ConfirmationPrompt, EnrichmentError, EnrichmentService, MutationError, MutationService,
    Notification, NotificationSink, OrderQueryService, QueryError, Refreshable,
};

pub(crate) fn sample_record(index: u64) -> OrderRecord {
    OrderRecord {
        id: OrderId::new(format!("a0{index:04}")),
        name: format!("O-{index:04}"),
        customer: Some(CustomerRecord {
            id: Some(CustomerId::new(format!("c0{index:04}"))),
            first_name: Some("Grace".into()),
            last_name: Some(format!("Hopper{index}")),
            city: Some("Arlington".into()),
        }),
        order_date: None,
        total: Some(index as f64 * 10.0),
        overdue: index % 2 == 0,
        weather_description: None,
        weather_temperature: None,
        weather_last_updated: None,
        created_date: None,
    }
}

pub(crate) fn sample_detail(order_id: &OrderId, items: usize) -> OrderDetail {
    OrderDetail {
        id: order_id.clone(),
        customer_first_name: Some("Grace".into()),
        customer_last_name: Some("Hopper".into()),
        customer_name: None,
        items: (0..items)
            .map(|i| OrderItem {
                id: OrderItemId::new(format!("{}-item-{i}", order_id.as_str())),
                product_name: Some(format!("Widget {i}")),
                quantity: 2.0,
                unit_price: Some(5.0),
                total: Some(10.0),
            })
            .collect(),
    }
}

/// Serves `total` synthetic records per search term, with optional latency
/// and failure injection.
pub(crate) struct FakeOrders {
    totals: Mutex<HashMap<String, u64>>,
    latency: Mutex<HashMap<String, Duration>>,
    detail_latency: Mutex<HashMap<OrderId, Duration>>,
    fail_pages: Mutex<Option<QueryError>>,
    fail_detail: Mutex<Option<QueryError>>,
    detail_items: Mutex<usize>,
    pub page_calls: Mutex<Vec<ListParams>>,
    pub detail_calls: Mutex<Vec<OrderId>>,
}

impl FakeOrders {
    pub fn with_total(total: u64) -> Self {
        Self {
            totals: Mutex::new(HashMap::from([(String::new(), total)])),
            latency: Mutex::new(HashMap::new()),
            detail_latency: Mutex::new(HashMap::new()),
            fail_pages: Mutex::new(None),
            fail_detail: Mutex::new(None),
            detail_items: Mutex::new(1),
            page_calls: Mutex::new(Vec::new()),
            detail_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn set_total(&self, search_term: &str, total: u64) {
        self.totals
            .lock()
            .expect("totals lock")
            .insert(search_term.to_string(), total);
    }

    pub fn set_latency(&self, search_term: &str, latency: Duration) {
        self.latency
            .lock()
            .expect("latency lock")
            .insert(search_term.to_string(), latency);
    }

    pub fn set_detail_latency(&self, order_id: &OrderId, latency: Duration) {
        self.detail_latency
            .lock()
            .expect("latency lock")
            .insert(order_id.clone(), latency);
    }

    pub fn fail_pages_with(&self, err: Option<QueryError>) {
        *self.fail_pages.lock().expect("fail lock") = err;
    }

    pub fn fail_detail_with(&self, err: Option<QueryError>) {
        *self.fail_detail.lock().expect("fail lock") = err;
    }

    pub fn set_detail_items(&self, items: usize) {
        *self.detail_items.lock().expect("items lock") = items;
    }

    pub fn page_call_count(&self) -> usize {
        self.page_calls.lock().expect("calls lock").len()
    }

    pub fn last_page_call(&self) -> Option<ListParams> {
        self.page_calls.lock().expect("calls lock").last().cloned()
    }

    pub fn detail_call_count(&self) -> usize {
        self.detail_calls.lock().expect("calls lock").len()
    }
}

#[async_trait]
impl OrderQueryService for FakeOrders {
    async fn fetch_page(&self, params: &ListParams) -> Result<Page<OrderRecord>, QueryError> {
        self.page_calls
            .lock()
            .expect("calls lock")
            .push(params.clone());

        let latency = self
            .latency
            .lock()
            .expect("latency lock")
            .get(&params.search_term)
            .copied();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let failure = self.fail_pages.lock().expect("fail lock").clone();
        if let Some(err) = failure {
            return Err(err);
        }

        let total = self
            .totals
            .lock()
            .expect("totals lock")
            .get(&params.search_term)
            .copied()
            .unwrap_or(0);
        let start = u64::from(params.page_number.saturating_sub(1)) * u64::from(params.page_size);
        let end = (start + u64::from(params.page_size)).min(total);
        Ok(Page {
            records: (start..end).map(sample_record).collect(),
            total,
            page_number: params.page_number,
            page_size: params.page_size,
        })
    }

    async fn fetch_detail(&self, order_id: &OrderId) -> Result<OrderDetail, QueryError> {
        self.detail_calls
            .lock()
            .expect("calls lock")
            .push(order_id.clone());

        let latency = self
            .detail_latency
            .lock()
            .expect("latency lock")
            .get(order_id)
            .copied();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let failure = self.fail_detail.lock().expect("fail lock").clone();
        if let Some(err) = failure {
            return Err(err);
        }
        let items = *self.detail_items.lock().expect("items lock");
        Ok(sample_detail(order_id, items))
    }
}

pub(crate) struct FakeEnrichment {
    fail: bool,
    latency: Duration,
    pub calls: Mutex<Vec<OrderId>>,
}

impl FakeEnrichment {
    pub fn succeeding() -> Self {
        Self {
            fail: false,
            latency: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::succeeding()
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("calls lock").len()
    }
}

#[async_trait]
impl EnrichmentService for FakeEnrichment {
    async fn request_update(&self, order_id: &OrderId) -> Result<(), EnrichmentError> {
        self.calls
            .lock()
            .expect("calls lock")
            .push(order_id.clone());
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.fail {
            return Err(EnrichmentError::Rejected { status: 503 });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum MutationCall {
    Create(EntityKind, FieldMap),
    Update(EntityKind, RecordId, FieldMap),
    Delete(EntityKind, RecordId),
}

pub(crate) struct RecordingMutations {
    fail_with: Mutex<Option<MutationError>>,
    pub calls: Mutex<Vec<MutationCall>>,
}

impl RecordingMutations {
    pub fn ok() -> Self {
        Self {
            fail_with: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(err: MutationError) -> Self {
        Self {
            fail_with: Mutex::new(Some(err)),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn recover(&self) {
        *self.fail_with.lock().expect("fail lock") = None;
    }

    pub fn calls(&self) -> Vec<MutationCall> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn record(&self, call: MutationCall) -> Result<(), MutationError> {
        self.calls.lock().expect("calls lock").push(call);
        match self.fail_with.lock().expect("fail lock").clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl MutationService for RecordingMutations {
    async fn create(&self, kind: EntityKind, fields: FieldMap) -> Result<RecordId, MutationError> {
        self.record(MutationCall::Create(kind, fields))?;
        Ok(RecordId::new("new-record"))
    }

    async fn update(
        &self,
        kind: EntityKind,
        id: &RecordId,
        fields: FieldMap,
    ) -> Result<(), MutationError> {
        self.record(MutationCall::Update(kind, id.clone(), fields))
    }

    async fn delete(&self, kind: EntityKind, id: &RecordId) -> Result<(), MutationError> {
        self.record(MutationCall::Delete(kind, id.clone()))
    }
}

#[derive(Default)]
pub(crate) struct RecordingSink {
    pub shown: Mutex<Vec<Notification>>,
}

impl RecordingSink {
    pub fn shown(&self) -> Vec<Notification> {
        self.shown.lock().expect("sink lock").clone()
    }
}

impl NotificationSink for RecordingSink {
    fn show(&self, notification: Notification) {
        self.shown.lock().expect("sink lock").push(notification);
    }
}

pub(crate) struct ScriptedPrompt {
    answer: bool,
    pub asked: Mutex<Vec<String>>,
}

impl ScriptedPrompt {
    pub fn answering(answer: bool) -> Self {
        Self {
            answer,
            asked: Mutex::new(Vec::new()),
        }
    }

    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().expect("prompt lock").clone()
    }
}

#[async_trait]
impl ConfirmationPrompt for ScriptedPrompt {
    async fn ask(&self, message: &str) -> bool {
        self.asked
            .lock()
            .expect("prompt lock")
            .push(message.to_string());
        self.answer
    }
}

#[derive(Default)]
pub(crate) struct CountingRefresh {
    count: AtomicUsize,
}

impl CountingRefresh {
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Refreshable for CountingRefresh {
    async fn refresh(&self) -> bool {
        self.count.fetch_add(1, Ordering::SeqCst);
        true
    }
}

/// Lets every ready task run and every timer up to `ms` fire. Only
/// meaningful on a paused clock.
pub(crate) async fn settle(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}
