use super::*;

use serde_json::json;

use crate::test_support::{settle, FakeEnrichment, FakeOrders};

fn controller(orders: &Arc<FakeOrders>, enrichment: &Arc<FakeEnrichment>) -> DetailSyncController {
    DetailSyncController::new(orders.clone(), enrichment.clone(), &SyncSettings::default())
}

fn order(id: &str) -> OrderId {
    OrderId::new(id)
}

#[tokio::test(start_paused = true)]
async fn accepted_enrichment_triggers_exactly_one_delayed_refresh() {
    let orders = Arc::new(FakeOrders::with_total(0));
    let enrichment = Arc::new(FakeEnrichment::succeeding());
    let detail = controller(&orders, &enrichment);

    assert!(detail.set_id(order("a01")).await);
    settle(10).await;
    let view = detail.snapshot();
    assert_eq!(view.phase, DetailPhase::Loaded);
    assert_eq!(view.enrichment, EnrichmentStage::Done);
    assert_eq!(orders.detail_call_count(), 1);
    assert_eq!(enrichment.call_count(), 1);

    settle(1480).await;
    assert_eq!(orders.detail_call_count(), 1);

    settle(20).await;
    assert_eq!(orders.detail_call_count(), 2);

    settle(5000).await;
    assert_eq!(orders.detail_call_count(), 2);
    assert_eq!(enrichment.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn teardown_before_delay_cancels_refresh() {
    let orders = Arc::new(FakeOrders::with_total(0));
    let enrichment = Arc::new(FakeEnrichment::succeeding());
    let detail = controller(&orders, &enrichment);

    detail.set_id(order("a01")).await;
    settle(10).await;
    detail.teardown().await;
    settle(3000).await;

    assert_eq!(orders.detail_call_count(), 1);
    assert!(!detail.set_id(order("a02")).await);
    assert!(!detail.refresh().await);
}

#[tokio::test(start_paused = true)]
async fn repeated_deliveries_request_enrichment_once() {
    let orders = Arc::new(FakeOrders::with_total(0));
    let enrichment = Arc::new(FakeEnrichment::succeeding());
    let detail = controller(&orders, &enrichment);

    detail.set_id(order("a01")).await;
    settle(10).await;
    assert!(detail.refresh().await);
    settle(10).await;
    detail
        .on_result(Ok(crate::test_support::sample_detail(&order("a01"), 2)))
        .await;
    settle(10).await;

    assert_eq!(enrichment.call_count(), 1);
    assert_eq!(detail.snapshot().item_rows().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn failed_enrichment_is_swallowed() {
    let orders = Arc::new(FakeOrders::with_total(0));
    let enrichment = Arc::new(FakeEnrichment::failing());
    let detail = controller(&orders, &enrichment);

    detail.set_id(order("a01")).await;
    settle(10).await;
    let view = detail.snapshot();
    assert_eq!(view.phase, DetailPhase::Loaded);
    assert_eq!(view.enrichment, EnrichmentStage::Failed);
    assert_eq!(view.error, None);
    assert!(view.order.is_some());

    settle(5000).await;
    assert_eq!(orders.detail_call_count(), 1);
    assert_eq!(enrichment.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_load_clears_order_and_shows_message() {
    let orders = Arc::new(FakeOrders::with_total(0));
    let enrichment = Arc::new(FakeEnrichment::failing());
    let detail = controller(&orders, &enrichment);

    detail.set_id(order("a01")).await;
    settle(10).await;
    assert!(detail.snapshot().order.is_some());

    orders.fail_detail_with(Some(QueryError::Rejected {
        status: 404,
        body: Some(json!({ "code": "not_found", "message": "Order not found" })),
    }));
    detail.refresh().await;
    settle(10).await;

    let view = detail.snapshot();
    assert_eq!(view.phase, DetailPhase::Failed);
    assert_eq!(view.order, None);
    assert_eq!(view.error.as_deref(), Some("Order not found"));
    assert_eq!(view.customer_name(), "");
    assert!(view.item_rows().is_empty());

    orders.fail_detail_with(None);
    detail.refresh().await;
    settle(10).await;
    let view = detail.snapshot();
    assert_eq!(view.phase, DetailPhase::Loaded);
    assert_eq!(view.error, None);
}

#[tokio::test(start_paused = true)]
async fn rebinding_supersedes_pending_refresh_and_resets_enrichment() {
    let orders = Arc::new(FakeOrders::with_total(0));
    let enrichment = Arc::new(FakeEnrichment::succeeding());
    let detail = controller(&orders, &enrichment);

    detail.set_id(order("a01")).await;
    settle(10).await;
    detail.set_id(order("a02")).await;
    settle(10).await;

    assert_eq!(
        *enrichment.calls.lock().expect("calls lock"),
        vec![order("a01"), order("a02")]
    );

    settle(1600).await;
    assert_eq!(
        *orders.detail_calls.lock().expect("calls lock"),
        vec![order("a01"), order("a02"), order("a02")]
    );
}

#[tokio::test(start_paused = true)]
async fn detail_queued_behind_a_rebind_is_discarded() {
    let orders = Arc::new(FakeOrders::with_total(0));
    orders.set_detail_latency(&order("a02"), Duration::from_millis(500));
    let enrichment = Arc::new(FakeEnrichment::succeeding());
    let detail = controller(&orders, &enrichment);
    assert!(detail.set_id(order("a01")).await);

    let mut state = detail.inner.state.lock().await;
    settle(10).await;
    assert!(detail.inner.bind(&mut state, order("a02")).await);
    drop(state);

    settle(10).await;
    let view = detail.snapshot();
    assert_eq!(view.order_id, Some(order("a02")));
    assert_eq!(view.phase, DetailPhase::Loading);
    assert_eq!(view.order, None);
    assert_eq!(enrichment.call_count(), 0);

    settle(600).await;
    let view = detail.snapshot();
    assert_eq!(view.phase, DetailPhase::Loaded);
    assert_eq!(view.order.map(|loaded| loaded.id), Some(order("a02")));
    assert_eq!(*enrichment.calls.lock().expect("calls lock"), vec![order("a02")]);
}

#[tokio::test(start_paused = true)]
async fn rebinding_same_id_keeps_activation() {
    let orders = Arc::new(FakeOrders::with_total(0));
    let enrichment = Arc::new(FakeEnrichment::succeeding());
    let detail = controller(&orders, &enrichment);

    assert!(detail.set_id(order("a01")).await);
    settle(10).await;
    assert!(!detail.set_id(order("a01")).await);
    settle(10).await;

    assert_eq!(enrichment.call_count(), 1);
    assert_eq!(detail.snapshot().phase, DetailPhase::Loaded);
}

#[tokio::test(start_paused = true)]
async fn slow_enrichment_for_previous_id_schedules_nothing() {
    let orders = Arc::new(FakeOrders::with_total(0));
    let enrichment =
        Arc::new(FakeEnrichment::succeeding().with_latency(Duration::from_millis(500)));
    let detail = controller(&orders, &enrichment);

    detail.set_id(order("a01")).await;
    settle(10).await;
    assert_eq!(detail.snapshot().enrichment, EnrichmentStage::Pending);

    detail.set_id(order("a02")).await;
    settle(3000).await;

    let refreshed_a01 = orders
        .detail_calls
        .lock()
        .expect("calls lock")
        .iter()
        .filter(|id| **id == order("a01"))
        .count();
    assert_eq!(refreshed_a01, 1);
}

#[tokio::test]
async fn idle_view_and_refresh_before_binding() {
    let orders = Arc::new(FakeOrders::with_total(0));
    let enrichment = Arc::new(FakeEnrichment::succeeding());
    let detail = controller(&orders, &enrichment);

    let view = detail.snapshot();
    assert_eq!(view.phase, DetailPhase::Idle);
    assert_eq!(view.order_id, None);
    assert!(!detail.refresh().await);
    assert_eq!(orders.detail_call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn loaded_view_exposes_customer_name_and_items() {
    let orders = Arc::new(FakeOrders::with_total(0));
    orders.set_detail_items(3);
    let enrichment = Arc::new(FakeEnrichment::failing());
    let detail = controller(&orders, &enrichment);
    let mut updates = detail.subscribe();

    detail.set_id(order("a07")).await;
    settle(10).await;

    assert!(updates.has_changed().expect("sender alive"));
    let view = updates.borrow_and_update().clone();
    assert_eq!(view.order_id, Some(order("a07")));
    assert_eq!(view.customer_name(), "Grace Hopper");
    assert_eq!(view.item_rows().len(), 3);
    assert_eq!(view.item_rows()[0].product_name.as_deref(), Some("Widget 0"));
}
