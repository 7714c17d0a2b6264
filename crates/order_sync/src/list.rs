//! Paginated, searchable order list.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use futures::{FutureExt, StreamExt};
use shared::protocol::{ListParams, OrderRecord, Page};
use tokio::{
    sync::{mpsc, watch, Mutex},
    task::JoinHandle,
};
use tracing::{debug, error, info};

use crate::{
    actions::{DetailSelection, RowActionTable},
    config::SyncSettings,
    cursor::PageCursor,
    debounce::SearchDebouncer,
    error::{describe_error, QueryError, LIST_ERROR_FALLBACK},
    query::{DeliveryStream, Fetcher, ReactiveQuery},
    rows::{summarize_page, OrderSummary},
    OrderQueryService, Refreshable,
};

type OrderPage = Page<OrderRecord>;

#[derive(Debug, Clone, PartialEq)]
pub struct ListView {
    pub rows: Vec<OrderSummary>,
    pub total_records: u64,
    pub page_number: u32,
    pub page_size: u32,
    pub total_pages: u32,
    pub search_term: String,
    pub loading: bool,
    pub last_error: Option<String>,
    pub selection: DetailSelection,
}

impl ListView {
    fn initial(cursor: &PageCursor) -> Self {
        Self {
            rows: Vec::new(),
            total_records: cursor.total_records(),
            page_number: cursor.page_number(),
            page_size: cursor.page_size(),
            total_pages: cursor.total_pages(),
            search_term: String::new(),
            loading: false,
            last_error: None,
            selection: DetailSelection::default(),
        }
    }

    pub fn is_first_page(&self) -> bool {
        self.page_number <= 1
    }

    pub fn is_last_page(&self) -> bool {
        self.page_number >= self.total_pages
    }
}

struct ListState {
    cursor: PageCursor,
    search_term: String,
    debouncer: SearchDebouncer,
    selection: DetailSelection,
    torn_down: bool,
}

impl ListState {
    fn params(&self) -> ListParams {
        ListParams::new(
            self.cursor.page_size(),
            self.cursor.page_number(),
            self.search_term.clone(),
        )
    }
}

struct ListInner {
    query: ReactiveQuery<ListParams, OrderPage>,
    state: Mutex<ListState>,
    view: watch::Sender<ListView>,
    actions: RowActionTable,
    pump: JoinHandle<()>,
}

/// Cheap, cloneable handle to the list controller. The controller stops when
/// `teardown` is called or the last handle is dropped.
#[derive(Clone)]
pub struct ListSyncController {
    inner: Arc<ListInner>,
}

impl ListSyncController {
    /// Must be called from within a Tokio runtime.
    pub fn new(service: Arc<dyn OrderQueryService>, settings: &SyncSettings) -> Self {
        Self::with_actions(service, settings, RowActionTable::standard())
    }

    pub fn with_actions(
        service: Arc<dyn OrderQueryService>,
        settings: &SyncSettings,
        actions: RowActionTable,
    ) -> Self {
        let fetch: Fetcher<ListParams, OrderPage> = Arc::new(move |params: ListParams| {
            let service = Arc::clone(&service);
            async move { service.fetch_page(&params).await }.boxed()
        });
        let (query, deliveries) = ReactiveQuery::new("order_list", fetch);
        let (debouncer, commits) = SearchDebouncer::new(settings.search_debounce());
        let cursor = PageCursor::new(settings.page_size);
        let (view, _) = watch::channel(ListView::initial(&cursor));

        let inner = Arc::new_cyclic(|weak: &Weak<ListInner>| ListInner {
            query,
            state: Mutex::new(ListState {
                cursor,
                search_term: String::new(),
                debouncer,
                selection: DetailSelection::default(),
                torn_down: false,
            }),
            view,
            actions,
            pump: tokio::spawn(run_list_pump(weak.clone(), deliveries, commits)),
        });
        Self { inner }
    }

    /// Issues the first query with the current cursor and search term.
    pub async fn start(&self) -> bool {
        let state = self.inner.state.lock().await;
        if state.torn_down {
            return false;
        }
        self.inner.issue(&state).await
    }

    pub async fn set_params(
        &self,
        page_size: u32,
        page_number: u32,
        search_term: impl Into<String>,
    ) -> bool {
        let mut state = self.inner.state.lock().await;
        if state.torn_down {
            return false;
        }
        state.cursor.set_page_size(page_size);
        state.cursor.jump_to(page_number);
        state.search_term = search_term.into();
        self.inner.issue(&state).await
    }

    pub async fn on_result(&self, result: Result<OrderPage, QueryError>) {
        self.inner.on_result(None, result).await;
    }

    pub async fn refresh(&self) -> bool {
        self.inner.refresh().await
    }

    pub async fn next_page(&self) -> bool {
        let mut state = self.inner.state.lock().await;
        if state.torn_down || !state.cursor.next() {
            return false;
        }
        self.inner.issue(&state).await
    }

    pub async fn prev_page(&self) -> bool {
        let mut state = self.inner.state.lock().await;
        if state.torn_down || !state.cursor.prev() {
            return false;
        }
        self.inner.issue(&state).await
    }

    /// Raw keystroke from the search box; committed after the quiet period.
    pub async fn on_search_input(&self, raw: &str) {
        let mut state = self.inner.state.lock().await;
        if state.torn_down {
            return;
        }
        state.debouncer.on_input(raw);
    }

    pub async fn handle_row_action(&self, action: &str, row: &OrderSummary) -> bool {
        let mut state = self.inner.state.lock().await;
        if state.torn_down {
            return false;
        }
        let handled = self.inner.actions.dispatch(action, &mut state.selection, row);
        if handled {
            let selection = state.selection.clone();
            self.inner
                .view
                .send_modify(|view| view.selection = selection);
        }
        handled
    }

    pub async fn close_detail(&self) {
        let mut state = self.inner.state.lock().await;
        state.selection.close();
        self.inner
            .view
            .send_modify(|view| view.selection = DetailSelection::default());
    }

    pub async fn selection(&self) -> DetailSelection {
        self.inner.state.lock().await.selection.clone()
    }

    pub fn row_actions(&self) -> Vec<(&'static str, &'static str)> {
        self.inner.actions.actions()
    }

    pub fn subscribe(&self) -> watch::Receiver<ListView> {
        self.inner.view.subscribe()
    }

    pub fn snapshot(&self) -> ListView {
        self.inner.view.borrow().clone()
    }

    /// Cancels the pending search commit, the in-flight query, and stops
    /// consuming results. Every later call is a no-op.
    pub async fn teardown(&self) {
        {
            let mut state = self.inner.state.lock().await;
            if state.torn_down {
                return;
            }
            state.torn_down = true;
            state.debouncer.cancel();
        }
        self.inner.query.cancel().await;
        self.inner.pump.abort();
        info!("order list controller torn down");
    }
}

#[async_trait]
impl Refreshable for ListSyncController {
    async fn refresh(&self) -> bool {
        self.inner.refresh().await
    }
}

impl ListInner {
    async fn issue(&self, state: &ListState) -> bool {
        let params = state.params();
        let issued = self.query.set_params(params.clone()).await;
        if issued {
            info!(
                page_size = params.page_size,
                page_number = params.page_number,
                search_term = %params.search_term,
                "order list query issued"
            );
        }
        self.view.send_modify(|view| {
            view.page_number = params.page_number;
            view.page_size = params.page_size;
            view.search_term = params.search_term;
            view.loading |= issued;
        });
        issued
    }

    async fn refresh(&self) -> bool {
        if self.state.lock().await.torn_down {
            return false;
        }
        let issued = self.query.refresh().await;
        if issued {
            self.view.send_modify(|view| view.loading = true);
        }
        issued
    }

    async fn commit_search(&self, term: String) {
        let mut state = self.state.lock().await;
        if state.torn_down {
            return;
        }
        debug!(search_term = %term, "search term committed");
        state.search_term = term;
        state.cursor.reset();
        self.issue(&state).await;
    }

    /// A delivery carrying `seq` is applied only if no newer query was issued.
    /// The check runs under the state lock so an issue cannot slip in between.
    async fn on_result(&self, seq: Option<u64>, result: Result<OrderPage, QueryError>) {
        let mut state = self.state.lock().await;
        if state.torn_down {
            return;
        }
        if let Some(seq) = seq {
            if !self.query.is_current(seq).await {
                debug!(seq, "dropping stale order page");
                return;
            }
        }

        match result {
            Ok(page) => {
                let page_size = state.cursor.page_size();
                let clamped = state.cursor.recompute(page.total, page_size);
                let rows = summarize_page(&page);
                debug!(total = page.total, rows = rows.len(), "order page delivered");

                let cursor = state.cursor;
                self.view.send_modify(|view| {
                    view.rows = rows;
                    view.total_records = cursor.total_records();
                    view.total_pages = cursor.total_pages();
                    view.page_number = cursor.page_number();
                    view.loading = false;
                    view.last_error = None;
                });

                if clamped {
                    info!(
                        page_number = cursor.page_number(),
                        "current page no longer exists; loading last page"
                    );
                    self.issue(&state).await;
                }
            }
            Err(err) => {
                error!(error = %err, "error loading orders");
                let message = describe_error(&err, LIST_ERROR_FALLBACK);
                self.view.send_modify(|view| {
                    view.loading = false;
                    view.last_error = Some(message);
                });
            }
        }
    }
}

impl Drop for ListInner {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

async fn run_list_pump(
    inner: Weak<ListInner>,
    mut deliveries: DeliveryStream<ListParams, OrderPage>,
    mut commits: mpsc::UnboundedReceiver<String>,
) {
    loop {
        tokio::select! {
            Some(delivery) = deliveries.next() => {
                let Some(inner) = inner.upgrade() else { break };
                inner.on_result(Some(delivery.seq), delivery.result).await;
            }
            Some(term) = commits.recv() => {
                let Some(inner) = inner.upgrade() else { break };
                inner.commit_search(term).await;
            }
            else => break,
        }
    }
}

#[cfg(test)]
#[path = "tests/list_tests.rs"]
mod tests;
