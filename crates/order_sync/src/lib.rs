//! Client-side synchronization core for the order master/detail views.
//!
//! The list and detail controllers each own a [`query::ReactiveQuery`] that
//! re-executes when its parameters change and can be force-refreshed. The
//! [`mutation::MutationCoordinator`] performs writes against the backing
//! store and refreshes whichever controllers were registered for the
//! affected entity kind.

use async_trait::async_trait;
use shared::{
    domain::{EntityKind, OrderId, RecordId},
    protocol::{FieldMap, ListParams, OrderDetail, OrderRecord, Page},
};

pub mod actions;
pub mod config;
pub mod cursor;
pub mod debounce;
pub mod detail;
pub mod error;
pub mod list;
pub mod mutation;
pub mod query;
pub mod rest;
pub mod rows;
pub mod timer;

pub use actions::{DetailSelection, RowActionTable, VIEW_ACTION};
pub use config::{load_settings, SyncSettings};
pub use cursor::PageCursor;
pub use debounce::SearchDebouncer;
pub use detail::{DetailPhase, DetailSyncController, DetailView, EnrichmentStage};
pub use error::{describe_error, EnrichmentError, ErrorDetail, MutationError, QueryError};
pub use list::{ListSyncController, ListView};
pub use mutation::{
    CreatePanel, EditPanel, MutationCoordinator, MutationCoordinatorBuilder, MutationOutcome,
    PanelState, ParentContext,
};
pub use rest::RestBackend;
pub use rows::OrderSummary;
pub use timer::TimerHandle;

#[async_trait]
pub trait OrderQueryService: Send + Sync {
    async fn fetch_page(&self, params: &ListParams) -> Result<Page<OrderRecord>, QueryError>;
    async fn fetch_detail(&self, order_id: &OrderId) -> Result<OrderDetail, QueryError>;
}

/// Background weather lookup attached to an order. Callers only observe
/// whether the request was accepted.
#[async_trait]
pub trait EnrichmentService: Send + Sync {
    async fn request_update(&self, order_id: &OrderId) -> Result<(), EnrichmentError>;
}

#[async_trait]
pub trait MutationService: Send + Sync {
    async fn create(&self, kind: EntityKind, fields: FieldMap) -> Result<RecordId, MutationError>;
    async fn update(
        &self,
        kind: EntityKind,
        id: &RecordId,
        fields: FieldMap,
    ) -> Result<(), MutationError>;
    async fn delete(&self, kind: EntityKind, id: &RecordId) -> Result<(), MutationError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub severity: Severity,
}

impl Notification {
    pub fn new(title: impl Into<String>, message: impl Into<String>, severity: Severity) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            severity,
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new("Success", message, Severity::Success)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new("Error", message, Severity::Error)
    }
}

pub trait NotificationSink: Send + Sync {
    fn show(&self, notification: Notification);
}

#[async_trait]
pub trait ConfirmationPrompt: Send + Sync {
    async fn ask(&self, message: &str) -> bool;
}

/// Anything whose backing query can be re-executed with its last parameters.
#[async_trait]
pub trait Refreshable: Send + Sync {
    /// Returns `false` when nothing was re-issued.
    async fn refresh(&self) -> bool;
}

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;
