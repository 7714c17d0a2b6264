//! Create/update/delete flows and the refreshes they trigger.
//!
//! A successful mutation closes its panel, raises a success notification and
//! refreshes every target registered for the entity kind, strictly after the
//! backing store acknowledged the write. Failures only raise an error
//! notification; panels stay open so the user can retry.

use std::{collections::HashMap, sync::Arc};

use serde_json::Value;
use shared::{
    domain::{EntityKind, OrderId, RecordId},
    protocol::FieldMap,
};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::{
    error::{describe_error, MutationError, MUTATION_ERROR_FALLBACK},
    ConfirmationPrompt, MutationService, Notification, NotificationSink, Refreshable,
};

/// Field under which a line item carries its parent order.
pub const PARENT_ORDER_FIELD: &str = "order_id";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParentContext {
    None,
    Order(OrderId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatePanel {
    pub kind: EntityKind,
    pub parent: ParentContext,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditPanel {
    pub kind: EntityKind,
    pub id: RecordId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PanelState {
    pub create: Option<CreatePanel>,
    pub edit: Option<EditPanel>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    Created(RecordId),
    Updated,
    Deleted,
    /// The user declined the delete confirmation.
    Declined,
    /// Already reported through the notification sink.
    Failed(String),
}

pub struct MutationCoordinator {
    mutations: Arc<dyn MutationService>,
    notifications: Arc<dyn NotificationSink>,
    confirmation: Arc<dyn ConfirmationPrompt>,
    refresh_targets: HashMap<EntityKind, Vec<Arc<dyn Refreshable>>>,
    panels: Mutex<PanelState>,
}

pub struct MutationCoordinatorBuilder {
    mutations: Arc<dyn MutationService>,
    notifications: Arc<dyn NotificationSink>,
    confirmation: Arc<dyn ConfirmationPrompt>,
    refresh_targets: HashMap<EntityKind, Vec<Arc<dyn Refreshable>>>,
}

impl MutationCoordinatorBuilder {
    /// Refresh `target` after every successful mutation of `kind`.
    pub fn refreshes(mut self, kind: EntityKind, target: Arc<dyn Refreshable>) -> Self {
        self.refresh_targets.entry(kind).or_default().push(target);
        self
    }

    pub fn build(self) -> MutationCoordinator {
        MutationCoordinator {
            mutations: self.mutations,
            notifications: self.notifications,
            confirmation: self.confirmation,
            refresh_targets: self.refresh_targets,
            panels: Mutex::new(PanelState::default()),
        }
    }
}

impl MutationCoordinator {
    pub fn builder(
        mutations: Arc<dyn MutationService>,
        notifications: Arc<dyn NotificationSink>,
        confirmation: Arc<dyn ConfirmationPrompt>,
    ) -> MutationCoordinatorBuilder {
        MutationCoordinatorBuilder {
            mutations,
            notifications,
            confirmation,
            refresh_targets: HashMap::new(),
        }
    }

    pub async fn open_create(&self, kind: EntityKind, parent: ParentContext) {
        self.panels.lock().await.create = Some(CreatePanel { kind, parent });
    }

    pub async fn open_edit(&self, kind: EntityKind, id: RecordId) {
        self.panels.lock().await.edit = Some(EditPanel { kind, id });
    }

    pub async fn close_panels(&self) {
        *self.panels.lock().await = PanelState::default();
    }

    pub async fn panels(&self) -> PanelState {
        self.panels.lock().await.clone()
    }

    pub async fn create(
        &self,
        kind: EntityKind,
        fields: FieldMap,
        parent: ParentContext,
    ) -> MutationOutcome {
        let fields = match attach_parent(kind, fields, &parent) {
            Ok(fields) => fields,
            Err(err) => return self.report_failure(kind, "create", err),
        };

        match self.mutations.create(kind, fields).await {
            Ok(id) => {
                info!(kind = %kind, id = %id, "record created");
                self.panels.lock().await.create = None;
                self.notifications
                    .show(Notification::success(format!("{} created", kind.label())));
                self.refresh_affected(kind).await;
                MutationOutcome::Created(id)
            }
            Err(err) => self.report_failure(kind, "create", err),
        }
    }

    pub async fn update(&self, kind: EntityKind, id: &RecordId, fields: FieldMap) -> MutationOutcome {
        match self.mutations.update(kind, id, fields).await {
            Ok(()) => {
                info!(kind = %kind, id = %id, "record updated");
                self.panels.lock().await.edit = None;
                self.notifications
                    .show(Notification::success(format!("{} updated", kind.label())));
                self.refresh_affected(kind).await;
                MutationOutcome::Updated
            }
            Err(err) => self.report_failure(kind, "update", err),
        }
    }

    /// Asks for confirmation first; a declined prompt never reaches the
    /// mutation service.
    pub async fn delete(&self, kind: EntityKind, id: &RecordId) -> MutationOutcome {
        let prompt = format!("Delete this {}?", kind.label().to_lowercase());
        if !self.confirmation.ask(&prompt).await {
            info!(kind = %kind, id = %id, "delete declined");
            return MutationOutcome::Declined;
        }

        match self.mutations.delete(kind, id).await {
            Ok(()) => {
                info!(kind = %kind, id = %id, "record deleted");
                self.notifications
                    .show(Notification::success(format!("{} deleted", kind.label())));
                self.refresh_affected(kind).await;
                MutationOutcome::Deleted
            }
            Err(err) => self.report_failure(kind, "delete", err),
        }
    }

    async fn refresh_affected(&self, kind: EntityKind) {
        let Some(targets) = self.refresh_targets.get(&kind) else {
            return;
        };
        for target in targets {
            target.refresh().await;
        }
    }

    fn report_failure(&self, kind: EntityKind, operation: &str, err: MutationError) -> MutationOutcome {
        warn!(kind = %kind, operation, error = %err, "mutation failed");
        let message = describe_error(&err, MUTATION_ERROR_FALLBACK);
        self.notifications.show(Notification::error(message.clone()));
        MutationOutcome::Failed(message)
    }
}

fn attach_parent(
    kind: EntityKind,
    mut fields: FieldMap,
    parent: &ParentContext,
) -> Result<FieldMap, MutationError> {
    match (kind, parent) {
        (EntityKind::OrderItem, ParentContext::Order(order_id)) => {
            fields.insert(
                PARENT_ORDER_FIELD.to_string(),
                Value::String(order_id.as_str().to_string()),
            );
            Ok(fields)
        }
        (EntityKind::OrderItem, ParentContext::None) => Err(MutationError::MissingParent { kind }),
        (EntityKind::Order, _) => Ok(fields),
    }
}

#[cfg(test)]
#[path = "tests/mutation_tests.rs"]
mod tests;
