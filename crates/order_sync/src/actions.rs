use std::collections::HashMap;

use shared::domain::OrderId;
use tracing::warn;

use crate::rows::OrderSummary;

pub const VIEW_ACTION: &str = "view";

/// Which order, if any, the detail panel is showing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailSelection {
    pub order_id: Option<OrderId>,
    pub show_detail: bool,
}

impl DetailSelection {
    pub fn open(&mut self, order_id: OrderId) {
        self.order_id = Some(order_id);
        self.show_detail = true;
    }

    pub fn close(&mut self) {
        self.order_id = None;
        self.show_detail = false;
    }
}

pub type RowActionHandler = fn(&mut DetailSelection, &OrderSummary);

/// Row action name to handler, built once per list controller.
pub struct RowActionTable {
    handlers: HashMap<&'static str, (&'static str, RowActionHandler)>,
}

impl RowActionTable {
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn standard() -> Self {
        let mut table = Self::empty();
        table.register(VIEW_ACTION, "View Details", open_detail);
        table
    }

    pub fn register(&mut self, name: &'static str, label: &'static str, handler: RowActionHandler) {
        self.handlers.insert(name, (label, handler));
    }

    /// `(name, label)` pairs sorted by name.
    pub fn actions(&self) -> Vec<(&'static str, &'static str)> {
        let mut actions: Vec<_> = self
            .handlers
            .iter()
            .map(|(name, (label, _))| (*name, *label))
            .collect();
        actions.sort_unstable();
        actions
    }

    /// Returns `false` for unknown action names.
    pub fn dispatch(&self, name: &str, selection: &mut DetailSelection, row: &OrderSummary) -> bool {
        match self.handlers.get(name) {
            Some((_, handler)) => {
                handler(selection, row);
                true
            }
            None => {
                warn!(action = name, order_id = %row.id, "ignoring unknown row action");
                false
            }
        }
    }
}

impl Default for RowActionTable {
    fn default() -> Self {
        Self::standard()
    }
}

fn open_detail(selection: &mut DetailSelection, row: &OrderSummary) {
    selection.open(row.id.clone());
}
