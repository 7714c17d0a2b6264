use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{CustomerId, OrderId, OrderItemId, RecordId};

/// Field values submitted by create/update flows, keyed by field name.
pub type FieldMap = serde_json::Map<String, serde_json::Value>;

/// Parameter set of one paginated order query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListParams {
    pub page_size: u32,
    pub page_number: u32,
    pub search_term: String,
}

impl ListParams {
    pub fn new(page_size: u32, page_number: u32, search_term: impl Into<String>) -> Self {
        Self {
            page_size,
            page_number,
            search_term: search_term.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub records: Vec<T>,
    #[serde(default)]
    pub total: u64,
    pub page_number: u32,
    pub page_size: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    #[serde(default)]
    pub id: Option<CustomerId>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
}

/// Raw order record as delivered by a list query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: OrderId,
    pub name: String,
    #[serde(default)]
    pub customer: Option<CustomerRecord>,
    #[serde(default)]
    pub order_date: Option<NaiveDate>,
    #[serde(default)]
    pub total: Option<f64>,
    #[serde(default)]
    pub overdue: bool,
    #[serde(default)]
    pub weather_description: Option<String>,
    #[serde(default)]
    pub weather_temperature: Option<f64>,
    #[serde(default)]
    pub weather_last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    #[serde(default)]
    pub product_name: Option<String>,
    pub quantity: f64,
    #[serde(default)]
    pub unit_price: Option<f64>,
    #[serde(default)]
    pub total: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDetail {
    pub id: OrderId,
    #[serde(default)]
    pub customer_first_name: Option<String>,
    #[serde(default)]
    pub customer_last_name: Option<String>,
    /// Server-composed display name, used when neither name part is present.
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedRecord {
    pub id: RecordId,
}
