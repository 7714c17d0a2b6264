use chrono::{DateTime, NaiveDate, Utc};
use shared::{
    domain::OrderId,
    protocol::{CustomerRecord, OrderDetail, OrderRecord, Page},
};

/// One row of the order list, flattened from an [`OrderRecord`].
#[derive(Debug, Clone, PartialEq)]
pub struct OrderSummary {
    pub id: OrderId,
    pub name: String,
    pub customer_name: Option<String>,
    pub customer_city: Option<String>,
    pub order_date: Option<NaiveDate>,
    pub total: Option<f64>,
    pub overdue: bool,
    pub weather: Option<String>,
    pub weather_temp: Option<f64>,
    pub weather_updated: Option<DateTime<Utc>>,
    pub created_date: Option<DateTime<Utc>>,
}

impl From<&OrderRecord> for OrderSummary {
    fn from(record: &OrderRecord) -> Self {
        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            customer_name: record.customer.as_ref().map(customer_display_name),
            customer_city: record
                .customer
                .as_ref()
                .and_then(|customer| customer.city.clone()),
            order_date: record.order_date,
            total: record.total,
            overdue: record.overdue,
            weather: record.weather_description.clone(),
            weather_temp: record.weather_temperature,
            weather_updated: record.weather_last_updated,
            created_date: record.created_date,
        }
    }
}

pub fn summarize_page(page: &Page<OrderRecord>) -> Vec<OrderSummary> {
    page.records.iter().map(OrderSummary::from).collect()
}

/// Joins the non-empty name parts with a single space.
pub fn join_name_parts(first: Option<&str>, last: Option<&str>) -> String {
    [first, last]
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn customer_display_name(customer: &CustomerRecord) -> String {
    join_name_parts(customer.first_name.as_deref(), customer.last_name.as_deref())
}

/// Detail header name: joined parts, or the server-composed name when both
/// parts are missing.
pub fn detail_customer_name(detail: &OrderDetail) -> String {
    let joined = join_name_parts(
        detail.customer_first_name.as_deref(),
        detail.customer_last_name.as_deref(),
    );
    if joined.is_empty() {
        detail.customer_name.clone().unwrap_or_default()
    } else {
        joined
    }
}
