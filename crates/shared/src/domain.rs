use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

id_newtype!(OrderId);
id_newtype!(OrderItemId);
id_newtype!(CustomerId);
id_newtype!(RecordId);

impl From<OrderId> for RecordId {
    fn from(value: OrderId) -> Self {
        Self(value.0)
    }
}

impl From<OrderItemId> for RecordId {
    fn from(value: OrderItemId) -> Self {
        Self(value.0)
    }
}

/// Kinds of records the mutation flows can create, update, or delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Order,
    OrderItem,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Order => "order",
            Self::OrderItem => "order_item",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Order => "Order",
            Self::OrderItem => "Order item",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
