//! Order types and the client-side deletion rules.

use chrono::{DateTime, Duration, Utc};
use crumb_core::{BranchId, DeliveryMode, Money, OfferId, OrderId, OrderStatus, ProductId, UserId};
use serde::{Deserialize, Serialize};

use super::offer::OfferComponent;

/// A line of a placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderItem {
    Product {
        product: ProductId,
        #[serde(default)]
        name: String,
        quantity: u32,
        unit_price: Money,
    },
    Offer {
        offer: OfferId,
        #[serde(default)]
        name: String,
        quantity: u32,
        unit_price: Money,
        #[serde(default)]
        products: Vec<OfferComponent>,
    },
}

impl OrderItem {
    #[must_use]
    pub const fn quantity(&self) -> u32 {
        match self {
            Self::Product { quantity, .. } | Self::Offer { quantity, .. } => *quantity,
        }
    }

    #[must_use]
    pub fn subtotal(&self) -> Money {
        match self {
            Self::Product {
                quantity,
                unit_price,
                ..
            }
            | Self::Offer {
                quantity,
                unit_price,
                ..
            } => unit_price.times(*quantity),
        }
    }
}

/// An order as stored by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub status: OrderStatus,
    pub delivery: DeliveryMode,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    pub total: Money,
    #[serde(default)]
    pub branch: Option<BranchId>,
    #[serde(default)]
    pub customer: Option<UserId>,
    pub created_at: DateTime<Utc>,
    /// Server flag: the order may be deleted once `deletable_at` has passed.
    #[serde(default)]
    pub deletable: bool,
    /// Start of the deletion window; the server purges the order on its own
    /// some time after this.
    #[serde(default)]
    pub deletable_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Check whether deleting this order at `now` would be accepted.
    ///
    /// Mirrors the server's rules so the request is not sent when it is
    /// bound to fail.
    ///
    /// # Errors
    ///
    /// Returns the [`DeleteRejection`] the server would answer with.
    pub fn check_deletable(&self, now: DateTime<Utc>) -> Result<(), DeleteRejection> {
        if !self.status.is_terminal() {
            return Err(DeleteRejection {
                code: "order_in_progress".to_string(),
                message: format!(
                    "Order #{} is still {}; only delivered or cancelled orders can be deleted",
                    self.id, self.status
                ),
                time_remaining: None,
            });
        }
        if let Some(at) = self.deletable_at
            && now < at
        {
            return Err(DeleteRejection {
                code: "too_early".to_string(),
                message: format!("Order #{} cannot be deleted yet", self.id),
                time_remaining: Some(format_remaining(at - now)),
            });
        }
        if !self.deletable {
            return Err(DeleteRejection {
                code: "not_deletable".to_string(),
                message: format!("Order #{} cannot be deleted", self.id),
                time_remaining: None,
            });
        }
        Ok(())
    }
}

/// Structured refusal to delete an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message} ({code}{})", .time_remaining.as_ref().map(|t| format!(", {t} remaining")).unwrap_or_default())]
pub struct DeleteRejection {
    /// Machine-readable reason.
    #[serde(alias = "reason")]
    pub code: String,
    /// Human-readable explanation.
    #[serde(alias = "detail", alias = "error")]
    pub message: String,
    /// How long until deletion becomes possible, when known.
    #[serde(default)]
    pub time_remaining: Option<String>,
}

/// Render a duration as `"2h 05m"`, `"14m"` or `"30s"`.
#[must_use]
pub fn format_remaining(remaining: Duration) -> String {
    let secs = remaining.num_seconds().max(0);
    let (hours, minutes) = (secs / 3600, (secs % 3600) / 60);
    if hours > 0 {
        format!("{hours}h {minutes:02}m")
    } else if minutes > 0 {
        format!("{minutes}m")
    } else {
        format!("{secs}s")
    }
}
