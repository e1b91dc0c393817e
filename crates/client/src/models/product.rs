//! Product types.

use crumb_core::{BranchId, Money, ProductId};
use serde::{Deserialize, Serialize};

/// A product sold by a branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Money,
    /// Units on hand. `None` means the branch does not track stock.
    #[serde(default)]
    pub stock: Option<u32>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub branch: Option<BranchId>,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub image: Option<String>,
}

impl Product {
    /// Whether `quantity` units can be ordered right now.
    #[must_use]
    pub fn can_supply(&self, quantity: u32) -> bool {
        self.active && self.stock.is_none_or(|stock| quantity <= stock)
    }
}

/// Payload for creating or replacing a product.
#[derive(Debug, Clone, Serialize)]
pub struct ProductInput {
    pub name: String,
    pub description: String,
    pub price: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub branch: BranchId,
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

pub(crate) const fn default_active() -> bool {
    true
}
