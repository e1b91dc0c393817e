//! Offer (bundle) types.

use chrono::{DateTime, Utc};
use crumb_core::{BranchId, Money, OfferId, ProductId};
use serde::{Deserialize, Serialize};

use super::product::default_active;

/// A product inside an offer, with how many units one bundle contains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferComponent {
    pub product: ProductId,
    #[serde(default)]
    pub name: String,
    #[serde(alias = "quantity")]
    pub multiplier: u32,
}

/// A promotional bundle sold at a combined price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub id: OfferId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Money,
    pub products: Vec<OfferComponent>,
    #[serde(default)]
    pub branch: Option<BranchId>,
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(default = "default_active")]
    pub active: bool,
}

impl Offer {
    /// Whether the offer can be bought at `now`.
    #[must_use]
    pub fn is_available_at(&self, now: DateTime<Utc>) -> bool {
        self.active
            && !self.products.is_empty()
            && self.starts_at.is_none_or(|start| start <= now)
            && self.ends_at.is_none_or(|end| now < end)
    }
}

/// Payload for creating or replacing an offer.
#[derive(Debug, Clone, Serialize)]
pub struct OfferInput {
    pub name: String,
    pub description: String,
    pub price: Money,
    pub products: Vec<OfferComponent>,
    pub branch: BranchId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<DateTime<Utc>>,
    pub active: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn offer() -> Offer {
        serde_json::from_str(
            r#"{
                "id": 9,
                "name": "Desayuno",
                "price": "5.00",
                "products": [
                    {"product": 1, "name": "Medialuna", "quantity": 3},
                    {"product": 2, "name": "Cafe", "multiplier": 1}
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_multiplier_alias() {
        let offer = offer();
        assert_eq!(offer.products[0].multiplier, 3);
        assert_eq!(offer.products[1].multiplier, 1);
    }

    #[test]
    fn test_availability_window() {
        let now = Utc::now();
        let mut offer = offer();
        assert!(offer.is_available_at(now));

        offer.starts_at = Some(now + Duration::hours(1));
        assert!(!offer.is_available_at(now));

        offer.starts_at = Some(now - Duration::hours(2));
        offer.ends_at = Some(now - Duration::hours(1));
        assert!(!offer.is_available_at(now));

        offer.ends_at = None;
        offer.active = false;
        assert!(!offer.is_available_at(now));
    }
}
