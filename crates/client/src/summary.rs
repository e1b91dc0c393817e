//! Client-side sales aggregation.
//!
//! The server's `/reports/sales` is the reference report. [`SalesSummary`]
//! computes the same headline numbers over a list of orders already on the
//! client, e.g. today's orders on the branch dashboard.

use std::collections::BTreeMap;

use crumb_core::{BranchId, Money, OrderStatus};
use rust_decimal::Decimal;

use crate::models::{Order, OrderItem};

const STATUSES: [OrderStatus; 5] = [
    OrderStatus::Received,
    OrderStatus::Preparing,
    OrderStatus::Ready,
    OrderStatus::Delivered,
    OrderStatus::Cancelled,
];

/// Aggregated figures over a set of orders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SalesSummary {
    /// Sum of the totals of non-cancelled orders.
    pub revenue: Money,
    /// Number of non-cancelled orders.
    pub orders: u64,
    /// Number of orders in each status, cancelled included.
    pub by_status: BTreeMap<&'static str, u64>,
    /// Revenue of non-cancelled orders per branch.
    pub by_branch: BTreeMap<BranchId, Money>,
    /// Units sold per product name, bundle contents included.
    pub units_by_product: BTreeMap<String, u64>,
}

impl SalesSummary {
    #[must_use]
    pub fn from_orders<'a>(orders: impl IntoIterator<Item = &'a Order>) -> Self {
        let mut summary = Self {
            by_status: STATUSES.iter().map(|s| (s.as_str(), 0)).collect(),
            ..Self::default()
        };

        for order in orders {
            *summary.by_status.entry(order.status.as_str()).or_insert(0) += 1;
            if order.status == OrderStatus::Cancelled {
                continue;
            }

            summary.orders += 1;
            summary.revenue = summary.revenue + order.total;
            if let Some(branch) = order.branch {
                let entry = summary.by_branch.entry(branch).or_insert(Money::ZERO);
                *entry = *entry + order.total;
            }
            for item in &order.items {
                summary.count_units(item);
            }
        }
        summary
    }

    fn count_units(&mut self, item: &OrderItem) {
        match item {
            OrderItem::Product {
                product,
                name,
                quantity,
                ..
            } => self.add_units(label(name, *product), u64::from(*quantity)),
            OrderItem::Offer {
                quantity, products, ..
            } => {
                for component in products {
                    let units = u64::from(component.multiplier) * u64::from(*quantity);
                    self.add_units(label(&component.name, component.product), units);
                }
            }
        }
    }

    fn add_units(&mut self, name: String, units: u64) {
        *self.units_by_product.entry(name).or_insert(0) += units;
    }

    /// Revenue per non-cancelled order, rounded to cents.
    #[must_use]
    pub fn average_ticket(&self) -> Option<Money> {
        if self.orders == 0 {
            return None;
        }
        let average = self.revenue.amount() / Decimal::from(self.orders);
        Money::new(average.round_dp(2)).ok()
    }

    /// The `n` best-selling products by units, ties by name.
    #[must_use]
    pub fn top_products(&self, n: usize) -> Vec<(&str, u64)> {
        let mut ranked: Vec<(&str, u64)> = self
            .units_by_product
            .iter()
            .map(|(name, units)| (name.as_str(), *units))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.truncate(n);
        ranked
    }
}

fn label(name: &str, product: impl std::fmt::Display) -> String {
    if name.trim().is_empty() {
        format!("Product #{product}")
    } else {
        name.to_owned()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn order(id: i64, status: &str, branch: i64, total: &str, items: serde_json::Value) -> Order {
        serde_json::from_value(json!({
            "id": id,
            "status": status,
            "delivery": {"mode": "pickup"},
            "items": items,
            "total": total,
            "branch": branch,
            "created_at": "2026-05-02T10:00:00Z"
        }))
        .unwrap()
    }

    fn orders() -> Vec<Order> {
        vec![
            order(
                1,
                "delivered",
                1,
                "12.40",
                json!([
                    {"type": "product", "product": 1, "name": "Medialuna", "quantity": 3, "unit_price": "0.80"},
                    {"type": "offer", "offer": 9, "name": "Desayuno", "quantity": 2, "unit_price": "5.00",
                     "products": [{"product": 1, "name": "Medialuna", "multiplier": 3},
                                  {"product": 2, "name": "Cafe", "multiplier": 1}]}
                ]),
            ),
            order(
                2,
                "ready",
                2,
                "4.00",
                json!([{"type": "product", "product": 3, "name": "Pan", "quantity": 2, "unit_price": "2.00"}]),
            ),
            order(
                3,
                "cancelled",
                1,
                "100.00",
                json!([{"type": "product", "product": 3, "name": "Pan", "quantity": 50, "unit_price": "2.00"}]),
            ),
        ]
    }

    #[test]
    fn test_cancelled_orders_do_not_count() {
        let summary = SalesSummary::from_orders(&orders());
        assert_eq!(summary.orders, 2);
        assert_eq!(summary.revenue, Money::from_cents(1640).unwrap());
        assert_eq!(summary.by_status["cancelled"], 1);
        assert_eq!(summary.by_status["received"], 0);
        assert_eq!(
            summary.by_branch[&BranchId::new(1)],
            Money::from_cents(1240).unwrap()
        );
    }

    #[test]
    fn test_offer_units_are_expanded() {
        let summary = SalesSummary::from_orders(&orders());
        assert_eq!(summary.units_by_product["Medialuna"], 9);
        assert_eq!(summary.units_by_product["Cafe"], 2);
        assert_eq!(summary.units_by_product["Pan"], 2);
        assert_eq!(
            summary.top_products(2),
            vec![("Medialuna", 9), ("Cafe", 2)]
        );
    }

    #[test]
    fn test_average_ticket() {
        let summary = SalesSummary::from_orders(&orders());
        assert_eq!(
            summary.average_ticket(),
            Some(Money::from_cents(820).unwrap())
        );
        assert_eq!(SalesSummary::from_orders(&Vec::<Order>::new()).average_ticket(), None);
    }
}
