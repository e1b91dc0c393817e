//! Turning a cart into an order.

use std::collections::BTreeMap;

use crumb_core::{BranchId, DeliveryMode, Money, OfferId, ProductId};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument};

use crate::api::OrdersApi;
use crate::cart::{CartLine, CartStore};
use crate::error::Result;
use crate::models::Order;

/// Reasons a cart cannot be checked out.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CheckoutError {
    #[error("The cart is empty")]
    EmptyCart,

    #[error("Home delivery needs an address")]
    MissingAddress,
}

/// A product inside an ordered offer, with the units it adds to the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BundleUnit {
    pub product: ProductId,
    /// `multiplier × offer quantity`.
    pub quantity: u32,
}

/// A line of the order payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CheckoutItem {
    Product {
        product: ProductId,
        quantity: u32,
        unit_price: Money,
    },
    Offer {
        offer: OfferId,
        quantity: u32,
        unit_price: Money,
        products: Vec<BundleUnit>,
    },
}

/// Body of `POST /orders`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutRequest {
    pub branch: BranchId,
    pub delivery: DeliveryMode,
    pub items: Vec<CheckoutItem>,
    /// Client-side total, for the server to double-check.
    pub total: Money,
}

impl CheckoutRequest {
    /// Build the order payload for `cart`.
    ///
    /// Offer lines keep their bundle price and quantity, and list every
    /// constituent product with `multiplier × quantity` units.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::EmptyCart` for an empty cart and
    /// `CheckoutError::MissingAddress` for a home delivery with a blank
    /// address.
    pub fn from_cart(
        cart: &CartStore,
        branch: BranchId,
        delivery: DeliveryMode,
    ) -> std::result::Result<Self, CheckoutError> {
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        let delivery = match delivery {
            DeliveryMode::HomeDelivery { address } if address.trim().is_empty() => {
                return Err(CheckoutError::MissingAddress);
            }
            DeliveryMode::HomeDelivery { address } => DeliveryMode::HomeDelivery {
                address: address.trim().to_owned(),
            },
            DeliveryMode::Pickup => DeliveryMode::Pickup,
        };

        let items = cart.lines().iter().map(checkout_item).collect();
        Ok(Self {
            branch,
            delivery,
            items,
            total: cart.total(),
        })
    }

    /// Units ordered per product, counting the contents of offers.
    #[must_use]
    pub fn product_quantities(&self) -> BTreeMap<ProductId, u32> {
        let mut units = BTreeMap::new();
        for item in &self.items {
            match item {
                CheckoutItem::Product {
                    product, quantity, ..
                } => {
                    let entry = units.entry(*product).or_insert(0u32);
                    *entry = entry.saturating_add(*quantity);
                }
                CheckoutItem::Offer { products, .. } => {
                    for unit in products {
                        let entry = units.entry(unit.product).or_insert(0u32);
                        *entry = entry.saturating_add(unit.quantity);
                    }
                }
            }
        }
        units
    }
}

fn checkout_item(line: &CartLine) -> CheckoutItem {
    match line {
        CartLine::Product {
            product,
            unit_price,
            quantity,
            ..
        } => CheckoutItem::Product {
            product: *product,
            quantity: *quantity,
            unit_price: *unit_price,
        },
        CartLine::Offer {
            offer,
            unit_price,
            quantity,
            products,
            ..
        } => CheckoutItem::Offer {
            offer: *offer,
            quantity: *quantity,
            unit_price: *unit_price,
            products: products
                .iter()
                .map(|component| BundleUnit {
                    product: component.product,
                    quantity: component.multiplier.saturating_mul(*quantity),
                })
                .collect(),
        },
    }
}

/// Place an order for the contents of `cart` and empty it.
///
/// The cart is only cleared once the server has accepted the order.
///
/// # Errors
///
/// Returns `ClientError::Checkout` for an invalid cart, or whatever the
/// order creation returned. The cart is untouched on error.
#[instrument(skip(orders, cart, delivery), fields(branch = %branch, lines = cart.lines().len()))]
pub async fn checkout(
    orders: &OrdersApi,
    cart: &mut CartStore,
    branch: BranchId,
    delivery: DeliveryMode,
) -> Result<Order> {
    let request = CheckoutRequest::from_cart(cart, branch, delivery)?;
    let order = orders.create(&request).await?;
    cart.clear()?;
    info!(order = %order.id, total = %order.total, "Order placed");
    Ok(order)
}
