//! Cart and checkout.
//!
//! # Usage
//!
//! ```bash
//! crumb cart add 3 --qty 2
//! crumb cart add-offer 9
//! crumb cart set product:3 5
//! crumb cart show
//! crumb checkout --branch 1 --address "Calle 12 #345"
//! ```

use crumb_client::checkout::checkout;
use crumb_client::{Guard, LineKey};
use crumb_core::{BranchId, DeliveryMode, OfferId, ProductId};

use crate::context::Context;
use crate::error::CliResult;
use crate::output;

pub async fn show(ctx: &Context) -> CliResult {
    output::cart(&ctx.cart()?);
    Ok(())
}

pub async fn add(ctx: &Context, product: ProductId, quantity: u32) -> CliResult {
    let product = ctx.api.products().get(product).await?;
    let mut cart = ctx.cart()?;
    cart.add(&product, quantity)?;
    output::message(&format!("Added {quantity} x {}.", product.name));
    output::cart(&cart);
    Ok(())
}

pub async fn add_offer(ctx: &Context, offer: OfferId, quantity: u32) -> CliResult {
    let offer = ctx.api.offers().get(offer).await?;
    let mut cart = ctx.cart()?;
    cart.add_offer(&offer, quantity)?;
    output::message(&format!("Added {quantity} x {}.", offer.name));
    output::cart(&cart);
    Ok(())
}

pub async fn set(ctx: &Context, key: &str, quantity: u32) -> CliResult {
    let key: LineKey = key.parse()?;
    let mut cart = ctx.cart()?;
    cart.update_qty(key, quantity)?;
    output::cart(&cart);
    Ok(())
}

pub async fn remove(ctx: &Context, key: &str) -> CliResult {
    let key: LineKey = key.parse()?;
    let mut cart = ctx.cart()?;
    cart.remove(key)?;
    output::cart(&cart);
    Ok(())
}

pub async fn clear(ctx: &Context) -> CliResult {
    ctx.cart()?.clear()?;
    output::message("Cart emptied.");
    Ok(())
}

/// Place an order for the cart. Pickup unless an address is given.
pub async fn place_order(ctx: &Context, branch: BranchId, address: Option<String>) -> CliResult {
    ctx.require(Guard::CUSTOMER).await?;
    let delivery = address.map_or(DeliveryMode::Pickup, |address| {
        DeliveryMode::HomeDelivery { address }
    });
    let mut cart = ctx.cart()?;
    let order = checkout(&ctx.api.orders(), &mut cart, branch, delivery).await?;
    output::message("Order placed.");
    output::order(&order);
    Ok(())
}
