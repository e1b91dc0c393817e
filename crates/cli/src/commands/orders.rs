//! Order tracking and handling.
//!
//! Customers see their own orders; administrators list, advance, cancel and
//! delete orders of their branch (or of every branch, for general admins).

use std::collections::HashMap;

use crumb_client::api::OrderFilter;
use crumb_client::{ClientError, Guard, spawn_poller};
use crumb_core::{BranchId, OrderId, OrderStatus};
use tracing::info;

use crate::context::Context;
use crate::error::{CliError, CliResult};
use crate::output;

pub async fn mine(ctx: &Context) -> CliResult {
    ctx.require(Guard::CUSTOMER).await?;
    output::orders(&ctx.api.orders().mine().await?);
    Ok(())
}

pub async fn list(
    ctx: &Context,
    branch: Option<BranchId>,
    status: Option<OrderStatus>,
) -> CliResult {
    ctx.require(Guard::ADMIN).await?;
    let orders = ctx.api.orders().list(OrderFilter { branch, status }).await?;
    output::orders(&orders);
    Ok(())
}

pub async fn show(ctx: &Context, id: OrderId) -> CliResult {
    ctx.require(Guard::Authenticated).await?;
    output::order(&ctx.api.orders().get(id).await?);
    Ok(())
}

pub async fn advance(ctx: &Context, id: OrderId) -> CliResult {
    ctx.require(Guard::ADMIN).await?;
    let orders = ctx.api.orders();
    let order = orders.get(id).await?;
    let updated = orders.advance(&order).await?;
    output::order_row(&updated);
    Ok(())
}

pub async fn set_status(ctx: &Context, id: OrderId, status: OrderStatus) -> CliResult {
    ctx.require(Guard::ADMIN).await?;
    let orders = ctx.api.orders();
    let order = orders.get(id).await?;
    let updated = orders.transition(&order, status).await?;
    output::order_row(&updated);
    Ok(())
}

pub async fn cancel(ctx: &Context, id: OrderId) -> CliResult {
    ctx.require(Guard::Authenticated).await?;
    let orders = ctx.api.orders();
    let order = orders.get(id).await?;
    let updated = orders.cancel(&order).await?;
    output::order_row(&updated);
    Ok(())
}

pub async fn delete(ctx: &Context, id: OrderId) -> CliResult {
    ctx.require(Guard::ADMIN).await?;
    let orders = ctx.api.orders();
    let order = orders.get(id).await?;
    orders.delete(&order).await?;
    output::message(&format!("Order #{id} deleted."));
    Ok(())
}

/// Follow order statuses until interrupted.
///
/// Customers follow their own orders; administrators follow the orders of
/// `branch` (their own branch for branch admins).
pub async fn watch(ctx: &Context, branch: Option<BranchId>) -> CliResult {
    let identity = ctx.require(Guard::Authenticated).await?;
    let orders = ctx.api.orders();
    let admin = identity.role.is_admin();

    let mut poller = spawn_poller(ctx.config.poll_interval, move || {
        let orders = orders.clone();
        async move {
            if admin {
                orders
                    .list(OrderFilter {
                        branch,
                        status: None,
                    })
                    .await
            } else {
                orders.mine().await
            }
        }
    });
    info!(
        every_secs = ctx.config.poll_interval.as_secs(),
        "Watching orders, press Ctrl+C to stop"
    );

    let mut seen: HashMap<OrderId, OrderStatus> = HashMap::new();
    let interrupt = interrupted();
    tokio::pin!(interrupt);
    loop {
        tokio::select! {
            update = poller.changed() => {
                let Some(current) = update else { break };
                for order in &current {
                    if seen.insert(order.id, order.status) != Some(order.status) {
                        output::order_row(order);
                    }
                }
            }
            () = &mut interrupt => break,
        }
    }
    poller.stop();

    if ctx.api.session().is_logged_in().await {
        Ok(())
    } else {
        Err(CliError::Client(ClientError::Unauthorized))
    }
}

async fn interrupted() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}
