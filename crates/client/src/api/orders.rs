//! `/orders` endpoints.
//!
//! Status changes and deletions are checked against the order lifecycle
//! before anything is sent. The server stays the authority and may still
//! refuse.

use chrono::Utc;
use crumb_core::{BranchId, OrderId, OrderStatus, Role};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::cache::CatalogCache;
use crate::checkout::CheckoutRequest;
use crate::error::{ClientError, Result};
use crate::http::{ApiClient, expect_success};
use crate::models::{DeleteRejection, Listing, Order};

/// Filters for listing orders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrderFilter {
    pub branch: Option<BranchId>,
    pub status: Option<OrderStatus>,
}

impl OrderFilter {
    fn to_pairs(self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(branch) = self.branch {
            pairs.push(("branch", branch.to_string()));
        }
        if let Some(status) = self.status {
            pairs.push(("status", status.to_string()));
        }
        pairs
    }
}

#[derive(Serialize)]
struct StatusChange {
    status: OrderStatus,
}

/// Client for orders.
#[derive(Clone)]
pub struct OrdersApi {
    client: ApiClient,
    cache: CatalogCache,
}

impl OrdersApi {
    pub(crate) const fn new(client: ApiClient, cache: CatalogCache) -> Self {
        Self { client, cache }
    }

    /// List orders (administrators).
    ///
    /// Branch administrators only ever see their own branch, whatever
    /// `filter.branch` says.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` if the request fails.
    #[instrument(skip(self))]
    pub async fn list(&self, mut filter: OrderFilter) -> Result<Vec<Order>> {
        if let Some(identity) = self.client.session().identity().await
            && identity.role == Role::BranchAdmin
            && identity.branch.is_some()
        {
            filter.branch = identity.branch;
        }
        let listing: Listing<Order> = self
            .client
            .get(self.client.url("orders", &filter.to_pairs())?)
            .await?;
        Ok(listing.into_items())
    }

    /// Orders of the logged-in customer.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` if the request fails.
    #[instrument(skip(self))]
    pub async fn mine(&self) -> Result<Vec<Order>> {
        let listing: Listing<Order> = self
            .client
            .get(self.client.url("orders/mine", &[])?)
            .await?;
        Ok(listing.into_items())
    }

    /// # Errors
    ///
    /// Returns `ClientError::Api` with status 404 for unknown orders.
    #[instrument(skip(self), fields(order = %id))]
    pub async fn get(&self, id: OrderId) -> Result<Order> {
        self.client
            .get(self.client.url(&format!("orders/{id}"), &[])?)
            .await
    }

    /// Place an order. Most callers want [`crate::checkout::checkout`],
    /// which also empties the cart.
    ///
    /// An accepted order changes stock, so the cached catalog is dropped.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Api` if the server refuses the order (for
    /// example when stock ran out since the cart was filled).
    #[instrument(skip(self, request), fields(branch = %request.branch, items = request.items.len()))]
    pub async fn create(&self, request: &CheckoutRequest) -> Result<Order> {
        let order: Order = self
            .client
            .post(self.client.url("orders", &[])?, request)
            .await?;
        self.cache.invalidate_all().await;
        Ok(order)
    }

    /// Move an order to `target`.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::InvalidTransition` without sending anything if
    /// the lifecycle does not allow the change.
    #[instrument(skip(self, order), fields(order = %order.id, from = %order.status, to = %target))]
    pub async fn transition(&self, order: &Order, target: OrderStatus) -> Result<Order> {
        if !order.status.can_transition_to(target) {
            return Err(ClientError::InvalidTransition {
                from: order.status,
                to: target,
            });
        }
        let updated: Order = self
            .client
            .patch(
                self.client.url(&format!("orders/{}/status", order.id), &[])?,
                &StatusChange { status: target },
            )
            .await?;
        info!(status = %updated.status, "Order status changed");
        Ok(updated)
    }

    /// Move an order one step forward (received, preparing, ready,
    /// delivered).
    ///
    /// # Errors
    ///
    /// Returns `ClientError::InvalidTransition` for delivered and cancelled
    /// orders.
    pub async fn advance(&self, order: &Order) -> Result<Order> {
        let target = order.status.next().ok_or(ClientError::InvalidTransition {
            from: order.status,
            to: order.status,
        })?;
        self.transition(order, target).await
    }

    /// Cancel an order that is not finished yet.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::InvalidTransition` for delivered and cancelled
    /// orders.
    pub async fn cancel(&self, order: &Order) -> Result<Order> {
        self.transition(order, OrderStatus::Cancelled).await
    }

    /// Delete a finished order.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Rejected` when the order cannot be deleted,
    /// either decided locally (nothing is sent) or decoded from the
    /// server's refusal.
    #[instrument(skip(self, order), fields(order = %order.id))]
    pub async fn delete(&self, order: &Order) -> Result<()> {
        order.check_deletable(Utc::now())?;

        let url = self.client.url(&format!("orders/{}", order.id), &[])?;
        let response = self.client.execute(Method::DELETE, url, None).await?;
        let status = response.status();
        if matches!(
            status,
            StatusCode::BAD_REQUEST | StatusCode::FORBIDDEN | StatusCode::CONFLICT
        ) {
            let body = response.text().await.unwrap_or_default();
            if let Ok(rejection) = serde_json::from_str::<DeleteRejection>(&body) {
                warn!(code = %rejection.code, "Order deletion refused by server");
                return Err(rejection.into());
            }
            return Err(ClientError::from_response(status.as_u16(), &body));
        }
        expect_success(response).await?;
        info!("Order deleted");
        Ok(())
    }
}
