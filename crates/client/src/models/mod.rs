//! Resource types exchanged with the REST API.

pub mod branch;
pub mod offer;
pub mod order;
pub mod product;
pub mod report;
pub mod user;

pub use branch::{Branch, BranchInput};
pub use offer::{Offer, OfferComponent, OfferInput};
pub use order::{DeleteRejection, Order, OrderItem};
pub use product::{Product, ProductInput};
pub use report::{BranchSales, ProductSales, ReportQuery, SalesReport};
pub use user::{NewAccount, ProfileUpdate, User, UserInput};

use serde::Deserialize;

/// A collection response.
///
/// Some endpoints return a bare array, paginated ones wrap it in
/// `{"count": .., "results": [..]}`. Both decode to the same items.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum Listing<T> {
    Plain(Vec<T>),
    Paged { results: Vec<T> },
}

impl<T> Listing<T> {
    pub(crate) fn into_items(self) -> Vec<T> {
        match self {
            Self::Plain(items) | Self::Paged { results: items } => items,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_accepts_both_shapes() {
        let plain: Listing<u8> = serde_json::from_str("[1,2]").unwrap();
        let paged: Listing<u8> =
            serde_json::from_str(r#"{"count":2,"next":null,"results":[1,2]}"#).unwrap();
        assert_eq!(plain.into_items(), paged.into_items());
    }
}
