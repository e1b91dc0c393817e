//! Shopping cart.
//!
//! The cart lives on the client. A [`CartStore`] owns the lines of one
//! account (or of the anonymous visitor) and writes every change through to
//! the [`KeyValueStore`] under [`keys::cart`]. The server never sees the
//! cart until checkout.
//!
//! Quantities are always at least 1 and the total is recomputed from the
//! lines on every call.
//!
//! A cart opened with [`CartStore::follow`] tracks the session: after a
//! logout or an account switch, the next mutation (or [`CartStore::sync`])
//! reloads the cart of whoever is logged in now, so a logged-out user's
//! lines are never written back.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use crumb_core::{Money, OfferId, ProductId, UserId};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::models::{Offer, OfferComponent, Product};
use crate::session::{SessionContext, keys};
use crate::storage::{KeyValueStore, StorageError, load_json, save_json};

/// Errors raised by cart operations. The cart is unchanged after any of them.
#[derive(Debug, Error)]
pub enum CartError {
    /// Quantities below 1 are not allowed.
    #[error("Quantity must be at least 1 (got {0})")]
    InvalidQuantity(u32),

    /// The product does not have enough units in stock.
    #[error("Only {available} of {name} in stock ({requested} requested)")]
    OutOfStock {
        name: String,
        available: u32,
        requested: u32,
    },

    /// The product or offer cannot be bought right now.
    #[error("{0} is not available")]
    Unavailable(String),

    /// No line with this key.
    #[error("{0} is not in the cart")]
    NotInCart(LineKey),

    /// The line key could not be parsed.
    #[error("Invalid cart line key: {0}")]
    InvalidKey(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Identifies a cart line: one line per product and one per offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineKey {
    Product(ProductId),
    Offer(OfferId),
}

impl fmt::Display for LineKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Product(id) => write!(f, "product:{id}"),
            Self::Offer(id) => write!(f, "offer:{id}"),
        }
    }
}

impl FromStr for LineKey {
    type Err = CartError;

    /// Parse `product:3` or `offer:9`. A bare number is a product.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CartError::InvalidKey(s.to_owned());
        match s.trim().split_once(':') {
            Some(("product", id)) => id.parse().map(Self::Product).map_err(|_| invalid()),
            Some(("offer", id)) => id.parse().map(Self::Offer).map_err(|_| invalid()),
            Some(_) => Err(invalid()),
            None => s.parse().map(Self::Product).map_err(|_| invalid()),
        }
    }
}

/// A line of the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CartLine {
    Product {
        product: ProductId,
        name: String,
        unit_price: Money,
        quantity: u32,
        /// Stock level when the product was last added.
        #[serde(default)]
        stock: Option<u32>,
    },
    Offer {
        offer: OfferId,
        name: String,
        /// Bundle price.
        unit_price: Money,
        quantity: u32,
        /// Products in one bundle, with their per-bundle multipliers.
        products: Vec<OfferComponent>,
    },
}

impl CartLine {
    #[must_use]
    pub const fn key(&self) -> LineKey {
        match self {
            Self::Product { product, .. } => LineKey::Product(*product),
            Self::Offer { offer, .. } => LineKey::Offer(*offer),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Product { name, .. } | Self::Offer { name, .. } => name,
        }
    }

    #[must_use]
    pub const fn quantity(&self) -> u32 {
        match self {
            Self::Product { quantity, .. } | Self::Offer { quantity, .. } => *quantity,
        }
    }

    #[must_use]
    pub const fn unit_price(&self) -> Money {
        match self {
            Self::Product { unit_price, .. } | Self::Offer { unit_price, .. } => *unit_price,
        }
    }

    /// `unit_price × quantity`.
    #[must_use]
    pub fn subtotal(&self) -> Money {
        self.unit_price().times(self.quantity())
    }

    const fn set_quantity(&mut self, value: u32) {
        match self {
            Self::Product { quantity, .. } | Self::Offer { quantity, .. } => *quantity = value,
        }
    }

    /// Reject `requested` units if the line tracks stock and it is short.
    fn check_stock(&self, requested: u32) -> Result<(), CartError> {
        if let Self::Product {
            name,
            stock: Some(available),
            ..
        } = self
            && requested > *available
        {
            return Err(CartError::OutOfStock {
                name: name.clone(),
                available: *available,
                requested,
            });
        }
        Ok(())
    }
}

/// The cart of one account, persisted through a [`KeyValueStore`].
pub struct CartStore {
    storage: Arc<dyn KeyValueStore>,
    owner: Option<UserId>,
    lines: Vec<CartLine>,
    session: Option<watch::Receiver<Option<UserId>>>,
}

impl CartStore {
    /// Load the cart of `owner` (`None` for the anonymous visitor).
    ///
    /// A stored cart that cannot be decoded is discarded with a warning.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Storage` if the backend cannot be read.
    pub fn open(storage: Arc<dyn KeyValueStore>, owner: Option<UserId>) -> Result<Self, CartError> {
        let lines = load_lines(storage.as_ref(), owner)?;
        Ok(Self {
            storage,
            owner,
            lines,
            session: None,
        })
    }

    /// Load the cart of whoever `session` has logged in, and keep following
    /// it.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Storage` if the backend cannot be read.
    pub fn follow(
        storage: Arc<dyn KeyValueStore>,
        session: &SessionContext,
    ) -> Result<Self, CartError> {
        let changes = session.owner_changes();
        let owner = *changes.borrow();
        let mut cart = Self::open(storage, owner)?;
        cart.session = Some(changes);
        Ok(cart)
    }

    /// Catch up with the session.
    ///
    /// When someone logged in or out since the last call, the in-memory
    /// lines are dropped and the cart of the current account is loaded from
    /// storage. Returns whether that happened. Carts made with
    /// [`CartStore::open`] never change owner here.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Storage` if the backend cannot be read.
    pub fn sync(&mut self) -> Result<bool, CartError> {
        let Some(changes) = self.session.as_mut() else {
            return Ok(false);
        };
        if !changes.has_changed().unwrap_or(false) {
            return Ok(false);
        }
        let owner = *changes.borrow();
        let lines = load_lines(self.storage.as_ref(), owner)?;
        changes.mark_unchanged();
        self.lines = lines;
        self.owner = owner;
        debug!(owner = %keys::cart(owner), lines = self.lines.len(), "Cart followed the session");
        Ok(true)
    }

    /// The account this cart belongs to.
    #[must_use]
    pub const fn owner(&self) -> Option<UserId> {
        self.owner
    }

    /// Reload the cart for another account.
    ///
    /// The current lines stay stored under the previous owner's key.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Storage` if the backend cannot be read.
    pub fn switch_owner(&mut self, owner: Option<UserId>) -> Result<(), CartError> {
        if owner == self.owner {
            return Ok(());
        }
        self.lines = load_lines(self.storage.as_ref(), owner)?;
        self.owner = owner;
        debug!(owner = %keys::cart(owner), lines = self.lines.len(), "Cart switched owner");
        Ok(())
    }

    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Sum of `unit_price × quantity` over all lines.
    #[must_use]
    pub fn total(&self) -> Money {
        self.lines.iter().map(CartLine::subtotal).sum()
    }

    /// Number of units in the cart, bundles counted once each.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines
            .iter()
            .fold(0u32, |count, line| count.saturating_add(line.quantity()))
    }

    /// Add `quantity` units of `product`, summing with an existing line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidQuantity` for 0, `CartError::Unavailable`
    /// for inactive products and `CartError::OutOfStock` when the summed
    /// quantity exceeds the reported stock.
    pub fn add(&mut self, product: &Product, quantity: u32) -> Result<(), CartError> {
        self.sync()?;
        if quantity == 0 {
            return Err(CartError::InvalidQuantity(quantity));
        }
        if !product.active {
            return Err(CartError::Unavailable(product.name.clone()));
        }

        let key = LineKey::Product(product.id);
        let mut lines = self.lines.clone();
        let existing = lines
            .iter()
            .find(|line| line.key() == key)
            .map_or(0, CartLine::quantity);
        // Refresh the snapshot with the latest catalog data.
        let line = product_line(product, existing.saturating_add(quantity));
        line.check_stock(line.quantity())?;
        match lines.iter_mut().find(|line| line.key() == key) {
            Some(slot) => *slot = line,
            None => lines.push(line),
        }

        self.commit(lines)
    }

    /// Add `quantity` bundles of `offer`, summing with an existing line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidQuantity` for 0 and
    /// `CartError::Unavailable` for inactive, expired or empty offers.
    pub fn add_offer(&mut self, offer: &Offer, quantity: u32) -> Result<(), CartError> {
        self.add_offer_at(offer, quantity, Utc::now())
    }

    /// [`CartStore::add_offer`] with an explicit clock.
    ///
    /// # Errors
    ///
    /// Same as [`CartStore::add_offer`].
    pub fn add_offer_at(
        &mut self,
        offer: &Offer,
        quantity: u32,
        now: DateTime<Utc>,
    ) -> Result<(), CartError> {
        self.sync()?;
        if quantity == 0 {
            return Err(CartError::InvalidQuantity(quantity));
        }
        if !offer.is_available_at(now) {
            return Err(CartError::Unavailable(offer.name.clone()));
        }

        let key = LineKey::Offer(offer.id);
        let mut lines = self.lines.clone();
        let existing = lines
            .iter()
            .find(|line| line.key() == key)
            .map_or(0, CartLine::quantity);
        let line = CartLine::Offer {
            offer: offer.id,
            name: offer.name.clone(),
            unit_price: offer.price,
            quantity: existing.saturating_add(quantity),
            products: offer.products.clone(),
        };
        match lines.iter_mut().find(|line| line.key() == key) {
            Some(slot) => *slot = line,
            None => lines.push(line),
        }

        self.commit(lines)
    }

    /// Set the quantity of a line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidQuantity` for 0 (the line is kept; use
    /// [`CartStore::remove`] to drop it), `CartError::NotInCart` for an
    /// unknown key and `CartError::OutOfStock` above the known stock.
    pub fn update_qty(&mut self, key: LineKey, quantity: u32) -> Result<(), CartError> {
        self.sync()?;
        if quantity < 1 {
            return Err(CartError::InvalidQuantity(quantity));
        }
        let mut lines = self.lines.clone();
        let line = lines
            .iter_mut()
            .find(|line| line.key() == key)
            .ok_or(CartError::NotInCart(key))?;
        line.check_stock(quantity)?;
        line.set_quantity(quantity);

        self.commit(lines)
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::NotInCart` for an unknown key.
    pub fn remove(&mut self, key: LineKey) -> Result<(), CartError> {
        self.sync()?;
        if !self.lines.iter().any(|line| line.key() == key) {
            return Err(CartError::NotInCart(key));
        }
        let lines = self
            .lines
            .iter()
            .filter(|line| line.key() != key)
            .cloned()
            .collect();
        self.commit(lines)
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Storage` if the stored cart cannot be removed.
    pub fn clear(&mut self) -> Result<(), CartError> {
        self.sync()?;
        self.commit(Vec::new())
    }

    /// Persist `lines`, then adopt them.
    fn commit(&mut self, lines: Vec<CartLine>) -> Result<(), CartError> {
        let key = keys::cart(self.owner);
        if lines.is_empty() {
            self.storage.remove(&key)?;
        } else {
            save_json(self.storage.as_ref(), &key, &lines)?;
        }
        self.lines = lines;
        Ok(())
    }
}

fn product_line(product: &Product, quantity: u32) -> CartLine {
    CartLine::Product {
        product: product.id,
        name: product.name.clone(),
        unit_price: product.price,
        quantity,
        stock: product.stock,
    }
}

fn load_lines(storage: &dyn KeyValueStore, owner: Option<UserId>) -> Result<Vec<CartLine>, CartError> {
    let key = keys::cart(owner);
    match load_json::<Vec<CartLine>>(storage, &key) {
        Ok(lines) => Ok(lines
            .unwrap_or_default()
            .into_iter()
            .filter(|line| line.quantity() >= 1)
            .collect()),
        Err(StorageError::Encoding(e)) => {
            warn!(key = %key, error = %e, "Discarding unreadable cart");
            Ok(Vec::new())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;
    use crumb_core::BranchId;

    use super::*;
    use crate::session::tests::{offline_auth, token_for};
    use crate::storage::MemoryStore;

    fn product(id: i64, price_cents: i64, stock: Option<u32>) -> Product {
        Product {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            description: String::new(),
            price: Money::from_cents(price_cents).unwrap(),
            stock,
            category: None,
            branch: Some(BranchId::new(1)),
            active: true,
            image: None,
        }
    }

    fn offer(id: i64) -> Offer {
        Offer {
            id: OfferId::new(id),
            name: "Desayuno".to_string(),
            description: String::new(),
            price: Money::from_cents(500).unwrap(),
            products: vec![OfferComponent {
                product: ProductId::new(1),
                name: "Medialuna".to_string(),
                multiplier: 3,
            }],
            branch: Some(BranchId::new(1)),
            starts_at: None,
            ends_at: None,
            active: true,
        }
    }

    fn cart(owner: Option<i64>) -> (Arc<dyn KeyValueStore>, CartStore) {
        let storage: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let cart = CartStore::open(Arc::clone(&storage), owner.map(UserId::new)).unwrap();
        (storage, cart)
    }

    #[test]
    fn test_add_accumulates_quantity() {
        let (_, mut cart) = cart(Some(1));
        let bread = product(1, 250, None);
        cart.add(&bread, 2).unwrap();
        cart.add(&bread, 3).unwrap();

        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.lines()[0].quantity(), 5);
        assert_eq!(cart.total(), Money::from_cents(1250).unwrap());
    }

    #[test]
    fn test_update_below_one_keeps_quantity() {
        let (_, mut cart) = cart(Some(1));
        let bread = product(1, 250, None);
        cart.add(&bread, 4).unwrap();

        let result = cart.update_qty(LineKey::Product(bread.id), 0);
        assert!(matches!(result, Err(CartError::InvalidQuantity(0))));
        assert_eq!(cart.lines()[0].quantity(), 4);

        cart.update_qty(LineKey::Product(bread.id), 1).unwrap();
        assert_eq!(cart.lines()[0].quantity(), 1);
    }

    #[test]
    fn test_clear_empties_cart_and_storage() {
        let (storage, mut cart) = cart(Some(1));
        cart.add(&product(1, 250, None), 2).unwrap();
        cart.add_offer(&offer(9), 1).unwrap();
        assert!(storage.get("cart:1").unwrap().is_some());

        cart.clear().unwrap();
        assert_eq!(cart.total(), Money::ZERO);
        assert_eq!(cart.item_count(), 0);
        assert!(storage.get("cart:1").unwrap().is_none());
    }

    #[test]
    fn test_stock_is_checked_on_summed_quantity() {
        let (_, mut cart) = cart(None);
        let cake = product(2, 1800, Some(3));
        cart.add(&cake, 2).unwrap();

        let err = cart.add(&cake, 2).unwrap_err();
        assert!(matches!(
            err,
            CartError::OutOfStock {
                available: 3,
                requested: 4,
                ..
            }
        ));
        assert_eq!(cart.lines()[0].quantity(), 2);

        assert!(cart.update_qty(LineKey::Product(cake.id), 4).is_err());
        assert_eq!(cart.lines()[0].quantity(), 2);
    }

    #[test]
    fn test_inactive_product_and_zero_quantity_rejected() {
        let (_, mut cart) = cart(None);
        let mut bread = product(1, 250, None);
        assert!(matches!(
            cart.add(&bread, 0),
            Err(CartError::InvalidQuantity(0))
        ));
        bread.active = false;
        assert!(matches!(cart.add(&bread, 1), Err(CartError::Unavailable(_))));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_expired_offer_rejected() {
        let (_, mut cart) = cart(None);
        let now = Utc::now();
        let mut expired = offer(9);
        expired.ends_at = Some(now - Duration::minutes(1));
        assert!(matches!(
            cart.add_offer_at(&expired, 1, now),
            Err(CartError::Unavailable(_))
        ));

        let live = offer(10);
        cart.add_offer_at(&live, 1, now).unwrap();
        cart.add_offer_at(&live, 2, now).unwrap();
        assert_eq!(cart.lines()[0].quantity(), 3);
        assert_eq!(cart.total(), Money::from_cents(1500).unwrap());
    }

    #[test]
    fn test_cart_persists_per_owner() {
        let (storage, mut cart) = cart(Some(1));
        cart.add(&product(1, 250, None), 2).unwrap();

        let reopened = CartStore::open(Arc::clone(&storage), Some(UserId::new(1))).unwrap();
        assert_eq!(reopened.lines(), cart.lines());

        cart.switch_owner(Some(UserId::new(2))).unwrap();
        assert!(cart.is_empty());
        cart.switch_owner(Some(UserId::new(1))).unwrap();
        assert_eq!(cart.item_count(), 2);
    }

    #[test]
    fn test_remove_and_unknown_lines() {
        let (_, mut cart) = cart(None);
        let bread = product(1, 250, None);
        cart.add(&bread, 1).unwrap();
        cart.add_offer(&offer(9), 1).unwrap();

        cart.remove(LineKey::Product(bread.id)).unwrap();
        assert_eq!(cart.lines().len(), 1);
        assert!(matches!(
            cart.remove(LineKey::Product(bread.id)),
            Err(CartError::NotInCart(_))
        ));
    }

    #[test]
    fn test_corrupt_cart_is_discarded() {
        let storage: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        storage.set("cart:guest", "{oops").unwrap();
        let cart = CartStore::open(storage, None).unwrap();
        assert!(cart.is_empty());
    }

    #[test]
    fn test_line_key_parsing() {
        assert_eq!(
            "offer:9".parse::<LineKey>().unwrap(),
            LineKey::Offer(OfferId::new(9))
        );
        assert_eq!(
            "3".parse::<LineKey>().unwrap(),
            LineKey::Product(ProductId::new(3))
        );
        assert_eq!(LineKey::Product(ProductId::new(3)).to_string(), "product:3");
        assert!("bundle:1".parse::<LineKey>().is_err());
    }

    #[tokio::test]
    async fn test_followed_cart_is_not_written_back_after_logout() {
        let storage: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let session = SessionContext::mount(offline_auth(), Arc::clone(&storage)).await;
        session
            .complete_oauth(token_for(5, "customer", 3600), Some("r1".to_string()))
            .await
            .unwrap();

        let mut cart = CartStore::follow(Arc::clone(&storage), &session).unwrap();
        assert_eq!(cart.owner(), Some(UserId::new(5)));
        cart.add(&product(1, 200, None), 2).unwrap();
        assert!(storage.get("cart:5").unwrap().is_some());

        session.logout().await;
        assert!(storage.get("cart:5").unwrap().is_none());

        cart.add(&product(2, 300, None), 1).unwrap();
        assert!(storage.get("cart:5").unwrap().is_none());
        assert_eq!(cart.owner(), None);
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.total(), Money::from_cents(300).unwrap());
        let guest: Vec<CartLine> = load_json(storage.as_ref(), "cart:guest").unwrap().unwrap();
        assert_eq!(guest.len(), 1);
    }

    #[tokio::test]
    async fn test_followed_cart_reloads_after_switching_accounts() {
        let storage: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let session = SessionContext::mount(offline_auth(), Arc::clone(&storage)).await;
        session
            .complete_oauth(token_for(5, "customer", 3600), None)
            .await
            .unwrap();
        let mut cart = CartStore::follow(Arc::clone(&storage), &session).unwrap();
        cart.add(&product(1, 200, None), 1).unwrap();

        session
            .complete_oauth(token_for(6, "customer", 3600), None)
            .await
            .unwrap();
        assert!(cart.sync().unwrap());
        assert_eq!(cart.owner(), Some(UserId::new(6)));
        assert!(cart.is_empty());
        assert!(!cart.sync().unwrap());
        assert!(storage.get("cart:5").unwrap().is_some());
    }

    #[test]
    fn test_opened_cart_ignores_sync() {
        let storage: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let mut cart = CartStore::open(storage, Some(UserId::new(3))).unwrap();
        assert!(!cart.sync().unwrap());
        assert_eq!(cart.owner(), Some(UserId::new(3)));
    }
}
