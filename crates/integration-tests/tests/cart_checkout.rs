//! Browsing, filling a cart and checking it out against the mock API.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use crumb_client::cart::CartError;
use crumb_client::session::keys;
use crumb_client::{CartStore, ClientError, KeyValueStore, LineKey, MemoryStore, checkout};
use crumb_core::{BranchId, DeliveryMode, Money, OfferId, OrderStatus, ProductId, UserId};
use crumb_integration_tests::{MockApi, PASSWORD};
use secrecy::SecretString;
use serde_json::json;

#[tokio::test]
async fn test_catalog_listing_is_cached() {
    let mock = MockApi::start().await.unwrap();
    let api = mock.connect(Arc::new(MemoryStore::new())).await.unwrap();

    let first = api.products().list(Some(BranchId::new(1))).await.unwrap();
    let second = api.products().list(Some(BranchId::new(1))).await.unwrap();

    assert_eq!(first.len(), 3);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(mock.state.hits("GET /api/products"), 1);

    // Expired offers are listed but never offered for sale.
    assert_eq!(api.offers().list(None).await.unwrap().len(), 2);
    let available = api.offers().available(None).await.unwrap();
    assert_eq!(available.len(), 1);
    assert_eq!(available[0].id, OfferId::new(9));
    assert_eq!(mock.state.hits("GET /api/offers"), 1);
}

#[tokio::test]
async fn test_checkout_sends_expanded_offers_and_clears_cart() {
    let mock = MockApi::start().await.unwrap();
    let storage: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let api = mock.connect(Arc::clone(&storage)).await.unwrap();
    let identity = api
        .session()
        .login("ana@crumb.test", &SecretString::from(PASSWORD))
        .await
        .unwrap();

    let medialuna = api.products().get(ProductId::new(1)).await.unwrap();
    let desayuno = api.offers().get(OfferId::new(9)).await.unwrap();

    let mut cart = CartStore::open(Arc::clone(&storage), Some(identity.id)).unwrap();
    cart.add(&medialuna, 2).unwrap();
    cart.add_offer(&desayuno, 2).unwrap();
    assert_eq!(cart.total(), Money::from_cents(1160).unwrap());
    assert!(storage.get(&keys::cart(Some(identity.id))).unwrap().is_some());

    let order = checkout(
        &api.orders(),
        &mut cart,
        BranchId::new(1),
        DeliveryMode::HomeDelivery {
            address: "  Calle 12 #345 ".to_string(),
        },
    )
    .await
    .unwrap();

    assert_eq!(order.status, OrderStatus::Received);
    assert_eq!(order.customer, Some(UserId::new(1)));
    assert!(cart.is_empty());
    assert!(storage.get(&keys::cart(Some(identity.id))).unwrap().is_none());

    let sent = mock.state.received_orders();
    assert_eq!(sent.len(), 1);
    let body = &sent[0];
    assert_eq!(body["branch"], 1);
    assert_eq!(body["delivery"]["mode"], "home_delivery");
    assert_eq!(body["delivery"]["address"], "Calle 12 #345");
    assert_eq!(body["items"][0]["type"], "product");
    assert_eq!(body["items"][0]["quantity"], 2);
    assert_eq!(body["items"][1]["type"], "offer");
    assert_eq!(body["items"][1]["offer"], 9);
    assert_eq!(body["items"][1]["quantity"], 2);
    assert_eq!(
        body["items"][1]["products"],
        json!([
            {"product": 1, "quantity": 6},
            {"product": 2, "quantity": 2}
        ])
    );
    let total: Money = serde_json::from_value(body["total"].clone()).unwrap();
    assert_eq!(total, Money::from_cents(1160).unwrap());
}

#[tokio::test]
async fn test_failed_checkout_keeps_the_cart() {
    let mock = MockApi::start().await.unwrap();
    let storage: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let api = mock.connect(Arc::clone(&storage)).await.unwrap();
    let identity = api
        .session()
        .login("ana@crumb.test", &SecretString::from(PASSWORD))
        .await
        .unwrap();
    let cafe = api.products().get(ProductId::new(2)).await.unwrap();

    let mut cart = CartStore::open(Arc::clone(&storage), Some(identity.id)).unwrap();
    cart.add(&cafe, 1).unwrap();

    let err = checkout(
        &api.orders(),
        &mut cart,
        BranchId::new(1),
        DeliveryMode::HomeDelivery {
            address: "   ".to_string(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ClientError::Checkout(_)));

    mock.state
        .always_unauthorized
        .store(true, std::sync::atomic::Ordering::SeqCst);
    let err = checkout(&api.orders(), &mut cart, BranchId::new(1), DeliveryMode::Pickup)
        .await
        .unwrap_err();
    assert!(err.is_unauthorized());

    assert_eq!(cart.item_count(), 1);
    assert!(mock.state.received_orders().is_empty());
}

#[tokio::test]
async fn test_stock_limits_cart_quantities() {
    let mock = MockApi::start().await.unwrap();
    let storage: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let api = mock.connect(Arc::clone(&storage)).await.unwrap();
    let torta = api.products().get(ProductId::new(3)).await.unwrap();

    let mut cart = CartStore::open(storage, None).unwrap();
    cart.add(&torta, 1).unwrap();
    let err = cart.add(&torta, 1).unwrap_err();

    assert!(matches!(
        err,
        CartError::OutOfStock {
            available: 1,
            requested: 2,
            ..
        }
    ));
    assert_eq!(cart.lines()[0].quantity(), 1);
    assert!(cart.update_qty(LineKey::Product(ProductId::new(3)), 0).is_err());
}

#[tokio::test]
async fn test_logout_drops_the_users_cart() {
    let mock = MockApi::start().await.unwrap();
    let storage: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let api = mock.connect(Arc::clone(&storage)).await.unwrap();
    let ana = api
        .session()
        .login("ana@crumb.test", &SecretString::from(PASSWORD))
        .await
        .unwrap();
    let medialuna = api.products().get(ProductId::new(1)).await.unwrap();

    let mut cart = CartStore::open(Arc::clone(&storage), Some(ana.id)).unwrap();
    cart.add(&medialuna, 4).unwrap();

    api.session().logout().await;
    assert!(storage.get(&keys::cart(Some(ana.id))).unwrap().is_none());

    let bea = api
        .session()
        .login("bea@crumb.test", &SecretString::from(PASSWORD))
        .await
        .unwrap();
    assert_eq!(bea.id, UserId::new(2));
    let cart = CartStore::open(Arc::clone(&storage), Some(bea.id)).unwrap();
    assert!(cart.is_empty());
}

#[tokio::test]
async fn test_checkout_refreshes_the_catalog() {
    let mock = MockApi::start().await.unwrap();
    let storage: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let api = mock.connect(Arc::clone(&storage)).await.unwrap();
    api.session()
        .login("ana@crumb.test", &SecretString::from(PASSWORD))
        .await
        .unwrap();

    let listed = api.products().list(Some(BranchId::new(1))).await.unwrap();
    api.offers().list(None).await.unwrap();
    let mut cart = CartStore::follow(Arc::clone(&storage), api.session()).unwrap();
    cart.add(&listed[0], 1).unwrap();

    checkout(&api.orders(), &mut cart, BranchId::new(1), DeliveryMode::Pickup)
        .await
        .unwrap();
    api.products().list(Some(BranchId::new(1))).await.unwrap();
    api.offers().list(None).await.unwrap();

    assert_eq!(mock.state.hits("GET /api/products"), 2);
    assert_eq!(mock.state.hits("GET /api/offers"), 2);
}

#[tokio::test]
async fn test_followed_cart_is_not_resurrected_after_logout() {
    let mock = MockApi::start().await.unwrap();
    let storage: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let api = mock.connect(Arc::clone(&storage)).await.unwrap();
    let ana = api
        .session()
        .login("ana@crumb.test", &SecretString::from(PASSWORD))
        .await
        .unwrap();
    let medialuna = api.products().get(ProductId::new(1)).await.unwrap();
    let cafe = api.products().get(ProductId::new(2)).await.unwrap();

    let mut cart = CartStore::follow(Arc::clone(&storage), api.session()).unwrap();
    cart.add(&medialuna, 4).unwrap();
    api.session().logout().await;

    cart.add(&cafe, 1).unwrap();
    assert!(storage.get(&keys::cart(Some(ana.id))).unwrap().is_none());
    assert_eq!(cart.owner(), None);
    assert_eq!(cart.item_count(), 1);

    let bea = api
        .session()
        .login("bea@crumb.test", &SecretString::from(PASSWORD))
        .await
        .unwrap();
    let err = cart.remove(LineKey::Product(ProductId::new(2))).unwrap_err();
    assert!(matches!(err, CartError::NotInCart(_)));
    assert_eq!(cart.owner(), Some(bea.id));
    assert!(cart.is_empty());
    assert!(storage.get(&keys::cart(None)).unwrap().is_some());
}
