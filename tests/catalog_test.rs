mod common;

use assert_matches::assert_matches;
use rust_decimal_macros::dec;

use storefront_api::errors::ServiceError;
use storefront_api::services::catalog::ProductInput;

use common::TestApp;

#[tokio::test]
async fn product_fields_round_trip_through_the_catalog() {
    let app = TestApp::new().await;
    let owner = app.seed_owner("owner@example.com").await;
    let store = app.seed_store(owner.id, "gadgets").await;

    let catalog = &app.state.services.catalog;
    let created = catalog
        .create_product(
            owner.id,
            store.id,
            ProductInput {
                name: "widget".to_string(),
                description: "a fine widget".to_string(),
                price: dec!(9.99),
                quantity: 3,
                image: "/img/widget.png".to_string(),
            },
        )
        .await
        .unwrap();

    let fetched = catalog.get_product(store.id, created.id).await.unwrap();
    assert_eq!(fetched.description, "a fine widget");
    assert_eq!(fetched.image, "/img/widget.png");
    assert_eq!(fetched.price, dec!(9.99));

    let listed = catalog.list_store_products(store.id).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].description, "a fine widget");
}

#[tokio::test]
async fn adjust_stock_moves_quantity_by_signed_delta() {
    let app = TestApp::new().await;
    let owner = app.seed_owner("owner@example.com").await;
    let store = app.seed_store(owner.id, "gadgets").await;
    let widget = app
        .seed_product(owner.id, store.id, "widget", dec!(5.00), 10)
        .await;

    let catalog = &app.state.services.catalog;
    let restocked = catalog
        .adjust_stock(owner.id, store.id, widget.id, 5)
        .await
        .unwrap();
    assert_eq!(restocked.quantity, 15);

    let shrunk = catalog
        .adjust_stock(owner.id, store.id, widget.id, -12)
        .await
        .unwrap();
    assert_eq!(shrunk.quantity, 3);
}

/// Removing more units than exist fails atomically, including against
/// stock already reserved by carts.
#[tokio::test]
async fn adjust_stock_never_goes_below_zero() {
    let app = TestApp::new().await;
    let owner = app.seed_owner("owner@example.com").await;
    let store = app.seed_store(owner.id, "gadgets").await;
    let customer = app.seed_customer("buyer@example.com", store.id).await;
    let widget = app
        .seed_product(owner.id, store.id, "widget", dec!(5.00), 10)
        .await;

    // A cart reservation leaves 4 units available.
    app.state
        .services
        .carts
        .add_item(customer.id, store.id, widget.id, 6)
        .await
        .unwrap();

    let catalog = &app.state.services.catalog;
    let err = catalog
        .adjust_stock(owner.id, store.id, widget.id, -5)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InsufficientStock(_));
    assert_eq!(app.product_quantity(widget.id).await, 4);

    let drained = catalog
        .adjust_stock(owner.id, store.id, widget.id, -4)
        .await
        .unwrap();
    assert_eq!(drained.quantity, 0);
}

#[tokio::test]
async fn adjust_stock_requires_store_ownership() {
    let app = TestApp::new().await;
    let owner = app.seed_owner("owner@example.com").await;
    let interloper = app.seed_owner("other@example.com").await;
    let store = app.seed_store(owner.id, "gadgets").await;
    let widget = app
        .seed_product(owner.id, store.id, "widget", dec!(5.00), 10)
        .await;

    let err = app
        .state
        .services
        .catalog
        .adjust_stock(interloper.id, store.id, widget.id, 5)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Forbidden(_));
}

/// Deleting a product takes its cart lines with it, while order snapshot
/// lines survive and keep rendering.
#[tokio::test]
async fn deleting_a_product_clears_cart_lines_but_not_order_snapshots() {
    let app = TestApp::new().await;
    let owner = app.seed_owner("owner@example.com").await;
    let store = app.seed_store(owner.id, "gadgets").await;
    let buyer = app.seed_customer("buyer@example.com", store.id).await;
    let browser = app.seed_customer("browser@example.com", store.id).await;
    let widget = app
        .seed_product(owner.id, store.id, "widget", dec!(5.00), 10)
        .await;

    let carts = &app.state.services.carts;
    carts
        .add_item(buyer.id, store.id, widget.id, 1)
        .await
        .unwrap();
    let order = app
        .state
        .services
        .orders
        .create_order(buyer.id, store.id, "1 Main St")
        .await
        .unwrap();
    // A second customer still holds the product in their cart.
    carts
        .add_item(browser.id, store.id, widget.id, 2)
        .await
        .unwrap();

    app.state
        .services
        .catalog
        .delete_product(owner.id, store.id, widget.id)
        .await
        .unwrap();

    assert_eq!(app.cart_line_count(browser.id).await, 0);

    let lines = app
        .state
        .services
        .orders
        .get_order_products(order.id)
        .await
        .unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].name, "(removed product)");
    assert_eq!(lines[0].price, dec!(5.00));
}
